//! Minimal SMTP client for the email sender.
//!
//! Plain TCP, one conversation per delivery attempt: greeting, EHLO,
//! optional AUTH PLAIN, MAIL FROM, RCPT TO, DATA, QUIT. Multi-line responses
//! are handled; the payload is dot-stuffed before transmission.

use std::io;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use herald_common::{incoming, outgoing};
use thiserror::Error;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

/// Chunk size for reads off the socket.
const READ_CHUNK: usize = 1024;

/// Maximum size of a buffered response before we give up on the server.
const MAX_RESPONSE: usize = 64 * 1024;

/// Errors that can occur during an SMTP conversation.
#[derive(Debug, Error)]
pub enum SmtpError {
    /// IO error during network operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Connection was closed unexpectedly.
    #[error("connection closed unexpectedly")]
    ConnectionClosed,

    /// Failed to parse an SMTP response from the server.
    #[error("failed to parse SMTP response: {0}")]
    Parse(String),

    /// The server refused a command.
    #[error("SMTP error: {code} - {message}")]
    Command { code: u16, message: String },
}

/// A complete (possibly multi-line) SMTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Response {
    /// All message lines joined by newlines.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    /// Whether this response indicates success (2xx code).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 300
    }

    /// Parse a complete response out of buffered text.
    ///
    /// Returns `Ok(None)` when more data is needed.
    pub(crate) fn parse(text: &str) -> Result<Option<Self>, SmtpError> {
        let mut code = None;
        let mut lines = Vec::new();

        for line in text.split_inclusive('\n') {
            if !line.ends_with('\n') {
                return Ok(None); // incomplete trailing line
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.len() < 3 {
                return Err(SmtpError::Parse(format!("response line too short: '{line}'")));
            }

            let line_code = line[..3]
                .parse::<u16>()
                .map_err(|_| SmtpError::Parse(format!("invalid status code: '{line}'")))?;
            if *code.get_or_insert(line_code) != line_code {
                return Err(SmtpError::Parse(format!(
                    "status code mismatch in multi-line response: '{line}'"
                )));
            }

            let is_last = match line.as_bytes().get(3) {
                Some(b' ') | None => true,
                Some(b'-') => false,
                Some(other) => {
                    return Err(SmtpError::Parse(format!(
                        "invalid separator character: '{}'",
                        char::from(*other)
                    )));
                }
            };
            lines.push(line.get(4..).unwrap_or("").to_string());

            if is_last {
                return Ok(Some(Self {
                    code: line_code,
                    lines,
                }));
            }
        }

        Ok(None) // need more lines
    }
}

/// An SMTP client driving one conversation.
pub struct SmtpClient {
    stream: TcpStream,
}

impl SmtpClient {
    /// Connect to the server and consume the 220 greeting.
    pub async fn connect(addr: &str) -> Result<Self, SmtpError> {
        let stream = TcpStream::connect(addr).await?;
        let mut client = Self { stream };

        let greeting = client.read_response().await?;
        if !greeting.is_success() {
            return Err(SmtpError::Command {
                code: greeting.code,
                message: greeting.message(),
            });
        }
        Ok(client)
    }

    async fn read_response(&mut self) -> Result<Response, SmtpError> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(SmtpError::ConnectionClosed);
            }
            buffer.extend_from_slice(&chunk[..n]);
            if buffer.len() > MAX_RESPONSE {
                return Err(SmtpError::Parse("response too large".to_string()));
            }

            let text = std::str::from_utf8(&buffer)
                .map_err(|err| SmtpError::Parse(err.to_string()))?;
            if let Some(response) = Response::parse(text)? {
                incoming!("{} {}", response.code, response.message());
                return Ok(response);
            }
        }
    }

    async fn send_line(&mut self, line: &str) -> Result<(), SmtpError> {
        outgoing!("{line}");
        self.stream.write_all(format!("{line}\r\n").as_bytes()).await?;
        Ok(())
    }

    /// Send a command and require a success (2xx) response.
    async fn command(&mut self, line: &str) -> Result<Response, SmtpError> {
        self.send_line(line).await?;
        let response = self.read_response().await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(SmtpError::Command {
                code: response.code,
                message: response.message(),
            })
        }
    }

    pub async fn ehlo(&mut self, domain: &str) -> Result<Response, SmtpError> {
        self.command(&format!("EHLO {domain}")).await
    }

    /// Authenticate with AUTH PLAIN.
    pub async fn auth_plain(&mut self, user: &str, pass: &str) -> Result<Response, SmtpError> {
        let token = STANDARD.encode(format!("\0{user}\0{pass}"));
        self.command(&format!("AUTH PLAIN {token}")).await
    }

    pub async fn mail_from(&mut self, from: &str) -> Result<Response, SmtpError> {
        self.command(&format!("MAIL FROM:<{from}>")).await
    }

    pub async fn rcpt_to(&mut self, to: &str) -> Result<Response, SmtpError> {
        self.command(&format!("RCPT TO:<{to}>")).await
    }

    /// Transmit the message payload: DATA, dot-stuffed body, closing dot.
    pub async fn data(&mut self, payload: &str) -> Result<Response, SmtpError> {
        self.send_line("DATA").await?;
        let response = self.read_response().await?;
        if response.code != 354 {
            return Err(SmtpError::Command {
                code: response.code,
                message: response.message(),
            });
        }

        let stuffed = dot_stuff(payload);
        self.stream.write_all(stuffed.as_bytes()).await?;
        if !stuffed.ends_with("\r\n") {
            self.stream.write_all(b"\r\n").await?;
        }
        self.send_line(".").await?;

        let response = self.read_response().await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(SmtpError::Command {
                code: response.code,
                message: response.message(),
            })
        }
    }

    /// Cleanly close the conversation. Failures here are not worth retrying.
    pub async fn quit(&mut self) -> Result<(), SmtpError> {
        self.send_line("QUIT").await?;
        let _ = self.read_response().await;
        Ok(())
    }
}

/// Prefix a dot to every payload line that starts with one (RFC 5321 §4.5.2).
fn dot_stuff(payload: &str) -> String {
    let mut stuffed = String::with_capacity(payload.len());
    for line in payload.split_inclusive('\n') {
        if line.starts_with('.') {
            stuffed.push('.');
        }
        stuffed.push_str(line);
    }
    stuffed
}
