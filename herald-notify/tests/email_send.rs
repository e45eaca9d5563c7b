//! Email sender integration tests against an in-process mock SMTP server.

use std::sync::Arc;

use chrono::Utc;
use herald_common::{Channel, CreateNotification, Notification};
use herald_notify::{EmailConfig, EmailNotifier, Notifier, SendError};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpListener,
    sync::Mutex,
};

fn notification(message: &str) -> Notification {
    Notification::from_request(CreateNotification {
        user_id: "person@example.com".to_string(),
        channel: Channel::Email,
        message: message.to_string(),
        send_at: Utc::now(),
    })
}

/// Serve exactly one SMTP conversation, capturing any DATA payloads.
/// `reject_rcpt` makes the server refuse RCPT TO with a 550.
async fn serve_one(listener: TcpListener, captured: Arc<Mutex<Vec<String>>>, reject_rcpt: bool) {
    let (stream, _) = listener.accept().await.expect("accept");
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    write_half
        .write_all(b"220 mock.example.com ESMTP\r\n")
        .await
        .expect("greeting");

    while let Ok(Some(line)) = lines.next_line().await {
        let upper = line.to_ascii_uppercase();
        let reply: &[u8] = if upper.starts_with("EHLO") {
            b"250-mock.example.com\r\n250 AUTH PLAIN\r\n"
        } else if upper.starts_with("AUTH") {
            b"235 authenticated\r\n"
        } else if upper.starts_with("RCPT") && reject_rcpt {
            b"550 user not found\r\n"
        } else if upper.starts_with("MAIL") || upper.starts_with("RCPT") {
            b"250 ok\r\n"
        } else if upper == "DATA" {
            write_half.write_all(b"354 go ahead\r\n").await.expect("354");
            let mut body = String::new();
            while let Ok(Some(data_line)) = lines.next_line().await {
                if data_line == "." {
                    break;
                }
                body.push_str(&data_line);
                body.push('\n');
            }
            captured.lock().await.push(body);
            b"250 queued\r\n"
        } else if upper == "QUIT" {
            write_half.write_all(b"221 bye\r\n").await.expect("221");
            break;
        } else {
            b"250 ok\r\n"
        };
        write_half.write_all(reply).await.expect("reply");
    }
}

async fn spawn_server(reject_rcpt: bool) -> (u16, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let captured = Arc::new(Mutex::new(Vec::new()));
    tokio::spawn(serve_one(listener, captured.clone(), reject_rcpt));
    (port, captured)
}

#[tokio::test(flavor = "multi_thread")]
async fn send_drives_a_full_smtp_conversation() {
    let (port, captured) = spawn_server(false).await;

    let notifier = EmailNotifier::new(EmailConfig {
        smtp_host: "127.0.0.1".to_string(),
        smtp_port: port,
        user: "noreply@example.com".to_string(),
        pass: "secret".to_string(),
    });

    notifier
        .send(&notification("hello from the scheduler"))
        .await
        .expect("send");

    let bodies = captured.lock().await;
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("From: noreply@example.com"));
    assert!(bodies[0].contains("To: person@example.com"));
    assert!(bodies[0].contains("Subject: Notification"));
    assert!(bodies[0].contains("hello from the scheduler"));
}

#[tokio::test(flavor = "multi_thread")]
async fn send_surfaces_a_refused_recipient() {
    let (port, captured) = spawn_server(true).await;

    let notifier = EmailNotifier::new(EmailConfig {
        smtp_host: "127.0.0.1".to_string(),
        smtp_port: port,
        user: "noreply@example.com".to_string(),
        pass: String::new(),
    });

    let result = notifier.send(&notification("never delivered")).await;
    match result {
        Err(SendError::Smtp(err)) => assert!(err.to_string().contains("550")),
        other => panic!("expected an SMTP error, got {other:?}"),
    }
    assert!(captured.lock().await.is_empty());
}

#[tokio::test]
async fn send_surfaces_a_connection_failure() {
    // Nothing listens on this freshly bound-and-dropped port.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let notifier = EmailNotifier::new(EmailConfig {
        smtp_host: "127.0.0.1".to_string(),
        smtp_port: port,
        user: String::new(),
        pass: String::new(),
    });

    let result = notifier.send(&notification("never delivered")).await;
    assert!(matches!(result, Err(SendError::Smtp(_))));
}
