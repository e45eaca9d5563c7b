//! The facade HTTP server.

use std::{io, sync::Arc, time::Duration};

use axum::Router;
use herald_common::{Signal, internal};
use herald_scheduler::Scheduler;
use serde::Deserialize;
use thiserror::Error;
use tokio::{net::TcpListener, sync::broadcast};
use tower_http::timeout::TimeoutLayer;
use tracing::warn;

use crate::routes;

fn default_addr() -> String {
    "0.0.0.0:8080".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_shutdown_timeout_secs() -> u64 {
    5
}

/// Listen settings for the HTTP facade.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address.
    ///
    /// Default: `0.0.0.0:8080`
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Per-request timeout, in seconds.
    ///
    /// Default: 30
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long a graceful shutdown waits for open connections.
    ///
    /// Default: 5
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            request_timeout_secs: default_request_timeout_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

/// Errors from the HTTP server lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(String),
}

/// The facade HTTP server.
pub struct HttpServer {
    listener: TcpListener,
    router: Router,
    shutdown_timeout: Duration,
}

impl HttpServer {
    /// Bind the listener and assemble the router.
    ///
    /// # Errors
    /// Returns an error if binding to the configured address fails.
    pub async fn bind(config: &ServerConfig, scheduler: Arc<Scheduler>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.addr)
            .await
            .map_err(|source| ServerError::Bind {
                address: config.addr.clone(),
                source,
            })?;

        internal!("HTTP facade bound on {}", config.addr);

        let router = routes::router(scheduler)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)));

        Ok(Self {
            listener,
            router,
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_secs),
        })
    }

    /// Run until the shutdown signal fires, then drain connections for at
    /// most the configured shutdown timeout.
    pub async fn serve(
        self,
        shutdown: broadcast::Receiver<Signal>,
    ) -> Result<(), ServerError> {
        internal!("HTTP facade starting");

        let mut graceful = shutdown;
        let mut deadline = graceful.resubscribe();
        let shutdown_timeout = self.shutdown_timeout;

        let serve = async move {
            axum::serve(self.listener, self.router)
                .with_graceful_shutdown(async move {
                    let _ = graceful.recv().await;
                    internal!("HTTP facade received shutdown signal");
                })
                .await
        };

        tokio::select! {
            result = serve => {
                result.map_err(|err| ServerError::Serve(err.to_string()))?;
            }
            () = async move {
                let _ = deadline.recv().await;
                tokio::time::sleep(shutdown_timeout).await;
            } => {
                warn!("Shutdown deadline exceeded, aborting open connections");
            }
        }

        internal!("HTTP facade stopped");
        Ok(())
    }
}
