//! Consumer worker plumbing shared by the bus backends.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::token;

/// How long a draining worker pool waits for in-flight handlers at shutdown.
pub(crate) const SHUTDOWN_GRACE_SECS: u64 = 5;

const fn default_count() -> u32 {
    5
}

const fn default_prefetch() -> u16 {
    10
}

/// Worker pool sizing.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent token handlers.
    ///
    /// Default: 5
    #[serde(default = "default_count")]
    pub count: u32,

    /// Unacked deliveries the bus hands the pool at once (back-pressure).
    ///
    /// Default: 10
    #[serde(default = "default_prefetch")]
    pub prefetch: u16,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            prefetch: default_prefetch(),
        }
    }
}

/// What to do with a token after one processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Ack: the token is settled (sent, no-op duplicate, record gone, or the
    /// next attempt has been republished).
    Done,
    /// Nack with requeue: transient failure, redeliver this token.
    Requeue,
    /// Nack without requeue: poison token, route to the dead-letter queue.
    Reject,
}

/// The consumer side of the scheduler: one processing attempt per token.
#[async_trait]
pub trait TokenProcessor: Send + Sync {
    async fn process(&self, id: Uuid) -> Outcome;
}

/// Decode a delivery body and run it through the processor.
///
/// Malformed bodies never reach the processor; they are rejected straight to
/// the dead-letter queue.
pub(crate) async fn dispatch(processor: &dyn TokenProcessor, body: &[u8]) -> Outcome {
    match token::decode(body) {
        Ok(id) => processor.process(id).await,
        Err(err) => {
            warn!(error = %err, "Rejecting malformed bus token");
            Outcome::Reject
        }
    }
}
