//! Error types for the herald-bus crate.

use thiserror::Error;

use crate::token::TokenError;

/// Top-level bus error type.
#[derive(Debug, Error)]
pub enum BusError {
    /// The AMQP transport failed.
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),

    /// Connecting to the broker took longer than the configured timeout.
    #[error("timed out connecting to the message broker")]
    ConnectTimeout,

    /// A token could not be encoded.
    #[error("token error: {0}")]
    Codec(#[from] TokenError),

    /// The in-memory bus channel is gone (consumer dropped).
    #[error("bus channel closed")]
    Closed,

    /// `consume` was called a second time on a single-consumer bus.
    #[error("bus consumer already taken")]
    ConsumerTaken,
}
