//! Error types for the scheduler facade.

use herald_bus::BusError;
use herald_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the facade operations.
///
/// Sender failures never appear here: they are absorbed by the retry loop
/// and materialize as a status transition to `Failed`.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `send_at` is not strictly in the future.
    #[error("send_at must be in the future")]
    SendAtInPast,

    /// No record with the requested id.
    #[error("notification not found")]
    NotFound,

    /// The record is no longer pending.
    #[error("cannot cancel non-pending notification")]
    CannotCancel,

    /// The record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The delay bus failed.
    #[error(transparent)]
    Bus(#[from] BusError),
}
