pub mod domain;
pub mod logging;
pub mod retry;

pub use domain::{Channel, CreateNotification, Notification, Status};
pub use retry::RetryStrategy;
pub use tracing;

/// Control signal broadcast to every serve loop at shutdown.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
    Finalised,
}
