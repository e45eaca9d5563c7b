//! The delayed-delivery state machine.
//!
//! One record moves `Pending → Sent | Cancelled | Failed`, driven by three
//! externalized collaborators: the record store (source of truth), the delay
//! bus (timers), and the channel senders. The scheduler is also the service
//! facade: `create`, `status`, `cancel`, `list` and `process` are the whole
//! surface, consumed by the HTTP layer and by tests alike.

pub mod error;
pub mod scheduler;

pub use error::SchedulerError;
pub use scheduler::Scheduler;
