//! Delayed message bus for herald.
//!
//! The bus carries tokens (a record id and nothing else) and guarantees a
//! token is never delivered before its delay elapses, and is delivered at
//! least once eventually. Consumption is at-least-once with per-token
//! ack/nack; processing must therefore be idempotent, which the scheduler's
//! status gate provides.

pub mod amqp;
pub mod bus;
pub mod config;
pub mod error;
pub mod memory;
pub mod token;
pub mod worker;

pub use amqp::{AmqpBus, AmqpConfig};
pub use bus::DelayBus;
pub use config::BusConfig;
pub use error::BusError;
pub use memory::MemoryBus;
pub use worker::{Outcome, TokenProcessor, WorkerConfig};
