//! Runtime selection of the bus backend.

use std::sync::Arc;

use herald_common::RetryStrategy;
use serde::Deserialize;

use crate::{AmqpBus, AmqpConfig, BusError, DelayBus, MemoryBus, worker::WorkerConfig};

/// Configuration for the delay bus backend.
///
/// ```ron
/// bus: Amqp((host: "localhost", port: 5672, user: "guest", pass: "guest"))
/// ```
///
/// or, for development and tests:
///
/// ```ron
/// bus: Memory
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum BusConfig {
    /// AMQP broker with the delayed-message plugin (production)
    Amqp(AmqpConfig),
    /// Timer-based in-process bus (testing/development)
    Memory,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::Memory
    }
}

impl BusConfig {
    /// Connect the configured backend and return it as a trait object.
    ///
    /// # Errors
    /// Returns an error if the AMQP connection or topology declaration fails.
    pub async fn into_bus(
        self,
        retries: RetryStrategy,
        workers: WorkerConfig,
    ) -> Result<Arc<dyn DelayBus>, BusError> {
        match self {
            Self::Amqp(config) => Ok(Arc::new(
                AmqpBus::connect(&config, retries, workers).await?,
            )),
            Self::Memory => Ok(Arc::new(MemoryBus::new(workers))),
        }
    }
}
