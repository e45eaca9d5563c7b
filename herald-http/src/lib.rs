//! HTTP facade for herald.
//!
//! Four routes over the scheduler facade:
//!
//! - `POST /api/v1/notify`: schedule a notification (201)
//! - `GET /api/v1/notify/{id}`: current status (200)
//! - `DELETE /api/v1/notify/{id}`: cancel while pending (200)
//! - `GET /api/v1/notifications`: newest records (200)
//!
//! Validation and domain conflicts map to 400, missing records to 404,
//! backend failures to 500 (logged, details withheld).

pub mod dto;
pub mod error;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use routes::router;
pub use server::{HttpServer, ServerConfig, ServerError};
