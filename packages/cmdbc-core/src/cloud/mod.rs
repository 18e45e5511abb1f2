//! CMDB server synchronization.
//!
//! Provides the HTTP client used for authentication, check-in/check-out,
//! serial number requests and audit submission.

mod client;
pub mod config;
mod session;
mod status;

pub use client::{Exchange, SyncClient};
pub use config::{ApiConfig, Endpoints};
pub use session::Session;
pub use status::{Disposition, HttpStatus};
