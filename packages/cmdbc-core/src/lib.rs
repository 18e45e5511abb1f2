//! cmdbc Core Library
//!
//! This crate provides the core functionality for the cmdbc peripheral agent:
//! - Device snapshots in their canonical JSON form
//! - Field-level change detection against a stored baseline
//! - Baseline storage in local files or on the CMDB server
//! - CMDB server synchronization (authentication, check-in/check-out,
//!   serial numbers, audit reports)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cmdbc_core::{audit, config, AuditMode, Auditor, DeviceSnapshot, LocalStore, Session, SyncClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = config::load_config(None)?;
//!     let session = Arc::new(Session::new(&config.api.client_id)?);
//!     let auditor = Auditor::new(
//!         LocalStore::new(&config.state_dir),
//!         Some(SyncClient::new(config.api.clone(), session)),
//!         audit::ChangeLog::new(&config.change_log),
//!     );
//!
//!     let mut snapshot = DeviceSnapshot::restore(&std::fs::read("reader.json")?)?;
//!     let outcome = auditor.audit(&mut snapshot, AuditMode::Remote).await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod cloud;
pub mod config;
pub mod device;
pub mod error;
pub mod store;

#[cfg(test)]
mod testing;

pub use audit::{AuditMode, AuditOutcome, Auditor};
pub use cloud::{Session, SyncClient};
pub use device::{ChangeRecord, DeviceIdentity, DeviceSnapshot};
pub use error::{Error, Result};
pub use store::{LocalStore, RemoteStore, StateStore};
