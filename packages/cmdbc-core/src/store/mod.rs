//! Baseline storage for device snapshots.
//!
//! Two interchangeable backends keyed by the device identity:
//! - [`LocalStore`]: one JSON file per device under a state directory
//! - [`RemoteStore`]: check-out/check-in against the CMDB server
//!
//! Stores only load and save; diffing and change logging belong to the
//! audit.

mod local;
mod remote;

pub use local::LocalStore;
pub use remote::RemoteStore;

use crate::device::{DeviceIdentity, DeviceSnapshot};
use crate::error::Result;

#[allow(async_fn_in_trait)]
pub trait StateStore {
    /// Short name used in log lines ("local", "server").
    fn name(&self) -> &'static str;

    /// Fetch the canonical bytes of the last saved snapshot.
    ///
    /// Fails with [`crate::Error::NotFound`] when nothing was ever saved
    /// for `identity`.
    async fn load(&self, host: &str, identity: &DeviceIdentity) -> Result<Vec<u8>>;

    /// Replace the baseline for the snapshot's identity.
    async fn save(&self, snapshot: &DeviceSnapshot) -> Result<()>;
}
