//! Device change audit.
//!
//! An audit fetches the device's baseline from the selected store, compares
//! it with the current snapshot, saves the current snapshot as the new
//! baseline, and records any differences in the change log. In remote mode
//! the differences are also reported to the CMDB server.

mod changelog;
pub mod diff;

pub use changelog::{format_change, ChangeLog};
pub use diff::{diff, diff_bytes};

use serde::{Deserialize, Serialize};

use crate::cloud::SyncClient;
use crate::device::{ChangeRecord, DeviceIdentity, DeviceSnapshot};
use crate::error::{Error, Result};
use crate::store::{LocalStore, RemoteStore, StateStore};

/// Where baselines are kept for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditMode {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    /// The device has no serial number; nothing was read or written.
    Skipped,
    /// The current state matches the baseline.
    Unchanged,
    /// Properties that differ from the baseline, in schema order.
    Changed(Vec<ChangeRecord>),
}

pub struct Auditor {
    local: LocalStore,
    client: Option<SyncClient>,
    changelog: ChangeLog,
}

impl Auditor {
    pub fn new(local: LocalStore, client: Option<SyncClient>, changelog: ChangeLog) -> Self {
        Self {
            local,
            client,
            changelog,
        }
    }

    pub fn local_store(&self) -> &LocalStore {
        &self.local
    }

    pub fn client(&self) -> Option<&SyncClient> {
        self.client.as_ref()
    }

    fn remote(&self) -> Result<RemoteStore<'_>> {
        self.client
            .as_ref()
            .map(RemoteStore::new)
            .ok_or_else(|| Error::Config("no CMDB server configured for remote mode".to_string()))
    }

    /// Run a change audit for one device.
    ///
    /// The first audit of a device returns [`Error::NotFound`], but the
    /// current snapshot is saved regardless, so the next audit has a
    /// baseline.
    pub async fn audit(&self, snapshot: &mut DeviceSnapshot, mode: AuditMode) -> Result<AuditOutcome> {
        let identity = snapshot.identity();
        if !identity.is_addressable() {
            tracing::info!(
                "device {}-{} skipping audit, no serial number",
                identity.vendor_id,
                identity.product_id
            );
            return Ok(AuditOutcome::Skipped);
        }

        let changes = match mode {
            AuditMode::Local => self.compare_and_save(&self.local, snapshot).await,
            AuditMode::Remote => self.compare_and_save(&self.remote()?, snapshot).await,
        }
        .inspect_err(|e| tracing::error!("device {} audit failed: {}", identity, e))?;

        if changes.is_empty() {
            tracing::info!("device {} detected no changes", identity);
            return Ok(AuditOutcome::Unchanged);
        }

        tracing::info!("device {} recording changes in change log", identity);
        if let Err(e) = self.changelog.record(&identity, &changes) {
            tracing::error!("device {} failed to write change log: {}", identity, e);
        }

        snapshot.set_changes(changes.clone());

        if let (AuditMode::Remote, Some(client)) = (mode, &self.client) {
            tracing::info!("device {} reporting changes to server", identity);
            client
                .submit_audit(snapshot)
                .await
                .inspect_err(|e| tracing::error!("device {} audit not reported: {}", identity, e))?;
        }

        Ok(AuditOutcome::Changed(changes))
    }

    /// Fetch and diff against the baseline, then save `snapshot` as the new
    /// baseline whatever the fetch or diff produced.
    async fn compare_and_save<S: StateStore>(
        &self,
        store: &S,
        snapshot: &DeviceSnapshot,
    ) -> Result<Vec<ChangeRecord>> {
        let identity = snapshot.identity();

        tracing::info!(
            "device {} fetching previous state from {}",
            identity,
            store.name()
        );
        let compared = match store.load(snapshot.host(), &identity).await {
            Ok(previous) => diff_bytes(snapshot, &previous),
            Err(e) => Err(e),
        };
        if let Err(Error::NotFound { .. }) = &compared {
            tracing::info!("device {} has no previous state, creating baseline", identity);
        }

        tracing::info!("device {} saving current state to {}", identity, store.name());
        if let Err(e) = store.save(snapshot).await {
            tracing::error!("device {} failed to save state: {}", identity, e);
        }

        compared
    }

    /// Save the current state without comparing it.
    pub async fn checkin(&self, snapshot: &DeviceSnapshot, mode: AuditMode) -> Result<()> {
        let identity = snapshot.identity();
        identity.require_addressable()?;

        tracing::info!("device {} checking in", identity);
        let result = match mode {
            AuditMode::Local => self.local.save(snapshot).await,
            AuditMode::Remote => self.remote()?.save(snapshot).await,
        };
        result.inspect_err(|e| tracing::error!("device {} checkin failed: {}", identity, e))
    }

    /// Fetch the stored baseline for a device.
    pub async fn checkout(
        &self,
        host: &str,
        identity: &DeviceIdentity,
        mode: AuditMode,
    ) -> Result<DeviceSnapshot> {
        let bytes = match mode {
            AuditMode::Local => self.local.load(host, identity).await?,
            AuditMode::Remote => self.remote()?.load(host, identity).await?,
        };
        DeviceSnapshot::restore(&bytes)
    }
}
