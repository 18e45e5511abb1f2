use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::device::{DeviceIdentity, DeviceSnapshot};
use crate::error::{Error, Result};
use crate::store::StateStore;

/// Baselines kept as `{state_dir}/{VID}-{PID}-{SN}.json`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    state_dir: PathBuf,
}

impl LocalStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn path_for(&self, identity: &DeviceIdentity) -> PathBuf {
        self.state_dir.join(identity.file_name())
    }

    /// Overwrite the baseline file with the snapshot's canonical bytes.
    pub fn save_snapshot(&self, snapshot: &DeviceSnapshot) -> Result<()> {
        let identity = snapshot.identity();
        identity.require_addressable()?;

        fs::create_dir_all(&self.state_dir).map_err(|e| Error::io(&self.state_dir, e))?;

        let path = self.path_for(&identity);
        let bytes = snapshot.serialize()?;
        fs::write(&path, bytes).map_err(|e| Error::io(&path, e))?;

        tracing::debug!("Saved device {} state to {:?}", identity, path);
        Ok(())
    }

    /// Read the baseline file for `identity`.
    pub fn load_bytes(&self, identity: &DeviceIdentity) -> Result<Vec<u8>> {
        identity.require_addressable()?;

        let path = self.path_for(identity);
        match fs::read(&path) {
            Ok(bytes) => {
                tracing::debug!("Loaded device {} state from {:?}", identity, path);
                Ok(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound {
                identity: identity.to_string(),
            }),
            Err(e) => Err(Error::io(&path, e)),
        }
    }

    pub fn load_snapshot(&self, identity: &DeviceIdentity) -> Result<DeviceSnapshot> {
        DeviceSnapshot::restore(&self.load_bytes(identity)?)
    }

    /// Delete the baseline for `identity`. Returns false if there was none.
    pub fn remove(&self, identity: &DeviceIdentity) -> Result<bool> {
        identity.require_addressable()?;

        let path = self.path_for(identity);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Removed device {} state file {:?}", identity, path);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(&path, e)),
        }
    }
}

impl StateStore for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn load(&self, _host: &str, identity: &DeviceIdentity) -> Result<Vec<u8>> {
        self.load_bytes(identity)
    }

    async fn save(&self, snapshot: &DeviceSnapshot) -> Result<()> {
        self.save_snapshot(snapshot)
    }
}
