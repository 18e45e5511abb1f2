//! Append-only record of detected property changes.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::device::{ChangeRecord, DeviceIdentity};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ChangeLog {
    path: PathBuf,
}

impl ChangeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line per change, creating the file if needed.
    pub fn record(&self, identity: &DeviceIdentity, changes: &[ChangeRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::io(&self.path, e))?;

        let mut lines = String::new();
        for change in changes {
            let line = format_change(identity, change);
            tracing::info!(target: "cmdbc::change", "{}", line);
            lines.push_str(&line);
            lines.push('\n');
        }

        file.write_all(lines.as_bytes())
            .map_err(|e| Error::io(&self.path, e))
    }
}

/// `device {VID}-{PID}-{SN} modified: "{field}" was "{old}", now "{new}"`
pub fn format_change(identity: &DeviceIdentity, change: &ChangeRecord) -> String {
    format!(
        "device {} modified: {:?} was {:?}, now {:?}",
        identity, change.field, change.old, change.new
    )
}
