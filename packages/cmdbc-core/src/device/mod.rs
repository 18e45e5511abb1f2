//! Device snapshot model.
//!
//! A [`DeviceSnapshot`] is the canonical, serializable record of a USB
//! peripheral's monitored properties. It is produced by the enumerator,
//! persisted as a baseline by the state stores and compared field by field
//! by the audit engine.

mod schema;

pub use schema::{Field, SCHEMA};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Unique key for a device: vendor ID, product ID and serial number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    pub vendor_id: String,
    pub product_id: String,
    pub serial_num: String,
}

impl DeviceIdentity {
    pub fn new(
        vendor_id: impl Into<String>,
        product_id: impl Into<String>,
        serial_num: impl Into<String>,
    ) -> Self {
        Self {
            vendor_id: vendor_id.into(),
            product_id: product_id.into(),
            serial_num: serial_num.into(),
        }
    }

    /// A device without a serial number cannot be used as a lookup key.
    pub fn is_addressable(&self) -> bool {
        !self.serial_num.is_empty()
    }

    /// Fails with [`Error::Identity`] unless the identity is addressable.
    pub fn require_addressable(&self) -> Result<()> {
        if self.is_addressable() {
            Ok(())
        } else {
            Err(Error::Identity {
                vendor_id: self.vendor_id.clone(),
                product_id: self.product_id.clone(),
            })
        }
    }

    /// Baseline file name, `{VID}-{PID}-{SN}.json`.
    pub fn file_name(&self) -> String {
        format!("{}.json", self)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.vendor_id, self.product_id, self.serial_num
        )
    }
}

/// One changed property: field name, previous value, current value.
///
/// Serialized as a `[field, old, new]` array, the shape the audit endpoint
/// expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String, String)", into = "(String, String, String)")]
pub struct ChangeRecord {
    pub field: String,
    pub old: String,
    pub new: String,
}

impl ChangeRecord {
    pub fn new(field: impl Into<String>, old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            old: old.into(),
            new: new.into(),
        }
    }
}

impl From<(String, String, String)> for ChangeRecord {
    fn from((field, old, new): (String, String, String)) -> Self {
        Self { field, old, new }
    }
}

impl From<ChangeRecord> for (String, String, String) {
    fn from(c: ChangeRecord) -> Self {
        (c.field, c.old, c.new)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    #[serde(default)]
    pub(crate) host_name: String,
    pub(crate) vendor_id: String,
    pub(crate) product_id: String,
    #[serde(default)]
    pub(crate) vendor_name: String,
    #[serde(default)]
    pub(crate) product_name: String,
    #[serde(default)]
    pub(crate) serial_num: String,
    #[serde(default)]
    pub(crate) software_id: String,
    #[serde(default)]
    pub(crate) product_ver: String,
    #[serde(default)]
    pub(crate) bus_number: u8,
    #[serde(default)]
    pub(crate) bus_address: u8,
    #[serde(default)]
    pub(crate) port_number: u8,
    #[serde(default)]
    pub(crate) buffer_size: u32,
    #[serde(default)]
    pub(crate) max_pkt_size: u32,
    #[serde(default)]
    pub(crate) usb_spec: String,
    #[serde(default)]
    pub(crate) usb_class: String,
    #[serde(default)]
    pub(crate) usb_subclass: String,
    #[serde(default)]
    pub(crate) usb_protocol: String,
    #[serde(default)]
    pub(crate) device_speed: String,
    #[serde(default)]
    pub(crate) device_ver: String,
    #[serde(default)]
    pub(crate) object_type: String,
    #[serde(default)]
    pub(crate) device_sn: String,
    #[serde(default)]
    pub(crate) factory_sn: String,
    #[serde(default)]
    pub(crate) descriptor_sn: String,
    #[serde(default, with = "changes_or_null")]
    pub(crate) changes: Vec<ChangeRecord>,
}

impl DeviceSnapshot {
    pub fn builder(
        host_name: impl Into<String>,
        vendor_id: impl Into<String>,
        product_id: impl Into<String>,
    ) -> SnapshotBuilder {
        SnapshotBuilder {
            inner: DeviceSnapshot {
                host_name: host_name.into(),
                vendor_id: vendor_id.into(),
                product_id: product_id.into(),
                ..Default::default()
            },
        }
    }

    /// Reconstruct a snapshot from its canonical bytes.
    pub fn restore(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Canonical bytes: compact JSON in fixed field order.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(&self.vendor_id, &self.product_id, &self.serial_num)
    }

    pub fn host(&self) -> &str {
        &self.host_name
    }

    pub fn vendor_id(&self) -> &str {
        &self.vendor_id
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn serial_num(&self) -> &str {
        &self.serial_num
    }

    pub fn vendor_name(&self) -> &str {
        &self.vendor_name
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn changes(&self) -> &[ChangeRecord] {
        &self.changes
    }

    /// Attach the result of an audit.
    pub fn set_changes(&mut self, changes: Vec<ChangeRecord>) {
        self.changes = changes;
    }

    /// Record a serial number issued by the server.
    pub fn set_serial_number(&mut self, serial: impl Into<String>) {
        let serial = serial.into();
        self.device_sn = serial.clone();
        self.serial_num = serial;
    }

    /// True when every monitored property matches; changes are ignored.
    pub fn same_state(&self, other: &DeviceSnapshot) -> bool {
        SCHEMA.iter().all(|f| f.value(self) == f.value(other))
    }
}

/// Builder used by enumerators and tests to assemble a snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    inner: DeviceSnapshot,
}

macro_rules! builder_setters {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            pub fn $name(mut self, value: impl Into<$ty>) -> Self {
                self.inner.$name = value.into();
                self
            }
        )*
    };
}

impl SnapshotBuilder {
    builder_setters! {
        vendor_name: String,
        product_name: String,
        serial_num: String,
        software_id: String,
        product_ver: String,
        bus_number: u8,
        bus_address: u8,
        port_number: u8,
        buffer_size: u32,
        max_pkt_size: u32,
        usb_spec: String,
        usb_class: String,
        usb_subclass: String,
        usb_protocol: String,
        device_speed: String,
        device_ver: String,
        object_type: String,
        device_sn: String,
        factory_sn: String,
        descriptor_sn: String,
    }

    pub fn build(self) -> DeviceSnapshot {
        self.inner
    }
}

/// `changes` is written as `null` until an audit attaches records.
mod changes_or_null {
    use super::ChangeRecord;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(changes: &[ChangeRecord], s: S) -> Result<S::Ok, S::Error> {
        if changes.is_empty() {
            s.serialize_none()
        } else {
            s.collect_seq(changes)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ChangeRecord>, D::Error> {
        Ok(Option::<Vec<ChangeRecord>>::deserialize(d)?.unwrap_or_default())
    }
}
