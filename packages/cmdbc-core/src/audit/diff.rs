//! Field-level comparison of two device snapshots.

use crate::device::{ChangeRecord, DeviceSnapshot, SCHEMA};
use crate::error::Result;

/// List every monitored property whose value differs between `previous`
/// and `current`, in schema order.
pub fn diff(current: &DeviceSnapshot, previous: &DeviceSnapshot) -> Vec<ChangeRecord> {
    SCHEMA
        .iter()
        .filter_map(|field| {
            let old = field.value(previous);
            let new = field.value(current);
            (old != new).then(|| ChangeRecord::new(field.name, old, new))
        })
        .collect()
}

/// Like [`diff`], with the previous state given as canonical bytes.
pub fn diff_bytes(current: &DeviceSnapshot, previous: &[u8]) -> Result<Vec<ChangeRecord>> {
    let previous = DeviceSnapshot::restore(previous)?;
    Ok(diff(current, &previous))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::magtek_reader;
    use crate::error::Error;

    fn upgraded_reader() -> DeviceSnapshot {
        DeviceSnapshot::builder("John-SurfacePro", "0801", "0001")
            .vendor_name("Mag-Tek")
            .product_name("USB Swipe Reader")
            .serial_num("24F0014")
            .software_id("21042818B02")
            .bus_number(1u8)
            .bus_address(13u8)
            .port_number(1u8)
            .buffer_size(24u32)
            .max_pkt_size(8u32)
            .usb_spec("2.00")
            .usb_class("per-interface")
            .usb_subclass("per-interface")
            .usb_protocol("0")
            .device_speed("full")
            .device_ver("1.00")
            .object_type("*usbci.Magtek")
            .device_sn("24F0014")
            .descriptor_sn("24F0014")
            .build()
    }

    #[test]
    fn test_firmware_and_spec_change() {
        let changes = diff(&upgraded_reader(), &magtek_reader());
        assert_eq!(
            changes,
            vec![
                ChangeRecord::new("SoftwareID", "21042818B01", "21042818B02"),
                ChangeRecord::new("USBSpec", "1.10", "2.00"),
            ]
        );
    }

    #[test]
    fn test_order_is_schema_order_in_both_directions() {
        let forward = diff(&upgraded_reader(), &magtek_reader());
        let backward = diff(&magtek_reader(), &upgraded_reader());

        let names = |c: &[ChangeRecord]| c.iter().map(|r| r.field.clone()).collect::<Vec<_>>();
        assert_eq!(names(&forward), names(&backward));
        assert_eq!(backward[0], ChangeRecord::new("SoftwareID", "21042818B02", "21042818B01"));
    }

    #[test]
    fn test_identical_states_have_no_changes() {
        assert!(diff(&magtek_reader(), &magtek_reader()).is_empty());
    }

    #[test]
    fn test_attached_changes_are_not_compared() {
        let mut current = magtek_reader();
        current.set_changes(vec![ChangeRecord::new("USBSpec", "1.10", "2.00")]);
        assert!(diff(&current, &magtek_reader()).is_empty());
    }

    #[test]
    fn test_no_type_coercion() {
        let previous = DeviceSnapshot::builder("h", "0801", "0001")
            .serial_num("1")
            .device_ver("1.0")
            .build();
        let current = DeviceSnapshot::builder("h", "0801", "0001")
            .serial_num("1")
            .device_ver("1.00")
            .build();
        assert_eq!(
            diff(&current, &previous),
            vec![ChangeRecord::new("DeviceVer", "1.0", "1.00")]
        );
    }

    #[test]
    fn test_numeric_change() {
        let moved = DeviceSnapshot::builder("John-SurfacePro", "0801", "0001")
            .serial_num("24F0014")
            .bus_address(14u8)
            .build();
        let before = DeviceSnapshot::builder("John-SurfacePro", "0801", "0001")
            .serial_num("24F0014")
            .bus_address(13u8)
            .build();
        assert_eq!(
            diff(&moved, &before),
            vec![ChangeRecord::new("BusAddress", "13", "14")]
        );
    }

    #[test]
    fn test_diff_bytes() {
        let previous = magtek_reader().serialize().unwrap();
        let changes = diff_bytes(&upgraded_reader(), &previous).unwrap();
        assert_eq!(changes.len(), 2);

        assert!(diff_bytes(&magtek_reader(), &previous).unwrap().is_empty());
    }

    #[test]
    fn test_diff_bytes_malformed() {
        let err = diff_bytes(&magtek_reader(), b"{\"host_name\": 42}").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
