//! Ordered table of the monitored device properties.
//!
//! The audit walks this table top to bottom, so change lists always come out
//! in this order. Identity fields and `changes` are not listed.

use std::borrow::Cow;

use super::DeviceSnapshot;

/// A named, monitored property and how to read it as a string.
pub struct Field {
    pub name: &'static str,
    read: fn(&DeviceSnapshot) -> Cow<'_, str>,
}

impl Field {
    pub fn value<'a>(&self, snapshot: &'a DeviceSnapshot) -> Cow<'a, str> {
        (self.read)(snapshot)
    }
}

macro_rules! text {
    ($name:literal, $field:ident) => {{
        fn read(d: &DeviceSnapshot) -> Cow<'_, str> {
            Cow::Borrowed(d.$field.as_str())
        }
        Field { name: $name, read }
    }};
}

macro_rules! number {
    ($name:literal, $field:ident) => {{
        fn read(d: &DeviceSnapshot) -> Cow<'_, str> {
            Cow::Owned(d.$field.to_string())
        }
        Field { name: $name, read }
    }};
}

pub static SCHEMA: &[Field] = &[
    text!("HostName", host_name),
    text!("VendorName", vendor_name),
    text!("ProductName", product_name),
    text!("SoftwareID", software_id),
    text!("ProductVer", product_ver),
    number!("BusNumber", bus_number),
    number!("BusAddress", bus_address),
    number!("PortNumber", port_number),
    number!("BufferSize", buffer_size),
    number!("MaxPktSize", max_pkt_size),
    text!("USBSpec", usb_spec),
    text!("USBClass", usb_class),
    text!("USBSubclass", usb_subclass),
    text!("USBProtocol", usb_protocol),
    text!("DeviceSpeed", device_speed),
    text!("DeviceVer", device_ver),
    text!("ObjectType", object_type),
    text!("DeviceSN", device_sn),
    text!("FactorySN", factory_sn),
    text!("DescriptorSN", descriptor_sn),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_schema_names_are_unique() {
        let names: HashSet<_> = SCHEMA.iter().map(|f| f.name).collect();
        assert_eq!(names.len(), SCHEMA.len());
    }

    #[test]
    fn test_schema_excludes_identity() {
        for name in ["VendorID", "ProductID", "SerialNum", "Changes"] {
            assert!(SCHEMA.iter().all(|f| f.name != name), "{name} is in the schema");
        }
    }

    #[test]
    fn test_numeric_fields_render_as_decimal() {
        let snapshot = DeviceSnapshot::builder("host", "0801", "0001")
            .buffer_size(24u32)
            .build();
        let field = SCHEMA.iter().find(|f| f.name == "BufferSize").unwrap();
        assert_eq!(field.value(&snapshot), "24");
    }
}
