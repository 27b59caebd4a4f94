//! Bluetooth UUIDs for Touch SDK watches.
//!
//! The watch app exposes two GATT services: an advertised interaction service
//! used only for discovery, and a protobuf service carrying the actual data.

use uuid::{Uuid, uuid};

// --- Services ---

/// Interaction service. Advertised by the watch app; used as the scan filter.
pub const INTERACTION_SERVICE: Uuid = uuid!("008e74d0-7bb3-4ac5-8baf-e5e372cced76");

/// Protobuf service holding the output and input characteristics.
pub const PROTOBUF_SERVICE: Uuid = uuid!("f9d60370-5325-4c64-b874-a68c7c555bad");

// --- Characteristics ---

/// Watch-to-host `Update` messages (notify, read).
pub const PROTOBUF_OUTPUT: Uuid = uuid!("f9d60371-5325-4c64-b874-a68c7c555bad");

/// Host-to-watch `InputUpdate` messages (write).
pub const PROTOBUF_INPUT: Uuid = uuid!("f9d60372-5325-4c64-b874-a68c7c555bad");

// --- Advertisement data ---

/// Manufacturer data key under which the watch advertises its UTF-8 name.
pub const MANUFACTURER_NAME_KEY: u16 = 0xFFFF;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_service_uuid() {
        assert_eq!(
            INTERACTION_SERVICE.to_string(),
            "008e74d0-7bb3-4ac5-8baf-e5e372cced76"
        );
    }

    #[test]
    fn test_protobuf_characteristics_share_base() {
        let base = |u: Uuid| u.to_string()[8..].to_string();
        assert_eq!(base(PROTOBUF_SERVICE), base(PROTOBUF_OUTPUT));
        assert_eq!(base(PROTOBUF_SERVICE), base(PROTOBUF_INPUT));
        assert_eq!(
            PROTOBUF_OUTPUT.to_string(),
            "f9d60371-5325-4c64-b874-a68c7c555bad"
        );
        assert_eq!(
            PROTOBUF_INPUT.to_string(),
            "f9d60372-5325-4c64-b874-a68c7c555bad"
        );
    }

    #[test]
    fn test_all_uuids_distinct() {
        let all = [
            INTERACTION_SERVICE,
            PROTOBUF_SERVICE,
            PROTOBUF_OUTPUT,
            PROTOBUF_INPUT,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_manufacturer_name_key() {
        assert_eq!(MANUFACTURER_NAME_KEY, 0xFFFF);
    }
}
