//! The static telemetry data-element table (§6, §9).
//!
//! Every `GET_DATA` slot index the controller can report is registered here
//! exactly once, built lazily the first time it's touched and never mutated
//! afterward. Slots the original driver carried but never gave a working
//! codec are still registered, with `not_implemented: true`, so a caller that
//! asks for one gets a clear `not implemented` response instead of silent
//! lookup failure.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::codec::Codec;
use crate::codec::FixedBase::{I16, U16};
use crate::version::FirmwareVersion;

/// One telemetry slot: its wire codec, display name, and the firmware
/// version range over which it is valid.
#[derive(Debug, Clone)]
pub struct DataElement {
    pub index: u8,
    pub codec: Codec,
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub not_implemented: bool,
    pub since: Option<FirmwareVersion>,
    pub until: Option<FirmwareVersion>,
}

impl DataElement {
    /// Human-readable description, falling back to the slot's name when the
    /// table carries no description (used by the out-of-scope CLI's
    /// `--list-data` flag; the registry must still carry the data).
    pub fn describe(&self) -> &'static str {
        self.description.unwrap_or(self.name)
    }

    /// True if this slot is valid on the given firmware version: not marked
    /// `not_implemented`, not older than `since`, and not retired as of
    /// `until`.
    pub fn supported(&self, version: FirmwareVersion) -> bool {
        if self.not_implemented {
            return false;
        }
        if let Some(since) = self.since {
            if version < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if until <= version {
                return false;
            }
        }
        true
    }
}

const fn v(major: u16, minor: u16) -> FirmwareVersion {
    FirmwareVersion::new(major, minor, 0)
}

const OLD_CURRENT: Codec = Codec::Fixed {
    base: U16,
    step: 34.0,
    zero: 0.0,
};
const OLD_VOLTAGE: Codec = Codec::Fixed {
    base: U16,
    step: 58.0,
    zero: 0.0,
};
const PERCENTAGE: Codec = Codec::Fixed {
    base: U16,
    step: 100.0,
    zero: 0.0,
};
const FAN_SPEED_RESPONSE: Codec = Codec::Fixed {
    base: U16,
    step: 240.0,
    zero: 0.0,
};
const DECIKELVIN: Codec = Codec::Fixed {
    base: U16,
    step: 10.0,
    zero: 2731.5,
};
const SIGNED_MILLIS: Codec = Codec::Fixed {
    base: I16,
    step: 1000.0,
    zero: 0.0,
};
const UNSIGNED_MILLIS: Codec = Codec::Fixed {
    base: U16,
    step: 1000.0,
    zero: 0.0,
};

fn element(
    index: u8,
    codec: Codec,
    name: &'static str,
    description: Option<&'static str>,
) -> DataElement {
    DataElement {
        index,
        codec,
        name,
        description,
        not_implemented: false,
        since: None,
        until: None,
    }
}

fn not_implemented(index: u8, codec: Codec, name: &'static str) -> DataElement {
    DataElement {
        not_implemented: true,
        ..element(index, codec, name, None)
    }
}

/// The full slot table, in index order. Backfilled from the original
/// driver's data table beyond the excerpt the distilled spec named.
static ELEMENTS: &[fn() -> DataElement] = &[
    || element(0, OLD_CURRENT, "battery (A+B) current (external)", Some("total current from batteries")),
    || not_implemented(2, Codec::U16, "left motor speed"),
    || not_implemented(4, Codec::U16, "right motor speed"),
    || element(6, Codec::U16, "flipper position 1", Some("flipper position sensor 1. 0=15 degrees; 1024=330 degrees;")),
    || element(8, Codec::U16, "flipper position 2", Some("flipper position sensor 2. 0=15 degrees; 1024=330 degrees;")),
    || element(10, OLD_CURRENT, "left motor current", None),
    || element(12, OLD_CURRENT, "right motor current", None),
    || DataElement {
        since: Some(v(1, 4)),
        ..element(
            14,
            Codec::U16,
            "left motor encoder count",
            Some("May overflow or underflow. Increments when motor driven forward, decrements backward"),
        )
    },
    || DataElement {
        since: Some(v(1, 4)),
        ..element(
            16,
            Codec::U16,
            "right motor encoder count",
            Some("May overflow or underflow. Increments when motor driven forward, decrements backward"),
        )
    },
    || not_implemented(18, Codec::U16, "motors fault flag"),
    || element(20, Codec::U16, "left motor temperature", None),
    || not_implemented(22, Codec::U16, "right motor temperature"),
    || element(24, OLD_VOLTAGE, "battery A voltage (external)", None),
    || element(26, OLD_VOLTAGE, "battery B voltage (external)", None),
    || element(
        28,
        Codec::U16,
        "left motor encoder interval",
        Some("0 when motor stopped. Else proportional to motor period (inverse motor speed)"),
    ),
    || element(
        30,
        Codec::U16,
        "right motor encoder interval",
        Some("0 when motor stopped. Else proportional to motor period (inverse motor speed)"),
    ),
    || not_implemented(32, Codec::U16, "flipper motor encoder interval"),
    || element(34, PERCENTAGE, "battery A state of charge", Some("Proportional charge, 0.0=empty, 1.0=full")),
    || element(36, PERCENTAGE, "battery B state of charge", Some("Proportional charge, 0.0=empty, 1.0=full")),
    || element(38, Codec::ChargerState, "battery charging state", None),
    || element(40, Codec::FirmwareVersion, "release version", None),
    || element(42, OLD_CURRENT, "battery A current (external)", None),
    || element(44, OLD_CURRENT, "battery B current (external)", None),
    || element(46, Codec::U16, "motor flipper angle", None),
    || element(48, FAN_SPEED_RESPONSE, "fan speed", None),
    || DataElement {
        until: Some(v(1, 7)),
        ..element(50, Codec::DriveMode, "drive mode", None)
    },
    || DataElement {
        since: Some(v(1, 2)),
        ..element(52, Codec::BatteryStatus, "battery A status", None)
    },
    || DataElement {
        since: Some(v(1, 2)),
        ..element(54, Codec::BatteryStatus, "battery B status", None)
    },
    || DataElement {
        since: Some(v(1, 2)),
        ..element(56, Codec::U16, "battery A mode", None)
    },
    || DataElement {
        since: Some(v(1, 2)),
        ..element(58, Codec::U16, "battery B mode", None)
    },
    || DataElement {
        since: Some(v(1, 2)),
        ..element(60, DECIKELVIN, "battery A temperature (internal)", None)
    },
    || DataElement {
        since: Some(v(1, 2)),
        ..element(62, DECIKELVIN, "battery B temperature (internal)", None)
    },
    || DataElement {
        since: Some(v(1, 2)),
        ..element(64, UNSIGNED_MILLIS, "battery A voltage (internal)", None)
    },
    || DataElement {
        since: Some(v(1, 2)),
        ..element(66, UNSIGNED_MILLIS, "battery B voltage (internal)", None)
    },
    || DataElement {
        since: Some(v(1, 2)),
        ..element(68, SIGNED_MILLIS, "battery A current (internal)", Some(">0 = charging; <0 = discharging"))
    },
    || DataElement {
        since: Some(v(1, 2)),
        ..element(70, SIGNED_MILLIS, "battery B current (internal)", Some(">0 = charging; <0 = discharging"))
    },
    || DataElement {
        since: Some(v(1, 7)),
        ..element(72, Codec::MotorStatus, "left motor status", None)
    },
    || DataElement {
        since: Some(v(1, 7)),
        ..element(74, Codec::MotorStatus, "right motor status", None)
    },
    || DataElement {
        since: Some(v(1, 7)),
        ..element(76, Codec::MotorStatus, "flipper motor status", None)
    },
    || DataElement {
        since: Some(v(1, 9)),
        ..element(78, FAN_SPEED_RESPONSE, "fan 1 duty", None)
    },
    || DataElement {
        since: Some(v(1, 9)),
        ..element(80, FAN_SPEED_RESPONSE, "fan 2 duty", None)
    },
    || DataElement {
        since: Some(v(1, 10)),
        ..element(82, Codec::SystemFault, "system fault flags", None)
    },
];

/// The full registry, keyed by slot index. Built once on first access.
pub static REGISTRY: Lazy<HashMap<u8, DataElement>> =
    Lazy::new(|| ELEMENTS.iter().map(|f| f()).map(|e| (e.index, e)).collect());

/// Looks up a slot by index.
pub fn get(index: u8) -> Option<&'static DataElement> {
    REGISTRY.get(&index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_spec_named_slots() {
        assert!(get(40).is_some());
        assert_eq!(get(40).unwrap().name, "release version");
        assert!(get(34).is_some());
        assert!(get(82).is_some());
    }

    #[test]
    fn not_implemented_slots_are_never_supported() {
        let el = get(2).unwrap();
        assert!(el.not_implemented);
        assert!(!el.supported(FirmwareVersion::new(99, 0, 0)));
    }

    #[test]
    fn since_gates_slot_support_by_version() {
        let el = get(14).unwrap();
        assert!(!el.supported(FirmwareVersion::new(1, 3, 0)));
        assert!(el.supported(FirmwareVersion::new(1, 4, 0)));
    }

    #[test]
    fn until_gates_slot_support_by_version() {
        let el = get(50).unwrap();
        assert!(el.supported(FirmwareVersion::new(1, 6, 0)));
        assert!(!el.supported(FirmwareVersion::new(1, 7, 0)));
    }

    #[test]
    fn describe_falls_back_to_name() {
        assert_eq!(get(46).unwrap().describe(), "motor flipper angle");
        assert_eq!(get(40).unwrap().describe(), "release version");
    }

    #[test]
    fn registry_size_matches_backfilled_table() {
        assert_eq!(REGISTRY.len(), 42);
    }
}
