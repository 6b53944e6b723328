//! Typed telemetry codecs and their decoded value shapes (§3).
//!
//! Each data element in [`crate::registry`] is tagged with one [`Codec`]
//! variant. A codec maps a 2-byte telemetry payload to a [`Value`] and,
//! for the three bidirectional shapes (`motor_effort`, `charger_state`,
//! `drive_mode`), back again. Motor effort additionally gets free
//! functions here ([`encode_motor_effort`]/[`decode_motor_effort`]) since
//! it packs into a single frame byte directly, outside the 2-byte
//! telemetry-slot system the rest of this module serves.
//! [`fix_encoder_delta`] likewise stands alone: it post-processes two raw
//! `Codec::U16` reads of an encoder-count slot rather than decoding a wire
//! payload itself.

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::version::FirmwareVersion;

bitflags! {
    /// Battery alarm/state bits (§6), big-endian `u16`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BatteryStatus: u16 {
        const OVERCHARGED = 0x8000;
        const TERMINATE_CHARGE = 0x4000;
        const OVER_TEMP = 0x1000;
        const TERMINATE_DISCHARGE = 0x0800;
        const REMAINING_CAPACITY = 0x0200;
        const REMAINING_TIME = 0x0100;
        const INITIALIZED = 0x0080;
        const DISCHARGING = 0x0040;
        const FULLY_CHARGED = 0x0020;
        const FULLY_DISCHARGED = 0x0010;
    }
}

bitflags! {
    /// Motor driver state bits (§6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MotorStatus: u16 {
        const FAULT1 = 1 << 0;
        const FAULT2 = 1 << 1;
        const DECAY_MODE = 1 << 2;
        const REVERSE = 1 << 3;
        const BRAKE = 1 << 4;
        const COAST = 1 << 5;
    }
}

bitflags! {
    /// Latched controller fault bits (§6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SystemFault: u16 {
        const OVERSPEED = 1 << 0;
        const OVERCURRENT = 1 << 1;
    }
}

/// Drive-control mode (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveMode {
    OpenLoop = 0,
    ClosedLoop = 1,
}

impl DriveMode {
    fn from_u16(raw: u16) -> Self {
        if raw == 0 {
            DriveMode::OpenLoop
        } else {
            DriveMode::ClosedLoop
        }
    }
}

/// A decoded telemetry value, tagged by the codec that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    U16(u16),
    I16(i16),
    /// A fixed-point telemetry reading, already converted to real units.
    Real(f64),
    Bool(bool),
    BatteryStatus(BatteryStatus),
    MotorStatus(MotorStatus),
    SystemFault(SystemFault),
    DriveMode(DriveMode),
    FirmwareVersion(FirmwareVersion),
    /// Fallback for a slot index the registry does not recognize: the raw
    /// big-endian `u16`, logged as a warning rather than discarded (§4.2, §9).
    Raw(u16),
}

/// The base integer width a [`Codec::Fixed`] value is stored over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedBase {
    U16,
    I16,
}

/// One of the closed set of wire encodings a telemetry slot may use (§3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Codec {
    U16,
    I16,
    /// `value = (raw - zero) / step`, stored over `base`.
    Fixed {
        base: FixedBase,
        step: f64,
        zero: f64,
    },
    ChargerState,
    BatteryStatus,
    MotorStatus,
    SystemFault,
    DriveMode,
    FirmwareVersion,
}

/// Magic bytes the charger reports while actively charging; anything else
/// decodes to `false`.
const CHARGER_ACTIVE_MAGIC: [u8; 2] = [0xDA, 0xDA];

impl Codec {
    /// Decodes a 2-byte big-endian telemetry payload into its typed value.
    pub fn decode(&self, bytes: [u8; 2]) -> Value {
        let raw = u16::from_be_bytes(bytes);
        match self {
            Codec::U16 => Value::U16(raw),
            Codec::I16 => Value::I16(raw as i16),
            Codec::Fixed { base, step, zero } => {
                let n: f64 = match base {
                    FixedBase::U16 => raw as f64,
                    FixedBase::I16 => (raw as i16) as f64,
                };
                Value::Real((n - zero) / step)
            }
            Codec::ChargerState => Value::Bool(bytes == CHARGER_ACTIVE_MAGIC),
            Codec::BatteryStatus => Value::BatteryStatus(self::BatteryStatus::from_bits_truncate(raw)),
            Codec::MotorStatus => Value::MotorStatus(self::MotorStatus::from_bits_truncate(raw)),
            Codec::SystemFault => Value::SystemFault(self::SystemFault::from_bits_truncate(raw)),
            Codec::DriveMode => Value::DriveMode(DriveMode::from_u16(raw)),
            Codec::FirmwareVersion => Value::FirmwareVersion(FirmwareVersion::from_raw(raw)),
        }
    }

    /// Encodes a typed value back to its 2-byte wire payload. Only the
    /// bidirectional codecs (`charger_state`, `drive_mode`) support this;
    /// motor effort is handled separately by [`encode_motor_effort`] since
    /// it is not a 2-byte telemetry slot.
    pub fn encode(&self, value: &Value) -> Result<[u8; 2]> {
        match (self, value) {
            (Codec::ChargerState, Value::Bool(true)) => Ok(CHARGER_ACTIVE_MAGIC),
            (Codec::ChargerState, Value::Bool(false)) => Ok([0, 0]),
            (Codec::DriveMode, Value::DriveMode(mode)) => Ok((*mode as u16).to_be_bytes()),
            _ => Err(Error::Protocol(format!(
                "codec {self:?} does not support encoding {value:?}"
            ))),
        }
    }
}

/// Rounds `x` to the nearest integer, breaking ties to the nearest even
/// integer (banker's rounding), as the `motor_effort` codec invariant
/// requires (§3, §8).
fn round_half_to_even(x: f64) -> f64 {
    let floor = x.floor();
    let diff = x - floor;
    if diff < 0.5 {
        floor
    } else if diff > 0.5 {
        floor + 1.0
    } else if (floor as i64) % 2 == 0 {
        floor
    } else {
        floor + 1.0
    }
}

/// Encodes a motor effort in `[-1, 1]` to its single-byte wire form:
/// `round_half_even(effort * 125) + 125`, clamped to `0..=250`.
pub fn encode_motor_effort(effort: f64) -> u8 {
    let raw = round_half_to_even(effort * 125.0) + 125.0;
    raw.clamp(0.0, 250.0) as u8
}

/// Decodes a motor-effort byte back to its real-valued effort in `[-1, 1]`.
pub fn decode_motor_effort(byte: u8) -> f64 {
    (byte as f64 - 125.0) / 125.0
}

/// Maps a raw wraparound encoder delta, `(b - a) mod 2^16`, to its signed
/// minimum-magnitude form (§6 "Encoder delta convention", §8
/// "Encoder-delta correctness") — the convention the wraparound encoder-count
/// slots (14, 16) need on top of their plain `Codec::U16` decode, since a
/// wheel that just wrapped from `65535` to `0` should read as `+1`, not
/// `-65535`.
pub fn fix_encoder_delta(raw_delta: u16) -> i16 {
    if raw_delta >= 0x8000 {
        (raw_delta as i32 - 0x1_0000) as i16
    } else {
        raw_delta as i16
    }
}
