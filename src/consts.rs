//! Protocol-wide constants for the rover wire format.
//!
//! These values define the fixed 7-byte frame (§6): the start byte, its
//! length, the checksum modulus, and the command-verb numbering. They should
//! be used wherever framing or dispatch logic is implemented so the layout
//! stays in one place.

/// Byte that starts every frame, in both directions.
pub const START_BYTE: u8 = 0xFD;

/// Total length of a frame: start byte, 5 payload bytes, checksum byte.
pub const FRAME_LEN: usize = 7;

/// Number of payload bytes the checksum covers (bytes 1..=5 of the frame).
pub const PAYLOAD_LEN: usize = 5;

/// Modulus used by the additive frame checksum (§6): `255 - (sum % 255)`.
pub const CHECKSUM_MODULUS: u32 = 255;

/// Default serial baud rate for the rover link.
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// Outbound queue high-water mark, in bytes, above which a backpressure
/// warning is logged.
pub const OUTBOUND_HIGH_WATER: usize = 8_000;

/// USB-to-serial manufacturer string used to filter candidate ports during
/// discovery.
pub const DEFAULT_MANUFACTURER_FILTER: &str = "FTDI";

/// Cooperative deadline for a single `get_data` request/reply round trip.
pub const GET_DATA_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(1);

/// Cooperative deadline used when probing a candidate port during discovery.
pub const DISCOVERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(1);

/// Number of times the `RESTART` frame is sent before giving up, to cover
/// packets lost around a reboot.
pub const RESTART_RETRIES: usize = 3;

/// Outbound command verbs (§6). The same byte appears as the fourth payload
/// byte of every outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Verb {
    /// No-op: carries only the current motor-effort latches.
    Nop = 0,
    /// Reload persisted settings from flash.
    ReloadSettings = 1,
    /// Commit in-memory settings to flash.
    CommitSettings = 2,
    /// Request a telemetry slot's current value. `arg` is the slot index.
    GetData = 10,
    /// Set the auxiliary fan speed. `arg` is `0..=240`.
    SetFanSpeed = 20,
    /// Reboot the controller. `arg` is 0 for the application, 1 for the
    /// bootloader.
    Restart = 230,
    /// Clear a latched system fault.
    ClearSystemFault = 232,
    /// Switch between open-loop and closed-loop drive control.
    SetDriveMode = 240,
    /// Run the flipper calibration routine. The arg byte is the verb byte
    /// itself, as a safety interlock against accidental triggering.
    FlipperCalibrate = 250,
}

impl Verb {
    /// The raw byte written to the wire for this verb.
    pub const fn byte(self) -> u8 {
        self as u8
    }
}

/// True if `byte` names one of the parameterized settings verbs (`3..=18`,
/// excluding [`Verb::GetData`]'s `10`). These are out of scope for this
/// crate's facade (the settings-update workflow lives in the external CLI
/// driver) but the range is recorded here for callers built directly on
/// [`crate::engine::ProtocolEngine`].
pub fn is_settings_verb(byte: u8) -> bool {
    (3..=18).contains(&byte) && byte != Verb::GetData.byte()
}
