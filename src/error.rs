//! Error types for the rover driver.
//!
//! All fallible operations in this crate return [`Error`], a single flat
//! enum with one variant per failure kind from the protocol design. Most
//! variants surface straight to the caller; [`Error::BadChecksum`] is the
//! one kind the protocol engine itself recovers from (log and resync on the
//! next start byte) rather than propagating as a hard failure.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for the rover driver.
#[derive(Debug, Error)]
pub enum Error {
    /// No serial port could be opened and probed successfully during
    /// discovery. Carries every candidate tried and why it failed.
    #[error("no rover device found; tried {candidates:?}")]
    DeviceNotFound {
        /// `(port path, failure)` for every candidate probed.
        candidates: Vec<(String, String)>,
    },

    /// Opening the serial port failed due to permissions, exclusivity, or
    /// the path not naming a serial device.
    #[error("could not open {path}: {source}")]
    DeviceAccess {
        /// The port path that failed to open.
        path: String,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// An operation was attempted after the endpoint was closed, or the
    /// transport hit end-of-stream.
    #[error("device closed")]
    DeviceClosed,

    /// A frame's checksum byte did not match the computed checksum.
    /// Recoverable: the engine discards the frame and resynchronizes on the
    /// next start byte.
    #[error("bad checksum in frame: expected {expected:#04x}, got {actual:#04x}")]
    BadChecksum {
        /// The checksum the frame should have carried.
        expected: u8,
        /// The checksum byte actually read.
        actual: u8,
    },

    /// A reply's slot index did not match the index a caller was waiting
    /// on, or the reply named a slot unknown to the registry.
    #[error("unexpected reply: expected slot {expected:?}, got slot {actual}")]
    BadResponse {
        /// The slot index the caller expected, if any.
        expected: Option<u8>,
        /// The slot index actually read.
        actual: u8,
    },

    /// A cooperative deadline expired before the expected reply arrived.
    /// The engine does not retry; the caller must.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// Catch-all for conditions that should not occur in a correctly
    /// behaving link, such as a partial frame at end-of-stream.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An I/O error not otherwise classified above.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Build a [`Error::DeviceAccess`] from an open-time I/O error.
    pub fn device_access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::DeviceAccess {
            path: path.into().to_string_lossy().into_owned(),
            source,
        }
    }
}

/// Result type alias for rover driver operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_checksum_message_contains_both_bytes() {
        let err = Error::BadChecksum {
            expected: 0x12,
            actual: 0x34,
        };
        let msg = err.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("34"));
    }

    #[test]
    fn device_not_found_lists_candidates() {
        let err = Error::DeviceNotFound {
            candidates: vec![("/dev/ttyUSB0".into(), "timeout".into())],
        };
        assert!(err.to_string().contains("ttyUSB0"));
    }
}
