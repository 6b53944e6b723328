//! Firmware version (§3, §4.6, §9).
//!
//! `FirmwareVersion` orders lexicographically on `(major, minor, patch)`,
//! parses from up to three dotted integers, and decodes from the wire's raw
//! `u16` representation — including the two legacy magic values that
//! predate the controller having a real versioning scheme.

use std::fmt;
use std::str::FromStr;

/// Raw wire value for firmware that predates versioning (pre-1.3); decodes
/// to `(0, 0, 0)`.
pub const LEGACY_PRE_VERSIONING_RAW: u16 = 16421;

/// Raw wire value for firmware that predates the `X.YY.ZZ` packed encoding
/// but postdates [`LEGACY_PRE_VERSIONING_RAW`]; decodes to `(1, 0, 0)`.
pub const LEGACY_POST_VERSIONING_RAW: u16 = 40621;

/// A parsed `(major, minor, patch)` firmware version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FirmwareVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl FirmwareVersion {
    /// Constructs a version directly from its three components.
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Decodes the wire's raw `u16` representation: `major*10000 +
    /// minor*100 + patch*10`, with the two legacy magic values preserved
    /// (§9: both are kept, rather than only the later one, in case
    /// round-tripping against old firmware matters).
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            LEGACY_PRE_VERSIONING_RAW => Self::new(0, 0, 0),
            LEGACY_POST_VERSIONING_RAW => Self::new(1, 0, 0),
            _ => Self::new(raw / 10000, (raw / 100) % 100, raw % 10),
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Error returned when a string does not parse as a firmware version.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid firmware version string: {0:?}")]
pub struct ParseVersionError(String);

impl FromStr for FirmwareVersion {
    type Err = ParseVersionError;

    /// Parses `"X"`, `"X.Y"`, or `"X.Y.Z"`; missing components default to 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(4, '.');
        let major = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ParseVersionError(s.to_owned()))?
            .parse()
            .map_err(|_| ParseVersionError(s.to_owned()))?;
        let minor = match parts.next() {
            Some(p) => p.parse().map_err(|_| ParseVersionError(s.to_owned()))?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(p) => p.parse().map_err(|_| ParseVersionError(s.to_owned()))?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(ParseVersionError(s.to_owned()));
        }
        Ok(Self::new(major, minor, patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_one_two_and_three_part_strings() {
        assert_eq!("1".parse::<FirmwareVersion>().unwrap(), FirmwareVersion::new(1, 0, 0));
        assert_eq!("1.4".parse::<FirmwareVersion>().unwrap(), FirmwareVersion::new(1, 4, 0));
        assert_eq!(
            "1.4.2".parse::<FirmwareVersion>().unwrap(),
            FirmwareVersion::new(1, 4, 2)
        );
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!("".parse::<FirmwareVersion>().is_err());
        assert!("1.2.3.4".parse::<FirmwareVersion>().is_err());
        assert!("a.b".parse::<FirmwareVersion>().is_err());
    }

    #[test]
    fn orders_lexicographically() {
        assert!(FirmwareVersion::new(1, 4, 0) < FirmwareVersion::new(1, 4, 1));
        assert!(FirmwareVersion::new(1, 4, 1) < FirmwareVersion::new(1, 5, 0));
        assert!(FirmwareVersion::new(1, 5, 0) < FirmwareVersion::new(2, 0, 0));
    }

    #[test]
    fn decodes_legacy_magic_values() {
        assert_eq!(FirmwareVersion::from_raw(16421), FirmwareVersion::new(0, 0, 0));
        assert_eq!(FirmwareVersion::from_raw(40621), FirmwareVersion::new(1, 0, 0));
    }

    #[test]
    fn decodes_packed_representation() {
        // 10502 = 1.05.02 per the original driver's documented example.
        assert_eq!(FirmwareVersion::from_raw(10502), FirmwareVersion::new(1, 5, 2));
    }

    #[test]
    fn display_matches_dotted_form() {
        assert_eq!(FirmwareVersion::new(1, 4, 2).to_string(), "1.4.2");
    }
}
