//! # roverlink
//!
//! A host-side async driver for a two-wheeled rover talking a small framed
//! binary protocol over a point-to-point serial link.
//!
//! This crate implements:
//! - a 7-byte frame codec with an additive checksum ([`frame`])
//! - a closed set of telemetry wire codecs, including three `bitflags`
//!   status types ([`codec`])
//! - the full telemetry data-element registry ([`registry`])
//! - an async serial transport built on `tokio-serial` ([`serial`])
//! - a protocol engine that serializes reads behind a FIFO-fair lock and
//!   resynchronizes past corrupted frames ([`engine`])
//! - a rover facade exposing motor control, telemetry requests, and the
//!   settings/restart commands ([`rover`])
//!
//! ## Usage
//!
//! ```no_run
//! # async fn run() -> roverlink::error::Result<()> {
//! use roverlink::serial::SerialConfig;
//!
//! let mut rover = roverlink::rover::open_rover(&SerialConfig::default()).await?;
//! rover.set_motor_speeds(0.2, 0.2, 0.0)?;
//! rover.send_speed().await?;
//! let version = rover.get_data(40).await?;
//! println!("firmware: {version:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Status
//!
//! Out of scope: the CLI driver utility, OS serial-port enumeration beyond a
//! manufacturer-string filter, the bootloader protocol, and the hardware
//! test suite.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications
)]

pub mod codec;
pub mod consts;
pub mod engine;
pub mod error;
pub mod frame;
pub mod registry;
pub mod rover;
pub mod serial;
pub mod version;

pub use error::{Error, Result};
pub use version::FirmwareVersion;
