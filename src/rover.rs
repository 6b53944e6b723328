//! The rover facade (§4.5) and device discovery (§4.1, §9).
//!
//! `Rover` owns the motor-effort latches and drives the command loop: every
//! outbound frame carries the current left/right/flipper effort values
//! alongside whatever verb the caller is issuing, matching the original
//! driver's `_send_command` (every command is really "update motor efforts,
//! plus this"). `get_data`/`get_data_items` send a `GET_DATA` request and
//! read exactly one reply frame under a 1-second deadline; a reply whose
//! slot index doesn't match the one requested is a protocol violation and
//! is surfaced to the caller as [`Error::BadResponse`] rather than retried
//! (§4.5, §7) — the in-order design the original settled on after an
//! abandoned per-index fan-out revision (§9) still applies, but a mismatch
//! is not silently absorbed.

use std::time::Duration;

use tokio::time::timeout;
use tokio_serial::SerialStream;

use crate::codec::{DriveMode, Value};
use crate::consts::{Verb, DISCOVERY_TIMEOUT, GET_DATA_TIMEOUT, RESTART_RETRIES};
use crate::engine::ProtocolEngine;
use crate::error::{Error, Result};
use crate::serial::{list_candidate_ports, SerialConfig, SerialEndpoint};

/// Motor-effort and command driver for a rover, built on a [`ProtocolEngine`].
pub struct Rover<T = SerialStream> {
    engine: ProtocolEngine<T>,
    motor_left: f64,
    motor_right: f64,
    motor_flipper: f64,
}

impl<T> Rover<T>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    pub fn new(engine: ProtocolEngine<T>) -> Self {
        Self {
            engine,
            motor_left: 0.0,
            motor_right: 0.0,
            motor_flipper: 0.0,
        }
    }

    /// Latches the motor efforts sent with every subsequent command (§3).
    /// Each value must be in `[-1, 1]`.
    pub fn set_motor_speeds(&mut self, left: f64, right: f64, flipper: f64) -> Result<()> {
        for (name, v) in [("left", left), ("right", right), ("flipper", flipper)] {
            if !(-1.0..=1.0).contains(&v) {
                return Err(Error::Protocol(format!(
                    "motor effort {name}={v} out of range [-1, 1]"
                )));
            }
        }
        self.motor_left = left;
        self.motor_right = right;
        self.motor_flipper = flipper;
        Ok(())
    }

    async fn send_command(&self, verb: Verb, arg: u8) -> Result<()> {
        self.engine
            .write_command(self.motor_left, self.motor_right, self.motor_flipper, verb.byte(), arg)
            .await
    }

    /// Sends a no-op frame carrying the current motor efforts.
    pub async fn send_speed(&self) -> Result<()> {
        self.send_command(Verb::Nop, 0).await
    }

    /// Sets the auxiliary fan speed, `0.0..=1.0`.
    pub async fn set_fan_speed(&self, fan_speed: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&fan_speed) {
            return Err(Error::Protocol(format!("fan speed {fan_speed} out of range [0, 1]")));
        }
        self.send_command(Verb::SetFanSpeed, (fan_speed * 240.0).round() as u8).await
    }

    /// Clears a latched system fault.
    pub async fn clear_system_fault(&self) -> Result<()> {
        self.send_command(Verb::ClearSystemFault, 0).await
    }

    /// Runs the flipper calibration routine. The arg byte is the verb byte
    /// itself, an interlock against accidental triggering.
    pub async fn flipper_calibrate(&self) -> Result<()> {
        self.send_command(Verb::FlipperCalibrate, Verb::FlipperCalibrate.byte()).await
    }

    /// Reloads settings from flash into the controller's working memory.
    pub async fn reload_settings(&self) -> Result<()> {
        self.send_command(Verb::ReloadSettings, 0).await
    }

    /// Commits working settings to flash so they survive a restart.
    pub async fn commit_settings(&self) -> Result<()> {
        self.send_command(Verb::CommitSettings, 0).await
    }

    /// Switches between open-loop and closed-loop drive control.
    pub async fn set_drive_mode(&self, mode: DriveMode) -> Result<()> {
        self.send_command(Verb::SetDriveMode, mode as u8).await
    }

    /// Reboots the controller. Sent [`RESTART_RETRIES`] times with no reply
    /// expected, since the controller is about to reset and may drop
    /// packets in flight around the reboot.
    pub async fn restart(&self, into_bootloader: bool) -> Result<()> {
        let arg = u8::from(into_bootloader);
        for _ in 0..RESTART_RETRIES {
            self.send_command(Verb::Restart, arg).await?;
        }
        self.engine.flush().await
    }

    /// Requests telemetry slot `index` and reads the next reply frame, under
    /// [`GET_DATA_TIMEOUT`]. A reply for any slot other than `index` is a
    /// protocol violation (§4.5, §7) and is returned as
    /// [`Error::BadResponse`] rather than retried.
    pub async fn get_data(&self, index: u8) -> Result<Value> {
        self.send_command(Verb::GetData, index).await?;
        let reply = timeout(GET_DATA_TIMEOUT, self.engine.read_one())
            .await
            .map_err(|_| Error::Timeout("get_data reply"))??;
        if reply.index != index {
            return Err(Error::BadResponse {
                expected: Some(index),
                actual: reply.index,
            });
        }
        Ok(reply.value)
    }

    /// Requests and reads each of `indices` in turn, deduplicating repeats.
    pub async fn get_data_items(&self, indices: &[u8]) -> Result<Vec<(u8, Value)>> {
        let mut seen = Vec::new();
        let mut out = Vec::with_capacity(indices.len());
        for &index in indices {
            if seen.contains(&index) {
                continue;
            }
            seen.push(index);
            out.push((index, self.get_data(index).await?));
        }
        Ok(out)
    }

    /// Drains and releases the serial endpoint (§4.1). Safe to call more
    /// than once; every command or telemetry request afterward fails with
    /// [`Error::DeviceClosed`].
    pub async fn close(&self) -> Result<()> {
        self.engine.close().await
    }
}

/// Probes `path` for a rover by requesting the firmware version slot (40)
/// under [`DISCOVERY_TIMEOUT`].
async fn probe_version(engine: &ProtocolEngine<SerialStream>) -> Result<()> {
    engine.write_command(0.0, 0.0, 0.0, Verb::GetData.byte(), 40).await?;
    timeout(DISCOVERY_TIMEOUT, async {
        loop {
            let reply = engine.read_one().await?;
            if reply.index == 40 {
                return Ok(());
            }
        }
    })
    .await
    .map_err(|_| Error::Timeout("device probe"))?
}

/// Enumerates FTDI serial ports and opens the first one that responds to a
/// firmware version probe, aggregating every candidate's failure into one
/// [`Error::DeviceNotFound`] if none answer (§4.1, §9, grounded on
/// `find_device.py::open_rover_device`).
pub async fn open_rover(config: &SerialConfig) -> Result<Rover<SerialStream>> {
    let candidates = list_candidate_ports(crate::consts::DEFAULT_MANUFACTURER_FILTER)?;
    let mut failures = Vec::new();
    for candidate in candidates {
        let path = candidate.port_name;
        match SerialEndpoint::open(&path, config) {
            Ok(endpoint) => {
                let engine = ProtocolEngine::new(endpoint);
                match probe_version(&engine).await {
                    Ok(()) => return Ok(Rover::new(engine)),
                    Err(e) => failures.push((path, e.to_string())),
                }
            }
            Err(e) => failures.push((path, e.to_string())),
        }
    }
    Err(Error::DeviceNotFound { candidates: failures })
}
