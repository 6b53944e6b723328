//! The async serial transport (§4.1).
//!
//! An open endpoint is split at construction into independent read and write
//! halves, so `write_nowait` never suspends behind an in-flight read (§5) —
//! only the read side is meant to sit behind the engine's FIFO-fair lock,
//! matching the original driver's `write()`, which takes no lock at all.
//! Both halves share a `closed` flag so `close()` is visible from either
//! side. Generic over the transport so tests can swap in
//! `tokio::io::DuplexStream` for the real `tokio_serial::SerialStream`.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialPortInfo, SerialStream, StopBits};

use crate::consts::{DEFAULT_BAUD_RATE, DEFAULT_MANUFACTURER_FILTER, OUTBOUND_HIGH_WATER};
use crate::error::{Error, Result};

/// Serial line parameters for opening a rover endpoint.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baud: u32,
    pub stop_bits: StopBits,
    /// Request exclusive access to the device node, matching the original
    /// driver's `exclusive=True` (§4.1): a second open should fail loudly
    /// rather than silently share the port.
    pub exclusive: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud: DEFAULT_BAUD_RATE,
            stop_bits: StopBits::One,
            exclusive: true,
        }
    }
}

/// The read half of an open endpoint. Meant to sit behind
/// [`crate::engine::ProtocolEngine`]'s FIFO read-lock.
pub struct SerialReader<T = SerialStream> {
    stream: ReadHalf<T>,
    path: String,
    closed: Arc<AtomicBool>,
}

/// The write half of an open endpoint. `write_nowait` never waits on the
/// read half's lock (§5).
pub struct SerialWriter<T = SerialStream> {
    stream: WriteHalf<T>,
    path: String,
    closed: Arc<AtomicBool>,
}

/// An open connection to the rover: a byte transport plus the high-water and
/// close bookkeeping the original driver performs around it. Immediately
/// splittable into independent [`SerialReader`]/[`SerialWriter`] halves.
pub struct SerialEndpoint<T = SerialStream> {
    reader: SerialReader<T>,
    writer: SerialWriter<T>,
    path: String,
    closed: Arc<AtomicBool>,
}

impl SerialEndpoint<SerialStream> {
    /// Opens `path` with `config`, mapping OS-level open failures to
    /// [`Error::DeviceAccess`].
    pub fn open(path: &str, config: &SerialConfig) -> Result<Self> {
        let stream = tokio_serial::new(path, config.baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(config.stop_bits)
            .exclusive(config.exclusive)
            .open_native_async()
            .map_err(|e| Error::device_access(path, io::Error::from(e)))?;

        Ok(Self::from_transport(path, stream))
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> SerialEndpoint<T> {
    /// Wraps an arbitrary transport, bypassing device discovery. Used by
    /// tests with an in-memory `tokio::io::duplex` pair standing in for the
    /// hardware link.
    pub fn from_transport(path: impl Into<String>, stream: T) -> Self {
        let path = path.into();
        let closed = Arc::new(AtomicBool::new(false));
        let (read_half, write_half) = split(stream);
        Self {
            reader: SerialReader {
                stream: read_half,
                path: path.clone(),
                closed: Arc::clone(&closed),
            },
            writer: SerialWriter {
                stream: write_half,
                path: path.clone(),
                closed: Arc::clone(&closed),
            },
            path,
            closed,
        }
    }

    /// Splits into independent read and write halves so each can be placed
    /// behind its own lock (§5: `write_nowait` must never suspend behind an
    /// in-flight read).
    pub fn split(self) -> (SerialReader<T>, SerialWriter<T>) {
        (self.reader, self.writer)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Drains outgoing bytes, then releases the endpoint (§4.1). Safe to
    /// call more than once; every read or write on either half afterward
    /// returns [`Error::DeviceClosed`].
    pub async fn close(&mut self) -> Result<()> {
        self.writer.close().await
    }
}

impl<T: AsyncRead + Unpin> SerialReader<T> {
    fn check_closed(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::DeviceClosed);
        }
        Ok(())
    }

    /// Reads exactly `buf.len()` bytes, suspending between partial reads.
    /// EOF before `buf` is filled maps to [`Error::DeviceClosed`].
    pub async fn read_exactly(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_closed()?;
        self.stream.read_exact(buf).await.map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::DeviceClosed
            } else {
                Error::Io(e)
            }
        })?;
        Ok(())
    }

    /// Reads a single byte, used by the frame resynchronizer to scan for the
    /// next start byte one byte at a time.
    pub async fn read_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_exactly(&mut b).await?;
        Ok(b[0])
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl<T: AsyncWrite + Unpin> SerialWriter<T> {
    fn check_closed(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::DeviceClosed);
        }
        Ok(())
    }

    /// Writes `data` in full. Logs a warning if more than
    /// [`OUTBOUND_HIGH_WATER`] bytes are written in one call (§4.1, grounded
    /// on the original driver's `write_nowait` + `_outbound_high_water`
    /// check; a generic async transport has no OS write-buffer depth to
    /// query, so the check is on the size of the write itself).
    pub async fn write_nowait(&mut self, data: &[u8]) -> Result<()> {
        self.check_closed()?;
        self.stream.write_all(data).await?;
        if data.len() >= OUTBOUND_HIGH_WATER {
            tracing::warn!(path = %self.path, len = data.len(), "outbound serial write backlogged, data may be lost");
        }
        Ok(())
    }

    /// Waits for the underlying write buffer to fully drain.
    pub async fn flush(&mut self) -> Result<()> {
        self.check_closed()?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Drains outgoing bytes, then marks the endpoint closed (§4.1). Safe to
    /// call more than once; every subsequent read or write on either half
    /// (the `closed` flag is shared with the paired [`SerialReader`]) returns
    /// [`Error::DeviceClosed`].
    pub async fn close(&mut self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.stream.flush().await?;
        Ok(())
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Lists serial ports whose manufacturer string contains `manufacturer_substr`
/// (case-sensitive, matching the original driver's exact-match filter but
/// generalized to substring so vendor string variants still match).
///
/// Defaults to [`DEFAULT_MANUFACTURER_FILTER`] when called from discovery.
pub fn list_candidate_ports(manufacturer_substr: &str) -> Result<Vec<SerialPortInfo>> {
    let ports = tokio_serial::available_ports().map_err(|e| Error::Protocol(e.to_string()))?;
    Ok(ports
        .into_iter()
        .filter(|p| matches_manufacturer(p, manufacturer_substr))
        .collect())
}

fn matches_manufacturer(port: &SerialPortInfo, substr: &str) -> bool {
    match &port.port_type {
        tokio_serial::SerialPortType::UsbPort(usb) => usb
            .manufacturer
            .as_deref()
            .is_some_and(|m| m.contains(substr)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_matches_rover_defaults() {
        let cfg = SerialConfig::default();
        assert_eq!(cfg.baud, 57_600);
        assert!(cfg.exclusive);
    }

    #[test]
    fn manufacturer_filter_defaults_to_ftdi() {
        assert_eq!(DEFAULT_MANUFACTURER_FILTER, "FTDI");
    }

    #[tokio::test]
    async fn read_exactly_over_duplex_round_trips() {
        let (mut client, server) = tokio::io::duplex(64);
        let endpoint = SerialEndpoint::from_transport("mock", server);
        let (mut reader, _writer) = endpoint.split();
        client.write_all(&[1, 2, 3, 4]).await.unwrap();
        let mut buf = [0u8; 4];
        reader.read_exactly(&mut buf).await.unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn read_exactly_maps_eof_to_device_closed() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);
        let endpoint = SerialEndpoint::from_transport("mock", server);
        let (mut reader, _writer) = endpoint.split();
        let mut buf = [0u8; 1];
        let err = reader.read_exactly(&mut buf).await.unwrap_err();
        assert!(matches!(err, Error::DeviceClosed));
    }

    #[tokio::test]
    async fn close_is_safe_to_call_twice_and_blocks_further_operations() {
        let (_client, server) = tokio::io::duplex(64);
        let mut endpoint = SerialEndpoint::from_transport("mock", server);
        endpoint.close().await.unwrap();
        endpoint.close().await.unwrap();

        let (mut reader, mut writer) = endpoint.split();
        let mut buf = [0u8; 1];
        assert!(matches!(
            reader.read_exactly(&mut buf).await.unwrap_err(),
            Error::DeviceClosed
        ));
        assert!(matches!(
            writer.write_nowait(&[0]).await.unwrap_err(),
            Error::DeviceClosed
        ));
    }
}
