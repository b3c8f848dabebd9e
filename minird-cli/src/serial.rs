//! Serial link to the miniRD controller
//!
//! The controller answers `r\r\n` with one comma-separated status line and
//! `I\r\n` with `miniRD,<firmware>`.

use anyhow::{bail, Context, Result};
use minird_bridge::{decode_vector, BridgeError, RawSample, SampleSource};
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::time::Duration;

const READ_REQUEST: &[u8] = b"r\r\n";
const IDENTIFY_REQUEST: &[u8] = b"I\r\n";
const CONTROLLER_ID: &str = "miniRD";
const PROBE_BACKOFF: Duration = Duration::from_secs(2);

/// Ports that can drop unread input
pub trait ClearInput {
    fn clear_input(&mut self) -> io::Result<()>;
}

impl ClearInput for Box<dyn SerialPort> {
    fn clear_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// Line-oriented request/response link
pub struct LineLink<T: Read + Write + ClearInput> {
    inner: BufReader<T>,
}

impl<T: Read + Write + ClearInput> LineLink<T> {
    pub fn new(port: T) -> Self {
        Self {
            inner: BufReader::new(port),
        }
    }

    /// Send a request and read the reply line.
    ///
    /// Replies that arrived after an earlier timeout are discarded first.
    fn request(&mut self, request: &[u8]) -> minird_bridge::Result<String> {
        let stale = self.inner.buffer().len();
        if stale > 0 {
            log::debug!("Discarding {} stale bytes", stale);
            self.inner.consume(stale);
        }

        let port = self.inner.get_mut();
        port.clear_input().map_err(map_io)?;
        port.write_all(request).map_err(map_io)?;
        port.flush().map_err(map_io)?;

        let mut line = Vec::new();
        self.inner.read_until(b'\n', &mut line).map_err(map_io)?;
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Ask the controller to identify itself; returns the firmware version
    pub fn identify(&mut self) -> minird_bridge::Result<Option<String>> {
        let reply = self.request(IDENTIFY_REQUEST)?;
        let mut fields = reply.trim().split(',');
        if fields.next() != Some(CONTROLLER_ID) {
            return Ok(None);
        }
        Ok(Some(fields.next().unwrap_or("unknown").to_string()))
    }
}

impl<T: Read + Write + ClearInput> SampleSource for LineLink<T> {
    fn sample(&mut self) -> minird_bridge::Result<RawSample> {
        let line = self.request(READ_REQUEST)?;
        decode_vector(&line)
    }
}

fn map_io(e: io::Error) -> BridgeError {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => BridgeError::Timeout,
        _ => BridgeError::IoError(e),
    }
}

/// The controller's serial port
pub type SerialSource = LineLink<Box<dyn SerialPort>>;

/// Open a known port
pub fn open(port: &str, baud_rate: u32, timeout: Duration) -> Result<SerialSource> {
    let handle = serialport::new(port, baud_rate)
        .timeout(timeout)
        .open()
        .with_context(|| format!("Failed to open serial port {}", port))?;
    log::info!("Opened {} at {} baud", port, baud_rate);
    Ok(LineLink::new(handle))
}

/// A controller found by probing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub port: String,
    pub firmware: String,
}

/// Probe every serial port, most recently enumerated first
pub fn discover(baud_rate: u32, probe_timeout: Duration) -> Result<Discovered> {
    let mut ports: Vec<String> = serialport::available_ports()
        .context("Could not enumerate serial ports")?
        .into_iter()
        .map(|p| p.port_name)
        .collect();
    ports.reverse();

    if ports.is_empty() {
        bail!("No serial ports found");
    }
    log::info!("Available serial ports: {:?}", ports);

    for port in &ports {
        log::debug!("Trying {}", port);
        let mut link = match open(port, baud_rate, probe_timeout) {
            Ok(link) => link,
            Err(e) => {
                log::debug!("Port unreachable: {:#}", e);
                continue;
            }
        };

        match link.identify() {
            Ok(Some(firmware)) => {
                log::info!("Found miniRD on {}, firmware version: {}", port, firmware);
                return Ok(Discovered {
                    port: port.clone(),
                    firmware,
                });
            }
            Ok(None) => {
                log::debug!("Port {} responded, but not as a miniRD", port);
                drop(link);
                std::thread::sleep(PROBE_BACKOFF);
            }
            Err(e) => log::debug!("No answer on {}: {}", port, e),
        }
    }

    bail!("No miniRD found on any of {} serial ports", ports.len())
}
