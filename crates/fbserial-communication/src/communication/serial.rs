//! Serial port communication implementation
//!
//! Provides low-level serial port operations for the USB/ACM link to the
//! controller board, and [`LineTransport`], which frames the byte stream
//! into newline-terminated lines for the engine.
//!
//! Supports:
//! - Port enumeration and discovery
//! - Baud rate, framing and flow control configuration
//! - Short-timeout blocking reads

use crate::communication::{Transport, TransportEvent};
use fbserial_core::{ConnectionError, Result};
use fbserial_settings::{ConnectionSettings, FlowControl, Parity};
use std::collections::VecDeque;
use std::io::{self, Read, Write};

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyACM0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Arduino Mega")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }
}

impl std::fmt::Display for SerialPortInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.port_name, self.description)
    }
}

/// List serial ports that look like controller boards
///
/// Filters ports to these patterns:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyACM*, /dev/ttyUSB*
/// - macOS: /dev/cu.usb*
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        ConnectionError::SerialError {
            reason: format!("Failed to enumerate ports: {}", e),
        }
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_controller_port(&port.port_name))
        .map(|port| {
            let info = SerialPortInfo::new(&port.port_name, port_description(port));
            match &port.port_type {
                serialport::SerialPortType::UsbPort(usb_info) => {
                    let info = info.with_usb_ids(usb_info.vid, usb_info.pid);
                    match &usb_info.manufacturer {
                        Some(mfg) => info.with_manufacturer(mfg),
                        None => info,
                    }
                }
                _ => info,
            }
        })
        .collect())
}

/// Check if a port name matches controller board patterns
fn is_controller_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    port_name.starts_with("/dev/ttyACM")
        || port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/cu.usb")
}

/// Get a user-friendly description for a port
fn port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

fn to_serialport_parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    }
}

fn to_serialport_flow_control(flow_control: FlowControl) -> serialport::FlowControl {
    match flow_control {
        FlowControl::None => serialport::FlowControl::None,
        FlowControl::Software => serialport::FlowControl::Software,
        FlowControl::Hardware => serialport::FlowControl::Hardware,
    }
}

/// Low-level serial port interface
pub trait SerialPort: Send {
    /// Write data to the port
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Read data from the port
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the port name
    fn name(&self) -> String;
}

/// Real serial port implementation using serialport crate
pub struct RealSerialPort {
    name: String,
    port: Box<dyn serialport::SerialPort>,
}

impl RealSerialPort {
    /// Open a serial port with the given settings
    pub fn open(settings: &ConnectionSettings) -> Result<Self> {
        let failed = |reason: String| ConnectionError::FailedToOpen {
            port: settings.port.clone(),
            reason,
        };

        let data_bits = match settings.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            other => return Err(failed(format!("Invalid data bits: {}", other)).into()),
        };
        let stop_bits = match settings.stop_bits {
            1 => serialport::StopBits::One,
            2 => serialport::StopBits::Two,
            other => return Err(failed(format!("Invalid stop bits: {}", other)).into()),
        };

        let port = serialport::new(&settings.port, settings.baud_rate)
            .timeout(settings.read_timeout())
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(to_serialport_parity(settings.parity))
            .flow_control(to_serialport_flow_control(settings.flow_control))
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", settings.port, e);
                failed(e.to_string())
            })?;

        tracing::info!(
            "Opened {} at {} baud ({} flow control)",
            settings.port,
            settings.baud_rate,
            settings.flow_control
        );

        Ok(Self {
            name: settings.port.clone(),
            port,
        })
    }
}

impl SerialPort for RealSerialPort {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let written = self.port.write(data)?;
        self.port.flush()?;
        Ok(written)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Longest partial line kept while waiting for its newline
const MAX_LINE_BYTES: usize = 4096;

/// Frames a serial byte stream into lines
pub struct LineTransport<P: SerialPort> {
    port: P,
    buffer: Vec<u8>,
    lines: VecDeque<String>,
    closed: bool,
    close_reported: bool,
}

impl<P: SerialPort> LineTransport<P> {
    /// Wrap an open port
    pub fn new(port: P) -> Self {
        Self {
            port,
            buffer: Vec::new(),
            lines: VecDeque::new(),
            closed: false,
            close_reported: false,
        }
    }

    fn fill(&mut self) {
        let mut chunk = [0u8; 256];
        match self.port.read(&mut chunk) {
            Ok(0) => {
                tracing::info!("Serial port {} reached end of stream", self.port.name());
                self.closed = true;
            }
            Ok(n) => {
                self.buffer.extend_from_slice(&chunk[..n]);
                self.split_lines();
                if self.buffer.len() > MAX_LINE_BYTES {
                    tracing::warn!(
                        "Discarding {} bytes from {} without a line ending",
                        self.buffer.len(),
                        self.port.name()
                    );
                    self.buffer.clear();
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::warn!("Serial port {} read failed: {}", self.port.name(), e);
                self.closed = true;
            }
        }
    }

    fn split_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if !line.is_empty() {
                self.lines.push_back(line);
            }
        }
    }
}

impl<P: SerialPort> Transport for LineTransport<P> {
    fn send_line(&mut self, line: &str) -> Result<()> {
        if self.closed {
            return Err(ConnectionError::Closed.into());
        }

        let data = format!("{}\n", line);
        let bytes = data.as_bytes();
        let mut written = 0;
        while written < bytes.len() {
            match self.port.write(&bytes[written..]) {
                Ok(0) => {
                    return Err(ConnectionError::IoError {
                        reason: format!("{} accepted no bytes", self.port.name()),
                    }
                    .into())
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    if !matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
                        tracing::warn!("Serial port {} write failed: {}", self.port.name(), e);
                        self.closed = true;
                    }
                    return Err(ConnectionError::IoError {
                        reason: e.to_string(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        if self.lines.is_empty() && !self.closed {
            self.fill();
        }
        if let Some(line) = self.lines.pop_front() {
            return Some(TransportEvent::Line(line));
        }
        if self.closed && !self.close_reported {
            self.close_reported = true;
            return Some(TransportEvent::Closed);
        }
        None
    }

    fn name(&self) -> String {
        self.port.name()
    }
}
