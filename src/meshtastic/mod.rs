//! # Meshtastic Device Communication
//!
//! Serial transport for a single Meshtastic node operating in text serial
//! mode. The relay treats the radio as an opaque endpoint: one outbound
//! operation ([`Transport::send_text`]) and one inbound stream of
//! [`TextEvent`]s produced by a background reader task.
//!
//! ## Wire format (text serial mode)
//!
//! Outbound frames are newline-terminated records addressed to the primary
//! broadcast address:
//!
//! ```text
//! TO:^all MSG:<text>
//! ```
//!
//! Inbound frames carry the sending node id, an optional long name, and
//! either a text payload or the port of a non-text packet:
//!
//! ```text
//! FROM:!ab12 NAME:Base Station MSG:<text>
//! FROM:!ab12 PORT:POSITION_APP
//! ```
//!
//! ## Ownership
//!
//! The open serial port is shared between the send path and the reader task
//! (`Arc<Mutex<..>>`); the device handle itself is cheap to clone. The
//! dispatcher holds the handle used for sending, so all sends are serialized
//! there; the reader only ever drains the receive side.
//!
//! ## Configuration
//!
//! ```toml
//! [meshtastic]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! channel = 0
//! ```

use log::debug;
#[cfg(feature = "serial")]
use log::error;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

#[cfg(feature = "serial")]
use std::io::{Read, Write};
#[cfg(feature = "serial")]
use std::sync::{Arc, Mutex};
#[cfg(feature = "serial")]
use tokio::time::{sleep, Duration};

pub mod framer;
#[cfg(feature = "serial")]
use framer::LineFramer;

/// Primary-channel broadcast address.
pub const BROADCAST_ADDR: &str = "^all";

/// Depth of the inbound event queue between the reader task and the
/// listener. Inbound traffic on a LoRa channel is slow; a small bound is
/// plenty.
const EVENT_QUEUE_DEPTH: usize = 64;

/// One received radio packet, as surfaced to the inbound listener.
///
/// `content` is `None` for non-text packets (position, telemetry, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEvent {
    pub from_id: Option<String>,
    pub long_name: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open serial port {port}: {reason}")]
    Connect { port: String, reason: String },
    #[error("no device attached")]
    NotConnected,
    #[error("serial I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// The single outbound operation the relay needs from a radio.
///
/// The dispatcher owns the implementation exclusively; nothing else calls
/// `send_text`.
pub trait Transport: Send {
    fn send_text(&mut self, text: &str) -> Result<(), TransportError>;
}

/// Stands in for the radio when the relay is started without a device.
/// Every send fails as a recoverable [`TransportError::NotConnected`].
pub struct NullTransport;

impl Transport for NullTransport {
    fn send_text(&mut self, _text: &str) -> Result<(), TransportError> {
        Err(TransportError::NotConnected)
    }
}

/// Create the bounded inbound event channel connecting the device reader to
/// the listener.
pub fn event_channel() -> (mpsc::Sender<TextEvent>, mpsc::Receiver<TextEvent>) {
    mpsc::channel(EVENT_QUEUE_DEPTH)
}

#[cfg(feature = "serial")]
type SharedPort = Arc<Mutex<Box<dyn serialport::SerialPort>>>;

/// A connected Meshtastic node.
#[derive(Clone)]
pub struct MeshtasticDevice {
    port_name: String,
    #[allow(dead_code)]
    baud_rate: u32,
    #[cfg(feature = "serial")]
    port: SharedPort,
}

impl MeshtasticDevice {
    /// Open the serial link. Fails with [`TransportError::Connect`] when the
    /// port cannot be opened; the caller decides whether that is fatal.
    pub async fn connect(port_name: &str, baud_rate: u32) -> Result<Self, TransportError> {
        log::info!(
            "Initializing Meshtastic device on {} at {} baud",
            port_name,
            baud_rate
        );

        #[cfg(feature = "serial")]
        {
            let mut builder =
                serialport::new(port_name, baud_rate).timeout(Duration::from_millis(500));
            // Some USB serial adapters need explicit settings
            #[cfg(unix)]
            {
                builder = builder
                    .data_bits(serialport::DataBits::Eight)
                    .stop_bits(serialport::StopBits::One)
                    .parity(serialport::Parity::None);
            }
            let mut port = builder.open().map_err(|e| TransportError::Connect {
                port: port_name.to_string(),
                reason: e.to_string(),
            })?;
            // Toggle DTR/RTS so ESP32-based boards wake up
            let _ = port.write_data_terminal_ready(true);
            let _ = port.write_request_to_send(true);
            sleep(Duration::from_millis(150)).await;
            // Drop any buffered startup chatter
            let mut purge = [0u8; 512];
            if let Ok(available) = port.bytes_to_read() {
                if available > 0 {
                    let _ = port.read(&mut purge);
                }
            }
            debug!("Serial port {} initialized", port_name);
            Ok(MeshtasticDevice {
                port_name: port_name.to_string(),
                baud_rate,
                port: Arc::new(Mutex::new(port)),
            })
        }

        #[cfg(not(feature = "serial"))]
        {
            log::warn!("Serial support not compiled in, using mock device");
            Ok(MeshtasticDevice {
                port_name: port_name.to_string(),
                baud_rate,
            })
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Spawn the reader task: drains the serial link, reassembles lines, and
    /// forwards parsed [`TextEvent`]s into `events`. Exits when `shutdown`
    /// flips true, the event channel closes, or the port dies.
    pub fn start_reader(
        &self,
        events: mpsc::Sender<TextEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        #[cfg(feature = "serial")]
        {
            let port = self.port.clone();
            let port_name = self.port_name.clone();
            tokio::spawn(async move {
                let mut framer = LineFramer::new();
                let mut buf = [0u8; 1024];
                'outer: loop {
                    tokio::select! {
                        res = shutdown.changed() => {
                            if res.is_err() || *shutdown.borrow() {
                                break;
                            }
                            continue;
                        }
                        _ = sleep(Duration::from_millis(50)) => {}
                    }

                    // Collect parsed events with the lock held, forward after
                    // releasing it: the send path shares this mutex.
                    let mut parsed = Vec::new();
                    {
                        let Ok(mut guard) = port.lock() else {
                            error!("Serial port lock poisoned; reader exiting");
                            break;
                        };
                        let available = match guard.bytes_to_read() {
                            Ok(n) => n,
                            Err(e) => {
                                error!("Serial status error on {}: {}", port_name, e);
                                break;
                            }
                        };
                        if available == 0 {
                            continue;
                        }
                        match guard.read(&mut buf) {
                            Ok(n) if n > 0 => {
                                framer.push(&buf[..n]);
                                while let Some(line) = framer.next_line() {
                                    if let Some(event) = parse_event_line(&line) {
                                        parsed.push(event);
                                    } else if !line.trim().is_empty() {
                                        debug!(
                                            "Unparsed serial line: {}",
                                            crate::logutil::preview(&line, 80)
                                        );
                                    }
                                }
                            }
                            Ok(_) => {}
                            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => {
                                debug!("Serial read interrupted, likely shutdown in progress");
                            }
                            Err(e) => {
                                error!("Serial read error on {}: {}", port_name, e);
                                break;
                            }
                        }
                    }
                    for event in parsed {
                        if events.send(event).await.is_err() {
                            debug!("Text event channel closed; reader exiting");
                            break 'outer;
                        }
                    }
                }
                debug!("Serial reader for {} terminated", port_name);
            })
        }

        #[cfg(not(feature = "serial"))]
        {
            let _ = events;
            tokio::spawn(async move {
                loop {
                    if shutdown.changed().await.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            })
        }
    }
}

impl Transport for MeshtasticDevice {
    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        #[cfg(feature = "serial")]
        {
            let frame = format!("TO:{} MSG:{}\n", BROADCAST_ADDR, text);
            let mut port = self.port.lock().map_err(|_| {
                TransportError::Io(std::io::Error::other("serial port lock poisoned"))
            })?;
            port.write_all(frame.as_bytes())?;
            port.flush()?;
            debug!("Sent {} bytes on {}", frame.len(), self.port_name);
            Ok(())
        }

        #[cfg(not(feature = "serial"))]
        {
            debug!("(mock) send: {}", crate::logutil::preview(text, 80));
            Ok(())
        }
    }
}

/// Parse one inbound serial line into a [`TextEvent`].
///
/// Returns `None` for lines that are not inbound packet records (device
/// chatter, diagnostics).
pub fn parse_event_line(line: &str) -> Option<TextEvent> {
    let rest = line.trim().strip_prefix("FROM:")?;
    let space = rest.find(' ')?;
    let id = &rest[..space];
    let mut rest = rest[space + 1..].trim_start();

    let mut long_name = None;
    if let Some(after) = rest.strip_prefix("NAME:") {
        // the name runs until the payload marker; names may contain spaces
        let marker = after.find(" MSG:").or_else(|| after.find(" PORT:"))?;
        long_name = Some(after[..marker].to_string());
        rest = &after[marker + 1..];
    }

    let from_id = (!id.is_empty()).then(|| id.to_string());
    if let Some(text) = rest.strip_prefix("MSG:") {
        Some(TextEvent {
            from_id,
            long_name,
            content: Some(text.to_string()),
        })
    } else if rest.strip_prefix("PORT:").is_some() {
        Some(TextEvent {
            from_id,
            long_name,
            content: None,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_with_name() {
        let event = parse_event_line("FROM:!ab12 NAME:Base Station MSG:hello there").unwrap();
        assert_eq!(event.from_id.as_deref(), Some("!ab12"));
        assert_eq!(event.long_name.as_deref(), Some("Base Station"));
        assert_eq!(event.content.as_deref(), Some("hello there"));
    }

    #[test]
    fn parses_text_without_name() {
        let event = parse_event_line("FROM:!ab12 MSG:ping").unwrap();
        assert_eq!(event.from_id.as_deref(), Some("!ab12"));
        assert_eq!(event.long_name, None);
        assert_eq!(event.content.as_deref(), Some("ping"));
    }

    #[test]
    fn parses_non_text_packet() {
        let event = parse_event_line("FROM:!ab12 PORT:POSITION_APP").unwrap();
        assert_eq!(event.from_id.as_deref(), Some("!ab12"));
        assert_eq!(event.content, None);
    }

    #[test]
    fn named_non_text_packet() {
        let event = parse_event_line("FROM:!ab12 NAME:Rover PORT:TELEMETRY_APP").unwrap();
        assert_eq!(event.long_name.as_deref(), Some("Rover"));
        assert_eq!(event.content, None);
    }

    #[test]
    fn payload_may_contain_markers() {
        let event = parse_event_line("FROM:!ab12 MSG:say NAME: or PORT: freely").unwrap();
        assert_eq!(event.content.as_deref(), Some("say NAME: or PORT: freely"));
    }

    #[test]
    fn rejects_chatter() {
        assert_eq!(parse_event_line("booting v2.3.2"), None);
        assert_eq!(parse_event_line(""), None);
        assert_eq!(parse_event_line("FROM:!ab12"), None);
        assert_eq!(parse_event_line("FROM:!ab12 garbage"), None);
    }
}
