#![deny(missing_docs)]

//! A duplex byte stream over a serial (TTY) device.
//!
//! The device's line discipline (baud rate, data bits, stop bits, parity)
//! is configured by invoking an external `stty` tool. The device file is
//! then opened for simultaneous reading and writing and exposed as a
//! single duplex channel.
//!
//! Lifecycle events (`open`, `data`, `end`, `error`, `close`) are
//! delivered over a broadcast channel; subscribe before initializing to
//! observe the full sequence.
//!
//! Supported on Linux and macOS, where serial devices appear as special
//! files.
//!
//! ```no_run
//! use stty_port::{PortConfig, SerialPort};
//!
//! # async fn demo() -> Result<(), stty_port::Error> {
//! let config = PortConfig::new("/dev/ttyACM0").set_baud_rate(115_200);
//! let mut port = SerialPort::new(config);
//!
//! let mut events = port.events();
//!
//! // Writes issued before the port opens are flushed in order once
//! // it does.
//! let ack = port.write("AT+CSQ\r\n");
//!
//! port.initialize().await?;
//! ack.flushed().await?;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//!
//! port.close()?;
//! # Ok(())
//! # }
//! ```

/// Line characteristics and how to apply them.
pub mod config;

/// Possible errors in this library.
pub mod error;

/// Tracing setup.
pub mod logging;

/// The serial port itself: initialization, duplex channel, lifecycle.
pub mod port;

/// The command line interface for the companion binary.
pub mod cli;

pub use config::{Parity, PortConfig};
pub use error::Error;
pub use port::{PortEvent, SerialPort, WriteAck};
