use std::io;

use thiserror::Error;

/// Any error this library might encounter.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value was rejected before any I/O was attempted.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The host OS has no known convention for selecting a serial device.
    #[error("Operating system not supported")]
    UnsupportedPlatform,

    /// The port is already initializing, open, or has been closed.
    /// Close the port before reinitializing.
    #[error("Port is already initialized")]
    AlreadyInitialized,

    /// The operation requires an open port.
    #[error("Port is not open")]
    NotOpen,

    /// The external line configuration tool rejected the settings.
    #[error("Line configuration tool exited with code {exit_code}")]
    ConfigurationFailed {
        /// The tool's exit code. `-1` if it was terminated by a signal.
        exit_code: i32,
    },

    /// The external line configuration tool did not complete in time.
    #[error("Line configuration did not complete in a timely manner")]
    InitializationTimeout,

    /// The operation was issued against a closed or closing port.
    #[error("Port is closed")]
    PortClosed,

    /// Underlying IO problem, reported with its original detail.
    #[error("IO problem")]
    Io(#[from] io::Error),
}
