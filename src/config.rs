use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The default path to the line configuration tool.
pub const DEFAULT_STTY_PATH: &str = "/bin/stty";

/// The default initialization timeout.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Parity bit handling for the serial line.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,

    /// Odd parity.
    Odd,

    /// Even parity.
    Even,

    /// Parity bit always set.
    Mark,

    /// Parity bit always cleared.
    Space,
}

impl Display for Parity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Parity::None => "none",
            Parity::Odd => "odd",
            Parity::Even => "even",
            Parity::Mark => "mark",
            Parity::Space => "space",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Parity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Parity::None),
            "odd" => Ok(Parity::Odd),
            "even" => Ok(Parity::Even),
            "mark" => Ok(Parity::Mark),
            "space" => Ok(Parity::Space),
            other => Err(Error::InvalidParameter(format!("Invalid parity: {other}"))),
        }
    }
}

impl Parity {
    /// The stty tokens expressing this parity mode.
    fn stty_tokens(&self) -> &'static [&'static str] {
        match self {
            Parity::None => &["-parenb"],
            Parity::Odd => &["parenb", "-parext", "parodd"],
            Parity::Even => &["parenb", "-parext", "-parodd"],
            Parity::Mark => &["parenb", "parext", "parodd"],
            Parity::Space => &["parenb", "parext", "-parodd"],
        }
    }
}

/// Line characteristics of a serial port, plus how to apply them.
///
/// Immutable once initialization starts: [`crate::SerialPort::new`] takes
/// ownership, and resuming a closed port requires a fresh configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortConfig {
    /// Path to the serial device, e.g. `/dev/ttyACM0`.
    pub device: String,

    /// Baud rate. Defaults to 9600.
    pub baud_rate: u32,

    /// Data bits, one of 5, 6, 7 or 8. Defaults to 8.
    pub data_bits: u8,

    /// Stop bits, 1 or 2. Defaults to 1.
    pub stop_bits: u8,

    /// Parity. Defaults to [`Parity::None`].
    pub parity: Parity,

    /// Path to the external line configuration tool.
    /// Defaults to `/bin/stty`.
    pub stty_path: PathBuf,

    /// Maximum duration of the line configuration step.
    /// `None` waits indefinitely. Defaults to 10 seconds.
    pub init_timeout: Option<Duration>,
}

impl PortConfig {
    /// A configuration for the given device with all defaults.
    pub fn new<P: AsRef<Path>>(device: P) -> Self {
        Self {
            device: device.as_ref().to_string_lossy().into_owned(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            stty_path: DEFAULT_STTY_PATH.into(),
            init_timeout: Some(DEFAULT_INIT_TIMEOUT),
        }
    }

    /// Set the baud rate.
    pub fn set_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the number of data bits.
    pub fn set_data_bits(mut self, data_bits: u8) -> Self {
        self.data_bits = data_bits;
        self
    }

    /// Set the number of stop bits.
    pub fn set_stop_bits(mut self, stop_bits: u8) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    /// Set the parity mode.
    pub fn set_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Set the path to the line configuration tool.
    pub fn set_stty_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.stty_path = path.into();
        self
    }

    /// Set the initialization timeout. `None` waits indefinitely.
    pub fn set_init_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.init_timeout = timeout;
        self
    }

    /// Check all line parameters without touching the device.
    pub fn validate(&self) -> Result<(), Error> {
        if self.device.is_empty() {
            return Err(Error::InvalidParameter(
                "Path to serial port device was not specified".into(),
            ));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(Error::InvalidParameter(format!(
                "Data bits must be between 5 and 8, got {}",
                self.data_bits
            )));
        }
        if !(1..=2).contains(&self.stop_bits) {
            return Err(Error::InvalidParameter(format!(
                "Stop bits must be 1 or 2, got {}",
                self.stop_bits
            )));
        }
        Ok(())
    }

    /// The ordered argument list for the line configuration tool.
    ///
    /// Validates first, so this never produces arguments for a bad
    /// configuration.
    pub fn stty_args(&self) -> Result<Vec<String>, Error> {
        self.validate()?;

        let mut args = vec![device_flag()?.to_string(), self.device.clone()];

        // Raw, unbuffered, no echo: bytes pass through unmodified.
        args.extend(
            [
                "raw", "-onlcr", "-iexten", "-echo", "-echoe", "-echok", "-echoctl", "-echoke",
            ]
            .map(String::from),
        );

        args.push("speed".into());
        args.push(self.baud_rate.to_string());

        args.push(format!("cs{}", self.data_bits));

        args.push(if self.stop_bits == 2 {
            "cstopb".into()
        } else {
            "-cstopb".into()
        });

        args.extend(self.parity.stty_tokens().iter().map(|t| t.to_string()));

        Ok(args)
    }
}

/// The flag which selects the target device on this platform.
fn device_flag() -> Result<&'static str, Error> {
    if cfg!(target_os = "linux") {
        Ok("-F")
    } else if cfg!(target_os = "macos") {
        Ok("-f")
    } else {
        Err(Error::UnsupportedPlatform)
    }
}
