use std::path::PathBuf;

use clap::Parser;

use crate::config::{Parity, PortConfig};

/// Open a serial device, print what it says, optionally talk back.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the serial device, e.g. /dev/ttyACM0
    pub device: String,

    /// Baud rate
    #[arg(short, long, default_value_t = 9600)]
    pub baud_rate: u32,

    /// Data bits (5-8)
    #[arg(long, default_value_t = 8)]
    pub data_bits: u8,

    /// Stop bits (1 or 2)
    #[arg(long, default_value_t = 1)]
    pub stop_bits: u8,

    /// Parity: none, odd, even, mark or space
    #[arg(long, default_value = "none")]
    pub parity: Parity,

    /// Path to the stty executable
    #[arg(long, default_value = "/bin/stty")]
    pub stty_path: PathBuf,

    /// Initialization timeout in milliseconds, 0 for unbounded
    #[arg(long, default_value_t = 10_000)]
    pub init_timeout_ms: u64,

    /// Write this after the port opens. May be repeated.
    #[arg(short, long)]
    pub send: Vec<String>,
}

impl Cli {
    /// The port configuration these arguments describe.
    pub fn port_config(&self) -> PortConfig {
        let timeout = match self.init_timeout_ms {
            0 => None,
            ms => Some(std::time::Duration::from_millis(ms)),
        };

        PortConfig::new(&self.device)
            .set_baud_rate(self.baud_rate)
            .set_data_bits(self.data_bits)
            .set_stop_bits(self.stop_bits)
            .set_parity(self.parity)
            .set_stty_path(self.stty_path.clone())
            .set_init_timeout(timeout)
    }
}
