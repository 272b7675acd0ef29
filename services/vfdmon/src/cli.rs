//! Command-line arguments

use clap::Parser;
use std::path::PathBuf;

use vfd_modbus::Parity;

use crate::config::AppConfig;
use crate::registers::ControlCommand;

/// Command-line arguments for vfdmon
#[derive(Parser, Debug, Clone)]
#[command(
    name = "vfdmon",
    version = env!("CARGO_PKG_VERSION"),
    about = "VFD monitor and controller over Modbus RTU",
    long_about = None
)]
pub struct Args {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short = 'c', long, env = "VFDMON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Serial port
    #[arg(short = 'p', long)]
    pub port: Option<String>,

    /// Baud rate (9600, 19200, 38400, 57600, 115200)
    #[arg(short = 'b', long)]
    pub baud: Option<u32>,

    /// Parity (N, E, O)
    #[arg(long)]
    pub parity: Option<Parity>,

    /// Slave id of the drive
    #[arg(short = 's', long)]
    pub slave: Option<u8>,

    /// Poll interval in milliseconds
    #[arg(long)]
    pub poll_ms: Option<u64>,

    /// Per-transaction timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    pub log_level: String,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Print samples as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Talk to a built-in simulated drive instead of a serial port
    #[arg(long)]
    pub simulate: bool,

    /// Control command to send once connected
    #[arg(long, value_name = "forward|reverse|stop|estop|reset")]
    pub command: Option<ControlCommand>,

    /// Raw target frequency (Hz x100) to write once connected
    #[arg(long, value_name = "RAW")]
    pub set_freq: Option<u16>,
}

impl Args {
    /// Command-line values win over every other source
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(port) = &self.port {
            config.connection.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.connection.baud_rate = baud;
        }
        if let Some(parity) = self.parity {
            config.connection.parity = parity;
        }
        if let Some(slave) = self.slave {
            config.connection.slave_id = slave;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.connection.timeout_ms = timeout_ms;
        }
        if let Some(poll_ms) = self.poll_ms {
            config.poll_interval_ms = poll_ms;
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_override() {
        let args = Args::try_parse_from([
            "vfdmon",
            "--port",
            "/dev/ttyS3",
            "--baud",
            "19200",
            "--parity",
            "o",
            "--slave",
            "7",
            "--poll-ms",
            "250",
            "--command",
            "estop",
            "--set-freq",
            "5000",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.connection.port, "/dev/ttyS3");
        assert_eq!(config.connection.baud_rate, 19200);
        assert_eq!(config.connection.parity, Parity::Odd);
        assert_eq!(config.connection.slave_id, 7);
        assert_eq!(config.connection.timeout_ms, 1000);
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(args.command, Some(ControlCommand::EStop));
        assert_eq!(args.set_freq, Some(5000));
    }

    #[test]
    fn test_rejects_unknown_command() {
        assert!(Args::try_parse_from(["vfdmon", "--command", "jog"]).is_err());
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let args = Args::try_parse_from(["vfdmon"]).unwrap();
        let mut config = AppConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config, AppConfig::default());
    }
}
