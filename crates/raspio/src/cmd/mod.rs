use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Subcommand};
use raspio_session::SessionConfig;
use raspio_transport::{ConnectionConfig, FixedPort};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod i2c;
pub mod serial;
pub mod spi;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a session and issue raw JSON requests.
    Call(CallArgs),
    /// I2C bus operations.
    #[command(subcommand)]
    I2c(I2cCommand),
    /// SPI bus operations.
    #[command(subcommand)]
    Spi(SpiCommand),
    /// Serial port operations.
    #[command(subcommand)]
    Serial(SerialCommand),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, format),
        Command::I2c(command) => i2c::run(command, format),
        Command::Spi(command) => spi::run(command, format),
        Command::Serial(command) => serial::run(command, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where the daemon is and how long to wait for it.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Daemon host name or address.
    pub host: String,
    /// Daemon port serving the resource.
    #[arg(long, env = "RASPIO_PORT")]
    pub port: u16,
    /// Reply timeout (e.g. 2s, 500ms).
    #[arg(long, env = "RASPIO_TIMEOUT")]
    pub timeout: Option<String>,
    /// TCP connect plus WebSocket upgrade timeout.
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
}

impl ConnectArgs {
    pub fn resolver(&self) -> FixedPort {
        FixedPort(self.port)
    }

    /// Session settings, using `default_timeout` unless `--timeout` was given.
    pub fn session_config(&self, default_timeout: Duration) -> CliResult<SessionConfig> {
        let timeout = match &self.timeout {
            Some(text) => parse_duration(text)?,
            None => default_timeout,
        };
        Ok(SessionConfig {
            timeout,
            connection: ConnectionConfig {
                connect_timeout: parse_duration(&self.connect_timeout)?,
                ..ConnectionConfig::default()
            },
            ..SessionConfig::default()
        })
    }
}

#[derive(Args, Debug)]
pub struct CallArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Service path on the daemon (e.g. i2c, spi, serial).
    #[arg(long)]
    pub path: String,
    /// Resource name passed to the endpoint resolver.
    #[arg(long, default_value = "")]
    pub resource: String,
    /// Open request as a JSON object with a "handle" key.
    #[arg(long)]
    pub open: String,
    /// Close request as a JSON object with a "handle" key.
    #[arg(long)]
    pub close: String,
    /// Request to issue after opening. Repeat to issue several in order.
    #[arg(long = "request", required = true)]
    pub requests: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum I2cCommand {
    /// Read bytes starting at a register.
    Read(I2cReadArgs),
    /// Write bytes starting at a register.
    Write(I2cWriteArgs),
}

#[derive(Args, Debug)]
pub struct I2cTarget {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Bus device on the daemon host.
    #[arg(long, default_value = "/dev/i2c-1")]
    pub bus: String,
    /// Slave address (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_int::<u16>)]
    pub addr: u16,
    /// Treat the slave address as ten bits wide.
    #[arg(long)]
    pub tenbit: bool,
    /// Use a combined ioctl transaction instead of plain read/write.
    #[arg(long)]
    pub ioctl: bool,
}

#[derive(Args, Debug)]
pub struct I2cReadArgs {
    #[command(flatten)]
    pub target: I2cTarget,
    /// Internal register address.
    #[arg(long, value_parser = parse_int::<u32>, default_value = "0")]
    pub reg: u32,
    /// Number of bytes to read.
    #[arg(long)]
    pub size: usize,
}

#[derive(Args, Debug)]
pub struct I2cWriteArgs {
    #[command(flatten)]
    pub target: I2cTarget,
    /// Internal register address.
    #[arg(long, value_parser = parse_int::<u32>, default_value = "0")]
    pub reg: u32,
    /// Bytes to write, as hex (e.g. 01ff).
    #[arg(long)]
    pub data: HexBytes,
}

#[derive(Subcommand, Debug)]
pub enum SpiCommand {
    /// Clock in bytes.
    Read(SpiReadArgs),
    /// Clock out bytes.
    Write(SpiWriteArgs),
    /// Write then read in one transaction.
    Xfer(SpiXferArgs),
}

#[derive(Args, Debug)]
pub struct SpiTarget {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// SPI device on the daemon host.
    #[arg(long, default_value = "/dev/spidev0.0")]
    pub device: String,
    /// Maximum clock in kHz.
    #[arg(long, default_value_t = 50)]
    pub speed_khz: u32,
    /// SPI mode, 0 through 3.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub mode: u8,
}

#[derive(Args, Debug)]
pub struct SpiReadArgs {
    #[command(flatten)]
    pub target: SpiTarget,
    #[arg(long)]
    pub size: usize,
}

#[derive(Args, Debug)]
pub struct SpiWriteArgs {
    #[command(flatten)]
    pub target: SpiTarget,
    /// Bytes to write, as hex.
    #[arg(long)]
    pub data: HexBytes,
}

#[derive(Args, Debug)]
pub struct SpiXferArgs {
    #[command(flatten)]
    pub target: SpiTarget,
    /// Bytes to write, as hex.
    #[arg(long)]
    pub data: HexBytes,
    /// Bytes to read back.
    #[arg(long)]
    pub read_size: usize,
    /// Hold chip select between blocks (xfer2).
    #[arg(long)]
    pub hold_cs: bool,
    /// Delay between blocks in microseconds.
    #[arg(long, default_value_t = 0)]
    pub delay_us: u32,
}

#[derive(Subcommand, Debug)]
pub enum SerialCommand {
    /// Read up to N bytes.
    Read(SerialReadArgs),
    /// Write bytes.
    Write(SerialWriteArgs),
}

#[derive(Args, Debug)]
pub struct SerialTarget {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Serial device on the daemon host.
    #[arg(long, default_value = "/dev/ttyUSB0")]
    pub device: String,
    #[arg(long, default_value_t = 115200)]
    pub baudrate: u32,
    /// Read timeout applied by the daemon. The reply timeout defaults to twice this.
    #[arg(long, default_value = "1s")]
    pub read_timeout: String,
}

#[derive(Args, Debug)]
pub struct SerialReadArgs {
    #[command(flatten)]
    pub target: SerialTarget,
    #[arg(long, default_value_t = 1)]
    pub size: usize,
}

#[derive(Args, Debug)]
pub struct SerialWriteArgs {
    #[command(flatten)]
    pub target: SerialTarget,
    /// Bytes to write, as hex.
    #[arg(long, conflicts_with = "text", required_unless_present = "text")]
    pub data: Option<HexBytes>,
    /// Text to write as UTF-8.
    #[arg(long)]
    pub text: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Bytes given on the command line as hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl FromStr for HexBytes {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let digits: String = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed)
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .collect();
        if !digits.is_ascii() {
            return Err(format!("invalid hex in '{input}'"));
        }
        if digits.len() % 2 != 0 {
            return Err(format!("odd number of hex digits in '{input}'"));
        }
        (0..digits.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&digits[i..i + 2], 16)
                    .map_err(|_| format!("invalid hex byte '{}'", &digits[i..i + 2]))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(HexBytes)
    }
}

/// Decimal or `0x`-prefixed hex integer.
pub fn parse_int<T: TryFrom<u64>>(input: &str) -> Result<T, String> {
    let input = input.trim();
    let value = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => input.parse(),
    }
    .map_err(|_| format!("invalid number: {input}"))?;
    T::try_from(value).map_err(|_| format!("{input} is out of range"))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}
