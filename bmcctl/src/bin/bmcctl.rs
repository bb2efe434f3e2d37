//! Command-line interface for bmcctl.
//!
//! Talks to a BMC through ipmitool: reads power supplies, selects the next
//! boot device and drives chassis power. The `decode` subcommand works
//! offline on register values captured elsewhere.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use bmcctl::config::Config;
use bmcctl::mgmt_protocol::boot::BootDevice;
use bmcctl::mgmt_protocol::ChassisControl;
use bmcctl::peripheral::pmbus::{self, LegacyLinear, Linear11};
use bmcctl::tracing::{self, prelude::*};
use bmcctl::transport::IpmitoolTransport;
use bmcctl::Client;

#[derive(Parser)]
#[command(name = "bmcctl")]
#[command(version)]
#[command(about = "Power supply telemetry and boot control through a BMC")]
#[command(long_about = "Power supply telemetry and boot control through a BMC

EXAMPLES:
    bmcctl --host 10.0.0.42 --user ADMIN psu 0x78
    bmcctl --host 10.0.0.42 psu 0xb0 --bus 3
    bmcctl --host 10.0.0.42 boot pxe
    bmcctl --host 10.0.0.42 chassis power-cycle
    bmcctl decode linear 00f3
    bmcctl decode vout 0018 --mode 0x17

ENVIRONMENT VARIABLES:
    BMCCTL_CONFIG          Configuration file
    BMCCTL_HOST            BMC host
    BMCCTL_USER            BMC user name
    BMCCTL_PASSWORD        BMC password
    RUST_LOG=trace         Log every request and response (same as -vvv)")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// BMC host name or address
    #[arg(long, global = true)]
    host: Option<String>,

    /// BMC user name
    #[arg(long, global = true)]
    user: Option<String>,

    /// BMC password
    #[arg(long, global = true)]
    password: Option<String>,

    /// ipmitool interface (lan, lanplus, open)
    #[arg(long, global = true)]
    interface: Option<String>,

    /// RMCP port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// More log output on stderr (-v info, -vv debug, -vvv frames)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read one power supply and print it as JSON
    Psu {
        /// PMBus address of the supply, e.g. 0x78
        #[arg(value_parser = parse_u8)]
        address: u8,

        /// BMC bus the supplies are on
        #[arg(long, value_parser = parse_u8)]
        bus: Option<u8>,
    },

    /// Set the next boot device
    Boot {
        /// none, pxe, disk, safe, diag, cdrom, bios, remote-floppy,
        /// remote-cdrom, remote-primary-media, remote-disk or floppy
        device: BootDevice,
    },

    /// Chassis power control
    Chassis {
        /// power-down, power-up, power-cycle, hard-reset,
        /// pulse-diagnostic-interrupt or soft-shutdown
        action: ChassisControl,
    },

    /// Decode a register value without touching the BMC
    Decode {
        #[arg(value_enum)]
        format: DecodeFormat,

        /// Two bytes in wire order (low byte first), as hex, e.g. 00f3
        word: String,

        /// VOUT_MODE byte for the vout format
        #[arg(long, value_parser = parse_u8, default_value = "0")]
        mode: u8,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DecodeFormat {
    /// LINEAR11
    Linear,
    /// Legacy fan speed scale
    Legacy,
    /// READ_VOUT with VOUT_MODE
    Vout,
}

fn parse_u8(s: &str) -> std::result::Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("{}: {}", s, e))
}

fn parse_word(s: &str) -> Result<[u8; 2]> {
    let bytes = hex::decode(s).with_context(|| format!("{} is not hex", s))?;
    <[u8; 2]>::try_from(bytes.as_slice())
        .map_err(|_| anyhow!("expected two bytes, got {}", bytes.len()))
}

fn decode(format: DecodeFormat, word: &str, mode: u8) -> Result<()> {
    let bytes = parse_word(word)?;
    let value = match format {
        DecodeFormat::Linear => Linear11::from_bytes(bytes),
        DecodeFormat::Legacy => LegacyLinear::from_bytes(bytes),
        DecodeFormat::Vout => pmbus::decode_vout(bytes, mode),
    };
    println!("{}", value);
    Ok(())
}

fn connect(cli: &Cli) -> Result<(Config, Client<IpmitoolTransport>)> {
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(host) = &cli.host {
        config.bmc.host = Some(host.clone());
    }
    if let Some(user) = &cli.user {
        config.bmc.username = Some(user.clone());
    }
    if let Some(password) = &cli.password {
        config.bmc.password = Some(password.clone());
    }
    if let Some(interface) = &cli.interface {
        config.bmc.interface = interface.clone();
    }
    if let Some(port) = cli.port {
        config.bmc.port = Some(port);
    }
    debug!(host = ?config.bmc.host, interface = %config.bmc.interface, "Connecting");

    let transport = IpmitoolTransport::new(config.bmc.clone())?;
    let client = Client::new(transport).with_pmbus_bus(config.pmbus.bus);
    Ok((config, client))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing::init_journald_or_stderr(tracing::level_for(cli.verbose));

    match &cli.command {
        Commands::Decode { format, word, mode } => decode(*format, word, *mode),
        Commands::Psu { address, bus } => {
            let (config, client) = connect(&cli)?;
            let mut client = client.with_pmbus_bus(bus.unwrap_or(config.pmbus.bus));
            let reading = client
                .power_supply(*address)
                .with_context(|| format!("reading power supply {:#04x}", address))?;
            println!("{}", serde_json::to_string_pretty(&reading)?);
            Ok(())
        }
        Commands::Boot { device } => {
            let (_, mut client) = connect(&cli)?;
            client
                .set_boot_device(*device)
                .with_context(|| format!("setting boot device to {}", device))?;
            info!(%device, "Next boot device set");
            Ok(())
        }
        Commands::Chassis { action } => {
            let (_, mut client) = connect(&cli)?;
            client
                .chassis_control(*action)
                .with_context(|| format!("chassis {}", action))?;
            Ok(())
        }
    }
}
