//! SIM808 CLI - Command-line interface
//!
//! Drives a SIM808 module over a serial port (or the built-in virtual
//! modem) for scripting and bench testing.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sim808_core::cli::{
    format_value, init_logging, print_exit_codes, print_payload, CliResult, ExitCodes,
    OutputFormat,
};
use sim808_core::core::http::{DEFAULT_SERVER_TIMEOUT_MS, DEFAULT_WRITE_TIMEOUT_MS};
use sim808_core::core::transport::list_ports;
use sim808_core::{
    AppConfig, DeviceTemplates, GnssStatus, HttpRequest, Modem, PowerMode,
    SerialTransport, Transport, VirtualModem,
};
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// SIM808 CLI
#[derive(Parser, Debug)]
#[command(
    name = "sim808-cli",
    version,
    about = "Drive a SIMCom SIM808/SIM868 module: status, power, GPRS, HTTP and GNSS",
    long_about = None
)]
struct Cli {
    /// Serial port name (e.g., COM3, /dev/ttyUSB0)
    #[arg(short, long, env = "SIM808_PORT")]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Config file (default: platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Talk to a virtual SIM808 instead of a serial port
    #[arg(long)]
    simulate: bool,

    /// TOML rule script for the virtual modem
    #[arg(long, requires = "simulate")]
    script: Option<PathBuf>,

    /// Command timeout (ms), overrides the config
    #[arg(long)]
    timeout: Option<u64>,

    /// More log output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    ListPorts {
        /// Show detailed info
        #[arg(short, long)]
        detailed: bool,
    },

    /// Readiness, signal, registration, power mode and identification
    Status,

    /// Show or change the power mode (minimum, normal, sleep)
    Power {
        /// Target mode; omit to query
        mode: Option<PowerMode>,
    },

    /// GPRS bearer control
    Gprs {
        #[command(subcommand)]
        action: GprsAction,
    },

    /// HTTP GET; the body goes to stdout
    Get {
        /// Target URL
        url: String,

        /// Extra header block
        #[arg(long)]
        header: Option<String>,

        /// Server answer budget (ms)
        #[arg(long, default_value_t = DEFAULT_SERVER_TIMEOUT_MS)]
        server_timeout: u64,
    },

    /// HTTP POST; body from --data, --file or stdin
    Post {
        /// Target URL
        url: String,

        /// Content type
        #[arg(short = 't', long, default_value = "application/json")]
        content_type: String,

        /// Inline body
        #[arg(short, long, conflicts_with = "file")]
        data: Option<String>,

        /// Body file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Extra header block
        #[arg(long)]
        header: Option<String>,

        /// Time the module waits for the body (ms)
        #[arg(long, default_value_t = DEFAULT_WRITE_TIMEOUT_MS)]
        write_timeout: u64,

        /// Server answer budget (ms)
        #[arg(long, default_value_t = DEFAULT_SERVER_TIMEOUT_MS)]
        server_timeout: u64,
    },

    /// GNSS engine control and fixes
    Gnss {
        #[command(subcommand)]
        action: GnssAction,
    },

    /// Soft reset through minimum power mode
    Reset,

    /// Print the exit code table
    ExitCodes,
}

#[derive(Subcommand, Debug)]
enum GprsAction {
    /// Configure the bearer for an APN
    Setup {
        /// Operator APN
        apn: String,
    },
    /// Open the bearer
    Connect,
    /// Close the bearer
    Disconnect,
}

#[derive(Subcommand, Debug)]
enum GnssAction {
    /// Power the engine on
    On,
    /// Power the engine off
    Off,
    /// Engine power state
    Status,
    /// Enable unsolicited reports
    Attach {
        /// Report every N fixes
        #[arg(default_value_t = 1)]
        interval: u8,

        /// Print this many reports before exiting
        #[arg(long, default_value_t = 0)]
        watch: u32,
    },
    /// Disable unsolicited reports
    Detach,
    /// Current navigation data
    Info,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(result) => return report(&cli, &result),
    };

    let _guard = match init_logging(&config.logging, cli.verbose, cli.quiet) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(ExitCodes::INTERNAL_ERROR);
        }
    };
    tracing::debug!("{} v{}", sim808_core::NAME, sim808_core::VERSION);

    let result = match run(&cli, config) {
        Ok(result) => result,
        Err(e) => CliResult::error(ExitCodes::ERROR, format!("{:#}", e)),
    };
    report(&cli, &result)
}

fn report(cli: &Cli, result: &CliResult) -> ExitCode {
    match (result, result.message()) {
        (CliResult::Error(_, msg), _) => eprintln!("Error: {}", msg),
        (CliResult::Success(_), Some(msg)) if !cli.quiet => eprintln!("{}", msg),
        _ => {}
    }
    result.to_exit_code()
}

fn load_config(cli: &Cli) -> Result<AppConfig, CliResult> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(port) = &cli.port {
        config.serial.port.clone_from(port);
    }
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(timeout) = cli.timeout {
        config.modem.default_timeout_ms = timeout;
    }
    Ok(config)
}

fn open_transport(cli: &Cli, config: &AppConfig) -> Result<Box<dyn Transport>, CliResult> {
    if cli.simulate {
        let device = match &cli.script {
            Some(path) => std::fs::read_to_string(path)
                .map_err(|e| format!("reading {}: {}", path.display(), e))
                .and_then(|source| {
                    VirtualModem::from_script(&source)
                        .map_err(|e| format!("parsing {}: {}", path.display(), e))
                })
                .map_err(|msg| CliResult::error(ExitCodes::CONFIG_ERROR, msg))?,
            None => DeviceTemplates::sim808(),
        };
        tracing::info!("using {}", device.connection_info());
        return Ok(Box::new(device));
    }
    let serial = SerialTransport::open(config.serial.clone())?;
    Ok(Box::new(serial))
}

fn run(cli: &Cli, config: AppConfig) -> anyhow::Result<CliResult> {
    match &cli.command {
        Commands::ListPorts { detailed } => return list(cli, *detailed),
        Commands::ExitCodes => {
            print_exit_codes();
            return Ok(CliResult::success());
        }
        _ => {}
    }

    let transport = match open_transport(cli, &config) {
        Ok(transport) => transport,
        Err(result) => return Ok(result),
    };
    let mut modem = Modem::with_config(transport, config.modem);

    let result = match &cli.command {
        Commands::Status => status(cli, &mut modem),
        Commands::Power { mode } => power(cli, &mut modem, *mode),
        Commands::Gprs { action } => gprs(&mut modem, action),
        Commands::Get {
            url,
            header,
            server_timeout,
        } => {
            let mut request = HttpRequest::get(url).server_timeout_ms(*server_timeout);
            request.headers.clone_from(header);
            http(cli, &mut modem, &request)
        }
        Commands::Post {
            url,
            content_type,
            data,
            file,
            header,
            write_timeout,
            server_timeout,
        } => {
            let body = read_body(data.as_deref(), file.as_ref())?;
            let mut request = HttpRequest::post(url, content_type, body)
                .write_timeout_ms(*write_timeout)
                .server_timeout_ms(*server_timeout);
            request.headers.clone_from(header);
            http(cli, &mut modem, &request)
        }
        Commands::Gnss { action } => gnss(cli, &mut modem, action),
        Commands::Reset => {
            if modem.soft_reset() {
                CliResult::success_with_message("Module reset")
            } else {
                CliResult::protocol("Soft reset failed")
            }
        }
        Commands::ListPorts { .. } | Commands::ExitCodes => CliResult::success(),
    };
    Ok(result)
}

fn list(cli: &Cli, detailed: bool) -> anyhow::Result<CliResult> {
    let ports = match list_ports() {
        Ok(ports) => ports,
        Err(e) => return Ok(e.into()),
    };

    if ports.is_empty() {
        if !cli.quiet {
            println!("No serial ports found.");
        }
        return Ok(CliResult::success());
    }

    match cli.format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = ports
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "name": p.port_name,
                        "type": format!("{:?}", p.port_type)
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            if detailed {
                println!("Available Serial Ports:");
                println!("{:-<60}", "");
                for port in &ports {
                    println!("  {} [{:?}]", port.port_name, port.port_type);
                }
            } else {
                for port in &ports {
                    println!("{}", port.port_name);
                }
            }
        }
    }
    Ok(CliResult::success())
}

fn status<T: Transport>(cli: &Cli, modem: &mut Modem<T>) -> CliResult {
    if !modem.is_ready() {
        return CliResult::error(ExitCodes::DEVICE_NOT_READY, "Module not answering AT");
    }
    let signal = modem.get_signal();
    let registration = modem.get_registration_status();
    let power = modem.get_power_mode();
    let version = modem.get_version();
    let firmware = modem.get_firmware();
    let ccid = modem.get_sim_card_number();
    let link = modem.transport().stats();

    let value = serde_json::json!({
        "ready": true,
        "signal": signal,
        "registration": registration,
        "power_mode": power,
        "version": version,
        "firmware": firmware,
        "ccid": ccid,
        "link": link,
    });
    let text = format!(
        "Signal:       {}/31\nRegistration: {}\nPower mode:   {}\nVersion:      {}\nFirmware:     {}\nSIM CCID:     {}\nLink:         {} sent, {} received, {} purged",
        signal,
        registration,
        power,
        version.as_deref().unwrap_or("-"),
        firmware.as_deref().unwrap_or("-"),
        ccid.as_deref().unwrap_or("-"),
        link.bytes_sent,
        link.bytes_received,
        link.bytes_purged,
    );
    println!("{}", format_value(&value, &text, cli.format));
    CliResult::success()
}

fn power<T: Transport>(cli: &Cli, modem: &mut Modem<T>, mode: Option<PowerMode>) -> CliResult {
    match mode {
        None => {
            let current = modem.get_power_mode();
            let value = serde_json::json!({ "power_mode": current });
            println!("{}", format_value(&value, &current.to_string(), cli.format));
            if current.is_known() {
                CliResult::success()
            } else {
                CliResult::protocol(format!("Power mode is {}", current))
            }
        }
        Some(target) => {
            if modem.set_power_mode(target) {
                CliResult::success_with_message(format!("Power mode set to {}", target))
            } else {
                CliResult::protocol(format!("Could not switch to {}", target))
            }
        }
    }
}

fn gprs<T: Transport>(modem: &mut Modem<T>, action: &GprsAction) -> CliResult {
    let (ok, what) = match action {
        GprsAction::Setup { apn } => (modem.setup_gprs(apn), "GPRS bearer configured"),
        GprsAction::Connect => (modem.connect_gprs(), "GPRS connected"),
        GprsAction::Disconnect => (modem.disconnect_gprs(), "GPRS disconnected"),
    };
    if ok {
        CliResult::success_with_message(what)
    } else {
        CliResult::protocol(format!("Failed: {:?}", action))
    }
}

fn read_body(data: Option<&str>, file: Option<&PathBuf>) -> anyhow::Result<Vec<u8>> {
    if let Some(data) = data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = file {
        return std::fs::read(path).with_context(|| format!("reading {}", path.display()));
    }
    let mut body = Vec::new();
    io::stdin()
        .read_to_end(&mut body)
        .context("reading body from stdin")?;
    Ok(body)
}

fn http<T: Transport>(cli: &Cli, modem: &mut Modem<T>, request: &HttpRequest) -> CliResult {
    let result = modem.http(request);
    let success = match &result {
        Ok(status) => request.method.is_success(*status),
        Err(_) => false,
    };
    if success && !modem.received().is_empty() {
        if modem.payload().is_truncated() {
            tracing::warn!(
                "body truncated: {} of {} bytes kept",
                modem.payload().len(),
                modem.payload().declared()
            );
        }
        if let Err(e) = print_payload(modem.received(), cli.format) {
            return CliResult::error(ExitCodes::ERROR, e.to_string());
        }
    }
    CliResult::from_http(&result, success)
}

fn gnss<T: Transport>(cli: &Cli, modem: &mut Modem<T>, action: &GnssAction) -> CliResult {
    match action {
        GnssAction::On => bool_result(
            modem.power_on_gnss(),
            "GNSS powered on",
            "GNSS power on failed",
        ),
        GnssAction::Off => bool_result(
            modem.power_off_gnss(),
            "GNSS powered off",
            "GNSS power off failed",
        ),
        GnssAction::Status => {
            let status = modem.get_gnss_power_status();
            let value = serde_json::json!({ "gnss": status });
            println!("{}", format_value(&value, &status.to_string(), cli.format));
            if status == GnssStatus::Error {
                CliResult::protocol("GNSS power query failed")
            } else {
                CliResult::success()
            }
        }
        GnssAction::Attach { interval, watch } => {
            if !modem.attach_gnss(*interval) {
                return CliResult::protocol("GNSS attach failed (is the engine on?)");
            }
            let wait = Duration::from_secs(u64::from(*interval).max(1) * 5);
            for _ in 0..*watch {
                let report = modem.next_gnss_urc(wait);
                let text = match &report.info {
                    Some(info) => {
                        format!("{} {:.6},{:.6}", info.utc, info.latitude, info.longitude)
                    }
                    None => report.status.to_string(),
                };
                println!("{}", format_value(&report, &text, cli.format));
            }
            CliResult::success_with_message("GNSS reports enabled")
        }
        GnssAction::Detach => bool_result(
            modem.detach_gnss(),
            "GNSS reports disabled",
            "GNSS detach failed",
        ),
        GnssAction::Info => {
            let report = modem.get_gnss_info();
            let text = match &report.info {
                Some(info) => format!(
                    "Fix:        {}\nUTC:        {}\nPosition:   {:.6}, {:.6}\nAltitude:   {:.1} m\nSpeed:      {:.2} km/h\nHeading:    {:.1}\nDOP:        {:.1}/{:.1}/{:.1}\nSatellites: {} used, {} in view",
                    info.fix_mode,
                    info.timestamp()
                        .map_or_else(|| info.utc.clone(), |ts| ts.to_string()),
                    info.latitude,
                    info.longitude,
                    info.altitude,
                    info.speed,
                    info.heading,
                    info.hdop,
                    info.pdop,
                    info.vdop,
                    info.satellites_used,
                    info.satellites_in_view,
                ),
                None => report.status.to_string(),
            };
            println!("{}", format_value(&report, &text, cli.format));
            match report.status {
                GnssStatus::Fix => CliResult::success(),
                GnssStatus::Error => CliResult::protocol("GNSS info query failed"),
                _ => CliResult::error(ExitCodes::NO_FIX, format!("GNSS {}", report.status)),
            }
        }
    }
}

fn bool_result(ok: bool, success: &str, failure: &str) -> CliResult {
    if ok {
        CliResult::success_with_message(success)
    } else {
        CliResult::protocol(failure)
    }
}
