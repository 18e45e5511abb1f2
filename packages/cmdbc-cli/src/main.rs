//! cmdbc CLI - peripheral inventory and change audit agent
//!
//! This binary reads device snapshots produced by the USB enumerator and can:
//! - Audit them for changes against a local or server-side baseline
//! - Check them in to, or out of, the CMDB server
//! - Request serial numbers for devices that lack one
//! - Look up registered vendor and product names

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cmdbc_core::audit::ChangeLog;
use cmdbc_core::config::{self, AgentConfig};
use cmdbc_core::{
    AuditMode, AuditOutcome, Auditor, ChangeRecord, DeviceIdentity, DeviceSnapshot, LocalStore,
    Session, SyncClient,
};

#[derive(Parser)]
#[command(name = "cmdbc")]
#[command(author = "Stratiform LLC")]
#[command(version)]
#[command(about = "Peripheral inventory and change audit agent")]
#[command(long_about = "
cmdbc tracks the state of attached USB peripherals. Each device snapshot is
compared with the last saved baseline, kept either in a local state directory
or on the CMDB server, and every changed property is written to the change log.

Quick start:
  1. Record a baseline:  cmdbc checkin reader.json
  2. Audit for changes:  cmdbc audit reader.json
  3. Use the server:     cmdbc audit --mode remote reader.json
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Config file (default: ~/.config/cmdbc/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
pub enum Mode {
    /// Baselines in the local state directory
    Local,
    /// Baselines on the CMDB server
    Remote,
}

impl From<Mode> for AuditMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Local => AuditMode::Local,
            Mode::Remote => AuditMode::Remote,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare device snapshots with their baselines and record changes
    Audit {
        /// Where baselines are kept
        #[arg(short, long, value_enum, default_value = "local")]
        mode: Mode,

        /// Device snapshot files (JSON)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Save device snapshots as the new baselines without comparing
    Checkin {
        #[arg(short, long, value_enum, default_value = "local")]
        mode: Mode,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the stored baseline for a device
    Checkout {
        #[arg(short, long, value_enum, default_value = "local")]
        mode: Mode,

        /// Host the device is attached to (default: configured host name)
        #[arg(long)]
        host: Option<String>,

        vendor_id: String,
        product_id: String,
        serial_num: String,
    },

    /// Show or request a device serial number
    Serial {
        /// Request a serial number from the server and check the device in
        #[arg(long)]
        fetch: bool,

        /// Replace an existing serial number
        #[arg(long, requires = "fetch")]
        force: bool,

        /// Device snapshot file, rewritten with the new serial number
        file: PathBuf,
    },

    /// Look up registered vendor and product names
    Lookup {
        vendor_id: String,
        product_id: Option<String>,
    },

    /// Delete the local baseline for a device
    Forget {
        vendor_id: String,
        product_id: String,
        serial_num: String,
    },

    /// Show configuration paths and settings
    Config,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cmdbc={},cmdbc_core={}", log_level, log_level).into()),
        )
        .with_target(false)
        .init();

    let config = config::load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Audit { mode, files } => cmd_audit(&cli, &config, (*mode).into(), files).await,
        Commands::Checkin { mode, files } => {
            cmd_checkin(&cli, &config, (*mode).into(), files).await
        }
        Commands::Checkout {
            mode,
            host,
            vendor_id,
            product_id,
            serial_num,
        } => {
            let identity = DeviceIdentity::new(vendor_id, product_id, serial_num);
            let host = host.as_deref().unwrap_or(&config.api.host_name);
            cmd_checkout(&cli, &config, (*mode).into(), host, &identity).await
        }
        Commands::Serial { fetch, force, file } => {
            cmd_serial(&cli, &config, *fetch, *force, file).await
        }
        Commands::Lookup {
            vendor_id,
            product_id,
        } => cmd_lookup(&cli, &config, vendor_id, product_id.as_deref()).await,
        Commands::Forget {
            vendor_id,
            product_id,
            serial_num,
        } => {
            let identity = DeviceIdentity::new(vendor_id, product_id, serial_num);
            cmd_forget(&cli, &config, &identity)
        }
        Commands::Config => cmd_config(&cli, &config),
    }
}

fn sync_client(config: &AgentConfig) -> Result<SyncClient> {
    let session = Arc::new(Session::new(&config.api.client_id)?);
    Ok(SyncClient::new(config.api.clone(), session))
}

fn auditor(config: &AgentConfig) -> Result<Auditor> {
    Ok(Auditor::new(
        LocalStore::new(&config.state_dir),
        Some(sync_client(config)?),
        ChangeLog::new(&config.change_log),
    ))
}

fn read_snapshot(path: &Path) -> Result<DeviceSnapshot> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    DeviceSnapshot::restore(&bytes).with_context(|| format!("Failed to parse {:?}", path))
}

fn exit_code(failed: usize) -> ExitCode {
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// What happened to one snapshot file.
#[derive(Debug)]
pub struct DeviceReport {
    pub file: PathBuf,
    /// `{VID}-{PID}-{SN}` when the file could be read
    pub device: Option<String>,
    pub status: DeviceStatus,
}

#[derive(Debug, PartialEq)]
pub enum DeviceStatus {
    Skipped,
    Unchanged,
    Changed(Vec<ChangeRecord>),
    /// First audit of the device, nothing to compare against
    NoPreviousState,
    CheckedIn,
    Failed(String),
}

impl DeviceStatus {
    fn label(&self) -> &'static str {
        match self {
            DeviceStatus::Skipped => "skipped",
            DeviceStatus::Unchanged => "unchanged",
            DeviceStatus::Changed(_) => "changed",
            DeviceStatus::NoPreviousState => "no_previous_state",
            DeviceStatus::CheckedIn => "checked_in",
            DeviceStatus::Failed(_) => "failed",
        }
    }
}

fn failures(reports: &[DeviceReport]) -> usize {
    reports
        .iter()
        .filter(|r| matches!(r.status, DeviceStatus::Failed(_)))
        .count()
}

/// Audit every file in turn. One device failing never stops the others.
async fn audit_files(auditor: &Auditor, mode: AuditMode, files: &[PathBuf]) -> Vec<DeviceReport> {
    let mut reports = Vec::with_capacity(files.len());

    for file in files {
        let mut snapshot = match read_snapshot(file) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!("{}: {:#}", file.display(), e);
                reports.push(DeviceReport {
                    file: file.clone(),
                    device: None,
                    status: DeviceStatus::Failed(format!("{:#}", e)),
                });
                continue;
            }
        };

        let status = match auditor.audit(&mut snapshot, mode).await {
            Ok(AuditOutcome::Skipped) => DeviceStatus::Skipped,
            Ok(AuditOutcome::Unchanged) => DeviceStatus::Unchanged,
            Ok(AuditOutcome::Changed(changes)) => DeviceStatus::Changed(changes),
            Err(e) if e.is_not_found() => DeviceStatus::NoPreviousState,
            Err(e) => DeviceStatus::Failed(e.to_string()),
        };
        reports.push(DeviceReport {
            file: file.clone(),
            device: Some(snapshot.identity().to_string()),
            status,
        });
    }

    reports
}

/// Check in every file in turn. One device failing never stops the others.
async fn checkin_files(auditor: &Auditor, mode: AuditMode, files: &[PathBuf]) -> Vec<DeviceReport> {
    let mut reports = Vec::with_capacity(files.len());

    for file in files {
        let report = match read_snapshot(file) {
            Ok(snapshot) => DeviceReport {
                file: file.clone(),
                device: Some(snapshot.identity().to_string()),
                status: match auditor.checkin(&snapshot, mode).await {
                    Ok(()) => DeviceStatus::CheckedIn,
                    Err(e) => DeviceStatus::Failed(e.to_string()),
                },
            },
            Err(e) => {
                tracing::error!("{}: {:#}", file.display(), e);
                DeviceReport {
                    file: file.clone(),
                    device: None,
                    status: DeviceStatus::Failed(format!("{:#}", e)),
                }
            }
        };
        reports.push(report);
    }

    reports
}

fn print_reports(format: OutputFormat, mode: AuditMode, reports: &[DeviceReport]) {
    match format {
        OutputFormat::Text => {
            for report in reports {
                let name = report
                    .device
                    .clone()
                    .unwrap_or_else(|| report.file.display().to_string());
                match &report.status {
                    DeviceStatus::Skipped => println!("{}: skipped, no serial number", name),
                    DeviceStatus::Unchanged => println!("{}: no changes", name),
                    DeviceStatus::Changed(changes) => {
                        println!("{}: {} change(s)", name, changes.len());
                        for change in changes {
                            println!("  {:14} {:?} -> {:?}", change.field, change.old, change.new);
                        }
                    }
                    DeviceStatus::NoPreviousState => println!("{}: no previous state", name),
                    DeviceStatus::CheckedIn => println!("{}: checked in", name),
                    DeviceStatus::Failed(error) => eprintln!("{}: failed: {}", name, error),
                }
            }
        }
        OutputFormat::Json => {
            let devices: Vec<_> = reports
                .iter()
                .map(|report| {
                    let mut entry = serde_json::json!({
                        "file": report.file,
                        "device": report.device,
                        "status": report.status.label(),
                    });
                    match &report.status {
                        DeviceStatus::Changed(changes) => entry["changes"] = serde_json::json!(changes),
                        DeviceStatus::Failed(error) => entry["error"] = serde_json::json!(error),
                        _ => {}
                    }
                    entry
                })
                .collect();
            println!("{}", serde_json::json!({ "mode": mode, "devices": devices }));
        }
    }
}

async fn cmd_audit(
    cli: &Cli,
    config: &AgentConfig,
    mode: AuditMode,
    files: &[PathBuf],
) -> Result<ExitCode> {
    let reports = audit_files(&auditor(config)?, mode, files).await;
    print_reports(cli.format, mode, &reports);
    Ok(exit_code(failures(&reports)))
}

async fn cmd_checkin(
    cli: &Cli,
    config: &AgentConfig,
    mode: AuditMode,
    files: &[PathBuf],
) -> Result<ExitCode> {
    let reports = checkin_files(&auditor(config)?, mode, files).await;
    print_reports(cli.format, mode, &reports);
    Ok(exit_code(failures(&reports)))
}

async fn cmd_checkout(
    cli: &Cli,
    config: &AgentConfig,
    mode: AuditMode,
    host: &str,
    identity: &DeviceIdentity,
) -> Result<ExitCode> {
    let snapshot = auditor(config)?
        .checkout(host, identity, mode)
        .await
        .with_context(|| format!("Failed to check out device {}", identity))?;

    match cli.format {
        OutputFormat::Text => println!("{}", snapshot.to_pretty_json()?),
        OutputFormat::Json => println!("{}", String::from_utf8_lossy(&snapshot.serialize()?)),
    }

    Ok(ExitCode::SUCCESS)
}

async fn cmd_serial(
    cli: &Cli,
    config: &AgentConfig,
    fetch: bool,
    force: bool,
    file: &Path,
) -> Result<ExitCode> {
    let mut snapshot = read_snapshot(file)?;

    if !fetch {
        match cli.format {
            OutputFormat::Text => {
                if snapshot.serial_num().is_empty() {
                    println!("{}: no serial number", file.display());
                } else {
                    println!("{}: {}", file.display(), snapshot.serial_num());
                }
            }
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({ "file": file, "serial_num": snapshot.serial_num() })
            ),
        }
        return Ok(ExitCode::SUCCESS);
    }

    if !snapshot.serial_num().is_empty() && !force {
        anyhow::bail!(
            "device {} already has serial number {:?}, use --force to replace it",
            snapshot.identity(),
            snapshot.serial_num()
        );
    }

    let client = sync_client(config)?;
    let serial = client
        .acquire_serial_number(&snapshot)
        .await
        .context("Failed to obtain a serial number")?;
    snapshot.set_serial_number(serial.clone());

    fs::write(file, snapshot.to_pretty_json()?)
        .with_context(|| format!("Failed to write {:?}", file))?;

    let auditor = Auditor::new(
        LocalStore::new(&config.state_dir),
        Some(client),
        ChangeLog::new(&config.change_log),
    );
    auditor.checkin(&snapshot, AuditMode::Remote).await?;

    match cli.format {
        OutputFormat::Text => println!("{}: serial number {} assigned", file.display(), serial),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "file": file,
                "device": snapshot.identity().to_string(),
                "serial_num": serial,
            })
        ),
    }

    Ok(ExitCode::SUCCESS)
}

async fn cmd_lookup(
    cli: &Cli,
    config: &AgentConfig,
    vendor_id: &str,
    product_id: Option<&str>,
) -> Result<ExitCode> {
    let client = sync_client(config)?;

    let vendor_name = client
        .vendor_name(vendor_id)
        .await
        .with_context(|| format!("Failed to look up vendor {}", vendor_id))?;
    let product_name = match product_id {
        Some(pid) => Some(
            client
                .product_name(vendor_id, pid)
                .await
                .with_context(|| format!("Failed to look up product {}:{}", vendor_id, pid))?,
        ),
        None => None,
    };

    match cli.format {
        OutputFormat::Text => {
            println!("Vendor:  {} ({})", vendor_name, vendor_id);
            if let (Some(name), Some(pid)) = (&product_name, product_id) {
                println!("Product: {} ({})", name, pid);
            }
        }
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "vendor_id": vendor_id,
                "vendor_name": vendor_name,
                "product_id": product_id,
                "product_name": product_name,
            })
        ),
    }

    Ok(ExitCode::SUCCESS)
}

fn cmd_forget(cli: &Cli, config: &AgentConfig, identity: &DeviceIdentity) -> Result<ExitCode> {
    let removed = LocalStore::new(&config.state_dir).remove(identity)?;

    match cli.format {
        OutputFormat::Text => {
            if removed {
                println!("Removed baseline for {}", identity);
            } else {
                println!("No baseline stored for {}", identity);
            }
        }
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "device": identity.to_string(), "removed": removed })
        ),
    }

    Ok(ExitCode::SUCCESS)
}

fn cmd_config(cli: &Cli, config: &AgentConfig) -> Result<ExitCode> {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(config::get_config_file_path_string);

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration");
            println!("=============");
            println!();
            println!("Config file:      {}", config_path);
            println!("CMDB server:      {} (from {})", config.api.server, config.source);
            println!("Host name:        {}", config.api.host_name);
            println!("Username:         {}", config.api.username);
            println!("Header timeout:   {:?}", config.api.header_timeout);
            println!("State directory:  {}", config.state_dir.display());
            println!("Change log:       {}", config.change_log.display());
            println!();
            println!("Environment variables:");
            println!("  {} - Override server URL", config::ENV_API_SERVER);
            println!("  {} - Override username", config::ENV_API_USERNAME);
            println!("  {} - Override password", config::ENV_API_PASSWORD);
            println!("  {} - Override host name", config::ENV_HOST_NAME);
            println!("  {} - Override state directory", config::ENV_STATE_DIR);
            println!();
            println!("Example config.toml:");
            println!();
            println!("{}", config::generate_example_config());
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "config_file": config_path,
                    "server": config.api.server,
                    "server_source": config.source.to_string(),
                    "host_name": config.api.host_name,
                    "username": config.api.username,
                    "header_timeout_secs": config.api.header_timeout.as_secs(),
                    "endpoints": config.api.endpoints,
                    "state_dir": config.state_dir,
                    "change_log": config.change_log,
                })
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}
