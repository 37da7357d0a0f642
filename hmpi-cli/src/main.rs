//! hmpi CLI - heavy metal pollution indices and hotspot risk for water samples

// Global invariants enforced:
// - Deterministic output ordering
// - Identical input yields byte-for-byte identical output
// - Logs go to stderr; results go to stdout

use anyhow::Context;
use clap::{Parser, Subcommand};
use hmpi_core::alerts::{parse_recipients, AlertConfig, Channel, LogNotifier};
use hmpi_core::report::{
    render_dispatch_text, render_predictions_text, render_samples_text, render_summary_text,
};
use hmpi_core::{config, upload_and_calculate_with, ResolvedConfig, SourceFormat, StoredSample, Store};
use hmpi_core::{compute_summary, predict_hotspots, render_json};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_ALERT_MESSAGE: &str = "Water quality alert: pollution thresholds exceeded";

#[derive(Parser)]
#[command(name = "hmpi")]
#[command(about = "Heavy metal pollution indices and hotspot risk for water-quality samples")]
#[command(version = env!("HMPI_VERSION"))]
struct Cli {
    /// Path to config file (default: auto-discover)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides config file)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute HPI and Cd for a CSV/JSON file and store the results
    Upload {
        /// Path to a .csv or .json file
        file: PathBuf,

        /// Input format (default: from file extension)
        #[arg(long)]
        input_format: Option<InputFormat>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Predict hotspot risk for a CSV/JSON file (nothing is stored)
    Predict {
        /// Path to a .csv or .json file
        file: PathBuf,

        /// Input format (default: from file extension)
        #[arg(long)]
        input_format: Option<InputFormat>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// List every stored sample with its indices
    Datasets {
        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Summarize stored indices
    Summary {
        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Manage and send threshold alerts
    Alerts {
        #[command(subcommand)]
        action: AlertsAction,
    },
    /// Validate or show the configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum AlertsAction {
    /// Show the active alert configuration
    Show {
        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Update the stored alert configuration
    Set {
        #[arg(long)]
        hpi_threshold: Option<f64>,

        #[arg(long)]
        cd_threshold: Option<f64>,

        /// Comma-separated email recipients (replaces the current list)
        #[arg(long)]
        email: Option<String>,

        /// Comma-separated SMS recipients (replaces the current list)
        #[arg(long)]
        sms: Option<String>,

        /// Region policies as a JSON object
        #[arg(long)]
        policy: Option<String>,
    },
    /// Send an alert covering every stored hotspot
    Send {
        #[arg(long)]
        channel: ChannelArg,

        #[arg(long, default_value = DEFAULT_ALERT_MESSAGE)]
        message: String,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum InputFormat {
    Csv,
    Json,
}

impl From<InputFormat> for SourceFormat {
    fn from(f: InputFormat) -> Self {
        match f {
            InputFormat::Csv => SourceFormat::Csv,
            InputFormat::Json => SourceFormat::Json,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ChannelArg {
    Email,
    Sms,
}

impl From<ChannelArg> for Channel {
    fn from(c: ChannelArg) -> Self {
        match c {
            ChannelArg::Email => Channel::Email,
            ChannelArg::Sms => Channel::Sms,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let project_root = std::env::current_dir()?;

    match cli.command {
        Commands::Upload {
            file,
            input_format,
            format,
        } => {
            let resolved = load_config(&project_root, cli.config.as_deref())?;
            let mut store = open_store(&resolved, cli.database.as_deref())?;
            let (bytes, source) = read_input(&file, input_format)?;
            let stored = upload_with_progress(&mut store, &bytes, source)?;
            print_samples(&stored, format);
        }
        Commands::Predict {
            file,
            input_format,
            format,
        } => {
            let (bytes, source) = read_input(&file, input_format)?;
            let predictions = predict_hotspots(&bytes, source)?;
            match format {
                OutputFormat::Json => println!("{}", render_json(&predictions)),
                OutputFormat::Text => print!("{}", render_predictions_text(&predictions)),
            }
        }
        Commands::Datasets { format } => {
            let resolved = load_config(&project_root, cli.config.as_deref())?;
            let store = open_store(&resolved, cli.database.as_deref())?;
            print_samples(&store.list_samples()?, format);
        }
        Commands::Summary { format } => {
            let resolved = load_config(&project_root, cli.config.as_deref())?;
            let store = open_store(&resolved, cli.database.as_deref())?;
            let summary = compute_summary(&store.list_samples()?);
            match format {
                OutputFormat::Json => println!("{}", render_json(&summary)),
                OutputFormat::Text => print!("{}", render_summary_text(&summary)),
            }
        }
        Commands::Alerts { action } => {
            let resolved = load_config(&project_root, cli.config.as_deref())?;
            let store = open_store(&resolved, cli.database.as_deref())?;
            handle_alerts(&store, &resolved.alert_defaults, action)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let path = path.or(cli.config);
                match config::load_and_resolve(&project_root, path.as_deref()) {
                    Ok(config) => {
                        if let Some(ref p) = config.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path } => {
                let path = path.or(cli.config);
                let resolved = config::load_and_resolve(&project_root, path.as_deref())
                    .context("failed to load configuration")?;
                let database = cli.database.unwrap_or_else(|| resolved.database_path.clone());

                println!("Configuration:");
                if let Some(ref p) = resolved.config_path {
                    println!("  Source: {}", p.display());
                } else {
                    println!("  Source: defaults (no config file found)");
                }
                println!();
                println!("Database: {}", database.display());
                println!();
                print_alert_config(&resolved.alert_defaults);
            }
        },
    }

    Ok(())
}

/// Logs go to stderr; RUST_LOG overrides the -v level
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(project_root: &Path, config_path: Option<&Path>) -> anyhow::Result<ResolvedConfig> {
    let resolved = config::load_and_resolve(project_root, config_path)
        .context("failed to load configuration")?;
    if let Some(path) = &resolved.config_path {
        tracing::info!("using config: {}", path.display());
    }
    Ok(resolved)
}

fn open_store(resolved: &ResolvedConfig, database: Option<&Path>) -> anyhow::Result<Store> {
    let path = database.unwrap_or(resolved.database_path.as_path());
    Store::open(path)
}

fn read_input(file: &Path, input_format: Option<InputFormat>) -> anyhow::Result<(Vec<u8>, SourceFormat)> {
    let format = match input_format {
        Some(f) => f.into(),
        None => SourceFormat::from_path(file)?,
    };
    let bytes =
        std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    Ok((bytes, format))
}

/// Upload with a progress bar over the parallel assessment
fn upload_with_progress(
    store: &mut Store,
    bytes: &[u8],
    format: SourceFormat,
) -> anyhow::Result<Vec<StoredSample>> {
    let style = ProgressStyle::with_template("{spinner} assessing [{bar:40}] {pos}/{len} samples")?;
    upload_and_calculate_with(store, bytes, format, |samples| {
        let pb = ProgressBar::new(samples.len() as u64).with_style(style);
        let assessed: Vec<_> = samples
            .par_iter()
            .progress_with(pb.clone())
            .map(hmpi_core::assess)
            .collect();
        pb.finish_and_clear();
        assessed
    })
}

fn print_samples(samples: &[StoredSample], format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", render_json(samples)),
        OutputFormat::Text => print!("{}", render_samples_text(samples)),
    }
}

fn handle_alerts(store: &Store, defaults: &AlertConfig, action: AlertsAction) -> anyhow::Result<()> {
    match action {
        AlertsAction::Show { format } => {
            let config = store.alert_config(defaults)?;
            match format {
                OutputFormat::Json => println!("{}", render_json(&config)),
                OutputFormat::Text => print_alert_config(&config),
            }
        }
        AlertsAction::Set {
            hpi_threshold,
            cd_threshold,
            email,
            sms,
            policy,
        } => {
            let mut config = store.alert_config(defaults)?;
            if let Some(v) = hpi_threshold {
                config.hpi_threshold = v;
            }
            if let Some(v) = cd_threshold {
                config.cd_threshold = v;
            }
            if let Some(list) = email {
                config.email_recipients = parse_recipients(&list);
            }
            if let Some(list) = sms {
                config.sms_recipients = parse_recipients(&list);
            }
            if let Some(json) = policy {
                config.policy_json =
                    serde_json::from_str(&json).context("--policy is not valid JSON")?;
            }
            store.save_alert_config(&config)?;
            print_alert_config(&config);
        }
        AlertsAction::Send {
            channel,
            message,
            format,
        } => {
            let config = store.alert_config(defaults)?;
            let samples = store.list_samples()?;
            let result = hmpi_core::dispatch(&config, channel.into(), &message, &samples, &LogNotifier)?;
            match format {
                OutputFormat::Json => println!("{}", render_json(&result)),
                OutputFormat::Text => print!("{}", render_dispatch_text(&result)),
            }
        }
    }
    Ok(())
}

fn print_alert_config(config: &AlertConfig) {
    let list = |items: &[String]| {
        if items.is_empty() {
            "none".to_string()
        } else {
            items.join(", ")
        }
    };
    println!("Alerts:");
    println!("  hpi_threshold: {}", config.hpi_threshold);
    println!("  cd_threshold: {}", config.cd_threshold);
    println!("  email_recipients: {}", list(&config.email_recipients));
    println!("  sms_recipients: {}", list(&config.sms_recipients));
    println!("  policy: {}", config.policy_json);
}
