use std::env;
use std::path::Path;

use clap::Parser;
use tokio::signal;
use tokio::time::{Duration, interval};
use tracing::{Level, debug, error, info};

use veneer_log::{LogConfig, init_logging};
use veneer_model::SchemaValidated;

mod config;
use config::Config;

mod scenario;
use scenario::Facility;

const VERSION: &str = "0.1.0";

/// Get default config path based on executable location
fn default_config_path() -> String {
    env::current_exe()
        .ok()
        .and_then(|exe_path| {
            let stem = exe_path.file_stem()?;
            let parent = exe_path.parent()?;
            Some(parent.join(stem).with_extension("json"))
        })
        .and_then(|path| path.to_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "./veneer_host.json".to_string())
}

/// Veneer Host - drives the object model against a simulated engine
#[derive(Parser, Debug)]
#[command(name = "veneer_host")]
#[command(version = VERSION)]
#[command(about = "Runs a scripted facility session through the Veneer object model", long_about = None)]
struct Args {
    /// Path to configuration file (JSON); defaults apply when absent
    #[arg(short, long)]
    config: Option<String>,

    /// Enable logging to file (veneer_host.log in current directory)
    #[arg(long, env = "VENEER_LOG_FILE")]
    log_file: bool,

    /// Override the number of ticks to run (0 runs until Ctrl+C)
    #[arg(long)]
    ticks: Option<u64>,

    /// Print the configuration JSON schema and exit
    #[arg(long)]
    print_schema: bool,
}

fn load_config(args: &Args) -> Result<(Config, String), String> {
    let (path, explicit) = match &args.config {
        Some(path) => (path.clone(), true),
        None => (default_config_path(), false),
    };
    if !explicit && !Path::new(&path).exists() {
        return Ok((Config::default(), "<defaults>".to_string()));
    }
    Config::from_json_file(&path)
        .map(|config| (config, path.clone()))
        .map_err(|e| format!("Failed to load config from '{}': {}", path, e))
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    if args.print_schema {
        match Config::schema_json() {
            Ok(schema) => println!("{}", schema),
            Err(e) => {
                eprintln!("Failed to generate schema: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // We can't log errors yet, so we use eprintln! for early failures
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    if let Some(ticks) = args.ticks {
        config.ticks = ticks;
    }

    let log_level = config.level().unwrap_or_else(|| {
        eprintln!("Warning: Invalid log level '{}', using INFO", config.log_level);
        Level::INFO
    });

    let log_config = if args.log_file {
        match std::fs::File::create("veneer_host.log") {
            Ok(file) => LogConfig::new("veneer_host::").with_level(log_level).with_log_file(file),
            Err(e) => {
                eprintln!("Unable to create veneer_host.log: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        LogConfig::<std::fs::File>::new("veneer_host::").with_level(log_level)
    };

    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Veneer Host v{}", VERSION);
    info!("Configuration: {}", source);

    debug!("Settings:");
    debug!("  Session: {}", config.name);
    debug!("  Tick Rate: {} Hz", config.tick_rate);
    debug!("  Ticks: {}", config.ticks);
    debug!("  Tracked Families: {:?}", config.model.tracked());
    debug!("  Heal Stale Entries: {}", config.model.heal_stale_entries);
    debug!("  Log Level: {}", config.log_level);

    let mut facility = match Facility::new(&config) {
        Ok(facility) => facility,
        Err(e) => {
            error!("Failed to set up the object model: {}", e);
            std::process::exit(1);
        }
    };

    let tick_duration = Duration::from_millis(1000 / config.tick_rate.max(1));
    let mut ticker = interval(tick_duration);
    let status_every = config.tick_rate.max(1);

    info!("Session '{}' running", config.name);
    loop {
        tokio::select! {
            biased;

            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }

            _ = ticker.tick() => {
                facility.tick();
                if facility.ticks() % status_every == 0 {
                    info!("{}", facility.status());
                }
                if config.ticks > 0 && facility.ticks() >= config.ticks {
                    info!("Reached {} ticks", config.ticks);
                    break;
                }
            }
        }
    }

    let report = facility.shutdown();
    info!(
        "Shutdown retired {} wrappers after {} ticks",
        report.retired_at_shutdown, report.ticks
    );
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize report: {}", e),
    }
}
