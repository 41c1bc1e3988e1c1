//! Anemometer Stats CLI
//!
//! Query station data from a store snapshot, prune it, or serve it over HTTP.

use anemometer_stats::{
    compute_wind_stats, config::Config, readers, store::MemoryStore, Timestamp, VERSION,
};
use anyhow::Context;
use chrono::{TimeZone, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "anemometer")]
#[command(version = VERSION)]
#[command(about = "Time-weighted statistics for weather station data", long_about = None)]
struct Cli {
    /// Store snapshot to read (defaults to the configured data path)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Query interval. Defaults to the last `--minutes` ending now.
#[derive(Args, Clone, Copy)]
struct RangeArgs {
    /// Interval start (ms since epoch)
    #[arg(long)]
    start: Option<Timestamp>,

    /// Interval end (ms since epoch)
    #[arg(long)]
    end: Option<Timestamp>,

    /// Interval length in minutes when --start is omitted
    #[arg(long, default_value = "60")]
    minutes: i64,
}

impl RangeArgs {
    fn resolve(self) -> anyhow::Result<(Timestamp, Timestamp)> {
        let end = self.end.unwrap_or_else(|| Utc::now().timestamp_millis());
        let start = match self.start {
            Some(start) => start,
            None => self
                .minutes
                .checked_mul(60_000)
                .and_then(|span| end.checked_sub(span))
                .with_context(|| format!("--minutes {} is out of range", self.minutes))?,
        };
        anyhow::ensure!(start <= end, "start {start} is after end {end}");
        anyhow::ensure!(
            end.checked_sub(start).is_some(),
            "range {start}..{end} is too long"
        );
        Ok((start, end))
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SeriesKind {
    Temperature,
    TempHum,
    Adc,
    Signal,
    Lag,
}

#[derive(Subcommand)]
enum Commands {
    /// Wind statistics: average, maximum, histogram and time series
    Wind {
        #[command(flatten)]
        range: RangeArgs,

        /// Maximum number of time series points
        #[arg(long)]
        points: Option<usize>,
    },

    /// A downsampled sensor series
    Series {
        /// Which series to read
        #[arg(value_enum)]
        kind: SeriesKind,

        #[command(flatten)]
        range: RangeArgs,

        /// Maximum number of points
        #[arg(long)]
        points: Option<usize>,
    },

    /// Door state changes
    Door {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Pilot counts
    Pilots {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Link reports per network type
    Network {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Uplink traffic volume
    Traffic {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Delete data older than the retention window
    Prune {
        /// Cutoff (ms since epoch); defaults to now minus the configured retention
        #[arg(long)]
        before: Option<Timestamp>,
    },

    /// Serve queries over HTTP
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config, using defaults: {e}");
            Config::default()
        }
    };
    init_logging(&config);

    if let Err(e) = run(cli, config) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let data_path = cli.data.clone().unwrap_or_else(|| config.data_path.clone());

    match cli.command {
        Commands::Wind { range, points } => {
            let store = load_store(&data_path)?;
            let (start, end) = range.resolve()?;
            let stats = compute_wind_stats(&store, start, end, config.output_points(points))?;
            if stats.is_none() {
                eprintln!("No wind data between {} and {}", format_ts(start), format_ts(end));
            }
            print_json(&stats)
        }
        Commands::Series {
            kind,
            range,
            points,
        } => {
            let store = load_store(&data_path)?;
            let (start, end) = range.resolve()?;
            let points = config.output_points(points);
            match kind {
                SeriesKind::Temperature => {
                    print_json(&readers::read_temperature(&store, start, end, points)?)
                }
                SeriesKind::TempHum => {
                    print_json(&readers::read_temp_hum(&store, start, end, points)?)
                }
                SeriesKind::Adc => print_json(&readers::read_adc(&store, start, end, points)?),
                SeriesKind::Signal => {
                    print_json(&readers::read_signal_strength(&store, start, end, points)?)
                }
                SeriesKind::Lag => print_json(&readers::read_lag(&store, start, end, points)?),
            }
        }
        Commands::Door { range } => {
            let store = load_store(&data_path)?;
            let (start, end) = range.resolve()?;
            print_json(&readers::read_door(&store, start, end)?)
        }
        Commands::Pilots { range } => {
            let store = load_store(&data_path)?;
            let (start, end) = range.resolve()?;
            print_json(&readers::read_pilots(&store, start, end)?)
        }
        Commands::Network { range } => {
            let store = load_store(&data_path)?;
            let (start, end) = range.resolve()?;
            print_json(&readers::read_network_types(&store, start, end)?)
        }
        Commands::Traffic { range } => {
            let store = load_store(&data_path)?;
            let (start, end) = range.resolve()?;
            print_json(&readers::read_traffic(&store, start, end)?)
        }
        Commands::Prune { before } => {
            let mut store = load_store(&data_path)?;
            let before =
                before.unwrap_or_else(|| config.retention_cutoff(Utc::now().timestamp_millis()));
            store.prune(before);
            store.save(&data_path)?;
            println!("Pruned data before {}", format_ts(before));
            Ok(())
        }
        Commands::Serve { port } => cmd_serve(&data_path, port, config),
        Commands::Config { save } => {
            if save {
                config.save()?;
                println!("Saved config to {:?}", Config::config_path());
            } else {
                println!("Config file: {:?}", Config::config_path());
            }
            print_json(&config)
        }
    }
}

#[cfg(feature = "server")]
fn cmd_serve(data_path: &std::path::Path, port: Option<u16>, config: Config) -> anyhow::Result<()> {
    use anemometer_stats::server::{run as run_server, ServerConfig};
    use std::sync::Arc;

    let store = load_store(data_path)?;
    let server_config = ServerConfig::new(
        port.unwrap_or(config.server_port),
        Arc::new(store),
        config,
    );

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async move {
        let (addr, shutdown_tx) = run_server(server_config).await?;
        println!("Serving on http://{addr} (Ctrl+C to stop)");
        tokio::signal::ctrl_c().await?;
        let _ = shutdown_tx.send(());
        Ok::<(), anyhow::Error>(())
    })
}

#[cfg(not(feature = "server"))]
fn cmd_serve(_data_path: &std::path::Path, _port: Option<u16>, _config: Config) -> anyhow::Result<()> {
    anyhow::bail!("this build does not include the HTTP server (enable the `server` feature)")
}

/// Load the snapshot, starting empty when none has been written yet.
fn load_store(path: &std::path::Path) -> anyhow::Result<MemoryStore> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "no store snapshot found, starting empty");
        return Ok(MemoryStore::new());
    }
    MemoryStore::load(path).with_context(|| format!("failed to load store from {path:?}"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_ts(ts: Timestamp) -> String {
    Utc.timestamp_millis_opt(ts)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}
