//! CLI entry point for the NaPTAN bus stop map builder.
//!
//! Downloads the stop registry and the national GTFS timetable, exports the
//! active stops with scheduled service as GeoJSON, builds a PMTiles archive
//! and publishes it to the CDN.

use anyhow::{Context, Result};
use clap::Parser;
use naptan_map::config::Config;
use naptan_map::pipeline::{self, PipelineOptions};
use naptan_map::scratch::Scratch;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "naptan_map")]
#[command(about = "Build and publish a tileset of UK bus stops with scheduled service", long_about = None)]
struct Cli {
    /// NaPTAN CSV as a local path or URL (default: download from the DfT API)
    #[arg(long, value_name = "PATH_OR_URL")]
    naptan_csv: Option<String>,

    /// Local GTFS zip (default: download from the bus data portal)
    #[arg(long, value_name = "PATH")]
    dft_gtfs: Option<PathBuf>,

    /// Scratch directory, emptied before use (default: a temporary directory)
    #[arg(long, value_name = "DIR")]
    scratch: Option<PathBuf>,

    /// Stop after building tiles instead of uploading them
    #[arg(long, default_value_t = false)]
    skip_publish: bool,
}

impl Cli {
    /// Portal credentials are only needed when the timetable is downloaded.
    fn needs_portal(&self) -> bool {
        self.dft_gtfs.is_none()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let cli = Cli::parse();

    // Fail on missing secrets before touching the network or disk, log
    // directory included
    let config = Config::from_env(cli.needs_portal()).context("invalid configuration")?;

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/naptan_map.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("naptan_map.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let scratch = match &cli.scratch {
        Some(dir) => Scratch::provided(dir),
        None => Scratch::temporary(),
    }
    .context("failed to prepare scratch directory")?;

    let options = PipelineOptions {
        naptan_csv: cli.naptan_csv,
        dft_gtfs: cli.dft_gtfs,
        skip_publish: cli.skip_publish,
    };

    let summary = match pipeline::run(&config, scratch.path(), &options).await {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "Run aborted");
            return Err(e).context("bus stop export failed");
        }
    };

    info!(
        written = summary.stats.written,
        skipped = summary.stats.skipped_not_in_timetable,
        no_coordinates = summary.stats.dropped_missing_coordinates,
        geojson = %summary.geojson.display(),
        tiles = %summary.tiles.display(),
        published = summary.published,
        "All done"
    );
    info!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
