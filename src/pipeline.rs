//! End-to-end run: acquire inputs, export the stop GeoJSON, build tiles and
//! publish them.
//!
//! Every stage runs to completion before the next starts, and any failure
//! aborts the run.

use std::path::{Path, PathBuf};

use reqwest::Method;
use serde::Serialize;
use tracing::info;

use crate::config::{Config, DFT_BUS_DATA_USERNAME};
use crate::error::{Error, Result};
use crate::fetch::auth::{PORTAL_ORIGIN, PortalSession};
use crate::fetch::{BasicClient, USER_AGENT, download_to_file, request};
use crate::gtfs::stops_in_timetable;
use crate::naptan::StopRegistry;
use crate::output::export_geojson;
use crate::publish::{BunnyPublisher, CdnPublisher};
use crate::stats::ExportStats;
use crate::tiles::TileBuilder;

pub const NAPTAN_CSV_URL: &str = "https://naptan.api.dft.gov.uk/v1/access-nodes?dataFormat=csv";

pub const NAPTAN_CSV_FILE: &str = "naptan.csv";
pub const GTFS_ZIP_FILE: &str = "itm_all_gtfs.zip";
pub const GEOJSON_FILE: &str = "bus_stops_uk_geojson.json";
pub const PMTILES_FILE: &str = "bus_stops_uk.pmtiles";

/// Local overrides for the inputs, mainly for debugging.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Registry CSV as a local path or an http(s) URL.
    pub naptan_csv: Option<String>,
    /// Already downloaded GTFS archive.
    pub dft_gtfs: Option<PathBuf>,
    pub skip_publish: bool,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub stats: ExportStats,
    pub geojson: PathBuf,
    pub tiles: PathBuf,
    pub published: bool,
}

#[tracing::instrument(skip(config, options), fields(scratch = %scratch.display()))]
pub async fn run(config: &Config, scratch: &Path, options: &PipelineOptions) -> Result<RunSummary> {
    let naptan_csv = acquire_registry(options.naptan_csv.as_deref(), scratch).await?;
    let dft_gtfs = acquire_timetable(options.dft_gtfs.as_deref(), config, scratch).await?;

    let geojson = scratch.join(GEOJSON_FILE);
    let stats = export_stage(naptan_csv, dft_gtfs, geojson.clone()).await?;

    let tiles = scratch.join(PMTILES_FILE);
    TileBuilder::default().build(&geojson, &tiles).await?;

    let published = if options.skip_publish {
        info!("Skipping publish");
        false
    } else {
        BunnyPublisher::new(BasicClient::new(), &config.cdn)?
            .publish(&tiles)
            .await?;
        true
    };

    Ok(RunSummary {
        stats,
        geojson,
        tiles,
        published,
    })
}

/// Resolves the registry CSV, downloading it into `scratch` when `source`
/// is a URL or absent.
pub async fn acquire_registry(source: Option<&str>, scratch: &Path) -> Result<PathBuf> {
    let source = source.unwrap_or(NAPTAN_CSV_URL);
    info!(source, "Opening stop registry");

    if !is_remote(source) {
        return Ok(PathBuf::from(source));
    }

    let path = scratch.join(NAPTAN_CSV_FILE);
    download_to_file(&BasicClient::new(), request(Method::GET, source)?, &path).await?;
    Ok(path)
}

/// Resolves the GTFS archive, logging in to the portal and downloading it
/// into `scratch` when no local path is given.
pub async fn acquire_timetable(
    local: Option<&Path>,
    config: &Config,
    scratch: &Path,
) -> Result<PathBuf> {
    if let Some(path) = local {
        info!(path = %path.display(), "Opening timetable archive");
        return Ok(path.to_path_buf());
    }

    let credentials = config.portal.as_ref().ok_or(Error::Config {
        var: DFT_BUS_DATA_USERNAME,
    })?;
    let client = BasicClient::with_cookies(USER_AGENT)?;
    let session = PortalSession::login(client, PORTAL_ORIGIN, credentials).await?;

    let path = scratch.join(GTFS_ZIP_FILE);
    session.download_gtfs(&path).await?;
    Ok(path)
}

/// Runs the filtering core: timetable membership, registry load, and the
/// streamed export to `out`. Both inputs are released before returning.
pub fn build_geojson(naptan_csv: &Path, dft_gtfs: &Path, out: &Path) -> Result<ExportStats> {
    let membership = stops_in_timetable(dft_gtfs)?;
    let registry = StopRegistry::load(naptan_csv)?;
    export_geojson(out, &registry, &membership)
}

/// [`build_geojson`] on the blocking pool. The stage is synchronous file and
/// CPU work and must not stall the runtime's worker threads.
pub async fn export_stage(naptan_csv: PathBuf, dft_gtfs: PathBuf, out: PathBuf) -> Result<ExportStats> {
    tokio::task::spawn_blocking(move || build_geojson(&naptan_csv, &dft_gtfs, &out)).await?
}

fn is_remote(source: &str) -> bool {
    source.starts_with("https://") || source.starts_with("http://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_remote() {
        assert!(is_remote(NAPTAN_CSV_URL));
        assert!(is_remote("http://localhost:8080/naptan.csv"));
        assert!(!is_remote("/data/naptan.csv"));
        assert!(!is_remote("httpdata/naptan.csv"));
    }

    #[tokio::test]
    async fn test_local_registry_is_used_as_is() {
        let scratch = tempfile::tempdir().unwrap();

        let path = acquire_registry(Some("/data/Stops.csv"), scratch.path())
            .await
            .unwrap();

        assert_eq!(path, PathBuf::from("/data/Stops.csv"));
    }

    #[tokio::test]
    async fn test_local_timetable_needs_no_credentials() {
        let scratch = tempfile::tempdir().unwrap();
        let config = config_without_portal();

        let path = acquire_timetable(Some(Path::new("/data/gtfs.zip")), &config, scratch.path())
            .await
            .unwrap();

        assert_eq!(path, PathBuf::from("/data/gtfs.zip"));
    }

    #[tokio::test]
    async fn test_download_without_credentials_is_config_error() {
        let scratch = tempfile::tempdir().unwrap();
        let config = config_without_portal();

        let err = acquire_timetable(None, &config, scratch.path())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Config { var } if var == DFT_BUS_DATA_USERNAME));
    }

    #[tokio::test]
    async fn test_export_stage_runs_off_the_runtime() {
        let scratch = tempfile::tempdir().unwrap();
        let naptan = scratch.path().join(NAPTAN_CSV_FILE);
        std::fs::write(
            &naptan,
            "ATCOCode,NaptanCode,CommonName,ShortCommonName,Indicator,Longitude,Latitude,BusStopType,Status\n\
             A1,n,First,,,-1.0,52.0,MKD,active\n\
             A2,n,Second,,,-1.1,52.1,CUS,active\n",
        )
        .unwrap();
        let gtfs = write_gtfs(scratch.path(), "trip_id,stop_id\nt1,A1\n");
        let out = scratch.path().join(GEOJSON_FILE);

        let stats = export_stage(naptan, gtfs, out.clone()).await.unwrap();

        assert_eq!(stats.written, 1);
        assert_eq!(stats.skipped_not_in_timetable, 1);
        assert!(out.exists());
    }

    #[tokio::test]
    async fn test_export_stage_propagates_schema_error() {
        let scratch = tempfile::tempdir().unwrap();
        let gtfs = write_gtfs(scratch.path(), "trip_id,arrival_time\nt1,08:00:00\n");

        let err = export_stage(
            scratch.path().join(NAPTAN_CSV_FILE),
            gtfs,
            scratch.path().join(GEOJSON_FILE),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Schema { .. }));
    }

    // Helper functions for tests
    fn config_without_portal() -> Config {
        Config::from_lookup(false, |_| Some("key".to_string())).unwrap()
    }

    fn write_gtfs(dir: &Path, stop_times: &str) -> PathBuf {
        use std::io::Write;

        let path = dir.join(GTFS_ZIP_FILE);
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        writer
            .start_file("stop_times.txt", zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(stop_times.as_bytes()).unwrap();
        writer.finish().unwrap();
        path
    }
}
