//! Streams eligible stops out as a GeoJSON `FeatureCollection`.
//!
//! Features are encoded and written one at a time; the collection is never
//! built in memory. The document is only valid once [`FeatureCollectionWriter::finish`]
//! has run, so a failed export leaves a truncated file behind.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::gtfs::TimetableMembership;
use crate::naptan::{StopRecord, StopRegistry};
use crate::stats::ExportStats;

/// A progress line is logged every this many written features.
pub const PROGRESS_INTERVAL: usize = 20_000;

const COLLECTION_OPEN: &[u8] = br#"{"type": "FeatureCollection", "features": ["#;
const COLLECTION_CLOSE: &[u8] = b"\n]}\n";

#[derive(Debug, Serialize)]
pub struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    properties: StopProperties<'a>,
    geometry: Point,
}

#[derive(Debug, Serialize)]
pub struct StopProperties<'a> {
    #[serde(rename = "ATCOCode", skip_serializing_if = "Option::is_none")]
    atco_code: Option<&'a str>,
    #[serde(rename = "CommonName", skip_serializing_if = "Option::is_none")]
    common_name: Option<&'a str>,
    #[serde(rename = "ShortCommonName", skip_serializing_if = "Option::is_none")]
    short_common_name: Option<&'a str>,
    #[serde(rename = "Indicator", skip_serializing_if = "Option::is_none")]
    indicator: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct Point {
    #[serde(rename = "type")]
    kind: &'static str,
    /// `[longitude, latitude]`
    coordinates: [f64; 2],
}

impl<'a> Feature<'a> {
    /// Builds the point feature for `stop`, or `None` without both coordinates.
    pub fn from_stop(stop: &'a StopRecord) -> Option<Self> {
        let coordinates = stop.coordinates()?;
        Some(Feature {
            kind: "Feature",
            properties: StopProperties {
                atco_code: stop.atco_code.as_deref(),
                common_name: stop.common_name.as_deref(),
                short_common_name: stop.short_common_name.as_deref(),
                indicator: stop.indicator.as_deref(),
            },
            geometry: Point {
                kind: "Point",
                coordinates,
            },
        })
    }
}

/// Incremental writer for a newline-delimited feature array.
pub struct FeatureCollectionWriter<W: Write> {
    sink: W,
    written: usize,
}

impl<W: Write> FeatureCollectionWriter<W> {
    /// Writes the collection preamble to `sink`.
    pub fn new(mut sink: W) -> io::Result<Self> {
        sink.write_all(COLLECTION_OPEN)?;
        Ok(Self { sink, written: 0 })
    }

    pub fn write_feature(&mut self, feature: &Feature<'_>) -> io::Result<()> {
        let separator: &[u8] = if self.written == 0 { b"\n" } else { b",\n" };
        self.sink.write_all(separator)?;
        serde_json::to_writer(&mut self.sink, feature)?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Closes the array and object, flushes, and hands the sink back.
    pub fn finish(mut self) -> io::Result<W> {
        self.sink.write_all(COLLECTION_CLOSE)?;
        self.sink.flush()?;
        Ok(self.sink)
    }
}

/// Filters `registry` against `membership` and streams the surviving stops
/// into `sink`.
///
/// Candidates are chosen up front by stop type and status. Each candidate
/// then either is written, is skipped for having no timetabled calls
/// (counted), or is dropped for lacking a coordinate (also counted, but
/// never folded into the skip count).
pub fn export_stops<W: Write>(
    registry: &StopRegistry,
    membership: &TimetableMembership,
    sink: W,
) -> io::Result<(ExportStats, W)> {
    let candidates = registry.candidates();
    let mut stats = ExportStats::new(membership.len(), candidates.len());
    debug!(
        rows = registry.len(),
        candidates = stats.candidates,
        "Selected candidate stops"
    );

    let mut writer = FeatureCollectionWriter::new(sink)?;
    for stop in candidates {
        let in_timetable = stop
            .atco_code
            .as_deref()
            .is_some_and(|code| membership.contains(code));
        if !in_timetable {
            stats.skipped_not_in_timetable += 1;
            continue;
        }

        let Some(feature) = Feature::from_stop(stop) else {
            stats.dropped_missing_coordinates += 1;
            continue;
        };

        writer.write_feature(&feature)?;
        stats.written = writer.written();

        if stats.written % PROGRESS_INTERVAL == 0 {
            info!(
                written = stats.written,
                approx_total = stats.membership_size,
                percent = stats.approx_progress_pct(),
                "Wrote stops"
            );
        }
    }

    let sink = writer.finish()?;
    Ok((stats, sink))
}

/// Runs [`export_stops`] into a new file at `path`.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be created or written.
#[tracing::instrument(skip(registry, membership), fields(path = %path.display()))]
pub fn export_geojson(
    path: &Path,
    registry: &StopRegistry,
    membership: &TimetableMembership,
) -> Result<ExportStats> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let (stats, _file) = export_stops(registry, membership, BufWriter::new(file))
        .map_err(|e| Error::io(path, e))?;

    info!(
        written = stats.written,
        skipped = stats.skipped_not_in_timetable,
        no_coordinates = stats.dropped_missing_coordinates,
        "Wrote stops GeoJSON"
    );
    Ok(stats)
}
