//! Extracts the set of stops referenced by a GTFS static timetable.
//!
//! Only `stop_times.txt` is read, and only its `stop_id` column. The file is
//! streamed record by record straight out of the archive; it is far too large
//! to buffer whole.

use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{Error, Result};

pub const STOP_TIMES_FILE: &str = "stop_times.txt";
pub const STOP_ID_COLUMN: &str = "stop_id";

const READ_BUFFER_BYTES: usize = 1 << 20;

/// ATCO codes of every stop with at least one scheduled call.
///
/// Lookups are exact string matches; codes are not normalised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimetableMembership {
    stops: HashSet<String>,
}

impl TimetableMembership {
    pub fn contains(&self, atco_code: &str) -> bool {
        self.stops.contains(atco_code)
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.stops.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for TimetableMembership {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            stops: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Opens the GTFS archive at `path` and collects the distinct `stop_id`
/// values of its `stop_times.txt`.
///
/// # Errors
///
/// Fails if the archive cannot be opened or lacks `stop_times.txt`, if the
/// header has no `stop_id` column, or if any row is too short to contain it.
#[tracing::instrument(fields(path = %path.display()))]
pub fn stops_in_timetable(path: &Path) -> Result<TimetableMembership> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    stops_in_archive(file)
}

/// Same as [`stops_in_timetable`] over an already opened archive.
pub fn stops_in_archive<R: Read + Seek>(archive: R) -> Result<TimetableMembership> {
    let mut archive = ZipArchive::new(archive)?;
    let stop_times = archive.by_name(STOP_TIMES_FILE).map_err(|e| match e {
        ZipError::FileNotFound => Error::MissingEntry {
            entry: STOP_TIMES_FILE.to_string(),
        },
        other => Error::Zip(other),
    })?;
    debug!(
        compressed = stop_times.compressed_size(),
        uncompressed = stop_times.size(),
        "Reading {STOP_TIMES_FILE}"
    );

    let membership = read_column_set(stop_times, STOP_TIMES_FILE, STOP_ID_COLUMN)?;

    info!(stops = membership.len(), "Found stops with times in timetable");
    Ok(membership)
}

/// Reads a CSV stream with a header row and returns the distinct values of
/// `column`.
///
/// Records are read one at a time into a reused buffer. Quoted fields are
/// unquoted and blank lines are ignored; a record too short to reach
/// `column` aborts the read.
pub fn read_column_set<R: Read>(
    reader: R,
    source_name: &str,
    column: &str,
) -> Result<TimetableMembership> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .buffer_capacity(READ_BUFFER_BYTES)
        .from_reader(reader);

    let index = rdr
        .headers()?
        .iter()
        .position(|name| name.trim_start_matches('\u{feff}') == column)
        .ok_or_else(|| Error::Schema {
            source_name: source_name.to_string(),
            column: column.to_string(),
        })?;

    let mut stops = HashSet::new();
    let mut record = StringRecord::new();
    let mut rows: u64 = 0;
    while rdr.read_record(&mut record)? {
        rows += 1;
        let Some(value) = record.get(index) else {
            return Err(Error::Record {
                source_name: source_name.to_string(),
                line: record.position().map_or(0, |p| p.line()),
                expected: index + 1,
                found: record.len(),
            });
        };

        if !stops.contains(value) {
            stops.insert(value.to_owned());
        }
    }

    debug!(rows, distinct = stops.len(), "Column scan complete");
    Ok(TimetableMembership { stops })
}
