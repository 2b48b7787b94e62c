//! Loader for the NaPTAN 2.4 stop registry CSV.
//!
//! Only the columns the export needs are kept, each parsed once into a
//! fixed-layout [`StopRecord`]. Schema reference:
//! <https://naptan.dft.gov.uk/naptan/schema/2.4/doc/NaPTANSchemaGuide-2.4-v0.57.pdf>

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Registry columns loaded, in [`StopRecord`] field order.
pub const COLUMNS: [&str; 9] = [
    "ATCOCode",
    "NaptanCode",
    "CommonName",
    "ShortCommonName",
    "Indicator",
    "Longitude",
    "Latitude",
    "BusStopType",
    "Status",
];

pub const ACTIVE_STATUS: &str = "active";

/// Physical classification of an on-street bus stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusStopType {
    /// `MKD`: marked point.
    Marked,
    /// `CUS`: custom (unmarked) point.
    Custom,
    /// Any other code, such as `HAR` or `FLX`.
    Other(String),
}

impl BusStopType {
    pub fn from_code(code: &str) -> Self {
        match code {
            "MKD" => BusStopType::Marked,
            "CUS" => BusStopType::Custom,
            other => BusStopType::Other(other.to_string()),
        }
    }

    pub fn is_exportable(&self) -> bool {
        matches!(self, BusStopType::Marked | BusStopType::Custom)
    }
}

/// One registry row. Missing cells and unparseable or non-finite coordinates
/// are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopRecord {
    pub atco_code: Option<String>,
    pub naptan_code: Option<String>,
    pub common_name: Option<String>,
    pub short_common_name: Option<String>,
    pub indicator: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub bus_stop_type: Option<BusStopType>,
    pub status: Option<String>,
}

impl StopRecord {
    /// Marked or custom bus stop whose status is `active`.
    pub fn is_candidate(&self) -> bool {
        self.bus_stop_type
            .as_ref()
            .is_some_and(BusStopType::is_exportable)
            && self.status.as_deref() == Some(ACTIVE_STATUS)
    }

    /// `[longitude, latitude]` when both are known.
    pub fn coordinates(&self) -> Option<[f64; 2]> {
        Some([self.longitude?, self.latitude?])
    }
}

/// The registry held in memory, in source row order.
#[derive(Debug, Clone, Default)]
pub struct StopRegistry {
    records: Vec<StopRecord>,
}

impl StopRegistry {
    pub fn new(records: Vec<StopRecord>) -> Self {
        Self { records }
    }

    /// Loads the registry CSV at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, a required column is missing, or a
    /// row is too short for the loaded columns.
    #[tracing::instrument(fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let registry = Self::from_reader(file, &path.display().to_string())?;
        info!(rows = registry.len(), "Loaded stop registry");
        Ok(registry)
    }

    pub fn from_reader<R: Read>(reader: R, source_name: &str) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);

        let headers = rdr.headers()?.clone();
        let mut indices = [0usize; COLUMNS.len()];
        for (slot, column) in indices.iter_mut().zip(COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}') == column)
                .ok_or_else(|| Error::Schema {
                    source_name: source_name.to_string(),
                    column: column.to_string(),
                })?;
        }
        let required = indices.iter().max().map_or(0, |max| max + 1);
        debug!(?indices, "Resolved registry columns");

        let mut records = Vec::new();
        let mut row = StringRecord::new();
        while rdr.read_record(&mut row)? {
            if row.len() < required {
                return Err(Error::Record {
                    source_name: source_name.to_string(),
                    line: row.position().map_or(0, |p| p.line()),
                    expected: required,
                    found: row.len(),
                });
            }
            records.push(parse_row(&row, &indices));
        }

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[StopRecord] {
        &self.records
    }

    /// Selects every exportable stop in one pass, preserving row order.
    pub fn candidates(&self) -> Vec<&StopRecord> {
        self.records.iter().filter(|r| r.is_candidate()).collect()
    }
}

/// Cell values read as missing: empty cells plus the usual NA spellings
/// found in tabular exports.
const NA_MARKERS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND",
    "1.#QNAN", "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn cell<'r>(row: &'r StringRecord, index: usize) -> Option<&'r str> {
    row.get(index).filter(|v| !NA_MARKERS.contains(v))
}

fn parse_row(row: &StringRecord, indices: &[usize; COLUMNS.len()]) -> StopRecord {
    let text = |i: usize| cell(row, indices[i]).map(str::to_owned);
    // Non-finite values would serialise as null coordinates.
    let number = |i: usize| {
        cell(row, indices[i])
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    };

    StopRecord {
        atco_code: text(0),
        naptan_code: text(1),
        common_name: text(2),
        short_common_name: text(3),
        indicator: text(4),
        longitude: number(5),
        latitude: number(6),
        bus_stop_type: cell(row, indices[7]).map(BusStopType::from_code),
        status: text(8),
    }
}
