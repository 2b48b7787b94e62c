use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Default, Clone, Serialize)]
pub struct ExportStats {
    pub generated_at: DateTime<Utc>,

    // inputs
    pub membership_size: usize,
    pub candidates: usize,

    // outcome per candidate
    pub written: usize,
    pub skipped_not_in_timetable: usize,
    pub dropped_missing_coordinates: usize,
}

impl ExportStats {
    pub fn new(membership_size: usize, candidates: usize) -> Self {
        ExportStats {
            generated_at: Utc::now(),
            membership_size,
            candidates,
            ..Default::default()
        }
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Rough progress against the timetable stop count. The membership set
    /// is only an estimate of the output size, so this may pass 100.
    pub fn approx_progress_pct(&self) -> f64 {
        Self::pct(self.written, self.membership_size).round()
    }

    /// Every candidate was written, skipped or dropped exactly once.
    pub fn is_balanced(&self) -> bool {
        self.written + self.skipped_not_in_timetable + self.dropped_missing_coordinates
            == self.candidates
    }
}
