//! Display-ready view of hearing test history.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::record::{EarResults, FrequencyResponse, HearingTestRecord};

/// Placeholder shown when a record has no score.
pub const NO_SCORE: &str = "N/A";

/// A hearing test normalized once for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Position in the page; the oldest entry is 1.
    pub number: usize,
    /// Record identifier.
    pub id: i64,
    /// When the test was stored.
    pub test_date: DateTime<Utc>,
    /// Kind of test performed.
    pub test_type: String,
    /// Precomputed summary score.
    pub overall_score: Option<f64>,
    /// Normalized left ear results.
    pub left_ear: EarResults,
    /// Normalized right ear results.
    pub right_ear: EarResults,
}

impl HistoryEntry {
    /// Normalize a newest-first page of records.
    #[must_use]
    pub fn from_records(records: &[HearingTestRecord]) -> Vec<Self> {
        let total = records.len();
        records
            .iter()
            .enumerate()
            .map(|(index, record)| Self::from_record(record, total - index))
            .collect()
    }

    /// Normalize a single record.
    #[must_use]
    pub fn from_record(record: &HearingTestRecord, number: usize) -> Self {
        Self {
            number,
            id: record.id,
            test_date: record.test_date,
            test_type: record.test_type.clone(),
            overall_score: record.overall_score,
            left_ear: record.left_ear(),
            right_ear: record.right_ear(),
        }
    }

    /// The score, or [`NO_SCORE`].
    #[must_use]
    pub fn score_text(&self) -> String {
        self.overall_score
            .map_or_else(|| NO_SCORE.to_string(), |score| score.to_string())
    }

    /// Heading line, e.g. `Test #2  2025-03-01 10:00 UTC  Score: 72`.
    #[must_use]
    pub fn heading(&self) -> String {
        format!(
            "Test #{}  {}  Score: {}",
            self.number,
            self.test_date.format("%Y-%m-%d %H:%M UTC"),
            self.score_text()
        )
    }
}

impl EarResults {
    /// One-line summary of this ear.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::NotTested => "Not tested".to_string(),
            Self::Frequencies(responses) => format!("{} frequencies tested", responses.len()),
            Self::PartiallyReadable {
                frequencies,
                unreadable,
            } => format!("{} frequencies tested", frequencies.len() + unreadable),
            Self::DetailUnavailable => "Tested".to_string(),
            Self::Unreadable => "Data available".to_string(),
        }
    }

    /// Per-frequency lines, or a single placeholder line.
    #[must_use]
    pub fn detail_lines(&self) -> Vec<String> {
        match self {
            Self::NotTested => vec!["No data available".to_string()],
            Self::DetailUnavailable => vec!["Invalid data format".to_string()],
            Self::Unreadable => vec!["Error loading data".to_string()],
            Self::Frequencies(responses) => responses.iter().map(frequency_line).collect(),
            Self::PartiallyReadable {
                frequencies,
                unreadable,
            } => frequencies
                .iter()
                .map(frequency_line)
                .chain(std::iter::once(format!("{unreadable} unreadable entries")))
                .collect(),
        }
    }
}

fn frequency_line(response: &FrequencyResponse) -> String {
    let heard = if response.heard { "Heard" } else { "Not heard" };
    format!("{}Hz: {heard}", response.freq)
}
