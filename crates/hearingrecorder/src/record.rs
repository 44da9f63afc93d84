//! Core hearing-test record types.
//!
//! A record is one completed hearing test. Each ear's per-frequency
//! responses can come back from storage in several shapes, so the stored
//! value is kept as a [`StoredEarResults`] and resolved into an
//! [`EarResults`] exactly once, at the read boundary.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::session::UserId;

/// Label used when a test outcome does not name its test type.
pub const DEFAULT_TEST_TYPE: &str = "audiometry";

/// Whether a single tone was heard at a single frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyResponse {
    /// Tone frequency in hertz.
    pub freq: f64,
    /// Whether the listener reported hearing the tone.
    pub heard: bool,
}

impl FrequencyResponse {
    /// Create a new frequency response.
    #[must_use]
    pub fn new(freq: f64, heard: bool) -> Self {
        Self { freq, heard }
    }
}

impl fmt::Display for FrequencyResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heard = if self.heard { "heard" } else { "not heard" };
        write!(f, "{}Hz {heard}", self.freq)
    }
}

/// Parses `<freq>:<heard>`, e.g. `1000:y` or `4000:no`.
impl FromStr for FrequencyResponse {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (freq, heard) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| Error::invalid_input(format!("expected <freq>:<heard>, got '{s}'")))?;

        let freq: f64 = freq
            .trim()
            .parse()
            .map_err(|_| Error::invalid_input(format!("invalid frequency '{freq}'")))?;
        if !freq.is_finite() || freq <= 0.0 {
            return Err(Error::invalid_input(format!(
                "frequency must be a positive number, got {freq}"
            )));
        }

        let heard = match heard.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" | "true" | "1" | "heard" => true,
            "n" | "no" | "false" | "0" | "missed" => false,
            other => {
                return Err(Error::invalid_input(format!(
                    "invalid heard value '{other}'"
                )))
            }
        };

        Ok(Self { freq, heard })
    }
}

/// Parse a comma-separated list of frequency responses.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if any entry is malformed.
pub fn parse_frequency_list(s: &str) -> crate::Result<Vec<FrequencyResponse>> {
    s.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// One ear's results as they come back from the data store.
///
/// Rows written by different clients hold either the structured sequence
/// or a JSON-encoded string of it, and either may be null.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum StoredEarResults {
    /// The column is null.
    #[default]
    Absent,
    /// A textual encoding that still needs decoding.
    Encoded(String),
    /// An already-structured sequence.
    Parsed(Vec<FrequencyResponse>),
    /// Some other JSON value.
    Other(Value),
}

impl StoredEarResults {
    /// Check if the column is null.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Resolve the stored shape into its normalized form.
    ///
    /// Never fails: an undecodable string degrades to
    /// [`EarResults::Unreadable`] and leaves the rest of the record intact.
    #[must_use]
    pub fn normalize(&self) -> EarResults {
        match self {
            Self::Absent => EarResults::NotTested,
            Self::Encoded(text) if text.is_empty() => EarResults::NotTested,
            Self::Encoded(text) => match serde_json::from_str::<Value>(text) {
                Ok(decoded) => Self::from(decoded).normalize_decoded(),
                Err(err) => {
                    tracing::debug!("Unreadable ear results payload: {err}");
                    EarResults::Unreadable
                }
            },
            other => other.normalize_decoded(),
        }
    }

    /// Only a sequence yields frequencies; a string is decoded at most once.
    fn normalize_decoded(&self) -> EarResults {
        match self {
            Self::Parsed(responses) => EarResults::Frequencies(responses.clone()),
            Self::Other(Value::Array(items)) => normalize_entries(items),
            _ => EarResults::DetailUnavailable,
        }
    }
}

/// Decode a sequence entry by entry, keeping every well-formed response.
fn normalize_entries(items: &[Value]) -> EarResults {
    let mut frequencies = Vec::with_capacity(items.len());
    let mut unreadable = 0;

    for item in items {
        match serde_json::from_value::<FrequencyResponse>(item.clone()) {
            Ok(response) => frequencies.push(response),
            Err(err) => {
                tracing::debug!("Unreadable frequency entry {item}: {err}");
                unreadable += 1;
            }
        }
    }

    if unreadable == 0 {
        EarResults::Frequencies(frequencies)
    } else {
        EarResults::PartiallyReadable {
            frequencies,
            unreadable,
        }
    }
}

impl From<Option<Vec<FrequencyResponse>>> for StoredEarResults {
    fn from(responses: Option<Vec<FrequencyResponse>>) -> Self {
        responses.map_or(Self::Absent, Self::Parsed)
    }
}

impl From<Value> for StoredEarResults {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::String(text) => Self::Encoded(text),
            Value::Array(items) => {
                let value = Value::Array(items);
                match serde_json::from_value::<Vec<FrequencyResponse>>(value.clone()) {
                    Ok(responses) => Self::Parsed(responses),
                    Err(_) => Self::Other(value),
                }
            }
            other => Self::Other(other),
        }
    }
}

impl From<StoredEarResults> for Value {
    fn from(stored: StoredEarResults) -> Self {
        match stored {
            StoredEarResults::Absent => Value::Null,
            StoredEarResults::Encoded(text) => Value::String(text),
            StoredEarResults::Parsed(responses) => Value::Array(
                responses
                    .iter()
                    .map(|r| serde_json::json!({ "freq": r.freq, "heard": r.heard }))
                    .collect(),
            ),
            StoredEarResults::Other(value) => value,
        }
    }
}

/// One ear's results after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "frequencies", rename_all = "snake_case")]
pub enum EarResults {
    /// No data was recorded for this ear.
    NotTested,
    /// The per-frequency responses.
    Frequencies(Vec<FrequencyResponse>),
    /// A sequence in which some entries could not be decoded.
    PartiallyReadable {
        /// The entries that decoded, in stored order.
        frequencies: Vec<FrequencyResponse>,
        /// How many entries were dropped.
        unreadable: usize,
    },
    /// Data is present but could not be decoded.
    Unreadable,
    /// Data is present but is not a frequency sequence.
    DetailUnavailable,
}

impl EarResults {
    /// The readable per-frequency responses, if the ear holds a sequence.
    #[must_use]
    pub fn frequencies(&self) -> Option<&[FrequencyResponse]> {
        match self {
            Self::Frequencies(responses)
            | Self::PartiallyReadable {
                frequencies: responses,
                ..
            } => Some(responses),
            _ => None,
        }
    }

    /// Number of entries in the stored sequence, readable or not.
    #[must_use]
    pub fn entry_count(&self) -> Option<usize> {
        match self {
            Self::Frequencies(responses) => Some(responses.len()),
            Self::PartiallyReadable {
                frequencies,
                unreadable,
            } => Some(frequencies.len() + unreadable),
            _ => None,
        }
    }
}

/// A persisted hearing test.
///
/// Field names match the `hearing_tests` table columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HearingTestRecord {
    /// Identifier assigned by the data store.
    pub id: i64,
    /// The user this test belongs to.
    pub user_id: UserId,
    /// When the store accepted the record.
    pub test_date: DateTime<Utc>,
    /// Left ear results as stored.
    #[serde(default)]
    pub left_ear_results: StoredEarResults,
    /// Right ear results as stored.
    #[serde(default)]
    pub right_ear_results: StoredEarResults,
    /// Precomputed summary score.
    pub overall_score: Option<f64>,
    /// Kind of test performed.
    pub test_type: String,
}

impl HearingTestRecord {
    /// Normalized left ear results.
    #[must_use]
    pub fn left_ear(&self) -> EarResults {
        self.left_ear_results.normalize()
    }

    /// Normalized right ear results.
    #[must_use]
    pub fn right_ear(&self) -> EarResults {
        self.right_ear_results.normalize()
    }
}

/// The outcome of a completed hearing test, before it is recorded.
///
/// Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Left ear responses.
    pub left_ear: Option<Vec<FrequencyResponse>>,
    /// Right ear responses.
    pub right_ear: Option<Vec<FrequencyResponse>>,
    /// Precomputed summary score.
    pub overall_score: Option<f64>,
    /// Kind of test performed.
    pub test_type: Option<String>,
}

impl TestOutcome {
    /// Create an empty outcome.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the left ear responses.
    #[must_use]
    pub fn with_left_ear(mut self, responses: Vec<FrequencyResponse>) -> Self {
        self.left_ear = Some(responses);
        self
    }

    /// Set the right ear responses.
    #[must_use]
    pub fn with_right_ear(mut self, responses: Vec<FrequencyResponse>) -> Self {
        self.right_ear = Some(responses);
        self
    }

    /// Set the overall score.
    #[must_use]
    pub fn with_overall_score(mut self, score: f64) -> Self {
        self.overall_score = Some(score);
        self
    }

    /// Set the test type.
    #[must_use]
    pub fn with_test_type(mut self, test_type: impl Into<String>) -> Self {
        self.test_type = Some(test_type.into());
        self
    }
}

/// A row to insert into `hearing_tests`, without the store-assigned fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewHearingTest {
    /// Owner of the record.
    pub user_id: UserId,
    /// Left ear results; null when the ear was not tested.
    pub left_ear_results: StoredEarResults,
    /// Right ear results; null when the ear was not tested.
    pub right_ear_results: StoredEarResults,
    /// Precomputed summary score.
    pub overall_score: Option<f64>,
    /// Kind of test performed.
    pub test_type: String,
}

impl NewHearingTest {
    /// Build the row for `outcome`, owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a frequency or the score is not a
    /// finite number, since it could not be stored and read back unchanged.
    pub fn from_outcome(user_id: UserId, outcome: TestOutcome) -> crate::Result<Self> {
        for (ear, responses) in [("left", &outcome.left_ear), ("right", &outcome.right_ear)] {
            if let Some(bad) = responses
                .iter()
                .flatten()
                .find(|r| !r.freq.is_finite())
            {
                return Err(Error::invalid_input(format!(
                    "{ear} ear frequency must be a finite number, got {}",
                    bad.freq
                )));
            }
        }
        if let Some(score) = outcome.overall_score.filter(|s| !s.is_finite()) {
            return Err(Error::invalid_input(format!(
                "overall score must be a finite number, got {score}"
            )));
        }

        let test_type = outcome
            .test_type
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TEST_TYPE.to_string());

        Ok(Self {
            user_id,
            left_ear_results: outcome.left_ear.into(),
            right_ear_results: outcome.right_ear.into(),
            overall_score: outcome.overall_score,
            test_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    #[test]
    fn test_decode_encoded_sequence() {
        let stored = StoredEarResults::Encoded(r#"[{"freq":1000,"heard":true}]"#.to_string());
        let ear = stored.normalize();

        let responses = ear.frequencies().unwrap();
        assert_eq!(responses.len(), 1);
        assert!((responses[0].freq - 1000.0).abs() < f64::EPSILON);
        assert!(responses[0].heard);
    }

    #[test]
    fn test_decode_invalid_text_is_unreadable() {
        let stored = StoredEarResults::Encoded("not json".to_string());
        assert_eq!(stored.normalize(), EarResults::Unreadable);
    }

    #[test]
    fn test_absent_is_not_tested() {
        assert_eq!(StoredEarResults::Absent.normalize(), EarResults::NotTested);
        assert_eq!(
            StoredEarResults::Encoded(String::new()).normalize(),
            EarResults::NotTested
        );
    }

    #[test]
    fn test_parsed_is_used_directly() {
        let responses = vec![FrequencyResponse::new(500.0, false)];
        let stored = StoredEarResults::Parsed(responses.clone());
        assert_eq!(stored.normalize(), EarResults::Frequencies(responses));
    }

    #[test]
    fn test_non_sequence_is_detail_unavailable() {
        let stored = StoredEarResults::Encoded(r#"{"freq":1000}"#.to_string());
        assert_eq!(stored.normalize(), EarResults::DetailUnavailable);

        let stored = StoredEarResults::Encoded("null".to_string());
        assert_eq!(stored.normalize(), EarResults::DetailUnavailable);

        let stored = StoredEarResults::Other(serde_json::json!({"left": true}));
        assert_eq!(stored.normalize(), EarResults::DetailUnavailable);
    }

    #[test]
    fn test_partially_readable_sequence_keeps_good_entries() {
        let stored = StoredEarResults::from(serde_json::json!([
            {"freq": 500, "heard": true},
            {"freq": 1000}
        ]));
        assert!(matches!(stored, StoredEarResults::Other(_)));

        let ear = stored.normalize();
        assert_eq!(
            ear,
            EarResults::PartiallyReadable {
                frequencies: vec![FrequencyResponse::new(500.0, true)],
                unreadable: 1,
            }
        );
        assert_eq!(ear.entry_count(), Some(2));
        assert_eq!(
            ear.frequencies(),
            Some(&[FrequencyResponse::new(500.0, true)][..])
        );
    }

    #[test]
    fn test_encoded_partial_sequence_is_still_a_sequence() {
        let stored = StoredEarResults::Encoded(r#"[{"hz":1000},{"freq":250,"heard":false}]"#.to_string());
        assert_eq!(
            stored.normalize(),
            EarResults::PartiallyReadable {
                frequencies: vec![FrequencyResponse::new(250.0, false)],
                unreadable: 1,
            }
        );
    }

    #[test]
    fn test_double_encoded_string_is_detail_unavailable() {
        let inner = r#"[{"freq":1000,"heard":true}]"#;
        let stored = StoredEarResults::Encoded(serde_json::to_string(inner).unwrap());
        assert_eq!(stored.normalize(), EarResults::DetailUnavailable);
    }

    #[test]
    fn test_new_hearing_test_rejects_non_finite_values() {
        let outcome = TestOutcome::new().with_right_ear(vec![FrequencyResponse::new(f64::NAN, true)]);
        let err = NewHearingTest::from_outcome(user(), outcome).unwrap_err();
        assert!(err.to_string().contains("right ear frequency"));

        let outcome = TestOutcome::new().with_left_ear(vec![FrequencyResponse::new(f64::INFINITY, false)]);
        assert!(NewHearingTest::from_outcome(user(), outcome).is_err());

        let outcome = TestOutcome::new().with_overall_score(f64::NAN);
        let err = NewHearingTest::from_outcome(user(), outcome).unwrap_err();
        assert!(err.to_string().contains("overall score"));
    }

    #[test]
    fn test_from_value_shapes() {
        assert_eq!(
            StoredEarResults::from(Value::Null),
            StoredEarResults::Absent
        );
        assert_eq!(
            StoredEarResults::from(Value::String("x".to_string())),
            StoredEarResults::Encoded("x".to_string())
        );
        assert_eq!(
            StoredEarResults::from(serde_json::json!([{"freq": 250, "heard": false}])),
            StoredEarResults::Parsed(vec![FrequencyResponse::new(250.0, false)])
        );
        assert_eq!(
            StoredEarResults::from(serde_json::json!([])),
            StoredEarResults::Parsed(vec![])
        );
    }

    #[test]
    fn test_absent_serializes_as_null() {
        let row = NewHearingTest::from_outcome(user(), TestOutcome::new()).unwrap();
        let json = serde_json::to_value(&row).unwrap();

        assert!(json.get("left_ear_results").unwrap().is_null());
        assert!(json.get("right_ear_results").unwrap().is_null());
    }

    #[test]
    fn test_record_deserializes_string_payload() {
        let json = r#"{
            "id": 7,
            "user_id": "user-1",
            "test_date": "2025-03-01T10:00:00Z",
            "left_ear_results": "[{\"freq\":1000,\"heard\":true}]",
            "right_ear_results": null,
            "overall_score": 80,
            "test_type": "audiometry"
        }"#;
        let record: HearingTestRecord = serde_json::from_str(json).unwrap();

        assert!(matches!(record.left_ear_results, StoredEarResults::Encoded(_)));
        assert_eq!(record.left_ear().frequencies().map(<[_]>::len), Some(1));
        assert_eq!(record.right_ear(), EarResults::NotTested);
    }

    #[test]
    fn test_new_hearing_test_defaults_test_type() {
        let row = NewHearingTest::from_outcome(user(), TestOutcome::new()).unwrap();
        assert_eq!(row.test_type, DEFAULT_TEST_TYPE);

        let row = NewHearingTest::from_outcome(user(), TestOutcome::new().with_test_type("")).unwrap();
        assert_eq!(row.test_type, DEFAULT_TEST_TYPE);

        let row = NewHearingTest::from_outcome(
            user(),
            TestOutcome::new().with_test_type("speech-in-noise"),
        )
        .unwrap();
        assert_eq!(row.test_type, "speech-in-noise");
    }

    #[test]
    fn test_new_hearing_test_maps_outcome() {
        let outcome = TestOutcome::new()
            .with_left_ear(vec![FrequencyResponse::new(500.0, false)])
            .with_overall_score(72.0);
        let row = NewHearingTest::from_outcome(user(), outcome).unwrap();

        assert_eq!(
            row.left_ear_results,
            StoredEarResults::Parsed(vec![FrequencyResponse::new(500.0, false)])
        );
        assert!(row.right_ear_results.is_absent());
        assert_eq!(row.overall_score, Some(72.0));
    }

    #[test]
    fn test_frequency_response_from_str() {
        let r: FrequencyResponse = "1000:y".parse().unwrap();
        assert_eq!(r, FrequencyResponse::new(1000.0, true));

        let r: FrequencyResponse = " 4000 : No ".parse().unwrap();
        assert_eq!(r, FrequencyResponse::new(4000.0, false));

        assert!("1000".parse::<FrequencyResponse>().is_err());
        assert!("abc:y".parse::<FrequencyResponse>().is_err());
        assert!("-5:y".parse::<FrequencyResponse>().is_err());
        assert!("1000:maybe".parse::<FrequencyResponse>().is_err());
    }

    #[test]
    fn test_parse_frequency_list() {
        let list = parse_frequency_list("250:y, 500:n,1000:yes").unwrap();
        assert_eq!(list.len(), 3);
        assert!(!list[1].heard);

        assert!(parse_frequency_list("").unwrap().is_empty());
        assert!(parse_frequency_list("250:y,bad").is_err());
    }

    #[test]
    fn test_frequency_response_display() {
        assert_eq!(FrequencyResponse::new(1000.0, true).to_string(), "1000Hz heard");
        assert_eq!(
            FrequencyResponse::new(250.0, false).to_string(),
            "250Hz not heard"
        );
    }

    #[test]
    fn test_ear_results_serialization() {
        let json = serde_json::to_value(EarResults::Unreadable).unwrap();
        assert_eq!(json, serde_json::json!({"status": "unreadable"}));

        let json = serde_json::to_value(EarResults::Frequencies(vec![FrequencyResponse::new(
            1000.0, true,
        )]))
        .unwrap();
        assert_eq!(json["status"], "frequencies");
        assert_eq!(json["frequencies"][0]["heard"], true);
    }
}
