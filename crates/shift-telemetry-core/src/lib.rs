use serde::{Deserialize, Serialize};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

pub mod simulate;

/// Points awarded per sale when scoring a session.
pub const SALE_POINTS: i64 = 100;
/// Points deducted per error when scoring a session.
pub const ERROR_PENALTY: i64 = 50;

/// Stored timestamp layout. The column text format is an external contract;
/// other tools read the database directly.
pub const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum TelemetryError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Scores a session: each sale earns [`SALE_POINTS`], each error costs
/// [`ERROR_PENALTY`], floored at zero. Total over all `u32` inputs.
#[must_use]
pub fn compute_score(sales: u32, errors: u32) -> i64 {
    (i64::from(sales) * SALE_POINTS - i64::from(errors) * ERROR_PENALTY).max(0)
}

/// One logged session outcome. Records are immutable once stored; the id is
/// assigned by the store and strictly increases in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SessionRecord {
    pub id: i64,
    #[serde(with = "timestamp_text")]
    pub recorded_at: OffsetDateTime,
    pub actor: String,
    pub sales: u32,
    pub errors: u32,
    pub score: i64,
}

/// A session submission before the store assigns id, timestamp, and score.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SessionInput {
    pub actor: String,
    pub sales: u32,
    pub errors: u32,
}

impl SessionInput {
    /// Validates a submission before append.
    ///
    /// # Errors
    /// Returns [`TelemetryError::Validation`] when the actor is missing.
    /// Counts cannot be negative at this boundary (`u32`).
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.actor.trim().is_empty() {
            return Err(TelemetryError::Validation(
                "actor MUST be provided for every session".to_string(),
            ));
        }

        Ok(())
    }
}

/// Append-only session log. Mutations are limited to appending one record
/// and clearing the whole log; records are never edited in place.
pub trait SessionStore {
    /// Scores and persists one submission, returning the stored record.
    ///
    /// # Errors
    /// Returns [`TelemetryError::Validation`] for rejected input and
    /// [`TelemetryError::Storage`] when the medium cannot be written.
    fn append(&mut self, input: &SessionInput) -> Result<SessionRecord, TelemetryError>;

    /// Full scan, newest first. An empty log yields an empty vec.
    ///
    /// # Errors
    /// Returns [`TelemetryError::Storage`] when the medium cannot be read.
    fn list_all(&self) -> Result<Vec<SessionRecord>, TelemetryError>;

    /// Deletes every record and reports how many were removed. Idempotent.
    ///
    /// # Errors
    /// Returns [`TelemetryError::Storage`] when the medium cannot be written.
    fn reset(&mut self) -> Result<usize, TelemetryError>;
}

/// Aggregate KPIs over the full session log.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SessionSummary {
    pub sessions_played: usize,
    pub best_score: i64,
    pub total_sales: u64,
    pub total_errors: u64,
    pub latest_actor: String,
    #[serde(with = "timestamp_text")]
    pub latest_recorded_at: OffsetDateTime,
}

/// Folds a newest-first record list (the [`SessionStore::list_all`] order)
/// into dashboard KPIs. Returns `None` for an empty log.
#[must_use]
pub fn summarize(records: &[SessionRecord]) -> Option<SessionSummary> {
    let latest = records.first()?;

    let mut best_score = 0_i64;
    let mut total_sales = 0_u64;
    let mut total_errors = 0_u64;

    for record in records {
        best_score = best_score.max(record.score);
        total_sales += u64::from(record.sales);
        total_errors += u64::from(record.errors);
    }

    Some(SessionSummary {
        sessions_played: records.len(),
        best_score,
        total_sales,
        total_errors,
        latest_actor: latest.actor.clone(),
        latest_recorded_at: latest.recorded_at,
    })
}

/// Parses a stored `YYYY-MM-DD HH:MM:SS` timestamp. Stored values carry no
/// offset and are taken as UTC.
///
/// # Errors
/// Returns [`TelemetryError::Validation`] when parsing fails.
pub fn parse_timestamp(value: &str) -> Result<OffsetDateTime, TelemetryError> {
    let parsed = PrimitiveDateTime::parse(value, TIMESTAMP_FORMAT)
        .map_err(|err| TelemetryError::Validation(format!("invalid timestamp: {err}")))?;

    Ok(parsed.assume_utc())
}

/// Formats a timestamp as `YYYY-MM-DD HH:MM:SS` after normalizing to UTC.
///
/// # Errors
/// Returns [`TelemetryError::Validation`] when formatting fails.
pub fn format_timestamp(value: OffsetDateTime) -> Result<String, TelemetryError> {
    value
        .to_offset(UtcOffset::UTC)
        .format(TIMESTAMP_FORMAT)
        .map_err(|err| TelemetryError::Validation(format!("failed to format timestamp: {err}")))
}

#[must_use]
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(UtcOffset::UTC)
}

/// Serde adapter keeping serialized timestamps on the stored text layout.
pub mod timestamp_text {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    /// # Errors
    /// Fails when the value cannot be rendered on [`super::TIMESTAMP_FORMAT`].
    pub fn serialize<S: Serializer>(
        value: &OffsetDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let formatted = super::format_timestamp(*value).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    /// # Errors
    /// Fails when the value is not a `YYYY-MM-DD HH:MM:SS` string.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn must_ok<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok(..), got error: {err}"),
        }
    }

    fn must_some<T>(value: Option<T>) -> T {
        match value {
            Some(inner) => inner,
            None => panic!("expected Some(..), got None"),
        }
    }

    fn fixture_record(id: i64, actor: &str, sales: u32, errors: u32) -> SessionRecord {
        SessionRecord {
            id,
            recorded_at: must_ok(parse_timestamp("2026-08-01 21:30:00")),
            actor: actor.to_string(),
            sales,
            errors,
            score: compute_score(sales, errors),
        }
    }

    #[test]
    fn score_rewards_sales_and_penalizes_errors() {
        assert_eq!(compute_score(0, 0), 0);
        assert_eq!(compute_score(10, 0), 1_000);
        assert_eq!(compute_score(23, 4), 2_100);
    }

    #[test]
    fn score_is_clamped_at_zero() {
        assert_eq!(compute_score(5, 20), 0);
        assert_eq!(compute_score(0, 1), 0);
        assert_eq!(compute_score(1, 2), 0);
    }

    #[test]
    fn score_break_even_is_two_errors_per_sale() {
        assert_eq!(compute_score(10, 20), 0);
        assert_eq!(compute_score(10, 19), 50);
    }

    proptest! {
        #[test]
        fn score_matches_clamped_formula(sales in any::<u32>(), errors in any::<u32>()) {
            let expected = (i128::from(sales) * 100 - i128::from(errors) * 50).max(0);
            prop_assert_eq!(i128::from(compute_score(sales, errors)), expected);
        }

        #[test]
        fn score_is_never_negative(sales in any::<u32>(), errors in any::<u32>()) {
            prop_assert!(compute_score(sales, errors) >= 0);
        }
    }

    #[test]
    fn input_requires_an_actor() {
        let input = SessionInput {
            actor: "  ".to_string(),
            sales: 1,
            errors: 0,
        };
        assert_eq!(
            input.validate(),
            Err(TelemetryError::Validation(
                "actor MUST be provided for every session".to_string()
            ))
        );

        let input = SessionInput {
            actor: "ana".to_string(),
            sales: 0,
            errors: 0,
        };
        assert_eq!(input.validate(), Ok(()));
    }

    #[test]
    fn summarize_empty_log_is_none() {
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn summarize_folds_newest_first_records() {
        // list_all order: newest first.
        let records = vec![
            fixture_record(3, "bot", 5, 20),
            fixture_record(2, "ana", 30, 2),
            fixture_record(1, "leo", 12, 12),
        ];

        let summary = must_some(summarize(&records));
        assert_eq!(summary.sessions_played, 3);
        assert_eq!(summary.best_score, 2_900);
        assert_eq!(summary.total_sales, 47);
        assert_eq!(summary.total_errors, 34);
        assert_eq!(summary.latest_actor, "bot");
    }

    #[test]
    fn timestamp_round_trips_on_stored_layout() {
        let parsed = must_ok(parse_timestamp("2026-08-01 21:30:05"));
        assert_eq!(must_ok(format_timestamp(parsed)), "2026-08-01 21:30:05");
    }

    #[test]
    fn timestamp_rejects_other_layouts() {
        assert!(parse_timestamp("2026-08-01T21:30:05Z").is_err());
        assert!(parse_timestamp("not a timestamp").is_err());
    }

    #[test]
    fn record_serializes_timestamp_as_stored_text() {
        let record = fixture_record(1, "ana", 10, 0);
        let json = must_ok(serde_json::to_value(&record));
        assert_eq!(json["recorded_at"], "2026-08-01 21:30:00");
        assert_eq!(json["score"], 1_000);

        let back: SessionRecord = must_ok(serde_json::from_value(json));
        assert_eq!(back, record);
    }
}
