//! Row types for the snapshot and history tables.
//!
//! [`EventRow`] is the single canonical read-side record: the reconciler
//! never sees storage rows, only [`PromotionEvent`] values produced by
//! [`EventRow::into_event`], so it stays decoupled from column layout.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::domain::promotion_event::{EventType, PromotionEvent};
use crate::domain::ChangeKind;

/// A row of the `events_current` table.
///
/// Timestamps are stored as RFC 3339 text, matching the canonical string
/// form used for hashing, so a value that round-trips through the store
/// canonicalizes identically to a freshly scraped one.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Identity key column; may be blank in rows written before keys existed.
    pub identity_key: String,
    /// Fingerprint of the stored observation.
    pub fingerprint: String,
    /// Provider name.
    pub provider: String,
    /// Promotion title.
    pub event_title: String,
    /// Event type in its stable string form.
    pub event_type: String,
    /// Region string.
    pub region: String,
    /// Promotion start, RFC 3339.
    pub start_at: Option<String>,
    /// Promotion end, RFC 3339.
    pub end_at: Option<String>,
    /// Price before promotion.
    pub price_before: Option<f64>,
    /// Price under promotion.
    pub price_after: Option<f64>,
    /// Currency code.
    pub currency: Option<String>,
    /// Credit amount.
    pub credit_amount: Option<f64>,
    /// Credit unit.
    pub credit_unit: Option<String>,
    /// Eligibility text.
    pub eligibility: Option<String>,
    /// Source page URL.
    pub source_url: String,
    /// Collection timestamp, RFC 3339.
    pub collected_at: String,
}

impl EventRow {
    /// Converts the row into the canonical in-memory record.
    ///
    /// Unparseable timestamps degrade to `None` (or now, for
    /// `collected_at`) with a warning; a bad row never fails a load.
    #[must_use]
    pub fn into_event(self) -> PromotionEvent {
        PromotionEvent {
            provider: self.provider,
            event_title: self.event_title,
            event_type: EventType::parse(&self.event_type),
            region: self.region,
            start_at: parse_ts(self.start_at.as_deref(), "start_at"),
            end_at: parse_ts(self.end_at.as_deref(), "end_at"),
            price_before: self.price_before,
            price_after: self.price_after,
            currency: self.currency,
            credit_amount: self.credit_amount,
            credit_unit: self.credit_unit,
            eligibility: self.eligibility,
            source_url: self.source_url,
            collected_at: parse_ts(Some(self.collected_at.as_str()), "collected_at")
                .unwrap_or_else(Utc::now),
            identity_key: self.identity_key,
            fingerprint: self.fingerprint,
        }
    }
}

fn parse_ts(raw: Option<&str>, column: &str) -> Option<DateTime<Utc>> {
    let raw = raw?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            warn!(column, raw, error = %e, "unparseable stored timestamp");
            None
        }
    }
}

/// One append-only history record, as written to `events_history`.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    /// Fingerprint of the observation that triggered the record.
    pub fingerprint: String,
    /// Identity key of the promotion.
    pub identity_key: String,
    /// Provider name.
    pub provider: String,
    /// Promotion title.
    pub event_title: String,
    /// NEW, UPDATED or ENDED.
    pub change_type: ChangeKind,
    /// Full event JSON for NEW/ENDED; field-delta map for UPDATED.
    pub payload: serde_json::Value,
    /// When the change was detected.
    pub changed_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn row() -> EventRow {
        EventRow {
            identity_key: "k1".to_string(),
            fingerprint: "f1".to_string(),
            provider: "openai".to_string(),
            event_title: "promo".to_string(),
            event_type: "trial_days".to_string(),
            region: "global".to_string(),
            start_at: None,
            end_at: Some("2026-03-01T00:00:00Z".to_string()),
            price_before: None,
            price_after: Some(9.99),
            currency: Some("usd".to_string()),
            credit_amount: None,
            credit_unit: None,
            eligibility: None,
            source_url: "https://openai.com/pricing".to_string(),
            collected_at: "2026-02-01T08:30:00Z".to_string(),
        }
    }

    #[test]
    fn row_round_trips_into_event() {
        let event = row().into_event();
        assert_eq!(event.event_type, EventType::TrialDays);
        assert_eq!(event.identity_key, "k1");
        assert_eq!(
            event.end_at.map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
            Some("2026-03-01T00:00:00Z".to_string())
        );
        assert_eq!(event.price_after, Some(9.99));
    }

    #[test]
    fn bad_timestamp_degrades_to_none() {
        let mut r = row();
        r.end_at = Some("not a timestamp".to_string());
        let event = r.into_event();
        assert!(event.end_at.is_none());
    }

    #[test]
    fn unknown_event_type_degrades_to_other() {
        let mut r = row();
        r.event_type = "mystery".to_string();
        assert_eq!(r.into_event().event_type, EventType::Other);
    }
}
