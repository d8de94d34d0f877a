//! SQLite implementation of the snapshot and history store.
//!
//! The snapshot table is replaced wholesale each cycle and the history
//! table is append-only. [`SqliteStore::commit`] performs both for one
//! reconciliation run inside a single transaction, so a persistence
//! failure can never leave the snapshot half-written.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::warn;

use super::models::{EventRow, HistoryRecord};
use crate::domain::reconciler::ReconcileOutcome;
use crate::domain::{ChangeKind, PromotionEvent};
use crate::error::TrackerError;

const SELECT_CURRENT: &str = "SELECT identity_key, fingerprint, provider, event_title, \
     event_type, region, start_at, end_at, price_before, price_after, currency, \
     credit_amount, credit_unit, eligibility, source_url, collected_at FROM events_current";

/// SQLite-backed store using `sqlx::SqlitePool`.
///
/// The pool is capped at one connection: the tracker is a single-writer
/// system and SQLite in-memory databases are per-connection anyway.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database file and ensures the schema.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Store`] if the file or its parent directory
    /// cannot be created, or schema setup fails.
    pub async fn connect(path: &Path) -> Result<Self, TrackerError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| TrackerError::Store(e.to_string()))?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::with_options(options).await
    }

    /// Opens an in-memory database. Used by tests.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Store`] if schema setup fails.
    pub async fn in_memory() -> Result<Self, TrackerError> {
        Self::with_options(SqliteConnectOptions::new().in_memory(true)).await
    }

    async fn with_options(options: SqliteConnectOptions) -> Result<Self, TrackerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| TrackerError::Store(e.to_string()))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), TrackerError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS events_current (
                identity_key TEXT PRIMARY KEY,
                fingerprint TEXT NOT NULL,
                provider TEXT NOT NULL,
                event_title TEXT NOT NULL,
                event_type TEXT NOT NULL,
                region TEXT NOT NULL,
                start_at TEXT,
                end_at TEXT,
                price_before REAL,
                price_after REAL,
                currency TEXT,
                credit_amount REAL,
                credit_unit TEXT,
                eligibility TEXT,
                source_url TEXT NOT NULL,
                collected_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| TrackerError::Store(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS events_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fingerprint TEXT NOT NULL,
                identity_key TEXT NOT NULL,
                provider TEXT NOT NULL,
                event_title TEXT NOT NULL,
                change_type TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                changed_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| TrackerError::Store(e.to_string()))?;

        Ok(())
    }

    /// Loads the current snapshot keyed by identity key.
    ///
    /// Returns an empty map on an uninitialized database. A row with a
    /// blank identity key is a data inconsistency: it is keyed by its
    /// fingerprint with a warning, so it still ends naturally when absent
    /// from the next scrape.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Store`] on database failure.
    pub async fn load_current(&self) -> Result<HashMap<String, PromotionEvent>, TrackerError> {
        let rows = sqlx::query_as::<_, EventRow>(SELECT_CURRENT)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TrackerError::Store(e.to_string()))?;

        let mut snapshot = HashMap::with_capacity(rows.len());
        for row in rows {
            let key = if row.identity_key.is_empty() {
                warn!(
                    fingerprint = %row.fingerprint,
                    provider = %row.provider,
                    "stored row lacks identity key, keying by fingerprint"
                );
                row.fingerprint.clone()
            } else {
                row.identity_key.clone()
            };
            snapshot.insert(key, row.into_event());
        }
        Ok(snapshot)
    }

    /// Replaces the whole snapshot with `events` in one transaction.
    ///
    /// An empty slice is valid and yields an empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Store`] on database failure; the prior
    /// snapshot is left untouched in that case.
    pub async fn replace_current(&self, events: &[PromotionEvent]) -> Result<(), TrackerError> {
        let mut tx = self.begin().await?;
        replace_current_tx(&mut tx, events).await?;
        tx.commit()
            .await
            .map_err(|e| TrackerError::Store(e.to_string()))
    }

    /// Appends one record to the history log. Pure insert, never an update.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Store`] on database failure.
    pub async fn append_history(&self, record: &HistoryRecord) -> Result<(), TrackerError> {
        let mut tx = self.begin().await?;
        append_history_tx(&mut tx, record).await?;
        tx.commit()
            .await
            .map_err(|e| TrackerError::Store(e.to_string()))
    }

    /// Persists one reconciliation run: snapshot replace plus all history
    /// appends, as a single all-or-nothing transaction.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Store`] on database failure and
    /// [`TrackerError::Serialization`] if a history payload cannot be
    /// serialized. Nothing is persisted in either case.
    pub async fn commit(&self, outcome: &ReconcileOutcome) -> Result<(), TrackerError> {
        let records = history_records(outcome)?;

        let mut tx = self.begin().await?;
        replace_current_tx(&mut tx, &outcome.snapshot).await?;
        for record in &records {
            append_history_tx(&mut tx, record).await?;
        }
        tx.commit()
            .await
            .map_err(|e| TrackerError::Store(e.to_string()))
    }

    /// Reads back the most recent history records, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Store`] on database failure.
    pub async fn history(&self, limit: i64) -> Result<Vec<HistoryRecord>, TrackerError> {
        let rows = sqlx::query_as::<_, (String, String, String, String, String, String, String)>(
            "SELECT fingerprint, identity_key, provider, event_title, change_type, \
             payload_json, changed_at FROM events_history ORDER BY id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TrackerError::Store(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for (fingerprint, identity_key, provider, event_title, change_type, payload_json, changed_at) in rows {
            let Some(change_type) = ChangeKind::parse(&change_type) else {
                warn!(change_type = %change_type, "unknown change type in history, skipping row");
                continue;
            };
            let changed_at = match DateTime::parse_from_rfc3339(&changed_at) {
                Ok(ts) => ts.with_timezone(&Utc),
                Err(e) => {
                    warn!(changed_at = %changed_at, error = %e, "unparseable history timestamp");
                    Utc::now()
                }
            };
            records.push(HistoryRecord {
                fingerprint,
                identity_key,
                provider,
                event_title,
                change_type,
                payload: serde_json::from_str(&payload_json)?,
                changed_at,
            });
        }
        Ok(records)
    }

    async fn begin(&self) -> Result<Transaction<'_, Sqlite>, TrackerError> {
        self.pool
            .begin()
            .await
            .map_err(|e| TrackerError::Store(e.to_string()))
    }
}

async fn replace_current_tx(
    tx: &mut Transaction<'_, Sqlite>,
    events: &[PromotionEvent],
) -> Result<(), TrackerError> {
    sqlx::query("DELETE FROM events_current")
        .execute(&mut **tx)
        .await
        .map_err(|e| TrackerError::Store(e.to_string()))?;

    for event in events {
        sqlx::query(
            "INSERT INTO events_current (
                identity_key, fingerprint, provider, event_title, event_type, region,
                start_at, end_at, price_before, price_after, currency,
                credit_amount, credit_unit, eligibility, source_url, collected_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        )
        .bind(&event.identity_key)
        .bind(&event.fingerprint)
        .bind(&event.provider)
        .bind(&event.event_title)
        .bind(event.event_type.as_str())
        .bind(&event.region)
        .bind(event.start_at.map(rfc3339))
        .bind(event.end_at.map(rfc3339))
        .bind(event.price_before)
        .bind(event.price_after)
        .bind(&event.currency)
        .bind(event.credit_amount)
        .bind(&event.credit_unit)
        .bind(&event.eligibility)
        .bind(&event.source_url)
        .bind(rfc3339(event.collected_at))
        .execute(&mut **tx)
        .await
        .map_err(|e| TrackerError::Store(e.to_string()))?;
    }
    Ok(())
}

async fn append_history_tx(
    tx: &mut Transaction<'_, Sqlite>,
    record: &HistoryRecord,
) -> Result<(), TrackerError> {
    sqlx::query(
        "INSERT INTO events_history (fingerprint, identity_key, provider, event_title, \
         change_type, payload_json, changed_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(&record.fingerprint)
    .bind(&record.identity_key)
    .bind(&record.provider)
    .bind(&record.event_title)
    .bind(record.change_type.as_str())
    .bind(record.payload.to_string())
    .bind(rfc3339(record.changed_at))
    .execute(&mut **tx)
    .await
    .map_err(|e| TrackerError::Store(e.to_string()))?;
    Ok(())
}

/// Builds the history records for one reconciliation outcome.
///
/// NEW and ENDED carry the full event as payload; UPDATED carries only the
/// map of changed fields.
///
/// # Errors
///
/// Returns [`TrackerError::Serialization`] if a payload cannot be
/// serialized to JSON.
pub fn history_records(outcome: &ReconcileOutcome) -> Result<Vec<HistoryRecord>, TrackerError> {
    let changed_at = Utc::now();
    let mut records = Vec::with_capacity(
        outcome.new.len() + outcome.updated.len() + outcome.ended.len(),
    );

    for event in &outcome.new {
        records.push(HistoryRecord {
            fingerprint: event.fingerprint.clone(),
            identity_key: event.identity_key.clone(),
            provider: event.provider.clone(),
            event_title: event.event_title.clone(),
            change_type: ChangeKind::New,
            payload: serde_json::to_value(event)?,
            changed_at,
        });
    }
    for updated in &outcome.updated {
        records.push(HistoryRecord {
            fingerprint: updated.fingerprint.clone(),
            identity_key: updated.identity_key.clone(),
            provider: updated.provider.clone(),
            event_title: updated.event_title.clone(),
            change_type: ChangeKind::Updated,
            payload: serde_json::to_value(&updated.changes)?,
            changed_at,
        });
    }
    for event in &outcome.ended {
        records.push(HistoryRecord {
            fingerprint: event.fingerprint.clone(),
            identity_key: event.identity_key.clone(),
            provider: event.provider.clone(),
            event_title: event.event_title.clone(),
            change_type: ChangeKind::Ended,
            payload: serde_json::to_value(event)?,
            changed_at,
        });
    }
    Ok(records)
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
