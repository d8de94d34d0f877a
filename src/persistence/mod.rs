//! Persistence layer: SQLite snapshot and append-only history log.
//!
//! The snapshot (`events_current`) is fully replaced each cycle; the
//! history log (`events_history`) only ever grows. Both writes for one
//! reconciliation run happen inside a single transaction.

pub mod models;
pub mod sqlite;

pub use models::{EventRow, HistoryRecord};
pub use sqlite::SqliteStore;
