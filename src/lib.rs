//! # promo-radar
//!
//! Tracks promotional/discount events published by AI service providers,
//! deduplicates them against previously observed state, and records a
//! change history (NEW / UPDATED / ENDED).
//!
//! The core is the identity-based reconciliation engine: each scraped
//! promotion carries a durable identity key (hash of its immutable
//! descriptive fields) and a fingerprint (hash of identity plus all watched
//! mutable fields). Diffing the new scrape against the persisted snapshot
//! by identity key yields a minimal, stable change set with field-level
//! deltas, after which the snapshot is replaced and the history appended
//! atomically.
//!
//! ## Architecture
//!
//! ```text
//! sources.yaml ── SourceRegistry
//!     │
//!     ├── Source Adapters (sources/)   HTTP + robots.txt + heuristics
//!     │       │
//!     │   PromotionEvent stream
//!     │       │
//!     ├── Reconciler (domain/)         pure identity-keyed diff
//!     │       │
//!     └── SqliteStore (persistence/)   snapshot replace + history append
//!             │
//!         ChangeDigest
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod sources;
