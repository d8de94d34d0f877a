//! Change classification types produced by reconciliation.
//!
//! Every identity key seen by a reconciliation run ends up in exactly one of
//! NEW / UPDATED / ENDED / UNCHANGED. The first three produce an immutable
//! history record; UNCHANGED produces nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kind of detected change, as persisted in the history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    /// Identity key present in the new set but not the old snapshot.
    New,
    /// Identity key present in both sets with at least one watched field
    /// difference.
    Updated,
    /// Identity key present in the old snapshot but not the new set.
    Ended,
}

impl ChangeKind {
    /// Stable string form used in the history table.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Updated => "UPDATED",
            Self::Ended => "ENDED",
        }
    }

    /// Parses the stable string form back into a kind.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(Self::New),
            "UPDATED" => Some(Self::Updated),
            "ENDED" => Some(Self::Ended),
            _ => None,
        }
    }
}

/// Before/after pair for one changed field, in canonical string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDelta {
    /// Canonical value in the old snapshot.
    pub before: String,
    /// Canonical value in the new observation.
    pub after: String,
}

/// One UPDATED classification: the surviving identity plus only the fields
/// that actually changed.
///
/// `changes` is a `BTreeMap` so the persisted JSON payload lists fields in a
/// stable order.
#[derive(Debug, Clone, Serialize)]
pub struct UpdatedEvent {
    /// Identity key of the promotion that changed.
    pub identity_key: String,
    /// Fingerprint of the new observation.
    pub fingerprint: String,
    /// Provider name, carried for the history record.
    pub provider: String,
    /// Event title, carried for the history record.
    pub event_title: String,
    /// Changed fields only, field name to before/after pair.
    pub changes: BTreeMap<&'static str, FieldDelta>,
}

/// Per-cycle summary of detected changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeDigest {
    /// Number of promotions seen for the first time.
    pub new_count: usize,
    /// Number of promotions with watched-field changes.
    pub updated_count: usize,
    /// Number of promotions that disappeared.
    pub ended_count: usize,
}

impl ChangeDigest {
    /// One-line human-readable summary for logs and CLI output.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "NEW: {}, UPDATED: {}, ENDED: {}",
            self.new_count, self.updated_count, self.ended_count
        )
    }

    /// Returns `true` if the cycle detected no changes at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.new_count == 0 && self.updated_count == 0 && self.ended_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_formats_counts() {
        let digest = ChangeDigest {
            new_count: 2,
            updated_count: 1,
            ended_count: 0,
        };
        assert_eq!(digest.summary(), "NEW: 2, UPDATED: 1, ENDED: 0");
        assert!(!digest.is_empty());
    }

    #[test]
    fn default_digest_is_empty() {
        assert!(ChangeDigest::default().is_empty());
    }

    #[test]
    fn change_kind_strings_are_stable() {
        assert_eq!(ChangeKind::New.as_str(), "NEW");
        assert_eq!(ChangeKind::Updated.as_str(), "UPDATED");
        assert_eq!(ChangeKind::Ended.as_str(), "ENDED");
    }
}
