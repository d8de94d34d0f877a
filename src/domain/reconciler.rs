//! Identity-based reconciliation engine.
//!
//! Pure diff between the persisted snapshot and one scrape cycle's events.
//! No I/O, no randomness: classification is a function of its two inputs
//! only, with bounded execution time proportional to the event count. All
//! fetching happens in the source layer before this code runs, and all
//! persistence happens after it returns.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::change::{ChangeDigest, FieldDelta, UpdatedEvent};
use super::promotion_event::PromotionEvent;

/// Result of one reconciliation run.
///
/// The three change sets partition, together with the implicit UNCHANGED
/// set, the union of old and new identity keys. `snapshot` holds the
/// complete new event set (unchanged entries included) that must replace
/// the persisted snapshot.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Promotions seen for the first time, full records.
    pub new: Vec<PromotionEvent>,
    /// Promotions whose watched fields changed, with field-level deltas.
    pub updated: Vec<UpdatedEvent>,
    /// Promotions that disappeared, last-known records.
    pub ended: Vec<PromotionEvent>,
    /// The complete new snapshot, replacing the old one unconditionally.
    pub snapshot: Vec<PromotionEvent>,
    /// Per-cycle change counts.
    pub digest: ChangeDigest,
}

/// Computes the identity-keyed diff between `old_snapshot` and `new_events`.
///
/// Classification rules:
/// - key only in `new_events` → NEW
/// - key only in `old_snapshot` → ENDED
/// - key in both, any watched field differs → UPDATED with a map of only
///   the changed fields
/// - key in both, nothing differs → UNCHANGED, no history record
///
/// Duplicate identity keys within one cycle are last-write-wins: a provider
/// page listing the same promo twice keeps only the later extraction. Events
/// that were never finalized with keys are skipped with a warning rather
/// than failing the run.
///
/// Output vectors are sorted by identity key so history appends are stable
/// across runs.
#[must_use]
pub fn reconcile(
    old_snapshot: &HashMap<String, PromotionEvent>,
    new_events: Vec<PromotionEvent>,
) -> ReconcileOutcome {
    let mut new_map: HashMap<String, PromotionEvent> = HashMap::with_capacity(new_events.len());
    for event in new_events {
        if event.identity_key.is_empty() {
            warn!(
                provider = %event.provider,
                title = %event.event_title,
                "event without identity key skipped"
            );
            continue;
        }
        if let Some(prev) = new_map.insert(event.identity_key.clone(), event) {
            debug!(
                identity_key = %prev.identity_key,
                provider = %prev.provider,
                "duplicate identity key in one cycle, last write wins"
            );
        }
    }

    let mut outcome = ReconcileOutcome::default();

    for (key, new_event) in &new_map {
        match old_snapshot.get(key) {
            None => outcome.new.push(new_event.clone()),
            Some(old_event) => {
                if let Some(changes) = watched_field_changes(old_event, new_event) {
                    outcome.updated.push(UpdatedEvent {
                        identity_key: key.clone(),
                        fingerprint: new_event.fingerprint.clone(),
                        provider: new_event.provider.clone(),
                        event_title: new_event.event_title.clone(),
                        changes,
                    });
                }
            }
        }
    }

    for (key, old_event) in old_snapshot {
        if !new_map.contains_key(key) {
            outcome.ended.push(old_event.clone());
        }
    }

    outcome.new.sort_by(|a, b| a.identity_key.cmp(&b.identity_key));
    outcome.updated.sort_by(|a, b| a.identity_key.cmp(&b.identity_key));
    outcome.ended.sort_by(|a, b| a.identity_key.cmp(&b.identity_key));

    let mut snapshot: Vec<PromotionEvent> = new_map.into_values().collect();
    snapshot.sort_by(|a, b| a.identity_key.cmp(&b.identity_key));
    outcome.snapshot = snapshot;

    outcome.digest = ChangeDigest {
        new_count: outcome.new.len(),
        updated_count: outcome.updated.len(),
        ended_count: outcome.ended.len(),
    };
    outcome
}

/// Compares the watched fields of two observations of the same promotion.
///
/// Fingerprint equality is the fast path: equal fingerprints mean equal
/// canonical field values by construction. On mismatch, each watched field
/// is compared in canonical string form, so type-representation differences
/// between a stored row and a live scrape never produce false positives.
///
/// Returns `None` when nothing changed. A fingerprint mismatch with no
/// field-level difference means the two sides canonicalized inconsistently;
/// it is logged and treated as unchanged rather than emitting an empty
/// update.
fn watched_field_changes(
    old_event: &PromotionEvent,
    new_event: &PromotionEvent,
) -> Option<std::collections::BTreeMap<&'static str, FieldDelta>> {
    if old_event.fingerprint == new_event.fingerprint {
        return None;
    }

    let changes: std::collections::BTreeMap<&'static str, FieldDelta> = old_event
        .watched_fields()
        .into_iter()
        .zip(new_event.watched_fields())
        .filter(|((_, before), (_, after))| before != after)
        .map(|((name, before), (_, after))| (name, FieldDelta { before, after }))
        .collect();

    if changes.is_empty() {
        warn!(
            identity_key = %new_event.identity_key,
            old_fingerprint = %old_event.fingerprint,
            new_fingerprint = %new_event.fingerprint,
            "fingerprint drift without field changes, treating as unchanged"
        );
        return None;
    }
    Some(changes)
}
