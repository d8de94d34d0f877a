//! Tracker service: one reconciliation cycle, and the serial scheduler.
//!
//! A cycle is fetch → reconcile → persist, strictly in that order. Source
//! failures are absorbed here and never reach the reconciler; only a store
//! failure aborts a cycle, in which case the persisted state is untouched.

use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::domain::{ChangeDigest, reconcile};
use crate::error::TrackerError;
use crate::persistence::SqliteStore;
use crate::sources::{HttpFetcher, SourceRegistry};

/// Orchestrates scraping, reconciliation, and persistence.
///
/// Single-writer: one cycle completes (or is abandoned) before the next
/// starts. The scheduler loop is strictly serial; runs never overlap.
#[derive(Debug)]
pub struct TrackerService {
    registry: SourceRegistry,
    fetcher: HttpFetcher,
    store: SqliteStore,
}

impl TrackerService {
    /// Creates a service over an already-built registry and store.
    #[must_use]
    pub fn new(registry: SourceRegistry, fetcher: HttpFetcher, store: SqliteStore) -> Self {
        Self {
            registry,
            fetcher,
            store,
        }
    }

    /// Runs one full reconciliation cycle and returns its digest.
    ///
    /// Every enabled source is scraped; a failing source is logged and
    /// contributes zero events. The digest is produced even when some
    /// sources failed.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Store`] if loading or committing persisted
    /// state fails; the snapshot is not replaced in that case.
    pub async fn run_cycle(&self) -> Result<ChangeDigest, TrackerError> {
        let mut all_events = Vec::new();
        for source in self.registry.sources() {
            match source.kind.scrape(&self.fetcher, &source.config).await {
                Ok(events) => {
                    info!(
                        provider = %source.config.provider,
                        count = events.len(),
                        "source scraped"
                    );
                    all_events.extend(events);
                }
                Err(e) => {
                    warn!(
                        provider = %source.config.provider,
                        error = %e,
                        "source failed, contributing zero events this cycle"
                    );
                }
            }
        }

        let old_snapshot = self.store.load_current().await?;
        let outcome = reconcile(&old_snapshot, all_events);
        self.store.commit(&outcome).await?;

        info!(
            new = outcome.digest.new_count,
            updated = outcome.digest.updated_count,
            ended = outcome.digest.ended_count,
            snapshot = outcome.snapshot.len(),
            "cycle complete"
        );
        Ok(outcome.digest)
    }

    /// Runs cycles forever at the registry's minimum poll interval.
    ///
    /// The first cycle runs immediately. A failed cycle is logged and the
    /// loop continues; missed ticks are delayed, never bunched.
    pub async fn run_scheduled(&self) {
        let period = self.registry.poll_interval();
        info!(period_secs = period.as_secs(), "scheduler started");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match self.run_cycle().await {
                Ok(digest) => info!(summary = %digest.summary(), "scheduled cycle finished"),
                Err(e) => error!(error = %e, "scheduled cycle failed"),
            }
        }
    }

    /// Read access to the underlying store.
    #[must_use]
    pub fn store(&self) -> &SqliteStore {
        &self.store
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::promotion_event::{EventType, PromotionEvent};

    async fn service_with_empty_registry() -> TrackerService {
        let Ok(store) = SqliteStore::in_memory().await else {
            panic!("store setup failed");
        };
        TrackerService::new(
            SourceRegistry::from_configs(vec![]),
            HttpFetcher::new("promo-radar-test/0.1"),
            store,
        )
    }

    fn event(title: &str) -> PromotionEvent {
        PromotionEvent::new(
            "openai",
            title,
            EventType::Other,
            "global",
            "https://openai.com/pricing",
        )
        .with_keys()
    }

    #[tokio::test]
    async fn cycle_with_no_sources_and_no_state_is_empty() {
        let service = service_with_empty_registry().await;
        let Ok(digest) = service.run_cycle().await else {
            panic!("cycle failed");
        };
        assert!(digest.is_empty());
    }

    #[tokio::test]
    async fn cycle_ends_promotions_no_longer_observed() {
        let service = service_with_empty_registry().await;
        let seeded = event("old promo");
        assert!(service.store().replace_current(&[seeded]).await.is_ok());

        let Ok(digest) = service.run_cycle().await else {
            panic!("cycle failed");
        };
        assert_eq!(digest.ended_count, 1);
        assert_eq!(digest.new_count, 0);

        let Ok(snapshot) = service.store().load_current().await else {
            panic!("load failed");
        };
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn second_cycle_against_own_state_reports_nothing() {
        let service = service_with_empty_registry().await;
        let Ok(first) = service.run_cycle().await else {
            panic!("cycle failed");
        };
        assert!(first.is_empty());
        let Ok(second) = service.run_cycle().await else {
            panic!("cycle failed");
        };
        assert!(second.is_empty());
    }
}
