//! OpenAI pricing-page adapter.
//!
//! Keyword-level heuristic only: when the page mentions free/trial/discount
//! wording, one `Other` event is emitted pointing a human at the page.
//! Extraction precision is deliberately out of scope.

use tracing::info;

use super::{HttpFetcher, SourceConfig, strip_tags};
use crate::domain::promotion_event::{EventType, PromotionEvent};
use crate::error::SourceError;

const KEYWORDS: [&str; 3] = ["free", "trial", "discount"];

/// Scrapes the configured OpenAI page.
///
/// # Errors
///
/// Returns [`SourceError`] when the fetch fails after all retries.
pub async fn scrape(
    fetcher: &HttpFetcher,
    config: &SourceConfig,
) -> Result<Vec<PromotionEvent>, SourceError> {
    if !fetcher.can_fetch(config).await {
        info!(provider = %config.provider, url = %config.url, "robots.txt denies fetch");
        return Ok(Vec::new());
    }

    let html = fetcher.get(config).await?;
    let text = strip_tags(&html).to_lowercase();

    let mut events = Vec::new();
    if KEYWORDS.iter().any(|k| text.contains(k)) {
        let mut event = PromotionEvent::new(
            config.provider.clone(),
            "OpenAI pricing page mention (keyword-detected)",
            EventType::Other,
            config.region.clone(),
            config.url.clone(),
        );
        event.eligibility = Some("Check official terms".to_string());
        events.push(event.with_keys());
    }
    Ok(events)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn keyword_page_text_is_detected() {
        let text = strip_tags("<p>Start your free trial today</p>").to_lowercase();
        assert!(KEYWORDS.iter().any(|k| text.contains(k)));
    }

    #[test]
    fn plain_pricing_text_is_not_detected() {
        let text = strip_tags("<p>Plans start at $20 per month</p>").to_lowercase();
        assert!(!KEYWORDS.iter().any(|k| text.contains(k)));
    }
}
