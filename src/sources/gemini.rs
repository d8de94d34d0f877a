//! Gemini promotion-page adapter.
//!
//! Regex heuristics over the flattened page text: "N months free/trial"
//! becomes a trial event, "N% off" becomes a discount event, and a page
//! that mentions promo keywords without matching either pattern yields a
//! single keyword-detected fallback event.

use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use super::{HttpFetcher, SourceConfig, strip_tags};
use crate::domain::promotion_event::{EventType, PromotionEvent};
use crate::error::SourceError;

#[allow(clippy::expect_used)]
static MONTHS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})\s*-?\s*months?\s*(?:free|trial|discount)")
        .expect("static pattern compiles")
});

#[allow(clippy::expect_used)]
static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,3})\s*%\s*(?:off|discount)").expect("static pattern compiles")
});

const KEYWORDS: [&str; 4] = ["free", "trial", "discount", "credit"];

/// Scrapes the configured Gemini page.
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
    Ok(extract(&html, config))
}

/// Pure extraction over the raw page body.
fn extract(html: &str, config: &SourceConfig) -> Vec<PromotionEvent> {
    let text = strip_tags(html).to_lowercase();
    let mut events = Vec::new();

    for captures in MONTHS_RE.captures_iter(&text) {
        let Some(months) = captures.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) else {
            continue;
        };
        let mut event = PromotionEvent::new(
            config.provider.clone(),
            format!("Gemini promo {months} months"),
            EventType::TrialDays,
            config.region.clone(),
            config.url.clone(),
        );
        event.credit_amount = Some(months * 30.0);
        event.credit_unit = Some("days".to_string());
        event.eligibility = Some("Check official terms".to_string());
        events.push(event.with_keys());
    }

    for captures in PERCENT_RE.captures_iter(&text) {
        let Some(pct) = captures.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) else {
            continue;
        };
        let mut event = PromotionEvent::new(
            config.provider.clone(),
            format!("Gemini discount {pct}%"),
            EventType::DiscountPercent,
            config.region.clone(),
            config.url.clone(),
        );
        event.credit_amount = Some(pct);
        event.credit_unit = Some("percent".to_string());
        event.eligibility = Some("Check official terms".to_string());
        events.push(event.with_keys());
    }

    if events.is_empty() && KEYWORDS.iter().any(|k| text.contains(k)) {
        let mut event = PromotionEvent::new(
            config.provider.clone(),
            "Gemini promotion mention (keyword-detected)",
            EventType::Other,
            config.region.clone(),
            config.url.clone(),
        );
        event.eligibility = Some("Check official terms".to_string());
        events.push(event.with_keys());
    }

    events
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn config() -> SourceConfig {
        SourceConfig {
            provider: "gemini".to_string(),
            kind: "gemini".to_string(),
            url: "https://gemini.google.com/advanced".to_string(),
            region: "global".to_string(),
            enabled: true,
            timeout_seconds: 20,
            max_retries: 2,
            poll_interval_minutes: 720,
        }
    }

    #[test]
    fn months_pattern_yields_trial_event() {
        let events = extract("<p>Get 2 months free with Gemini Advanced</p>", &config());
        assert_eq!(events.len(), 1);
        let Some(event) = events.first() else {
            panic!("expected one event");
        };
        assert_eq!(event.event_type, EventType::TrialDays);
        assert_eq!(event.credit_amount, Some(60.0));
        assert_eq!(event.credit_unit.as_deref(), Some("days"));
        assert!(!event.identity_key.is_empty());
        assert!(!event.fingerprint.is_empty());
    }

    #[test]
    fn percent_pattern_yields_discount_event() {
        let events = extract("Students get 50% off the annual plan", &config());
        assert_eq!(events.len(), 1);
        let Some(event) = events.first() else {
            panic!("expected one event");
        };
        assert_eq!(event.event_type, EventType::DiscountPercent);
        assert_eq!(event.credit_amount, Some(50.0));
        assert_eq!(event.credit_unit.as_deref(), Some("percent"));
    }

    #[test]
    fn keyword_fallback_when_no_structured_match() {
        let events = extract("<div>Limited credit offer for new users</div>", &config());
        assert_eq!(events.len(), 1);
        assert_eq!(events.first().map(|e| e.event_type), Some(EventType::Other));
    }

    #[test]
    fn silent_page_yields_no_events() {
        let events = extract("<p>Gemini is a large language model.</p>", &config());
        assert!(events.is_empty());
    }

    #[test]
    fn multiple_patterns_yield_multiple_events() {
        let events = extract("3 months free now, or 20% off annual billing", &config());
        assert_eq!(events.len(), 2);
    }
}
