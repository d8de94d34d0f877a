//! HTTP fetching for source adapters.
//!
//! All network I/O lives here, before reconciliation ever runs. Each fetch
//! goes through a robots.txt permission check and bounded retries with
//! exponential backoff. A polite delay precedes every request.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Url};
use tracing::{debug, warn};

use super::SourceConfig;
use crate::error::SourceError;

/// Delay before every outgoing request.
const POLITE_DELAY: Duration = Duration::from_millis(500);

/// Shared HTTP client for all source adapters.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    user_agent: String,
}

impl HttpFetcher {
    /// Creates a fetcher identifying itself with `user_agent`.
    #[must_use]
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            user_agent: user_agent.into(),
        }
    }

    /// Checks robots.txt of the target origin before any page fetch.
    ///
    /// Conservative on failure: an unreachable robots.txt denies the fetch,
    /// while a missing one (4xx) allows it. Adapters short-circuit to zero
    /// events when this returns `false`.
    pub async fn can_fetch(&self, config: &SourceConfig) -> bool {
        let Ok(url) = Url::parse(&config.url) else {
            warn!(url = %config.url, "unparseable source url");
            return false;
        };
        let Some(host) = url.host_str() else {
            warn!(url = %config.url, "source url has no host");
            return false;
        };
        let robots_url = match url.port() {
            Some(port) => format!("{}://{host}:{port}/robots.txt", url.scheme()),
            None => format!("{}://{host}/robots.txt", url.scheme()),
        };

        let response = self
            .client
            .get(&robots_url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                let body = resp.text().await.unwrap_or_default();
                robots_allows(&body, &self.user_agent, url.path())
            }
            // No robots.txt published: fetching is permitted.
            Ok(resp) if resp.status().is_client_error() => true,
            Ok(resp) => {
                warn!(robots_url = %robots_url, status = %resp.status(), "robots.txt fetch refused");
                false
            }
            Err(e) => {
                warn!(robots_url = %robots_url, error = %e, "robots.txt unreachable, denying fetch");
                false
            }
        }
    }

    /// Fetches the configured URL with bounded retries and exponential
    /// backoff (2^attempt seconds between attempts).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::FetchFailed`] once `max_retries` retries are
    /// exhausted.
    pub async fn get(&self, config: &SourceConfig) -> Result<String, SourceError> {
        retry_with_backoff(config.max_retries, move || {
            self.get_once(&config.url, config.timeout_seconds)
        })
        .await
    }

    async fn get_once(&self, url: &str, timeout_seconds: u64) -> Result<String, SourceError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .timeout(Duration::from_secs(timeout_seconds))
            .send()
            .await
            .map_err(|e| SourceError::FetchFailed {
                attempts: 1,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::BadStatus(status.as_u16()));
        }
        response.text().await.map_err(|e| SourceError::FetchFailed {
            attempts: 1,
            reason: e.to_string(),
        })
    }
}

/// Runs `attempt` up to `max_retries + 1` times, sleeping the polite delay
/// before each attempt and 2^attempt seconds between failed ones.
///
/// The final error is wrapped in [`SourceError::FetchFailed`] carrying the
/// total attempt count.
async fn retry_with_backoff<T, F, Fut>(max_retries: u32, mut attempt: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut attempts = 0_u32;
    loop {
        tokio::time::sleep(POLITE_DELAY).await;
        attempts += 1;
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if attempts <= max_retries => {
                let backoff = Duration::from_secs(2_u64.saturating_pow(attempts - 1));
                debug!(
                    attempts,
                    backoff_secs = backoff.as_secs(),
                    error = %e,
                    "fetch attempt failed, backing off"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => {
                return Err(SourceError::FetchFailed {
                    attempts,
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Minimal robots.txt evaluation: longest-prefix `Disallow` rules from the
/// groups matching our user agent (or `*`), with `Allow` taking precedence
/// on equal-or-longer prefixes.
fn robots_allows(robots: &str, user_agent: &str, path: &str) -> bool {
    let ua_token = user_agent
        .split('/')
        .next()
        .unwrap_or(user_agent)
        .to_lowercase();

    let mut in_matching_group = false;
    let mut group_has_agent_line = false;
    let mut disallow: Vec<String> = Vec::new();
    let mut allow: Vec<String> = Vec::new();

    for line in robots.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let field = field.trim().to_lowercase();
        let value = value.trim();

        match field.as_str() {
            "user-agent" => {
                let agent = value.to_lowercase();
                // A run of user-agent lines opens a new group.
                if !group_has_agent_line {
                    in_matching_group = false;
                }
                group_has_agent_line = true;
                if agent == "*" || ua_token.contains(&agent) || agent.contains(&ua_token) {
                    in_matching_group = true;
                }
            }
            "disallow" if in_matching_group => {
                group_has_agent_line = false;
                if !value.is_empty() {
                    disallow.push(value.to_string());
                }
            }
            "allow" if in_matching_group => {
                group_has_agent_line = false;
                if !value.is_empty() {
                    allow.push(value.to_string());
                }
            }
            _ => {
                group_has_agent_line = false;
            }
        }
    }

    let longest_match = |rules: &[String]| {
        rules
            .iter()
            .filter(|rule| path.starts_with(rule.as_str()))
            .map(String::len)
            .max()
    };

    match (longest_match(&disallow), longest_match(&allow)) {
        (None, _) => true,
        (Some(d_len), Some(a_len)) => a_len >= d_len,
        (Some(_), None) => false,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retry_exhausts_after_max_retries_with_exponential_backoff() {
        let starts: Mutex<Vec<Duration>> = Mutex::new(Vec::new());
        let origin = tokio::time::Instant::now();

        let starts_ref = &starts;
        let result: Result<String, SourceError> = retry_with_backoff(2, move || async move {
            if let Ok(mut s) = starts_ref.lock() {
                s.push(tokio::time::Instant::now() - origin);
            }
            Err(SourceError::BadStatus(500))
        })
        .await;

        let Err(SourceError::FetchFailed { attempts, reason }) = result else {
            panic!("expected exhausted retries");
        };
        assert_eq!(attempts, 3);
        assert!(reason.contains("500"));

        // Paused clock: attempt times are exact. Polite delay of 500ms
        // before each attempt, backoffs of 1s then 2s between them.
        let Ok(starts) = starts.lock() else {
            panic!("lock poisoned");
        };
        assert_eq!(
            *starts,
            vec![
                Duration::from_millis(500),
                Duration::from_millis(2_000),
                Duration::from_millis(4_500),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retry_stops_as_soon_as_an_attempt_succeeds() {
        let calls = AtomicU32::new(0);

        let calls_ref = &calls;
        let result = retry_with_backoff(5, move || async move {
            if calls_ref.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(SourceError::BadStatus(503))
            } else {
                Ok("body".to_string())
            }
        })
        .await;

        assert_eq!(result.ok().as_deref(), Some("body"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_success_does_not_retry() {
        let calls = AtomicU32::new(0);

        let calls_ref = &calls;
        let result = retry_with_backoff(2, move || async move {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            Ok("body".to_string())
        })
        .await;

        assert_eq!(result.ok().as_deref(), Some("body"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_robots_allows_everything() {
        assert!(robots_allows("", "promo-radar/0.1", "/pricing"));
    }

    #[test]
    fn wildcard_disallow_blocks_matching_path() {
        let robots = "User-agent: *\nDisallow: /pricing\n";
        assert!(!robots_allows(robots, "promo-radar/0.1", "/pricing"));
        assert!(robots_allows(robots, "promo-radar/0.1", "/blog"));
    }

    #[test]
    fn rules_for_other_agents_do_not_apply() {
        let robots = "User-agent: badbot\nDisallow: /\n";
        assert!(robots_allows(robots, "promo-radar/0.1", "/pricing"));
    }

    #[test]
    fn allow_overrides_shorter_disallow() {
        let robots = "User-agent: *\nDisallow: /p\nAllow: /pricing\n";
        assert!(robots_allows(robots, "promo-radar/0.1", "/pricing"));
        assert!(!robots_allows(robots, "promo-radar/0.1", "/private"));
    }

    #[test]
    fn named_group_applies_to_our_agent() {
        let robots = "User-agent: promo-radar\nDisallow: /\n";
        assert!(!robots_allows(robots, "promo-radar/0.1", "/pricing"));
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let robots = "# nothing to see\n\nUser-agent: * # all\nDisallow:\n";
        assert!(robots_allows(robots, "promo-radar/0.1", "/pricing"));
    }
}
