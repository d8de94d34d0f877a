//! Promotion event model and its two derived stable identifiers.
//!
//! A [`PromotionEvent`] carries everything one scrape observed about a single
//! promotion. Two hex SHA-256 digests are derived from it:
//!
//! - **identity key** — computed from the immutable descriptive fields only
//!   (provider, normalized title, type, region, source URL). Two observations
//!   with the same identity key are the same real-world promotion at
//!   different points in time.
//! - **fingerprint** — computed from the identity key plus every watched
//!   mutable field. It changes whenever any watched field changes, so equal
//!   fingerprints mean byte-for-byte equivalent observations.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Canonical placeholder for an absent optional field.
///
/// Hashing and field comparison both stringify optional fields through
/// [`canon_opt`]/[`canon_ts`]/[`canon_num`], so presence or absence of a
/// value is itself part of the fingerprint.
const NONE_PLACEHOLDER: &str = "<none>";

/// Separator between fields in hash input. Explicit so that adjacent fields
/// cannot run together and produce accidental collisions.
const FIELD_SEP: &str = "|";

/// Category of a promotion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Free allowance granted on first signup.
    FirstSignupFree,
    /// Time-limited free trial.
    TrialDays,
    /// Percentage discount on a paid plan.
    DiscountPercent,
    /// One-off credit grant.
    CreditBonus,
    /// Recurring monthly free credit.
    MonthlyFreeCredit,
    /// Anything that does not fit the categories above.
    #[default]
    Other,
}

impl EventType {
    /// Stable string form used in hashing and storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FirstSignupFree => "first_signup_free",
            Self::TrialDays => "trial_days",
            Self::DiscountPercent => "discount_percent",
            Self::CreditBonus => "credit_bonus",
            Self::MonthlyFreeCredit => "monthly_free_credit",
            Self::Other => "other",
        }
    }

    /// Parses the stable string form. Unknown strings map to [`Self::Other`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "first_signup_free" => Self::FirstSignupFree,
            "trial_days" => Self::TrialDays,
            "discount_percent" => Self::DiscountPercent,
            "credit_bonus" => Self::CreditBonus,
            "monthly_free_credit" => Self::MonthlyFreeCredit,
            _ => Self::Other,
        }
    }
}

/// One observed promotion event.
///
/// Constructed by a source adapter, then finalized exactly once with
/// [`PromotionEvent::with_keys`] after all descriptive fields are set.
/// Only finalized events may enter reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionEvent {
    /// Provider name (e.g. `"openai"`).
    pub provider: String,
    /// Human-readable promotion title as extracted from the page.
    pub event_title: String,
    /// Promotion category.
    pub event_type: EventType,
    /// Geographic region the promotion applies to.
    pub region: String,
    /// Promotion start, when advertised.
    pub start_at: Option<DateTime<Utc>>,
    /// Promotion end, when advertised.
    pub end_at: Option<DateTime<Utc>>,
    /// Price before the promotion, when advertised.
    pub price_before: Option<f64>,
    /// Price under the promotion, when advertised.
    pub price_after: Option<f64>,
    /// ISO currency code for the prices.
    pub currency: Option<String>,
    /// Credit amount granted, when advertised.
    pub credit_amount: Option<f64>,
    /// Unit of `credit_amount` (e.g. `"days"`, `"percent"`, `"usd"`).
    pub credit_unit: Option<String>,
    /// Eligibility constraints as free text.
    pub eligibility: Option<String>,
    /// Page the event was extracted from.
    pub source_url: String,
    /// When this observation was collected.
    pub collected_at: DateTime<Utc>,
    /// Derived identity key. Empty until [`PromotionEvent::with_keys`] runs.
    pub identity_key: String,
    /// Derived fingerprint. Empty until [`PromotionEvent::with_keys`] runs.
    pub fingerprint: String,
}

impl PromotionEvent {
    /// Creates an event with the required descriptive fields and all
    /// optional fields unset. `collected_at` is set to now.
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        event_title: impl Into<String>,
        event_type: EventType,
        region: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            event_title: event_title.into(),
            event_type,
            region: region.into(),
            start_at: None,
            end_at: None,
            price_before: None,
            price_after: None,
            currency: None,
            credit_amount: None,
            credit_unit: None,
            eligibility: None,
            source_url: source_url.into(),
            collected_at: Utc::now(),
            identity_key: String::new(),
            fingerprint: String::new(),
        }
    }

    /// Computes and populates `identity_key` and `fingerprint`.
    ///
    /// Must be called exactly once, after every descriptive field is final
    /// and before the event enters reconciliation. Pure and deterministic:
    /// calling it again on an unchanged event yields the same keys.
    #[must_use]
    pub fn with_keys(mut self) -> Self {
        self.identity_key = self.compute_identity_key();
        self.fingerprint = self.compute_fingerprint();
        self
    }

    /// Hashes the immutable descriptive fields into the identity key.
    fn compute_identity_key(&self) -> String {
        let normalized = normalize_title(&self.event_title);
        let raw = [
            self.provider.as_str(),
            normalized.as_str(),
            self.event_type.as_str(),
            self.region.as_str(),
            self.source_url.as_str(),
        ]
        .join(FIELD_SEP);
        sha256_hex(&raw)
    }

    /// Hashes the identity key plus every watched mutable field into the
    /// fingerprint.
    fn compute_fingerprint(&self) -> String {
        let mut parts = vec![self.identity_key.clone()];
        parts.extend(self.watched_fields().into_iter().map(|(_, v)| v));
        sha256_hex(&parts.join(FIELD_SEP))
    }

    /// Canonical string form of each watched mutable field, in a fixed
    /// order. Used both for fingerprint input and for field-level change
    /// comparison, so the two can never disagree about equality.
    #[must_use]
    pub fn watched_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("start_at", canon_ts(self.start_at.as_ref())),
            ("end_at", canon_ts(self.end_at.as_ref())),
            ("price_before", canon_num(self.price_before)),
            ("price_after", canon_num(self.price_after)),
            ("currency", canon_opt(self.currency.as_deref())),
            ("credit_amount", canon_num(self.credit_amount)),
            ("credit_unit", canon_opt(self.credit_unit.as_deref())),
            ("eligibility", canon_opt(self.eligibility.as_deref())),
        ]
    }
}

/// Lowercases and collapses whitespace so that cosmetic title differences do
/// not split one promotion into two identities.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    title.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical string form of an optional string field.
fn canon_opt(v: Option<&str>) -> String {
    v.map_or_else(|| NONE_PLACEHOLDER.to_string(), |s| s.to_string())
}

/// Canonical string form of an optional timestamp: RFC 3339 with second
/// precision, UTC designator `Z`. Matches the storage format so values read
/// back from the store canonicalize identically.
fn canon_ts(v: Option<&DateTime<Utc>>) -> String {
    v.map_or_else(
        || NONE_PLACEHOLDER.to_string(),
        |ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

/// Canonical string form of an optional decimal field.
fn canon_num(v: Option<f64>) -> String {
    v.map_or_else(|| NONE_PLACEHOLDER.to_string(), |n| format!("{n}"))
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
