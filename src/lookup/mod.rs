//! Outbound price lookups
//!
//! Defines the result model for a single identifier lookup, the
//! `PriceClient` trait that abstracts the upstream endpoint (so tests can
//! substitute fakes), and the retry policy applied to transient failures.

mod config;
mod http;
mod retry;

pub use config::LookupConfig;
pub use http::HttpPriceClient;
pub use retry::{RetryDecision, RetryPolicy};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Terminal classification of one identifier lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupOutcome {
    /// Upstream returned a product with price data
    Success,
    /// Upstream answered but does not carry the item
    NotFound,
    /// Lookup could not be completed (retries exhausted, rate-limit wait
    /// exceeded, or credential rejected)
    Failed,
}

/// Product fields returned by the upstream endpoint on a successful lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub available: bool,
    pub category: String,
    pub image_url: Option<String>,
    pub current_price: Option<f64>,
    pub original_price: Option<f64>,
    pub discount_percentage: Option<u32>,
    pub unit_price: Option<f64>,
    pub unit_label: Option<String>,
    pub currency: String,
}

/// Stored result of one identifier lookup
///
/// At most one current result exists per (session, identifier); a retry of
/// the same identifier overwrites the prior row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResult {
    pub identifier: String,
    /// Submission-order index within the session, used for stable snapshots
    pub position: u64,
    pub outcome: LookupOutcome,
    /// Current price, when the lookup succeeded and the product has one
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductDetails>,
    pub attempts: u32,
    pub fetched_at: DateTime<Utc>,
    /// Terminal failure reason; never contains credentials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LookupResult {
    pub fn success(
        identifier: impl Into<String>,
        position: u64,
        product: ProductDetails,
        attempts: u32,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            position,
            outcome: LookupOutcome::Success,
            price: product.current_price,
            product: Some(product),
            attempts,
            fetched_at,
            error: None,
        }
    }

    pub fn not_found(
        identifier: impl Into<String>,
        position: u64,
        attempts: u32,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            position,
            outcome: LookupOutcome::NotFound,
            price: None,
            product: None,
            attempts,
            fetched_at,
            error: None,
        }
    }

    pub fn failed(
        identifier: impl Into<String>,
        position: u64,
        reason: impl Into<String>,
        attempts: u32,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            position,
            outcome: LookupOutcome::Failed,
            price: None,
            product: None,
            attempts,
            fetched_at,
            error: Some(reason.into()),
        }
    }

    /// Whether this lookup reached the upstream and got an answer
    pub fn is_resolved(&self) -> bool {
        matches!(self.outcome, LookupOutcome::Success | LookupOutcome::NotFound)
    }
}

/// Upstream answer for one identifier
#[derive(Debug, Clone, PartialEq)]
pub enum LookupReply {
    Found(ProductDetails),
    NotCarried,
}

/// Failure of one lookup attempt
#[derive(Debug, Clone, thiserror::Error)]
pub enum LookupError {
    /// Credential rejected by the upstream; not retryable
    #[error("upstream rejected the session credential")]
    AuthInvalid,

    /// Timeout, connection failure, or upstream 5xx; retryable
    #[error("transient lookup failure: {0}")]
    Transient(String),
}

/// Client for the external pricing endpoint
///
/// One call performs one identifier lookup using the caller's session
/// credential. Implementations must be safe to share across workers.
#[async_trait]
pub trait PriceClient: Send + Sync {
    async fn fetch(
        &self,
        auth_token: &SecretString,
        identifier: &str,
    ) -> std::result::Result<LookupReply, LookupError>;
}
