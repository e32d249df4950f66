//! Request and response contracts for the external services.

use prospector_core::targeting::{Category, Location};
use prospector_core::types::DbId;
use serde::{Deserialize, Serialize};

/// One discovery search, scoped to a single location and category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryQuery {
    pub location: Location,
    pub category: Category,
    pub limit: u32,
}

/// A website returned by a discovery search, with whatever the scrape of
/// its landing page produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryHit {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
}

/// SEO metrics for a domain. `raw` keeps the provider payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoMetrics {
    #[serde(default)]
    pub domain_authority: Option<f64>,
    #[serde(default)]
    pub backlinks: Option<i64>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Outcome of verifying one address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailVerification {
    pub deliverable: bool,
    /// Provider confidence on a 0..=100 scale.
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Context handed to the drafting service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftRequest {
    pub prospect_id: DbId,
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub category: Option<Category>,
    pub contact_email: String,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub subject: String,
    pub body: String,
}

/// A finalized message. `dedup_key` is stable per prospect so a repeated
/// send is dropped by the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub dedup_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub message_id: String,
}

/// Dedup key for a prospect's outreach message.
pub fn dedup_key(prospect_id: DbId) -> String {
    format!("prospect-{prospect_id}")
}

/// Lowercased host of a URL without a leading `www.`, or `None` if the
/// URL has no host.
pub fn domain_of(url: &str) -> Option<String> {
    let rest = url.split_once("://").map_or(url, |(_, r)| r);
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.rsplit_once('@').map_or(host, |(_, h)| h);
    let host = host.split(':').next()?.trim().to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    if host.is_empty() || !host.contains('.') {
        None
    } else {
        Some(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_is_normalized() {
        assert_eq!(domain_of("https://www.Acme.io/about?x=1").as_deref(), Some("acme.io"));
        assert_eq!(domain_of("http://shop.acme.io:8080").as_deref(), Some("shop.acme.io"));
        assert_eq!(domain_of("acme.io/path").as_deref(), Some("acme.io"));
        assert_eq!(domain_of("https://localhost"), None);
        assert_eq!(domain_of(""), None);
    }

    #[test]
    fn dedup_key_is_stable_per_prospect() {
        assert_eq!(dedup_key(17), "prospect-17");
    }
}
