//! External-service adapters for the prospecting pipeline.
//!
//! - [`traits`]: the seams handlers depend on.
//! - [`http`]: JSON-over-HTTP clients built on `reqwest`.
//! - [`offline`]: stand-ins for services without a configured URL.
//! - [`Adapters`]: the bundle handed to the pipeline; every call through
//!   it is bounded by a timeout.

pub mod error;
pub mod http;
pub mod offline;
pub mod traits;
pub mod types;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use error::{AdapterError, AdapterResult};
use http::{HttpDiscovery, HttpDrafter, HttpSender, HttpSeo, HttpVerifier, JsonClient};
use offline::{DisabledSender, NoopDiscovery, NoopSeo, NoopVerifier, TemplateDrafter};
use traits::{DynDiscoverySource, DynDrafter, DynEmailVerifier, DynMailSender, DynSeoProvider};
use types::{
    DiscoveryHit, DiscoveryQuery, Draft, DraftRequest, EmailVerification, OutboundMessage,
    SendReceipt, SeoMetrics,
};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Base URLs and credentials for the external services. A missing URL
/// selects the [`offline`] stand-in for that service.
#[derive(Debug, Clone, Default)]
pub struct AdapterConfig {
    pub discovery_url: Option<String>,
    pub seo_url: Option<String>,
    pub verifier_url: Option<String>,
    pub drafter_url: Option<String>,
    pub sender_url: Option<String>,
    /// Bearer token sent to every configured service.
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
}

/// Run `call`, mapping an elapsed deadline onto [`AdapterError::Timeout`].
pub async fn with_timeout<T, F>(service: &'static str, after: Duration, call: F) -> AdapterResult<T>
where
    F: Future<Output = AdapterResult<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(AdapterError::Timeout { service, after }),
    }
}

/// The full set of adapters, shared via `Arc` across handlers.
#[derive(Clone)]
pub struct Adapters {
    pub discovery: DynDiscoverySource,
    pub seo: DynSeoProvider,
    pub verifier: DynEmailVerifier,
    pub drafter: DynDrafter,
    pub sender: DynMailSender,
    pub timeout: Duration,
}

impl std::fmt::Debug for Adapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapters")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Adapters {
    /// All offline stand-ins.
    pub fn offline() -> Self {
        Self {
            discovery: Arc::new(NoopDiscovery),
            seo: Arc::new(NoopSeo),
            verifier: Arc::new(NoopVerifier),
            drafter: Arc::new(TemplateDrafter),
            sender: Arc::new(DisabledSender),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// HTTP clients for every configured URL, offline stand-ins otherwise.
    pub fn from_config(config: &AdapterConfig) -> Self {
        let timeout = config.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = reqwest::Client::new();
        let json = |service: &'static str, url: &str| {
            JsonClient::new(client.clone(), service, url, config.api_key.clone(), timeout)
        };

        let mut adapters = Self::offline().with_timeout(timeout);
        if let Some(url) = &config.discovery_url {
            adapters.discovery = Arc::new(HttpDiscovery(json("discovery", url)));
        }
        if let Some(url) = &config.seo_url {
            adapters.seo = Arc::new(HttpSeo(json("seo", url)));
        }
        if let Some(url) = &config.verifier_url {
            adapters.verifier = Arc::new(HttpVerifier(json("verifier", url)));
        }
        if let Some(url) = &config.drafter_url {
            adapters.drafter = Arc::new(HttpDrafter(json("drafter", url)));
        }
        if let Some(url) = &config.sender_url {
            adapters.sender = Arc::new(HttpSender(json("sender", url)));
        } else {
            tracing::warn!("SENDER_URL not set, send jobs will leave prospects in DRAFTED");
        }
        adapters
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    // ---- timed calls ----

    pub async fn search(&self, query: &DiscoveryQuery) -> AdapterResult<Vec<DiscoveryHit>> {
        with_timeout("discovery", self.timeout, self.discovery.search(query)).await
    }

    pub async fn metrics(&self, domain: &str) -> AdapterResult<SeoMetrics> {
        with_timeout("seo", self.timeout, self.seo.metrics(domain)).await
    }

    pub async fn verify(&self, email: &str) -> AdapterResult<EmailVerification> {
        with_timeout("verifier", self.timeout, self.verifier.verify(email)).await
    }

    pub async fn draft(&self, request: &DraftRequest) -> AdapterResult<Draft> {
        with_timeout("drafter", self.timeout, self.drafter.draft(request)).await
    }

    pub async fn send(&self, message: &OutboundMessage) -> AdapterResult<SendReceipt> {
        with_timeout("sender", self.timeout, self.sender.send(message)).await
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;
    use crate::traits::SeoProvider;

    struct Stalled;

    #[async_trait]
    impl SeoProvider for Stalled {
        async fn metrics(&self, _domain: &str) -> AdapterResult<SeoMetrics> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("the timeout fires first")
        }
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let mut adapters = Adapters::offline().with_timeout(Duration::from_millis(50));
        adapters.seo = Arc::new(Stalled);
        assert_matches!(
            adapters.metrics("acme.io").await,
            Err(AdapterError::Timeout { service: "seo", .. })
        );
    }

    #[tokio::test]
    async fn offline_bundle_answers_without_io() {
        let adapters = Adapters::offline();
        let metrics = adapters.metrics("acme.io").await.unwrap();
        assert!(metrics.domain_authority.is_none());
        let verification = adapters.verify("hi@acme.io").await.unwrap();
        assert!(!verification.deliverable);
    }
}
