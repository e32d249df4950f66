//! JSON-over-HTTP clients for the external services, using [`reqwest`].
//!
//! | Service      | Request                          |
//! |--------------|----------------------------------|
//! | discovery    | `POST {base}/search`             |
//! | seo          | `GET  {base}/metrics?domain=...` |
//! | verifier     | `POST {base}/verify`             |
//! | drafter      | `POST {base}/draft`              |
//! | sender       | `POST {base}/send` + `Idempotency-Key` header |

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{AdapterError, AdapterResult};
use crate::traits::{DiscoverySource, Drafter, EmailVerifier, MailSender, SeoProvider};
use crate::types::{
    DiscoveryHit, DiscoveryQuery, Draft, DraftRequest, EmailVerification, OutboundMessage,
    SendReceipt, SeoMetrics,
};

/// Header carrying the send dedup key.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// HTTP client bound to one service's base URL.
#[derive(Debug, Clone)]
pub struct JsonClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    service: &'static str,
    timeout: Duration,
}

impl JsonClient {
    /// Create a client for `service` at `base_url`. The request timeout is
    /// applied by `reqwest` as well as by [`crate::Adapters`].
    pub fn new(
        client: reqwest::Client,
        service: &'static str,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            service,
            timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.timeout(self.timeout);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn post<B, T>(&self, path: &str, body: &B, headers: &[(&str, &str)]) -> AdapterResult<T>
    where
        B: serde::Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let mut request = self.authorize(self.client.post(self.url(path))).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(self.service, e, self.timeout))?;
        self.parse_response(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> AdapterResult<T> {
        let response = self
            .authorize(self.client.get(self.url(path)))
            .query(query)
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(self.service, e, self.timeout))?;
        self.parse_response(response).await
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or a classified error
    /// carrying the status and body text.
    async fn ensure_success(&self, response: reqwest::Response) -> AdapterResult<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(AdapterError::from_status(self.service, status.as_u16(), body));
        }
        Ok(response)
    }

    async fn parse_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> AdapterResult<T> {
        let response = self.ensure_success(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| AdapterError::Transient {
                service: self.service,
                message: format!("unreadable response: {e}"),
            })
    }
}

// ---------------------------------------------------------------------------
// Service clients
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<DiscoveryHit>,
}

#[derive(Debug, Clone)]
pub struct HttpDiscovery(pub JsonClient);

#[async_trait]
impl DiscoverySource for HttpDiscovery {
    async fn search(&self, query: &DiscoveryQuery) -> AdapterResult<Vec<DiscoveryHit>> {
        let response: SearchResponse = self.0.post("search", query, &[]).await?;
        Ok(response.results)
    }
}

#[derive(Debug, Clone)]
pub struct HttpSeo(pub JsonClient);

#[async_trait]
impl SeoProvider for HttpSeo {
    async fn metrics(&self, domain: &str) -> AdapterResult<SeoMetrics> {
        let raw: serde_json::Value = self.0.get("metrics", &[("domain", domain)]).await?;
        let mut metrics: SeoMetrics =
            serde_json::from_value(raw.clone()).map_err(|e| AdapterError::Transient {
                service: self.0.service,
                message: format!("unreadable metrics: {e}"),
            })?;
        metrics.raw = raw;
        Ok(metrics)
    }
}

#[derive(Debug, Clone)]
pub struct HttpVerifier(pub JsonClient);

#[async_trait]
impl EmailVerifier for HttpVerifier {
    async fn verify(&self, email: &str) -> AdapterResult<EmailVerification> {
        let body = serde_json::json!({ "email": email });
        let raw: serde_json::Value = self.0.post("verify", &body, &[]).await?;
        let mut verification: EmailVerification =
            serde_json::from_value(raw.clone()).map_err(|e| AdapterError::Transient {
                service: self.0.service,
                message: format!("unreadable verification: {e}"),
            })?;
        verification.raw = raw;
        Ok(verification)
    }
}

#[derive(Debug, Clone)]
pub struct HttpDrafter(pub JsonClient);

#[async_trait]
impl Drafter for HttpDrafter {
    async fn draft(&self, request: &DraftRequest) -> AdapterResult<Draft> {
        self.0.post("draft", request, &[]).await
    }
}

#[derive(Debug, Clone)]
pub struct HttpSender(pub JsonClient);

#[async_trait]
impl MailSender for HttpSender {
    async fn send(&self, message: &OutboundMessage) -> AdapterResult<SendReceipt> {
        self.0
            .post("send", message, &[(IDEMPOTENCY_HEADER, message.dedup_key.as_str())])
            .await
    }
}
