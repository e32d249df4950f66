//! Adapters used when a service has no base URL configured.
//!
//! Discovery finds nothing, SEO lookups return no metrics, verification
//! reports every address undeliverable, drafting fills a fixed template,
//! and sending is refused. Nothing here performs I/O.

use async_trait::async_trait;

use crate::error::{AdapterError, AdapterResult};
use crate::traits::{DiscoverySource, Drafter, EmailVerifier, MailSender, SeoProvider};
use crate::types::{
    DiscoveryHit, DiscoveryQuery, Draft, DraftRequest, EmailVerification, OutboundMessage,
    SendReceipt, SeoMetrics,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiscovery;

#[async_trait]
impl DiscoverySource for NoopDiscovery {
    async fn search(&self, query: &DiscoveryQuery) -> AdapterResult<Vec<DiscoveryHit>> {
        tracing::debug!(
            location = %query.location,
            category = %query.category,
            "Discovery service not configured, returning no results",
        );
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSeo;

#[async_trait]
impl SeoProvider for NoopSeo {
    async fn metrics(&self, _domain: &str) -> AdapterResult<SeoMetrics> {
        Ok(SeoMetrics {
            domain_authority: None,
            backlinks: None,
            raw: serde_json::Value::Null,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopVerifier;

#[async_trait]
impl EmailVerifier for NoopVerifier {
    async fn verify(&self, _email: &str) -> AdapterResult<EmailVerification> {
        Ok(EmailVerification {
            deliverable: false,
            confidence: None,
            raw: serde_json::json!({ "reason": "verifier not configured" }),
        })
    }
}

/// Fills a plain outreach template from the prospect context.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateDrafter;

#[async_trait]
impl Drafter for TemplateDrafter {
    async fn draft(&self, request: &DraftRequest) -> AdapterResult<Draft> {
        let site = request.title.as_deref().unwrap_or(&request.domain);
        Ok(Draft {
            subject: format!("A quick idea for {site}"),
            body: format!(
                "Hi,\n\nI came across {url} and thought our work could be a good fit \
                 for your audience. Would you be open to a short conversation?\n\nBest regards",
                url = request.url,
            ),
        })
    }
}

/// Refuses every send; outreach needs a configured mail service.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSender;

#[async_trait]
impl MailSender for DisabledSender {
    async fn send(&self, message: &OutboundMessage) -> AdapterResult<SendReceipt> {
        tracing::warn!(dedup_key = %message.dedup_key, "Mail service not configured, send refused");
        Err(AdapterError::Transient {
            service: "sender",
            message: "mail service not configured".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn template_uses_title_then_domain() {
        let mut request = DraftRequest {
            prospect_id: 1,
            url: "https://acme.io".into(),
            domain: "acme.io".into(),
            title: Some("Acme Cloud".into()),
            category: None,
            contact_email: "hi@acme.io".into(),
            score: Some(70.0),
        };
        let draft = TemplateDrafter.draft(&request).await.unwrap();
        assert_eq!(draft.subject, "A quick idea for Acme Cloud");
        assert!(draft.body.contains("https://acme.io"));

        request.title = None;
        let draft = TemplateDrafter.draft(&request).await.unwrap();
        assert_eq!(draft.subject, "A quick idea for acme.io");
    }

    #[tokio::test]
    async fn disabled_sender_never_reports_success() {
        let message = OutboundMessage {
            to: "hi@acme.io".into(),
            subject: "s".into(),
            body: "b".into(),
            dedup_key: "prospect-1".into(),
        };
        let err = DisabledSender.send(&message).await.unwrap_err();
        assert!(!err.is_rejected());
    }
}
