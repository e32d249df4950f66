//! Adapter seams. Handlers depend only on these traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AdapterResult;
use crate::types::{
    DiscoveryHit, DiscoveryQuery, Draft, DraftRequest, EmailVerification, OutboundMessage,
    SendReceipt, SeoMetrics,
};

#[async_trait]
pub trait DiscoverySource: Send + Sync {
    async fn search(&self, query: &DiscoveryQuery) -> AdapterResult<Vec<DiscoveryHit>>;
}

#[async_trait]
pub trait SeoProvider: Send + Sync {
    async fn metrics(&self, domain: &str) -> AdapterResult<SeoMetrics>;
}

#[async_trait]
pub trait EmailVerifier: Send + Sync {
    async fn verify(&self, email: &str) -> AdapterResult<EmailVerification>;
}

#[async_trait]
pub trait Drafter: Send + Sync {
    async fn draft(&self, request: &DraftRequest) -> AdapterResult<Draft>;
}

#[async_trait]
pub trait MailSender: Send + Sync {
    /// Send a message. Providers must drop a second message carrying the
    /// same `dedup_key`.
    async fn send(&self, message: &OutboundMessage) -> AdapterResult<SendReceipt>;
}

pub type DynDiscoverySource = Arc<dyn DiscoverySource>;
pub type DynSeoProvider = Arc<dyn SeoProvider>;
pub type DynEmailVerifier = Arc<dyn EmailVerifier>;
pub type DynDrafter = Arc<dyn Drafter>;
pub type DynMailSender = Arc<dyn MailSender>;
