//! Handler behaviour against the in-memory store and scripted adapters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use prospector_adapters::traits::{DiscoverySource, EmailVerifier, MailSender, SeoProvider};
use prospector_adapters::types::{
    DiscoveryHit, DiscoveryQuery, EmailVerification, OutboundMessage, SendReceipt, SeoMetrics,
};
use prospector_adapters::{AdapterError, AdapterResult, Adapters};
use prospector_core::error::CoreError;
use prospector_core::job::{JobParameters, JobType, OutcomeKind};
use prospector_core::stage::{Stage, VerificationStatus};
use prospector_core::targeting::{Category, Location};
use prospector_core::types::DbId;
use prospector_db::models::job::{Job, NewJob};
use prospector_db::models::prospect::{NewProspect, Prospect};
use prospector_db::{JobStore, MemoryStore, ProspectStore};
use prospector_pipeline::{run_job, PipelineContext, PipelineError, PipelineSettings};
use serde_json::json;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Scripted adapters
// ---------------------------------------------------------------------------

struct FixedSeo(fn() -> AdapterResult<SeoMetrics>);

#[async_trait]
impl SeoProvider for FixedSeo {
    async fn metrics(&self, _domain: &str) -> AdapterResult<SeoMetrics> {
        (self.0)()
    }
}

/// Never answers within a test's lifetime.
struct StalledSeo;

#[async_trait]
impl SeoProvider for StalledSeo {
    async fn metrics(&self, _domain: &str) -> AdapterResult<SeoMetrics> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Err(AdapterError::Transient {
            service: "seo",
            message: "unreachable".into(),
        })
    }
}

#[derive(Default)]
struct CountingVerifier {
    calls: AtomicUsize,
}

#[async_trait]
impl EmailVerifier for CountingVerifier {
    async fn verify(&self, _email: &str) -> AdapterResult<EmailVerification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(EmailVerification {
            deliverable: true,
            confidence: Some(90.0),
            raw: json!({"result": "deliverable"}),
        })
    }
}

/// Deliverable, but the provider reports no confidence or details.
struct UnratedVerifier;

#[async_trait]
impl EmailVerifier for UnratedVerifier {
    async fn verify(&self, _email: &str) -> AdapterResult<EmailVerification> {
        Ok(EmailVerification {
            deliverable: true,
            confidence: None,
            raw: serde_json::Value::Null,
        })
    }
}

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<OutboundMessage>>,
}

#[async_trait]
impl MailSender for RecordingSender {
    async fn send(&self, message: &OutboundMessage) -> AdapterResult<SendReceipt> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(SendReceipt {
            message_id: format!("msg-{}", sent.len()),
        })
    }
}

struct FixedDiscovery(Vec<DiscoveryHit>);

#[async_trait]
impl DiscoverySource for FixedDiscovery {
    async fn search(&self, _query: &DiscoveryQuery) -> AdapterResult<Vec<DiscoveryHit>> {
        Ok(self.0.clone())
    }
}

fn hit(url: &str, email: Option<&str>) -> DiscoveryHit {
    DiscoveryHit {
        url: url.to_string(),
        title: Some("Acme Cloud Platform".into()),
        contact_email: email.map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn context(store: &Arc<MemoryStore>, adapters: Adapters) -> PipelineContext {
    PipelineContext::new(store.clone(), adapters, PipelineSettings::default())
}

/// Insert a prospect and place it at `stage` with `edit` applied.
async fn prospect_at(
    store: &MemoryStore,
    domain: &str,
    stage: Stage,
    edit: impl FnOnce(&mut Prospect),
) -> Prospect {
    let created = store
        .upsert_prospect(&NewProspect {
            url: format!("https://{domain}"),
            domain: domain.to_string(),
            category: Some(Category::Saas),
            location: Some(Location::UnitedStates),
            ..Default::default()
        })
        .await
        .unwrap();
    let mut prospect = created.prospect;
    prospect.stage = stage;
    edit(&mut prospect);
    store.put_prospect(prospect.clone()).await;
    prospect
}

async fn claimed(store: &MemoryStore, input: NewJob) -> Job {
    let job_type = input.job_type;
    store.insert_job(&input).await.unwrap();
    store.claim_next(job_type).await.unwrap().unwrap()
}

async fn reload(store: &MemoryStore, id: DbId) -> Prospect {
    store.find_prospect(id).await.unwrap().unwrap()
}

// ---------------------------------------------------------------------------
// Enrich and score
// ---------------------------------------------------------------------------

#[tokio::test]
async fn enrich_writes_metrics_and_advances() {
    let store = Arc::new(MemoryStore::new());
    let p = prospect_at(&store, "acme.io", Stage::Scraped, |_| {}).await;
    let mut adapters = Adapters::offline();
    adapters.seo = Arc::new(FixedSeo(|| {
        Ok(SeoMetrics {
            domain_authority: Some(55.0),
            backlinks: Some(1200),
            raw: json!({"da": 55}),
        })
    }));

    let job = claimed(&store, NewJob::manual(JobType::Enrich, vec![])).await;
    let summary = run_job(&context(&store, adapters), &job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    let p = reload(&store, p.id).await;
    assert_eq!(p.stage, Stage::Enriched);
    assert_eq!(p.domain_authority, Some(55.0));
    assert_eq!(p.metrics, Some(json!({"da": 55})));
}

#[tokio::test]
async fn rejected_lookup_moves_prospect_to_failed() {
    let store = Arc::new(MemoryStore::new());
    let p = prospect_at(&store, "acme.io", Stage::Scraped, |_| {}).await;
    let mut adapters = Adapters::offline();
    adapters.seo = Arc::new(FixedSeo(|| {
        Err(AdapterError::Rejected {
            service: "seo",
            status: 404,
            message: "unknown domain".into(),
        })
    }));

    let job = claimed(&store, NewJob::manual(JobType::Enrich, vec![])).await;
    let summary = run_job(&context(&store, adapters), &job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    let p = reload(&store, p.id).await;
    assert_eq!(p.stage, Stage::Failed);
    assert_eq!(p.failed_from, Some(Stage::Scraped));
    assert!(p.last_error.unwrap().contains("unknown domain"));
}

#[tokio::test]
async fn transient_error_leaves_prospect_in_place() {
    let store = Arc::new(MemoryStore::new());
    let p = prospect_at(&store, "acme.io", Stage::Scraped, |_| {}).await;
    let mut adapters = Adapters::offline();
    adapters.seo = Arc::new(FixedSeo(|| {
        Err(AdapterError::Transient {
            service: "seo",
            message: "HTTP 503".into(),
        })
    }));

    let job = claimed(&store, NewJob::manual(JobType::Enrich, vec![])).await;
    let summary = run_job(&context(&store, adapters), &job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    let p = reload(&store, p.id).await;
    assert_eq!(p.stage, Stage::Scraped);
    assert_eq!(p.failed_from, None);
}

#[tokio::test]
async fn score_writes_score_and_breakdown() {
    let store = Arc::new(MemoryStore::new());
    let p = prospect_at(&store, "acme.io", Stage::Enriched, |p| {
        p.domain_authority = Some(70.0);
        p.contact_email = Some("hello@acme.io".into());
    })
    .await;

    let job = claimed(&store, NewJob::manual(JobType::Score, vec![p.id])).await;
    run_job(&context(&store, Adapters::offline()), &job, &CancellationToken::new())
        .await
        .unwrap();

    let p = reload(&store, p.id).await;
    assert_eq!(p.stage, Stage::Scored);
    let score = p.score.unwrap();
    assert!((0.0..=100.0).contains(&score));
    assert!(p.score_breakdown.is_some());
}

// ---------------------------------------------------------------------------
// Verify
// ---------------------------------------------------------------------------

#[tokio::test]
async fn verify_without_email_makes_no_call() {
    let store = Arc::new(MemoryStore::new());
    let p = prospect_at(&store, "acme.io", Stage::Scored, |p| p.score = Some(30.0)).await;
    let verifier = Arc::new(CountingVerifier::default());
    let mut adapters = Adapters::offline();
    adapters.verifier = verifier.clone();

    let job = claimed(&store, NewJob::manual(JobType::Verify, vec![])).await;
    run_job(&context(&store, adapters), &job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    let p = reload(&store, p.id).await;
    assert_eq!(p.stage, Stage::Unverified);
    assert_eq!(p.verification_status, VerificationStatus::Unverified);
}

#[tokio::test]
async fn verify_deliverable_rescores_in_same_write() {
    let store = Arc::new(MemoryStore::new());
    let p = prospect_at(&store, "acme.io", Stage::Scored, |p| {
        p.contact_email = Some("hello@acme.io".into());
        p.score = Some(10.0);
    })
    .await;
    let verifier = Arc::new(CountingVerifier::default());
    let mut adapters = Adapters::offline();
    adapters.verifier = verifier.clone();

    let job = claimed(&store, NewJob::manual(JobType::Verify, vec![p.id])).await;
    run_job(&context(&store, adapters), &job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    let p = reload(&store, p.id).await;
    assert_eq!(p.stage, Stage::Verified);
    assert_eq!(p.verification_confidence, Some(90.0));
    assert!(p.score_breakdown.unwrap().email_confidence > 0.0);
    assert_ne!(p.score, Some(10.0));
}

#[tokio::test]
async fn reverify_replaces_the_previous_confidence() {
    let store = Arc::new(MemoryStore::new());
    let p = prospect_at(&store, "acme.io", Stage::Verified, |p| {
        p.contact_email = Some("hello@acme.io".into());
        p.verification_status = VerificationStatus::Verified;
        p.verification_confidence = Some(90.0);
        p.verification = Some(json!({"result": "deliverable"}));
    })
    .await;
    let mut adapters = Adapters::offline();
    adapters.verifier = Arc::new(UnratedVerifier);

    let mut input = NewJob::manual(JobType::Verify, vec![p.id]);
    input.parameters.reprocess = true;
    let job = claimed(&store, input).await;
    run_job(&context(&store, adapters), &job, &CancellationToken::new())
        .await
        .unwrap();

    let p = reload(&store, p.id).await;
    assert_eq!(p.stage, Stage::Verified);
    assert_eq!(p.verification_confidence, None);
    assert_eq!(p.verification, None);
    // A known email with no reported confidence scores the neutral 50.
    assert_eq!(p.score_breakdown.unwrap().email_confidence, 50.0);
}

// ---------------------------------------------------------------------------
// Draft and send
// ---------------------------------------------------------------------------

fn verified(p: &mut Prospect) {
    p.contact_email = Some("hello@acme.io".into());
    p.verification_status = VerificationStatus::Verified;
    p.score = Some(75.0);
}

#[tokio::test]
async fn draft_below_threshold_is_skipped() {
    let store = Arc::new(MemoryStore::new());
    let p = prospect_at(&store, "acme.io", Stage::Verified, |p| {
        verified(p);
        p.score = Some(12.0);
    })
    .await;

    let job = claimed(&store, NewJob::manual(JobType::Draft, vec![p.id])).await;
    let summary = run_job(&context(&store, Adapters::offline()), &job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.outcomes[0].outcome, OutcomeKind::Skipped);
    assert_eq!(reload(&store, p.id).await.stage, Stage::Verified);
}

#[tokio::test]
async fn draft_then_send_uses_dedup_key() {
    let store = Arc::new(MemoryStore::new());
    let p = prospect_at(&store, "acme.io", Stage::Verified, verified).await;
    let sender = Arc::new(RecordingSender::default());
    let mut adapters = Adapters::offline();
    adapters.sender = sender.clone();
    let ctx = context(&store, adapters);
    let cancel = CancellationToken::new();

    let draft = claimed(&store, NewJob::manual(JobType::Draft, vec![])).await;
    run_job(&ctx, &draft, &cancel).await.unwrap();
    let drafted = reload(&store, p.id).await;
    assert_eq!(drafted.stage, Stage::Drafted);
    assert!(drafted.draft_subject.is_some());

    let send = claimed(&store, NewJob::manual(JobType::Send, vec![])).await;
    run_job(&ctx, &send, &cancel).await.unwrap();

    let sent = reload(&store, p.id).await;
    assert_eq!(sent.stage, Stage::Sent);
    assert!(sent.sent_at.is_some());
    assert_eq!(sent.sent_message_id.as_deref(), Some("msg-1"));

    let messages = sender.sent.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].dedup_key, format!("prospect-{}", p.id));
    assert_eq!(messages[0].to, "hello@acme.io");
}

#[tokio::test]
async fn sent_prospect_is_never_sent_again() {
    let store = Arc::new(MemoryStore::new());
    let p = prospect_at(&store, "acme.io", Stage::Sent, |p| {
        verified(p);
        p.draft_subject = Some("Hi".into());
        p.draft_body = Some("Body".into());
        p.sent_at = Some(chrono::Utc::now());
    })
    .await;
    let sender = Arc::new(RecordingSender::default());
    let mut adapters = Adapters::offline();
    adapters.sender = sender.clone();

    let mut input = NewJob::manual(JobType::Send, vec![p.id]);
    input.parameters.reprocess = true;
    let job = claimed(&store, input).await;
    let summary = run_job(&context(&store, adapters), &job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert!(sender.sent.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Targets, retries, cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn explicit_targets_record_missing_and_ineligible() {
    let store = Arc::new(MemoryStore::new());
    let eligible = prospect_at(&store, "a.io", Stage::Enriched, |_| {}).await;
    let behind = prospect_at(&store, "b.io", Stage::Scraped, |_| {}).await;

    let job = claimed(
        &store,
        NewJob::manual(JobType::Score, vec![eligible.id, behind.id, 999]),
    )
    .await;
    let summary = run_job(&context(&store, Adapters::offline()), &job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(reload(&store, behind.id).await.stage, Stage::Scraped);
}

#[tokio::test]
async fn failed_prospect_is_retried_only_when_targeted() {
    let store = Arc::new(MemoryStore::new());
    let p = prospect_at(&store, "acme.io", Stage::Failed, |p| {
        p.failed_from = Some(Stage::Enriched);
        p.last_error = Some("boom".into());
    })
    .await;
    let ctx = context(&store, Adapters::offline());
    let cancel = CancellationToken::new();

    let untargeted = claimed(&store, NewJob::manual(JobType::Score, vec![])).await;
    let summary = run_job(&ctx, &untargeted, &cancel).await.unwrap();
    assert_eq!(summary.total(), 0);

    let targeted = claimed(&store, NewJob::manual(JobType::Score, vec![p.id])).await;
    run_job(&ctx, &targeted, &cancel).await.unwrap();

    let p = reload(&store, p.id).await;
    assert_eq!(p.stage, Stage::Scored);
    assert_eq!(p.failed_from, None);
    assert_eq!(p.last_error, None);
}

#[tokio::test]
async fn reprocess_reruns_a_completed_transition() {
    let store = Arc::new(MemoryStore::new());
    let p = prospect_at(&store, "acme.io", Stage::Verified, verified).await;

    let mut input = NewJob::manual(JobType::Score, vec![p.id]);
    input.parameters.reprocess = true;
    let job = claimed(&store, input).await;
    run_job(&context(&store, Adapters::offline()), &job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reload(&store, p.id).await.stage, Stage::Scored);
}

#[tokio::test]
async fn cancelled_job_stops_between_prospects() {
    let store = Arc::new(MemoryStore::new());
    let p = prospect_at(&store, "acme.io", Stage::Enriched, |_| {}).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let job = claimed(&store, NewJob::manual(JobType::Score, vec![])).await;
    let err = run_job(&context(&store, Adapters::offline()), &job, &cancel)
        .await
        .unwrap_err();

    assert_matches!(err, PipelineError::Cancelled);
    assert_eq!(reload(&store, p.id).await.stage, Stage::Enriched);
}

#[tokio::test]
async fn cancellation_interrupts_an_in_flight_external_call() {
    let store = Arc::new(MemoryStore::new());
    let p = prospect_at(&store, "acme.io", Stage::Scraped, |_| {}).await;
    let mut adapters = Adapters::offline();
    adapters.seo = Arc::new(StalledSeo);
    let ctx = context(&store, adapters);
    let cancel = CancellationToken::new();

    let job = claimed(&store, NewJob::manual(JobType::Enrich, vec![])).await;
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), run_job(&ctx, &job, &cancel))
        .await
        .expect("cancellation should not wait for the external call");

    assert_matches!(result, Err(PipelineError::Cancelled));
    assert_eq!(reload(&store, p.id).await.stage, Stage::Scraped);
}

// ---------------------------------------------------------------------------
// Discover
// ---------------------------------------------------------------------------

fn scoped() -> JobParameters {
    JobParameters {
        locations: vec![Location::UnitedStates],
        categories: vec![Category::Saas],
        ..Default::default()
    }
}

#[tokio::test]
async fn discover_creates_and_scrapes_new_prospects() {
    let store = Arc::new(MemoryStore::new());
    let mut adapters = Adapters::offline();
    adapters.discovery = Arc::new(FixedDiscovery(vec![
        hit("https://www.acme.io/", Some("hello@acme.io")),
        hit("https://acme.io/pricing", None),
        hit("https://globex.com", None),
    ]));

    let job = claimed(
        &store,
        NewJob::manual(JobType::Discover, vec![]).with_parameters(scoped()),
    )
    .await;
    let summary = run_job(&context(&store, adapters), &job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.created, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.skipped, 1);

    let all = store.eligible_prospects(Stage::Scraped, 10).await.unwrap();
    assert_eq!(all.len(), 2);
    let acme = all.iter().find(|p| p.domain == "acme.io").unwrap();
    assert_eq!(acme.contact_email.as_deref(), Some("hello@acme.io"));
    assert_eq!(acme.category, Some(Category::Saas));
}

#[tokio::test]
async fn discover_without_scope_is_missing_configuration() {
    let store = Arc::new(MemoryStore::new());
    let job = claimed(&store, NewJob::manual(JobType::Discover, vec![])).await;

    let err = run_job(&context(&store, Adapters::offline()), &job, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_matches!(
        err,
        PipelineError::Core(CoreError::MissingConfiguration { missing_fields })
            if missing_fields == vec!["locations".to_string(), "categories".to_string()]
    );
}

#[tokio::test]
async fn discover_with_targets_only_scrapes_them() {
    let store = Arc::new(MemoryStore::new());
    let p = prospect_at(&store, "acme.io", Stage::Discovered, |_| {}).await;

    let job = claimed(&store, NewJob::manual(JobType::Discover, vec![p.id])).await;
    let summary = run_job(&context(&store, Adapters::offline()), &job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.created, 0);
    assert_eq!(reload(&store, p.id).await.stage, Stage::Scraped);
}
