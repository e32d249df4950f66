//! Atomic stage writes.
//!
//! Every stage change goes through here: the write compares on the stage
//! the caller read, so two writers racing on one prospect produce exactly
//! one winner. The loser reads the row back and reports it in
//! [`PipelineError::ConcurrentModification`].

use prospector_core::error::CoreError;
use prospector_core::stage::{can_fail, check_target, Stage, Transition};
use prospector_db::models::prospect::{Prospect, ProspectUpdate, StageWrite};
use prospector_db::Store;

use crate::error::PipelineError;

/// Move `prospect` to `target` via `transition`, writing `update` in the
/// same statement. Clears any recorded failure.
///
/// Eligibility (see [`prospector_core::stage::check_transition`]) must
/// already have been checked against the same snapshot.
pub async fn advance(
    store: &dyn Store,
    prospect: &Prospect,
    transition: Transition,
    target: Stage,
    update: ProspectUpdate,
) -> Result<Prospect, PipelineError> {
    check_target(transition, target)?;
    let write = StageWrite {
        prospect_id: prospect.id,
        expected: prospect.stage,
        next: target,
        failed_from: None,
        last_error: None,
        update,
    };
    commit(store, &write).await
}

/// Move `prospect` to `FAILED`, remembering the stage it failed from.
///
/// A prospect that is already `FAILED` keeps its `failed_from` and only
/// gets the new error recorded.
pub async fn fail(
    store: &dyn Store,
    prospect: &Prospect,
    error: &str,
) -> Result<Prospect, PipelineError> {
    let failed_from = match (prospect.stage, prospect.failed_from) {
        (Stage::Failed, Some(prior)) => prior,
        (current, _) if can_fail(current) => current,
        (current, _) => {
            return Err(CoreError::PreconditionNotMet(format!(
                "a {current} prospect cannot fail"
            ))
            .into())
        }
    };
    let write = StageWrite {
        prospect_id: prospect.id,
        expected: prospect.stage,
        next: Stage::Failed,
        failed_from: Some(failed_from),
        last_error: Some(error.to_string()),
        update: ProspectUpdate::default(),
    };
    commit(store, &write).await
}

async fn commit(store: &dyn Store, write: &StageWrite) -> Result<Prospect, PipelineError> {
    if let Some(written) = store.write_stage(write).await? {
        tracing::debug!(
            prospect_id = written.id,
            from = %write.expected,
            to = %written.stage,
            "Prospect stage written",
        );
        return Ok(written);
    }

    let winner = store.find_prospect(write.prospect_id).await?;
    tracing::debug!(
        prospect_id = write.prospect_id,
        expected = %write.expected,
        actual = ?winner.as_ref().map(|p| p.stage.as_str()),
        "Stage write lost to a concurrent writer",
    );
    Err(PipelineError::ConcurrentModification {
        prospect_id: write.prospect_id,
        winner: winner.map(Box::new),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use prospector_db::models::prospect::NewProspect;
    use prospector_db::{MemoryStore, ProspectStore};

    use super::*;

    async fn discovered(store: &MemoryStore) -> Prospect {
        store
            .upsert_prospect(&NewProspect {
                url: "https://acme.io".into(),
                domain: "acme.io".into(),
                ..Default::default()
            })
            .await
            .unwrap()
            .prospect
    }

    #[tokio::test]
    async fn advance_writes_data_with_the_stage() {
        let store = MemoryStore::new();
        let p = discovered(&store).await;
        let update = ProspectUpdate {
            title: Some("Acme".into()),
            ..Default::default()
        };
        let written = advance(&store, &p, Transition::Scrape, Stage::Scraped, update)
            .await
            .unwrap();
        assert_eq!(written.stage, Stage::Scraped);
        assert_eq!(written.title.as_deref(), Some("Acme"));
        assert!(written.updated_at > p.updated_at);
    }

    #[tokio::test]
    async fn illegal_target_is_rejected_before_writing() {
        let store = MemoryStore::new();
        let p = discovered(&store).await;
        let result = advance(&store, &p, Transition::Scrape, Stage::Enriched, Default::default()).await;
        assert_matches!(result, Err(PipelineError::Core(CoreError::PreconditionNotMet(_))));
    }

    #[tokio::test]
    async fn losing_writer_sees_the_winner() {
        let store = Arc::new(MemoryStore::new());
        let p = discovered(&store).await;

        advance(store.as_ref(), &p, Transition::Scrape, Stage::Scraped, Default::default())
            .await
            .unwrap();
        let stale = advance(store.as_ref(), &p, Transition::Scrape, Stage::Scraped, Default::default()).await;

        assert_matches!(
            stale,
            Err(PipelineError::ConcurrentModification { winner: Some(w), .. }) if w.stage == Stage::Scraped
        );
    }

    #[tokio::test]
    async fn failing_records_the_prior_stage() {
        let store = MemoryStore::new();
        let p = discovered(&store).await;
        let failed = fail(&store, &p, "rejected").await.unwrap();
        assert_eq!(failed.stage, Stage::Failed);
        assert_eq!(failed.failed_from, Some(Stage::Discovered));
        assert_eq!(failed.last_error.as_deref(), Some("rejected"));

        let again = fail(&store, &failed, "rejected twice").await.unwrap();
        assert_eq!(again.failed_from, Some(Stage::Discovered));
        assert_eq!(again.last_error.as_deref(), Some("rejected twice"));
    }

    #[tokio::test]
    async fn retry_clears_the_failure() {
        let store = MemoryStore::new();
        let p = discovered(&store).await;
        let failed = fail(&store, &p, "rejected").await.unwrap();
        let retried = advance(&store, &failed, Transition::Scrape, Stage::Scraped, Default::default())
            .await
            .unwrap();
        assert_eq!(retried.stage, Stage::Scraped);
        assert!(retried.failed_from.is_none());
        assert!(retried.last_error.is_none());
    }
}
