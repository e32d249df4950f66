//! Prospect stage state machine.
//!
//! Lives in `core` (zero internal deps) so the pipeline handlers, the
//! repositories, and the API all agree on which transitions are legal.
//!
//! ```text
//! DISCOVERED --scrape--> SCRAPED --enrich--> ENRICHED --score--> SCORED
//! SCORED --verify--> VERIFIED | UNVERIFIED
//! VERIFIED --draft--> DRAFTED --send--> SENT
//! any non-terminal --error--> FAILED (prior stage kept in `failed_from`)
//! ```

use crate::error::CoreError;

define_string_enum! {
    /// Position of a prospect in the outreach pipeline.
    Stage {
        Discovered = "DISCOVERED",
        Scraped = "SCRAPED",
        Enriched = "ENRICHED",
        Scored = "SCORED",
        Verified = "VERIFIED",
        Unverified = "UNVERIFIED",
        Drafted = "DRAFTED",
        Sent = "SENT",
        Failed = "FAILED",
    }
}

define_string_enum! {
    /// Outcome of contact verification.
    VerificationStatus {
        Unchecked = "none",
        Verified = "verified",
        Unverified = "unverified",
    }
}

define_string_enum! {
    /// A forward edge in the stage graph.
    Transition {
        Scrape = "scrape",
        Enrich = "enrich",
        Score = "score",
        Verify = "verify",
        Draft = "draft",
        Send = "send",
    }
}

impl Stage {
    /// Ordinal position along the pipeline. `FAILED` has none.
    ///
    /// `VERIFIED` and `UNVERIFIED` share a position: they are alternative
    /// outcomes of the same transition.
    pub fn position(self) -> Option<u8> {
        match self {
            Stage::Discovered => Some(0),
            Stage::Scraped => Some(1),
            Stage::Enriched => Some(2),
            Stage::Scored => Some(3),
            Stage::Verified | Stage::Unverified => Some(4),
            Stage::Drafted => Some(5),
            Stage::Sent => Some(6),
            Stage::Failed => None,
        }
    }

    /// `SENT` never moves again. `FAILED` only moves through a retry.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Sent | Stage::Failed)
    }
}

impl Transition {
    /// The stage a prospect must be in for this transition to apply.
    pub fn source(self) -> Stage {
        match self {
            Transition::Scrape => Stage::Discovered,
            Transition::Enrich => Stage::Scraped,
            Transition::Score => Stage::Enriched,
            Transition::Verify => Stage::Scored,
            Transition::Draft => Stage::Verified,
            Transition::Send => Stage::Drafted,
        }
    }

    /// Stages this transition may produce.
    pub fn targets(self) -> &'static [Stage] {
        match self {
            Transition::Scrape => &[Stage::Scraped],
            Transition::Enrich => &[Stage::Enriched],
            Transition::Score => &[Stage::Scored],
            Transition::Verify => &[Stage::Verified, Stage::Unverified],
            Transition::Draft => &[Stage::Drafted],
            Transition::Send => &[Stage::Sent],
        }
    }

    /// Whether an explicit re-processing request may re-run this edge.
    /// Sending is never repeated.
    pub fn allows_reprocess(self) -> bool {
        !matches!(self, Transition::Send)
    }

    fn output_position(self) -> u8 {
        // Every target of one transition shares a position.
        self.targets()[0].position().unwrap_or(u8::MAX)
    }
}

/// How a prospect qualifies for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// The prospect sits in the transition's source stage.
    Forward,
    /// The prospect failed while in the source stage and is being retried.
    Retry,
    /// The prospect is already past the transition and is being re-run.
    Reprocess,
}

/// Decide whether `transition` may be applied to a prospect currently in
/// `current` (with `failed_from` recorded if it is `FAILED`).
pub fn check_transition(
    current: Stage,
    failed_from: Option<Stage>,
    transition: Transition,
    reprocess: bool,
) -> Result<Eligibility, CoreError> {
    let source = transition.source();

    if current == source {
        return Ok(Eligibility::Forward);
    }

    if current == Stage::Failed {
        return match failed_from {
            Some(prior) if prior == source => Ok(Eligibility::Retry),
            Some(prior) => Err(CoreError::PreconditionNotMet(format!(
                "{transition} requires {source}; prospect failed while {prior}"
            ))),
            None => Err(CoreError::PreconditionNotMet(format!(
                "{transition} requires {source}; prospect is FAILED with no prior stage"
            ))),
        };
    }

    if reprocess && transition.allows_reprocess() && current != Stage::Sent {
        if let Some(pos) = current.position() {
            if pos >= transition.output_position() {
                return Ok(Eligibility::Reprocess);
            }
        }
    }

    Err(CoreError::PreconditionNotMet(format!(
        "{transition} requires {source}, prospect is {current}"
    )))
}

/// Check that `target` is a legal outcome of `transition`.
pub fn check_target(transition: Transition, target: Stage) -> Result<(), CoreError> {
    if transition.targets().contains(&target) {
        Ok(())
    } else {
        Err(CoreError::PreconditionNotMet(format!(
            "{transition} cannot produce {target}"
        )))
    }
}

/// Whether a prospect in `current` may be moved to `FAILED`.
pub fn can_fail(current: Stage) -> bool {
    !current.is_terminal()
}

/// Data-level preconditions for entering `DRAFTED`.
///
/// Requires a non-empty contact email, `verification_status = verified`,
/// and a score of at least `min_score`.
pub fn check_draft_eligibility(
    contact_email: Option<&str>,
    verification_status: VerificationStatus,
    score: Option<f64>,
    min_score: f64,
) -> Result<(), CoreError> {
    let has_email = contact_email.is_some_and(|e| !e.trim().is_empty());
    if !has_email {
        return Err(CoreError::PreconditionNotMet(
            "draft requires a contact email".into(),
        ));
    }
    if verification_status != VerificationStatus::Verified {
        return Err(CoreError::PreconditionNotMet(format!(
            "draft requires a verified contact, status is {verification_status}"
        )));
    }
    match score {
        Some(s) if s >= min_score => Ok(()),
        Some(s) => Err(CoreError::PreconditionNotMet(format!(
            "score {s} is below the drafting threshold {min_score}"
        ))),
        None => Err(CoreError::PreconditionNotMet(
            "draft requires a computed score".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    // -----------------------------------------------------------------------
    // Forward edges
    // -----------------------------------------------------------------------

    #[test]
    fn each_transition_applies_from_its_source() {
        for t in Transition::ALL {
            assert_eq!(
                check_transition(t.source(), None, *t, false).unwrap(),
                Eligibility::Forward
            );
        }
    }

    #[test]
    fn verify_produces_either_verification_outcome() {
        assert!(check_target(Transition::Verify, Stage::Verified).is_ok());
        assert!(check_target(Transition::Verify, Stage::Unverified).is_ok());
        assert!(check_target(Transition::Verify, Stage::Drafted).is_err());
    }

    #[test]
    fn forward_targets_are_strictly_later() {
        for t in Transition::ALL {
            let from = t.source().position().unwrap();
            for target in t.targets() {
                assert!(target.position().unwrap() > from, "{t} -> {target}");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Rejections
    // -----------------------------------------------------------------------

    #[test]
    fn skipping_a_stage_is_rejected() {
        assert_matches!(
            check_transition(Stage::Scraped, None, Transition::Score, false),
            Err(CoreError::PreconditionNotMet(_))
        );
    }

    #[test]
    fn draft_from_unverified_is_rejected_even_with_reprocess() {
        assert_matches!(
            check_transition(Stage::Unverified, None, Transition::Draft, true),
            Err(CoreError::PreconditionNotMet(_))
        );
    }

    #[test]
    fn going_backwards_without_reprocess_is_rejected() {
        assert_matches!(
            check_transition(Stage::Drafted, None, Transition::Score, false),
            Err(CoreError::PreconditionNotMet(_))
        );
    }

    // -----------------------------------------------------------------------
    // FAILED recovery
    // -----------------------------------------------------------------------

    #[test]
    fn failed_prospect_retries_the_transition_it_failed_on() {
        assert_eq!(
            check_transition(Stage::Failed, Some(Stage::Scraped), Transition::Enrich, false)
                .unwrap(),
            Eligibility::Retry
        );
    }

    #[test]
    fn failed_prospect_cannot_jump_to_another_transition() {
        assert_matches!(
            check_transition(Stage::Failed, Some(Stage::Scraped), Transition::Verify, false),
            Err(CoreError::PreconditionNotMet(_))
        );
    }

    #[test]
    fn terminal_stages_cannot_fail() {
        assert!(!can_fail(Stage::Sent));
        assert!(!can_fail(Stage::Failed));
        assert!(can_fail(Stage::Scored));
    }

    // -----------------------------------------------------------------------
    // Re-processing
    // -----------------------------------------------------------------------

    #[test]
    fn rescoring_a_drafted_prospect_is_allowed_on_request() {
        assert_eq!(
            check_transition(Stage::Drafted, None, Transition::Score, true).unwrap(),
            Eligibility::Reprocess
        );
    }

    #[test]
    fn sent_prospects_are_never_reprocessed() {
        assert!(check_transition(Stage::Sent, None, Transition::Draft, true).is_err());
        assert!(check_transition(Stage::Sent, None, Transition::Send, true).is_err());
    }

    #[test]
    fn send_is_never_reprocessable() {
        assert!(!Transition::Send.allows_reprocess());
    }

    // -----------------------------------------------------------------------
    // Draft eligibility
    // -----------------------------------------------------------------------

    #[test]
    fn draft_requires_email() {
        assert_matches!(
            check_draft_eligibility(None, VerificationStatus::Verified, Some(90.0), 0.0),
            Err(CoreError::PreconditionNotMet(_))
        );
        assert_matches!(
            check_draft_eligibility(Some("  "), VerificationStatus::Verified, Some(90.0), 0.0),
            Err(CoreError::PreconditionNotMet(_))
        );
    }

    #[test]
    fn draft_requires_verified_status() {
        assert!(check_draft_eligibility(
            Some("a@b.com"),
            VerificationStatus::Unverified,
            Some(90.0),
            0.0
        )
        .is_err());
    }

    #[test]
    fn draft_respects_score_threshold() {
        assert!(
            check_draft_eligibility(Some("a@b.com"), VerificationStatus::Verified, Some(39.9), 40.0)
                .is_err()
        );
        assert!(
            check_draft_eligibility(Some("a@b.com"), VerificationStatus::Verified, Some(40.0), 40.0)
                .is_ok()
        );
    }

    #[test]
    fn stage_round_trips_through_its_string_form() {
        for s in Stage::ALL {
            assert_eq!(s.as_str().parse::<Stage>().unwrap(), *s);
        }
        assert!("ARCHIVED".parse::<Stage>().is_err());
    }
}
