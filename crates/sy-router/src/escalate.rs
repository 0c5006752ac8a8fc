//! Escalation state machine.
//!
//! Decides, after a cross-check, whether to trust the result, re-run once
//! at the next tier, or hand the decision to a human. Auto-escalation and
//! confirmation are mutually exclusive terminal states; the machine never
//! produces both.

use sy_core::{BackendCatalog, Tier};

use crate::crosscheck::CrossCheckResult;

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// How a resolved cross-check settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Primary and reviewer agreed.
    NoConflicts,
    /// An arbitrator settled the disagreement.
    Arbitrated,
    /// Conflicts remain and no further escalation is possible.
    Unresolved,
}

impl Resolution {
    /// Annotation appended to the routing summary.
    pub fn annotation(&self) -> &'static str {
        match self {
            Resolution::NoConflicts => "(no conflicts)",
            Resolution::Arbitrated => "(conflicts resolved with arbitrator)",
            Resolution::Unresolved => "(conflicts unresolved)",
        }
    }
}

/// State of the escalation machine after a cross-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationState {
    /// Terminal: trust the cross-check consensus as-is.
    Resolved { resolution: Resolution },
    /// Intermediate: conflicts found, escalation options not yet weighed.
    ConflictDetected,
    /// Terminal for this call: re-run the cross-check once at `to`.
    AutoEscalating { to: Tier },
    /// Terminal: return the lower-tier consensus and ask the caller to
    /// confirm the escalation.
    AwaitingConfirmation { to: Tier, reason: String },
}

impl EscalationState {
    /// Evaluate the machine over a fresh [`CrossCheckResult`].
    pub fn evaluate(
        result: &CrossCheckResult,
        auto_escalate: bool,
        max_tier: Tier,
        catalog: &dyn BackendCatalog,
    ) -> EscalationState {
        let initial = if result.conflicts.is_empty() {
            EscalationState::Resolved {
                resolution: Resolution::NoConflicts,
            }
        } else {
            EscalationState::ConflictDetected
        };
        initial.advance(result, auto_escalate, max_tier, catalog)
    }

    fn advance(
        self,
        result: &CrossCheckResult,
        auto_escalate: bool,
        max_tier: Tier,
        catalog: &dyn BackendCatalog,
    ) -> EscalationState {
        match self {
            EscalationState::ConflictDetected => {
                let next = catalog
                    .next_tier(result.tier)
                    .filter(|tier| *tier <= max_tier);

                match next {
                    Some(to) if auto_escalate => EscalationState::AutoEscalating { to },
                    Some(to) if !to.is_free() => EscalationState::AwaitingConfirmation {
                        reason: format!(
                            "cross-check at {} found {} conflict(s); {} is a paid tier \
                             and auto-escalation is disabled",
                            result.tier,
                            result.conflicts.len(),
                            to
                        ),
                        to,
                    },
                    _ => EscalationState::Resolved {
                        resolution: if result.arbitrator.is_some() {
                            Resolution::Arbitrated
                        } else {
                            Resolution::Unresolved
                        },
                    },
                }
            }
            terminal => terminal,
        }
    }
}

// ---------------------------------------------------------------------------
// Escalation prompt
// ---------------------------------------------------------------------------

/// Bundle the original request, the disputed consensus, and the conflict
/// list into the prompt a higher tier would receive on confirmation.
pub fn build_escalation_prompt(
    task: &str,
    consensus: &str,
    conflicts: &[String],
    from: Tier,
    to: Tier,
) -> String {
    let mut prompt = format!(
        "ESCALATED FROM {from} TO {to}\n\n\
         Original request:\n{task}\n\n\
         Disputed answer from {from}:\n{consensus}\n\n\
         Reported conflicts:\n"
    );
    for conflict in conflicts {
        prompt.push_str("- ");
        prompt.push_str(conflict);
        prompt.push('\n');
    }
    prompt.push_str("\nProvide a corrected, authoritative answer.");
    prompt
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::Invocation;
    use sy_core::{default_backend_table, CatalogSnapshot};

    fn invocation(id: &str, content: &str) -> Invocation {
        Invocation {
            content: content.into(),
            input_tokens: 10,
            output_tokens: 5,
            cost: 0.0,
            backend_id: id.into(),
            provider: "test".into(),
        }
    }

    fn result(tier: Tier, conflicts: Vec<String>, arbitrated: bool) -> CrossCheckResult {
        CrossCheckResult {
            tier,
            primary: invocation("primary", "answer"),
            reviewer: Some(invocation("reviewer", "review")),
            arbitrator: arbitrated.then(|| invocation("arbitrator", "settled")),
            consensus: "answer".into(),
            conflicts,
            summary: format!("cross-check in {tier}"),
        }
    }

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot::new(default_backend_table())
    }

    #[test]
    fn no_conflicts_resolves_immediately() {
        let state = EscalationState::evaluate(
            &result(Tier::Free, vec![], false),
            true,
            Tier::Elite,
            &catalog(),
        );
        assert_eq!(
            state,
            EscalationState::Resolved {
                resolution: Resolution::NoConflicts
            }
        );
    }

    #[test]
    fn auto_escalates_to_next_tier() {
        let state = EscalationState::evaluate(
            &result(Tier::Free, vec!["disagreement".into()], false),
            true,
            Tier::Elite,
            &catalog(),
        );
        assert_eq!(state, EscalationState::AutoEscalating { to: Tier::Standard });
    }

    #[test]
    fn paid_next_tier_without_auto_awaits_confirmation() {
        let state = EscalationState::evaluate(
            &result(Tier::Free, vec!["disagreement".into()], false),
            false,
            Tier::Elite,
            &catalog(),
        );
        match state {
            EscalationState::AwaitingConfirmation { to, reason } => {
                assert_eq!(to, Tier::Standard);
                assert!(reason.contains("T0"));
                assert!(reason.contains("paid"));
            }
            other => panic!("expected AwaitingConfirmation, got {other:?}"),
        }
    }

    #[test]
    fn terminal_tier_resolves_with_arbitrator() {
        let state = EscalationState::evaluate(
            &result(Tier::Elite, vec!["disagreement".into()], true),
            true,
            Tier::Elite,
            &catalog(),
        );
        assert_eq!(
            state,
            EscalationState::Resolved {
                resolution: Resolution::Arbitrated
            }
        );
    }

    #[test]
    fn terminal_tier_without_arbitrator_is_unresolved() {
        let state = EscalationState::evaluate(
            &result(Tier::Elite, vec!["disagreement".into()], false),
            false,
            Tier::Elite,
            &catalog(),
        );
        assert_eq!(
            state,
            EscalationState::Resolved {
                resolution: Resolution::Unresolved
            }
        );
    }

    #[test]
    fn max_escalation_tier_caps_the_climb() {
        // Next tier exists but sits above the configured maximum.
        let state = EscalationState::evaluate(
            &result(Tier::Standard, vec!["disagreement".into()], false),
            true,
            Tier::Standard,
            &catalog(),
        );
        assert_eq!(
            state,
            EscalationState::Resolved {
                resolution: Resolution::Unresolved
            }
        );
    }

    #[test]
    fn escalation_prompt_carries_marker_and_conflicts() {
        let prompt = build_escalation_prompt(
            "original task",
            "the disputed answer",
            &["reviewer called the answer incorrect".into()],
            Tier::Free,
            Tier::Standard,
        );
        assert!(prompt.contains("ESCALATED FROM T0 TO T1"));
        assert!(prompt.contains("original task"));
        assert!(prompt.contains("the disputed answer"));
        assert!(prompt.contains("- reviewer called the answer incorrect"));
    }

    #[test]
    fn resolution_annotations() {
        assert_eq!(Resolution::NoConflicts.annotation(), "(no conflicts)");
        assert_eq!(
            Resolution::Arbitrated.annotation(),
            "(conflicts resolved with arbitrator)"
        );
        assert_eq!(Resolution::Unresolved.annotation(), "(conflicts unresolved)");
    }
}
