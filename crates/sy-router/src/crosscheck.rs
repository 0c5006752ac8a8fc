//! Multi-backend cross-checking.
//!
//! Runs a primary backend, a reviewer that critiques the primary's answer,
//! and — when the reviewer disagrees — an arbitrator that settles the
//! dispute. The stages are strictly sequential: each later prompt embeds
//! the earlier output.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use sy_core::{BackendCatalog, TaskType, Tier};

use crate::error::RouteError;
use crate::invoke::{BackendInvoker, Invocation, Message};
use crate::picker::pick_backend;

// ---------------------------------------------------------------------------
// Conflict detection
// ---------------------------------------------------------------------------

/// Decides whether a reviewer's text disagrees with the primary answer.
///
/// Kept behind a trait so the keyword matcher can be swapped for a better
/// classifier without touching the cross-check pipeline.
pub trait ConflictDetector: Send + Sync {
    /// Human-readable disagreement reasons; empty means no conflict.
    fn detect(&self, review: &str) -> Vec<String>;
}

/// Literal, case-insensitive substring matching.
///
/// Generic constructive suggestions without these markers do not count as
/// conflicts.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordConflictDetector;

impl ConflictDetector for KeywordConflictDetector {
    fn detect(&self, review: &str) -> Vec<String> {
        let lower = review.to_lowercase();
        let mut reasons = Vec::new();

        if lower.contains("needs-improvement") || lower.contains("needs improvement") {
            reasons.push("reviewer marked the answer as needing improvement".to_string());
        }
        if (lower.contains("critical") || lower.contains("major"))
            && (lower.contains("bug") || lower.contains("error"))
        {
            reasons.push("reviewer reported a critical or major defect".to_string());
        }
        if lower.contains("incorrect") || lower.contains("wrong") || lower.contains("fails") {
            reasons.push("reviewer called the answer incorrect".to_string());
        }
        reasons
    }
}

// ---------------------------------------------------------------------------
// CrossCheckResult
// ---------------------------------------------------------------------------

/// Outcome of one cross-check run at a tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossCheckResult {
    pub tier: Tier,
    pub primary: Invocation,
    pub reviewer: Option<Invocation>,
    pub arbitrator: Option<Invocation>,
    /// The text the caller should trust.
    pub consensus: String,
    /// Disagreement reasons; empty when primary and reviewer agree.
    pub conflicts: Vec<String>,
    /// Which backends were used, and where.
    pub summary: String,
}

impl CrossCheckResult {
    /// The invocation that produced the consensus text.
    pub fn final_invocation(&self) -> &Invocation {
        self.arbitrator.as_ref().unwrap_or(&self.primary)
    }

    /// Total cost across every call made during this run.
    pub fn total_cost(&self) -> f64 {
        self.invocations().map(|i| i.cost).sum()
    }

    pub fn total_input_tokens(&self) -> u64 {
        self.invocations().map(|i| i.input_tokens).sum()
    }

    pub fn total_output_tokens(&self) -> u64 {
        self.invocations().map(|i| i.output_tokens).sum()
    }

    fn invocations(&self) -> impl Iterator<Item = &Invocation> {
        std::iter::once(&self.primary)
            .chain(self.reviewer.as_ref())
            .chain(self.arbitrator.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// The original task as flat text, for embedding in review prompts.
pub fn render_task(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| m.role == crate::invoke::Role::User)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_review_prompt(task: &str, primary_output: &str) -> String {
    format!(
        "Review the following answer produced by another model.\n\n\
         Original task:\n{task}\n\n\
         Proposed answer:\n{primary_output}\n\n\
         Give an overall assessment of the answer, then list any specific \
         issues you find. Be direct about anything incorrect."
    )
}

fn build_arbitration_prompt(task: &str, primary_output: &str, review: &str) -> String {
    format!(
        "Two models disagree about the following task. Produce the best \
         final answer, taking the review into account.\n\n\
         Original task:\n{task}\n\n\
         First answer:\n{primary_output}\n\n\
         Review of the first answer:\n{review}"
    )
}

// ---------------------------------------------------------------------------
// CrossChecker
// ---------------------------------------------------------------------------

/// Sequential primary → reviewer → arbitrator pipeline over one tier.
pub struct CrossChecker<'a> {
    pub catalog: &'a dyn BackendCatalog,
    pub invoker: &'a dyn BackendInvoker,
    pub detector: &'a dyn ConflictDetector,
}

impl CrossChecker<'_> {
    /// Run the cross-check at `tier`.
    ///
    /// With fewer than two backends in the tier this degrades to a single
    /// picked call and reports no conflicts. Any invocation failure is
    /// fatal for the whole route; no partial consensus is returned.
    pub async fn run(
        &self,
        messages: &[Message],
        task: TaskType,
        tier: Tier,
        cancel: &CancellationToken,
    ) -> Result<CrossCheckResult, RouteError> {
        let backends = self.catalog.backends_for_tier(tier);

        if backends.len() < 2 {
            let backend = pick_backend(self.catalog, tier, task)?;
            let primary = self.invoker.invoke(messages, &backend, cancel).await?;
            let summary = format!(
                "single call in {tier} via {} (not enough backends to cross-check)",
                primary.backend_id
            );
            return Ok(CrossCheckResult {
                tier,
                consensus: primary.content.clone(),
                primary,
                reviewer: None,
                arbitrator: None,
                conflicts: Vec::new(),
                summary,
            });
        }

        let task_text = render_task(messages);

        let primary = self.invoker.invoke(messages, &backends[0], cancel).await?;

        let review_messages = [Message::user(build_review_prompt(
            &task_text,
            &primary.content,
        ))];
        let reviewer = self
            .invoker
            .invoke(&review_messages, &backends[1], cancel)
            .await?;

        let conflicts = self.detector.detect(&reviewer.content);
        debug!(%tier, conflicts = conflicts.len(), "cross-check reviewed");

        let mut arbitrator = None;
        let consensus = if !conflicts.is_empty() && backends.len() >= 3 {
            let arbitration_messages = [Message::user(build_arbitration_prompt(
                &task_text,
                &primary.content,
                &reviewer.content,
            ))];
            let arb = self
                .invoker
                .invoke(&arbitration_messages, &backends[2], cancel)
                .await?;
            let consensus = arb.content.clone();
            arbitrator = Some(arb);
            consensus
        } else {
            primary.content.clone()
        };

        let mut summary = format!(
            "cross-check in {tier}: primary={}, reviewer={}",
            primary.backend_id, reviewer.backend_id
        );
        if let Some(ref arb) = arbitrator {
            summary.push_str(&format!(", arbitrator={}", arb.backend_id));
        }

        Ok(CrossCheckResult {
            tier,
            primary,
            reviewer: Some(reviewer),
            arbitrator,
            consensus,
            conflicts,
            summary,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::{InvokeError, MockInvoker};
    use sy_core::{BackendDescriptor, Capability, CatalogSnapshot};

    fn backend(id: &str, tier: Tier, priority: u32) -> BackendDescriptor {
        BackendDescriptor {
            id: id.into(),
            provider: "test".into(),
            tier,
            capabilities: vec![Capability::General, Capability::Code],
            input_cost_per_1k: Some(0.001),
            output_cost_per_1k: Some(0.002),
            context_window: 8192,
            enabled: true,
            priority,
            relative_cost: 1,
        }
    }

    fn three_backend_catalog() -> CatalogSnapshot {
        CatalogSnapshot::new(vec![
            backend("primary", Tier::Standard, 0),
            backend("reviewer", Tier::Standard, 1),
            backend("arbitrator", Tier::Standard, 2),
        ])
    }

    fn two_backend_catalog() -> CatalogSnapshot {
        CatalogSnapshot::new(vec![
            backend("primary", Tier::Standard, 0),
            backend("reviewer", Tier::Standard, 1),
        ])
    }

    // -- Conflict detection --

    #[test]
    fn failure_wording_is_a_conflict() {
        let detector = KeywordConflictDetector;
        assert!(!detector.detect("the solution fails on empty input").is_empty());
        assert!(!detector.detect("This is Incorrect.").is_empty());
        assert!(!detector.detect("needs improvement in several places").is_empty());
        assert!(!detector.detect("a major error in step two").is_empty());
    }

    #[test]
    fn constructive_suggestions_are_not_conflicts() {
        let detector = KeywordConflictDetector;
        assert!(detector
            .detect("consider renaming this variable for clarity")
            .is_empty());
        assert!(detector.detect("looks good overall, well structured").is_empty());
    }

    #[test]
    fn severity_words_alone_are_not_conflicts() {
        let detector = KeywordConflictDetector;
        // "critical" without "bug"/"error" is praise-compatible.
        assert!(detector
            .detect("handles the critical path efficiently")
            .is_empty());
    }

    // -- Pipeline --

    #[tokio::test]
    async fn agreement_has_no_conflicts() {
        let catalog = three_backend_catalog();
        let invoker = MockInvoker::new()
            .with_reply("the answer")
            .with_reply("looks good overall");
        let checker = CrossChecker {
            catalog: &catalog,
            invoker: &invoker,
            detector: &KeywordConflictDetector,
        };
        let cancel = CancellationToken::new();

        let result = checker
            .run(&[Message::user("task")], TaskType::General, Tier::Standard, &cancel)
            .await
            .unwrap();

        assert!(result.conflicts.is_empty());
        assert_eq!(result.consensus, "the answer");
        assert!(result.arbitrator.is_none());
        assert_eq!(invoker.call_count(), 2);
        assert!(result.summary.contains("primary=primary"));
        assert!(result.summary.contains("reviewer=reviewer"));
    }

    #[tokio::test]
    async fn conflict_with_arbitrator_settles() {
        let catalog = three_backend_catalog();
        let invoker = MockInvoker::new()
            .with_reply("the answer")
            .with_reply("this is wrong in step two")
            .with_reply("the settled answer");
        let checker = CrossChecker {
            catalog: &catalog,
            invoker: &invoker,
            detector: &KeywordConflictDetector,
        };
        let cancel = CancellationToken::new();

        let result = checker
            .run(&[Message::user("task")], TaskType::General, Tier::Standard, &cancel)
            .await
            .unwrap();

        assert!(!result.conflicts.is_empty());
        assert_eq!(result.consensus, "the settled answer");
        assert!(result.arbitrator.is_some());
        assert_eq!(result.final_invocation().backend_id, "arbitrator");
        assert!(result.summary.contains("arbitrator=arbitrator"));
        assert_eq!(invoker.call_count(), 3);
    }

    #[tokio::test]
    async fn conflict_without_arbitrator_stays_unresolved() {
        let catalog = two_backend_catalog();
        let invoker = MockInvoker::new()
            .with_reply("the answer")
            .with_reply("this is incorrect");
        let checker = CrossChecker {
            catalog: &catalog,
            invoker: &invoker,
            detector: &KeywordConflictDetector,
        };
        let cancel = CancellationToken::new();

        let result = checker
            .run(&[Message::user("task")], TaskType::General, Tier::Standard, &cancel)
            .await
            .unwrap();

        assert!(!result.conflicts.is_empty());
        assert_eq!(result.consensus, "the answer");
        assert!(result.arbitrator.is_none());
        assert_eq!(invoker.call_count(), 2);
    }

    #[tokio::test]
    async fn single_backend_degrades_to_one_call() {
        let catalog = CatalogSnapshot::new(vec![backend("only", Tier::Standard, 0)]);
        let invoker = MockInvoker::new().with_reply("solo answer");
        let checker = CrossChecker {
            catalog: &catalog,
            invoker: &invoker,
            detector: &KeywordConflictDetector,
        };
        let cancel = CancellationToken::new();

        let result = checker
            .run(&[Message::user("task")], TaskType::General, Tier::Standard, &cancel)
            .await
            .unwrap();

        assert!(result.conflicts.is_empty());
        assert_eq!(result.consensus, "solo answer");
        assert_eq!(invoker.call_count(), 1);
        assert!(result.summary.contains("single call"));
    }

    #[tokio::test]
    async fn reviewer_prompt_embeds_primary_output() {
        let catalog = two_backend_catalog();
        let invoker = MockInvoker::new()
            .with_reply("the primary text")
            .with_reply("fine");
        let checker = CrossChecker {
            catalog: &catalog,
            invoker: &invoker,
            detector: &KeywordConflictDetector,
        };
        let cancel = CancellationToken::new();

        checker
            .run(
                &[Message::user("compute the thing")],
                TaskType::General,
                Tier::Standard,
                &cancel,
            )
            .await
            .unwrap();

        let calls = invoker.calls();
        let review_prompt = &calls[1].1[0].content;
        assert!(review_prompt.contains("the primary text"));
        assert!(review_prompt.contains("compute the thing"));
    }

    #[tokio::test]
    async fn reviewer_failure_is_fatal() {
        let catalog = two_backend_catalog();
        let invoker = MockInvoker::new()
            .with_reply("the answer")
            .with_error(InvokeError::Timeout);
        let checker = CrossChecker {
            catalog: &catalog,
            invoker: &invoker,
            detector: &KeywordConflictDetector,
        };
        let cancel = CancellationToken::new();

        let result = checker
            .run(&[Message::user("task")], TaskType::General, Tier::Standard, &cancel)
            .await;
        assert!(matches!(result, Err(RouteError::Invocation(_))));
    }

    #[tokio::test]
    async fn totals_cover_every_call() {
        let catalog = three_backend_catalog();
        let invoker = MockInvoker::new()
            .with_reply("a")
            .with_reply("wrong")
            .with_reply("b");
        let checker = CrossChecker {
            catalog: &catalog,
            invoker: &invoker,
            detector: &KeywordConflictDetector,
        };
        let cancel = CancellationToken::new();

        let result = checker
            .run(&[Message::user("task")], TaskType::General, Tier::Standard, &cancel)
            .await
            .unwrap();

        // Three mock calls at 10 in / 5 out each.
        assert_eq!(result.total_input_tokens(), 30);
        assert_eq!(result.total_output_tokens(), 15);
        assert!(result.total_cost() > 0.0);
    }
}
