//! The routing orchestrator.
//!
//! `Router::route` is the sole routing entry point: admission gate, then
//! either direct dispatch (explicit tier preference) or the full pipeline
//! of classification, policy matching, tier selection, cross-check, and
//! escalation. `Router::preview` dry-runs the policy and tier logic for
//! operational tooling without touching a backend.

use std::sync::Arc;

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use sy_core::{cheapest, estimate_cost, BackendCatalog, BackendDescriptor, TaskType, Tier};

use crate::classifier::{classify, classify_heuristic, Complexity};
use crate::config::RouterConfig;
use crate::crosscheck::{
    render_task, ConflictDetector, CrossCheckResult, CrossChecker, KeywordConflictDetector,
};
use crate::error::RouteError;
use crate::escalate::{build_escalation_prompt, EscalationState, Resolution};
use crate::invoke::{BackendInvoker, Invocation, Message};
use crate::picker::pick_backend;
use crate::policy::{
    builtin_policies, match_policies, MatchContext, PolicyAction, RiskLevel, RoutingPolicy,
};
use crate::quota::{estimate_tokens, AllowAll, QuotaGate};
use crate::selector::{select_tier, QualityPreference};

// ---------------------------------------------------------------------------
// Request context and outcome
// ---------------------------------------------------------------------------

/// Per-request routing facts supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingContext {
    pub task_type: TaskType,
    /// Hard override: dispatch straight to this tier, skipping
    /// classification, policy tier actions, and cross-check.
    pub preferred_tier: Option<Tier>,
    pub quality: QualityPreference,
    /// File the request concerns, for pattern-based policy rules.
    pub file_path: Option<String>,
    pub role: Option<String>,
    /// Caller's own cost estimate; when absent the router prices the
    /// token estimate against the default tier's cheapest backend.
    pub estimated_cost: Option<f64>,
    pub user: Option<String>,
    pub project: Option<String>,
    /// Per-call overrides for the config flags.
    pub enable_cross_check: Option<bool>,
    pub enable_auto_escalate: Option<bool>,
}

impl RoutingContext {
    pub fn new(task_type: TaskType) -> Self {
        Self {
            task_type,
            preferred_tier: None,
            quality: QualityPreference::Normal,
            file_path: None,
            role: None,
            estimated_cost: None,
            user: None,
            project: None,
            enable_cross_check: None,
            enable_auto_escalate: None,
        }
    }
}

impl Default for RoutingContext {
    fn default() -> Self {
        Self::new(TaskType::General)
    }
}

/// Terminal result of a route.
///
/// `requires_confirmation` and a silently escalated answer are mutually
/// exclusive: an outcome either carries the escalated result or asks the
/// caller to approve the climb, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteOutcome {
    pub request_id: Uuid,
    pub content: String,
    /// Backend that produced `content`.
    pub backend_id: String,
    pub provider: String,
    /// Token and cost totals across every call the route made.
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub summary: String,
    pub requires_confirmation: bool,
    pub suggested_tier: Option<Tier>,
    pub escalation_reason: Option<String>,
    /// Pre-built prompt for the escalated retry, bundling the original
    /// request, the lower-tier consensus, and the conflict list.
    pub optimized_prompt: Option<String>,
}

/// Dry-run result from [`Router::preview`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyPreview {
    pub matched_policy: Option<String>,
    pub action: Option<PolicyAction>,
    pub risk: RiskLevel,
    /// Tier the request would start at; `None` when a deny rule matched.
    pub tier: Option<Tier>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Composes catalog, invoker, quota gate, policies, and the escalation
/// machinery into one routing decision per call. Carries no cross-request
/// mutable state; independent calls may run concurrently.
pub struct Router {
    catalog: Arc<dyn BackendCatalog>,
    invoker: Arc<dyn BackendInvoker>,
    quota: Arc<dyn QuotaGate>,
    detector: Arc<dyn ConflictDetector>,
    policies: Vec<RoutingPolicy>,
    config: RouterConfig,
}

impl Router {
    /// Router with the built-in policy set, an admit-everything quota
    /// gate, and default configuration.
    pub fn new(catalog: Arc<dyn BackendCatalog>, invoker: Arc<dyn BackendInvoker>) -> Self {
        Self {
            catalog,
            invoker,
            quota: Arc::new(AllowAll),
            detector: Arc::new(KeywordConflictDetector),
            policies: builtin_policies(),
            config: RouterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the policy set entirely.
    pub fn with_policies(mut self, policies: Vec<RoutingPolicy>) -> Self {
        self.policies = policies;
        self
    }

    /// Stack an administrator policy on top of the current set.
    pub fn add_policy(mut self, policy: RoutingPolicy) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn with_quota(mut self, quota: Arc<dyn QuotaGate>) -> Self {
        self.quota = quota;
        self
    }

    pub fn with_conflict_detector(mut self, detector: Arc<dyn ConflictDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Route one request. See the module docs for the pipeline order.
    pub async fn route(
        &self,
        messages: &[Message],
        ctx: &RoutingContext,
        cancel: &CancellationToken,
    ) -> Result<RouteOutcome, RouteError> {
        let request_id = Uuid::new_v4();
        let task_text = render_task(messages);
        let est_tokens = estimate_tokens(&task_text);
        let est_cost = self.estimate_request_cost(ctx, est_tokens);

        // Admission is a single pre-flight check, before any backend call.
        let quota = self
            .quota
            .check_quota(ctx.user.as_deref(), ctx.project.as_deref(), est_tokens, est_cost)
            .await;
        if !quota.allowed {
            return Err(RouteError::QuotaExceeded {
                reason: quota.reason.unwrap_or_else(|| "quota exceeded".into()),
                remaining_tokens: quota.remaining_tokens,
                resets_at: quota.resets_at,
            });
        }
        if cancel.is_cancelled() {
            return Err(RouteError::Cancelled);
        }

        // Hard override for direct/manual dispatch.
        if let Some(tier) = ctx.preferred_tier {
            let backend = pick_backend(self.catalog.as_ref(), tier, ctx.task_type)?;
            let invocation = self.invoker.invoke(messages, &backend, cancel).await?;
            debug!(%request_id, %tier, backend = %invocation.backend_id, "direct dispatch");
            let summary = format!("direct dispatch to {tier} via {}", invocation.backend_id);
            return Ok(outcome_from_invocation(request_id, invocation, summary));
        }

        let complexity =
            classify(&task_text, self.catalog.as_ref(), self.invoker.as_ref(), cancel).await?;
        let policy = match_policies(&self.policies, &self.match_context(ctx, complexity, est_cost));
        let tier = select_tier(&policy, complexity, ctx.quality, self.config.default_tier)?;
        debug!(%request_id, ?complexity, %tier, risk = ?policy.risk, "routing resolved");

        let cross_check = ctx
            .enable_cross_check
            .unwrap_or(self.config.enable_cross_check);
        if !cross_check || complexity != Complexity::High {
            let backend = pick_backend(self.catalog.as_ref(), tier, ctx.task_type)?;
            let invocation = self.invoker.invoke(messages, &backend, cancel).await?;
            let summary = format!("routed to {tier} via {}", invocation.backend_id);
            return Ok(outcome_from_invocation(request_id, invocation, summary));
        }

        let checker = CrossChecker {
            catalog: self.catalog.as_ref(),
            invoker: self.invoker.as_ref(),
            detector: self.detector.as_ref(),
        };
        let result = checker.run(messages, ctx.task_type, tier, cancel).await?;
        let auto = ctx
            .enable_auto_escalate
            .unwrap_or(self.config.enable_auto_escalate);

        let state = EscalationState::evaluate(
            &result,
            auto,
            self.config.max_escalation_tier,
            self.catalog.as_ref(),
        );
        match state {
            EscalationState::Resolved { resolution } => Ok(outcome_from_cross_check(
                request_id,
                &result,
                resolution.annotation(),
            )),
            EscalationState::AutoEscalating { to } => {
                debug!(%request_id, from = %tier, %to, "auto-escalating");
                // One re-run at the higher tier; its conflicts are not
                // chained into a further climb within this call.
                let escalated = checker.run(messages, ctx.task_type, to, cancel).await?;
                let annotation = format!("(escalated from {tier})");
                let mut outcome = outcome_from_cross_check(request_id, &escalated, &annotation);
                outcome.cost += result.total_cost();
                outcome.input_tokens += result.total_input_tokens();
                outcome.output_tokens += result.total_output_tokens();
                Ok(outcome)
            }
            EscalationState::AwaitingConfirmation { to, reason } => {
                debug!(%request_id, from = %tier, %to, "awaiting escalation confirmation");
                let prompt = build_escalation_prompt(
                    &task_text,
                    &result.consensus,
                    &result.conflicts,
                    tier,
                    to,
                );
                let mut outcome =
                    outcome_from_cross_check(request_id, &result, "(awaiting confirmation)");
                outcome.requires_confirmation = true;
                outcome.suggested_tier = Some(to);
                outcome.escalation_reason = Some(reason);
                outcome.optimized_prompt = Some(prompt);
                Ok(outcome)
            }
            EscalationState::ConflictDetected => Ok(outcome_from_cross_check(
                request_id,
                &result,
                Resolution::Unresolved.annotation(),
            )),
        }
    }

    /// Dry-run policy matching and tier selection with the heuristic
    /// classifier. No backend call, no quota consumption.
    pub fn preview(&self, messages: &[Message], ctx: &RoutingContext) -> PolicyPreview {
        let task_text = render_task(messages);
        let complexity = classify_heuristic(&task_text);
        let est_tokens = estimate_tokens(&task_text);
        let est_cost = self.estimate_request_cost(ctx, est_tokens);

        let policy = match_policies(&self.policies, &self.match_context(ctx, complexity, est_cost));
        let tier = match ctx.preferred_tier {
            Some(tier) => Some(tier),
            None => {
                select_tier(&policy, complexity, ctx.quality, self.config.default_tier).ok()
            }
        };
        PolicyPreview {
            matched_policy: policy.policy.clone(),
            action: policy.action.clone(),
            risk: policy.risk,
            tier,
        }
    }

    fn match_context(
        &self,
        ctx: &RoutingContext,
        complexity: Complexity,
        estimated_cost: f64,
    ) -> MatchContext {
        MatchContext {
            task_type: ctx.task_type,
            complexity,
            file_path: ctx.file_path.clone(),
            estimated_cost,
            role: ctx.role.clone(),
            hour: chrono::Local::now().hour(),
        }
    }

    fn estimate_request_cost(&self, ctx: &RoutingContext, est_tokens: u64) -> f64 {
        if let Some(cost) = ctx.estimated_cost {
            return cost;
        }
        let backends = self.catalog.backends_for_tier(self.config.default_tier);
        let refs: Vec<&BackendDescriptor> = backends.iter().collect();
        match cheapest(&refs) {
            Some(backend) => estimate_cost(est_tokens, est_tokens, backend),
            None => 0.0,
        }
    }
}

fn outcome_from_invocation(
    request_id: Uuid,
    invocation: Invocation,
    summary: String,
) -> RouteOutcome {
    RouteOutcome {
        request_id,
        content: invocation.content,
        backend_id: invocation.backend_id,
        provider: invocation.provider,
        input_tokens: invocation.input_tokens,
        output_tokens: invocation.output_tokens,
        cost: invocation.cost,
        summary,
        requires_confirmation: false,
        suggested_tier: None,
        escalation_reason: None,
        optimized_prompt: None,
    }
}

fn outcome_from_cross_check(
    request_id: Uuid,
    result: &CrossCheckResult,
    annotation: &str,
) -> RouteOutcome {
    let final_invocation = result.final_invocation();
    RouteOutcome {
        request_id,
        content: result.consensus.clone(),
        backend_id: final_invocation.backend_id.clone(),
        provider: final_invocation.provider.clone(),
        input_tokens: result.total_input_tokens(),
        output_tokens: result.total_output_tokens(),
        cost: result.total_cost(),
        summary: format!("{} {}", result.summary, annotation),
        requires_confirmation: false,
        suggested_tier: None,
        escalation_reason: None,
        optimized_prompt: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
