//! Policy rules and the first-match-wins matcher.
//!
//! Policies let operators force, deny, or adjust tier selection
//! independently of complexity. Rules are conjunctive: every condition
//! present on a rule must hold; an omitted condition always matches.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sy_core::{TaskType, Tier};

use crate::classifier::Complexity;

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

/// Aggregated severity attached to a policy match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

// ---------------------------------------------------------------------------
// Actions and conditions
// ---------------------------------------------------------------------------

/// What a matched rule does to the routing decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    /// Let the request through with no tier adjustment.
    Allow,
    /// Abort the route.
    Deny,
    /// Move one tier above the would-be default.
    Escalate,
    /// Force a cheaper tier.
    Downgrade { tier: Tier },
    /// Force a specific tier.
    RouteTo { tier: Tier },
}

/// A `[start, end)` window over hours 0-23. When `start > end` the window
/// wraps past midnight (18→8 means "after 6pm or before 8am").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: u32,
    pub end: u32,
}

impl TimeWindow {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start <= self.end {
            hour >= self.start && hour < self.end
        } else {
            hour >= self.start || hour < self.end
        }
    }
}

/// Conjunctive rule condition; omitted fields always match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleCondition {
    /// Task type membership.
    #[serde(default)]
    pub task_types: Option<Vec<TaskType>>,
    /// Complexity bucket.
    #[serde(default)]
    pub complexity: Option<Complexity>,
    /// Regex tested against the literal file path (not a glob).
    #[serde(default)]
    pub file_pattern: Option<String>,
    /// Matches when the request's estimated cost is at or above this amount.
    #[serde(default)]
    pub min_cost: Option<f64>,
    /// Time-of-day window.
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
    /// User role membership.
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

impl RuleCondition {
    fn matches(&self, ctx: &MatchContext) -> bool {
        if let Some(ref task_types) = self.task_types {
            if !task_types.contains(&ctx.task_type) {
                return false;
            }
        }
        if let Some(complexity) = self.complexity {
            if complexity != ctx.complexity {
                return false;
            }
        }
        if let Some(ref pattern) = self.file_pattern {
            let Some(ref path) = ctx.file_path else {
                return false;
            };
            match Regex::new(pattern) {
                Ok(re) => {
                    if !re.is_match(path) {
                        return false;
                    }
                }
                Err(err) => {
                    warn!(pattern = %pattern, error = %err, "invalid file pattern in policy rule");
                    return false;
                }
            }
        }
        if let Some(min_cost) = self.min_cost {
            if ctx.estimated_cost < min_cost {
                return false;
            }
        }
        if let Some(window) = self.time_window {
            if !window.contains(ctx.hour) {
                return false;
            }
        }
        if let Some(ref roles) = self.roles {
            let Some(ref role) = ctx.role else {
                return false;
            };
            if !roles.contains(role) {
                return false;
            }
        }
        true
    }
}

/// One condition → action mapping with a severity tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub condition: RuleCondition,
    pub action: PolicyAction,
    pub risk: RiskLevel,
}

/// An ordered group of rules with an evaluation priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingPolicy {
    pub name: String,
    /// Higher priority evaluates first.
    pub priority: i32,
    pub enabled: bool,
    pub rules: Vec<PolicyRule>,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Snapshot of the request facts a rule can condition on.
#[derive(Debug, Clone)]
pub struct MatchContext {
    pub task_type: TaskType,
    pub complexity: Complexity,
    pub file_path: Option<String>,
    pub estimated_cost: f64,
    pub role: Option<String>,
    /// Local hour of day, 0-23.
    pub hour: u32,
}

/// Outcome of policy evaluation.
#[derive(Debug, Clone)]
pub struct PolicyMatch {
    /// Name of the policy whose rule matched, if any.
    pub policy: Option<String>,
    pub action: Option<PolicyAction>,
    pub risk: RiskLevel,
}

impl PolicyMatch {
    fn none() -> Self {
        Self {
            policy: None,
            action: None,
            risk: RiskLevel::Low,
        }
    }
}

/// Evaluate enabled policies highest-priority-first, rules in order.
/// The first matching rule wins globally.
pub fn match_policies(policies: &[RoutingPolicy], ctx: &MatchContext) -> PolicyMatch {
    let mut ordered: Vec<&RoutingPolicy> = policies.iter().filter(|p| p.enabled).collect();
    ordered.sort_by_key(|p| std::cmp::Reverse(p.priority));

    for policy in ordered {
        for rule in &policy.rules {
            if rule.condition.matches(ctx) {
                debug!(policy = %policy.name, action = ?rule.action, "policy rule matched");
                return PolicyMatch {
                    policy: Some(policy.name.clone()),
                    action: Some(rule.action.clone()),
                    risk: RiskLevel::Low.max(rule.risk),
                };
            }
        }
    }
    PolicyMatch::none()
}

// ---------------------------------------------------------------------------
// Built-in policies
// ---------------------------------------------------------------------------

/// Default policy set. Administrator-added policies stack on top of these.
pub fn builtin_policies() -> Vec<RoutingPolicy> {
    vec![
        RoutingPolicy {
            name: "sensitive-paths".into(),
            priority: 100,
            enabled: true,
            rules: vec![PolicyRule {
                condition: RuleCondition {
                    file_pattern: Some(r".*(auth|security|secrets|crypto).*".into()),
                    ..RuleCondition::default()
                },
                action: PolicyAction::Escalate,
                risk: RiskLevel::High,
            }],
        },
        RoutingPolicy {
            name: "runaway-cost".into(),
            priority: 90,
            enabled: true,
            rules: vec![PolicyRule {
                condition: RuleCondition {
                    min_cost: Some(25.0),
                    ..RuleCondition::default()
                },
                action: PolicyAction::Deny,
                risk: RiskLevel::Critical,
            }],
        },
        RoutingPolicy {
            name: "complex-code".into(),
            priority: 10,
            enabled: true,
            rules: vec![PolicyRule {
                condition: RuleCondition {
                    task_types: Some(vec![TaskType::Code]),
                    complexity: Some(Complexity::High),
                    ..RuleCondition::default()
                },
                action: PolicyAction::RouteTo { tier: Tier::Premium },
                risk: RiskLevel::Medium,
            }],
        },
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
