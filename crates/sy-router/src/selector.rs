//! Initial tier selection.
//!
//! Combines explicit caller preference, policy output, and classified
//! complexity/quality. Explicit preference is handled by the router before
//! this module runs; here the policy action and quality defaults resolve.

use serde::{Deserialize, Serialize};
use tracing::debug;

use sy_core::Tier;

use crate::classifier::Complexity;
use crate::error::RouteError;
use crate::policy::{PolicyAction, PolicyMatch};

// ---------------------------------------------------------------------------
// Quality preference
// ---------------------------------------------------------------------------

/// How much the caller cares about answer quality over cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreference {
    #[default]
    Normal,
    High,
    Critical,
}

// ---------------------------------------------------------------------------
// Tier selection
// ---------------------------------------------------------------------------

/// Resolve the initial tier from policy output, complexity, and quality.
///
/// A matched `Deny` aborts with [`RouteError::PolicyDenied`]. `RouteTo` and
/// `Downgrade` adopt the rule's tier; `Escalate` takes the tier above the
/// would-be quality default, clamped at the top.
pub fn select_tier(
    policy: &PolicyMatch,
    complexity: Complexity,
    quality: QualityPreference,
    default_tier: Tier,
) -> Result<Tier, RouteError> {
    let quality_default = quality_default(complexity, quality, default_tier);

    let tier = match policy.action.as_ref() {
        Some(PolicyAction::Deny) => {
            return Err(RouteError::PolicyDenied {
                policy: policy.policy.clone().unwrap_or_else(|| "unknown".into()),
                reason: format!("risk {:?}", policy.risk),
            });
        }
        Some(PolicyAction::RouteTo { tier }) | Some(PolicyAction::Downgrade { tier }) => *tier,
        Some(PolicyAction::Escalate) => quality_default.next_up().unwrap_or(quality_default),
        Some(PolicyAction::Allow) | None => quality_default,
    };

    debug!(?complexity, ?quality, %tier, "tier selected");
    Ok(tier)
}

fn quality_default(complexity: Complexity, quality: QualityPreference, default_tier: Tier) -> Tier {
    match quality {
        QualityPreference::Critical => Tier::second_highest(),
        QualityPreference::High if complexity == Complexity::High => {
            default_tier.next_up().unwrap_or(default_tier)
        }
        _ => default_tier,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
