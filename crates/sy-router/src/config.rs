//! Router configuration.

use serde::{Deserialize, Serialize};

use sy_core::Tier;

/// Options recognized by the router. Read once per route call, never
/// mutated by the core; per-call context flags can override the two
/// booleans.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Tier used when neither policy nor quality says otherwise.
    pub default_tier: Tier,
    /// Escalation never climbs above this tier.
    pub max_escalation_tier: Tier,
    /// Re-run a conflicted cross-check at the next tier without asking.
    pub enable_auto_escalate: bool,
    /// Cross-check high-complexity requests.
    pub enable_cross_check: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_tier: Tier::Free,
            max_escalation_tier: Tier::Elite,
            enable_auto_escalate: false,
            enable_cross_check: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
