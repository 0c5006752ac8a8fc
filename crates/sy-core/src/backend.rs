//! Backend descriptors and capability flags.

use serde::{Deserialize, Serialize};

use crate::tier::Tier;

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// What a backend can do. A backend carries a flat set of these flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Code,
    General,
    Reasoning,
    Vision,
}

/// The kind of work a request represents, used to filter backends by
/// capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Code,
    General,
    Reasoning,
    Vision,
}

impl TaskType {
    /// The capability a backend must carry to serve this task type.
    pub fn required_capability(&self) -> Capability {
        match self {
            TaskType::Code => Capability::Code,
            TaskType::Reasoning => Capability::Reasoning,
            TaskType::Vision => Capability::Vision,
            TaskType::General => Capability::General,
        }
    }
}

// ---------------------------------------------------------------------------
// BackendDescriptor
// ---------------------------------------------------------------------------

/// One invocable compute backend, scoped to a tier.
///
/// Descriptors are immutable for the duration of a routing decision.
/// Administrative enable/disable produces a new catalog snapshot; no
/// decision observes a backend flipping state mid-flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Unique backend id, typically the model name.
    pub id: String,
    /// Provider label (e.g. "anthropic", "openai", "local").
    pub provider: String,
    pub tier: Tier,
    pub capabilities: Vec<Capability>,
    /// USD per 1,000 input tokens. `None` means free or unknown.
    pub input_cost_per_1k: Option<f64>,
    /// USD per 1,000 output tokens. `None` means free or unknown.
    pub output_cost_per_1k: Option<f64>,
    /// Context window size in tokens.
    pub context_window: u64,
    pub enabled: bool,
    /// Intra-tier preference, lower = preferred.
    pub priority: u32,
    /// Ranking number used to compare backends when price data is absent.
    pub relative_cost: u32,
}

impl BackendDescriptor {
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Whether this backend can serve the given task type.
    pub fn supports(&self, task: TaskType) -> bool {
        self.has_capability(task.required_capability())
    }
}

/// Default backend table covering common hosted and local models
/// (approximate 2025-2026 pricing, USD per 1k tokens).
pub fn default_backend_table() -> Vec<BackendDescriptor> {
    vec![
        // Free tier — local inference
        BackendDescriptor {
            id: "llama-3.3-70b-local".into(),
            provider: "local".into(),
            tier: Tier::Free,
            capabilities: vec![Capability::General, Capability::Code],
            input_cost_per_1k: None,
            output_cost_per_1k: None,
            context_window: 128_000,
            enabled: true,
            priority: 0,
            relative_cost: 1,
        },
        BackendDescriptor {
            id: "qwen-2.5-coder-local".into(),
            provider: "local".into(),
            tier: Tier::Free,
            capabilities: vec![Capability::General, Capability::Code],
            input_cost_per_1k: None,
            output_cost_per_1k: None,
            context_window: 32_000,
            enabled: true,
            priority: 1,
            relative_cost: 1,
        },
        // Standard tier
        BackendDescriptor {
            id: "claude-haiku-4-20250514".into(),
            provider: "anthropic".into(),
            tier: Tier::Standard,
            capabilities: vec![Capability::General, Capability::Code, Capability::Vision],
            input_cost_per_1k: Some(0.0008),
            output_cost_per_1k: Some(0.004),
            context_window: 200_000,
            enabled: true,
            priority: 0,
            relative_cost: 10,
        },
        BackendDescriptor {
            id: "gpt-4o-mini".into(),
            provider: "openai".into(),
            tier: Tier::Standard,
            capabilities: vec![Capability::General, Capability::Code, Capability::Vision],
            input_cost_per_1k: Some(0.00015),
            output_cost_per_1k: Some(0.0006),
            context_window: 128_000,
            enabled: true,
            priority: 1,
            relative_cost: 5,
        },
        // Premium tier
        BackendDescriptor {
            id: "claude-sonnet-4-20250514".into(),
            provider: "anthropic".into(),
            tier: Tier::Premium,
            capabilities: vec![
                Capability::General,
                Capability::Code,
                Capability::Reasoning,
                Capability::Vision,
            ],
            input_cost_per_1k: Some(0.003),
            output_cost_per_1k: Some(0.015),
            context_window: 200_000,
            enabled: true,
            priority: 0,
            relative_cost: 40,
        },
        BackendDescriptor {
            id: "gpt-4o".into(),
            provider: "openai".into(),
            tier: Tier::Premium,
            capabilities: vec![Capability::General, Capability::Code, Capability::Vision],
            input_cost_per_1k: Some(0.0025),
            output_cost_per_1k: Some(0.01),
            context_window: 128_000,
            enabled: true,
            priority: 1,
            relative_cost: 35,
        },
        BackendDescriptor {
            id: "o3-mini".into(),
            provider: "openai".into(),
            tier: Tier::Premium,
            capabilities: vec![Capability::General, Capability::Reasoning],
            input_cost_per_1k: Some(0.0011),
            output_cost_per_1k: Some(0.0044),
            context_window: 200_000,
            enabled: true,
            priority: 2,
            relative_cost: 30,
        },
        // Elite tier
        BackendDescriptor {
            id: "claude-opus-4-20250514".into(),
            provider: "anthropic".into(),
            tier: Tier::Elite,
            capabilities: vec![
                Capability::General,
                Capability::Code,
                Capability::Reasoning,
                Capability::Vision,
            ],
            input_cost_per_1k: Some(0.015),
            output_cost_per_1k: Some(0.075),
            context_window: 200_000,
            enabled: true,
            priority: 0,
            relative_cost: 100,
        },
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_capability_mapping() {
        assert_eq!(TaskType::Code.required_capability(), Capability::Code);
        assert_eq!(
            TaskType::Reasoning.required_capability(),
            Capability::Reasoning
        );
        assert_eq!(TaskType::Vision.required_capability(), Capability::Vision);
        assert_eq!(TaskType::General.required_capability(), Capability::General);
    }

    #[test]
    fn backend_supports_task() {
        let backend = BackendDescriptor {
            id: "b".into(),
            provider: "test".into(),
            tier: Tier::Free,
            capabilities: vec![Capability::General, Capability::Code],
            input_cost_per_1k: None,
            output_cost_per_1k: None,
            context_window: 8192,
            enabled: true,
            priority: 0,
            relative_cost: 1,
        };
        assert!(backend.supports(TaskType::Code));
        assert!(backend.supports(TaskType::General));
        assert!(!backend.supports(TaskType::Reasoning));
        assert!(!backend.supports(TaskType::Vision));
    }

    #[test]
    fn default_table_has_every_tier() {
        let table = default_backend_table();
        for tier in Tier::all() {
            assert!(
                table.iter().any(|b| b.tier == tier),
                "no backend in {tier}"
            );
        }
    }

    #[test]
    fn default_table_free_tier_has_no_prices() {
        for backend in default_backend_table()
            .iter()
            .filter(|b| b.tier == Tier::Free)
        {
            assert!(backend.input_cost_per_1k.is_none());
            assert!(backend.output_cost_per_1k.is_none());
        }
    }

    #[test]
    fn descriptor_serialization_roundtrip() {
        let backend = &default_backend_table()[2];
        let json = serde_json::to_string(backend).unwrap();
        let deser: BackendDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(deser.id, backend.id);
        assert_eq!(deser.tier, Tier::Standard);
        assert_eq!(deser.capabilities, backend.capabilities);
    }
}
