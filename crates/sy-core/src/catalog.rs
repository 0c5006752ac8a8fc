//! Read-only catalog of available backends.
//!
//! The catalog is an immutable snapshot for the duration of one routing
//! decision. Administrative changes (enable/disable a backend or a whole
//! tier) produce a new snapshot that takes effect for decisions starting
//! after the swap.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::backend::BackendDescriptor;
use crate::tier::Tier;

// ---------------------------------------------------------------------------
// BackendCatalog trait
// ---------------------------------------------------------------------------

/// Read-only view over available backends per tier.
pub trait BackendCatalog: Send + Sync {
    /// Enabled backends of an enabled tier, sorted by `priority` ascending.
    /// Empty if the tier itself is disabled.
    fn backends_for_tier(&self, tier: Tier) -> Vec<BackendDescriptor>;

    /// Whether a tier accepts routing at all.
    fn is_tier_enabled(&self, tier: Tier) -> bool;

    /// The next enabled tier above `tier`, or `None` at the top.
    fn next_tier(&self, tier: Tier) -> Option<Tier> {
        let mut current = tier;
        while let Some(next) = current.next_up() {
            if self.is_tier_enabled(next) {
                return Some(next);
            }
            current = next;
        }
        None
    }
}

// ---------------------------------------------------------------------------
// CatalogSnapshot
// ---------------------------------------------------------------------------

/// In-memory catalog snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    backends: Vec<BackendDescriptor>,
    disabled_tiers: HashSet<Tier>,
}

impl CatalogSnapshot {
    pub fn new(backends: Vec<BackendDescriptor>) -> Self {
        Self {
            backends,
            disabled_tiers: HashSet::new(),
        }
    }

    /// Disable a whole tier. Returns the modified snapshot for chaining.
    pub fn with_tier_disabled(mut self, tier: Tier) -> Self {
        self.disabled_tiers.insert(tier);
        self
    }

    /// All backends in the snapshot, including disabled ones.
    pub fn backends(&self) -> &[BackendDescriptor] {
        &self.backends
    }
}

impl BackendCatalog for CatalogSnapshot {
    fn backends_for_tier(&self, tier: Tier) -> Vec<BackendDescriptor> {
        if !self.is_tier_enabled(tier) {
            return Vec::new();
        }
        let mut matching: Vec<BackendDescriptor> = self
            .backends
            .iter()
            .filter(|b| b.tier == tier && b.enabled)
            .cloned()
            .collect();
        // Stable: catalog order breaks priority ties.
        matching.sort_by_key(|b| b.priority);
        matching
    }

    fn is_tier_enabled(&self, tier: Tier) -> bool {
        !self.disabled_tiers.contains(&tier)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
