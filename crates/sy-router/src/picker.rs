//! Backend selection within a tier.
//!
//! Filters a tier's backends by the task's required capability and picks
//! the cheapest candidate. An empty tier falls back to the lowest free
//! tier before giving up.

use tracing::debug;

use sy_core::{cheapest, BackendCatalog, BackendDescriptor, TaskType, Tier};

use crate::error::RouteError;

/// Pick a backend for `task` in `tier`.
///
/// Filter order: capability match within the tier, then any backend in the
/// tier, then the same two steps against the lowest free tier. Only when
/// all four come up empty does the route fail.
pub fn pick_backend(
    catalog: &dyn BackendCatalog,
    tier: Tier,
    task: TaskType,
) -> Result<BackendDescriptor, RouteError> {
    if let Some(backend) = pick_within(catalog, tier, task) {
        return Ok(backend);
    }
    let fallback = Tier::lowest();
    if fallback != tier {
        if let Some(backend) = pick_within(catalog, fallback, task) {
            debug!(requested = %tier, %fallback, backend = %backend.id, "fell back to free tier");
            return Ok(backend);
        }
    }
    Err(RouteError::NoBackendAvailable { tier })
}

fn pick_within(catalog: &dyn BackendCatalog, tier: Tier, task: TaskType) -> Option<BackendDescriptor> {
    let backends = catalog.backends_for_tier(tier);
    if backends.is_empty() {
        return None;
    }
    let capable: Vec<&BackendDescriptor> = backends.iter().filter(|b| b.supports(task)).collect();
    if let Some(backend) = cheapest(&capable) {
        return Some(backend.clone());
    }
    // Nothing with the right capability; any backend in the tier will do.
    let all: Vec<&BackendDescriptor> = backends.iter().collect();
    cheapest(&all).cloned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
