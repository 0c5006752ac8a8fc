//! Cost estimation and relative-cost ranking.
//!
//! Pure functions. A backend with missing price data is treated as free,
//! never as an error; `relative_cost` carries the ranking when prices are
//! absent.

use crate::backend::BackendDescriptor;

/// Monetary cost in USD for the given token counts against a backend's
/// per-1k prices. A missing price field contributes zero.
pub fn estimate_cost(input_tokens: u64, output_tokens: u64, backend: &BackendDescriptor) -> f64 {
    let input = backend
        .input_cost_per_1k
        .map(|rate| (input_tokens as f64 / 1000.0) * rate)
        .unwrap_or(0.0);
    let output = backend
        .output_cost_per_1k
        .map(|rate| (output_tokens as f64 / 1000.0) * rate)
        .unwrap_or(0.0);
    input + output
}

/// The backend with the minimum `relative_cost`. Ties keep the earliest
/// entry, so catalog order is the tiebreaker.
pub fn cheapest<'a>(backends: &[&'a BackendDescriptor]) -> Option<&'a BackendDescriptor> {
    backends
        .iter()
        .copied()
        .min_by_key(|b| b.relative_cost)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
