//! Route-level error taxonomy.
//!
//! `requires_confirmation` on a [`crate::router::RouteOutcome`] is a valid
//! terminal state, not an error. Everything here is fatal for the current
//! route; the caller decides whether to retry the whole request.

use chrono::{DateTime, Utc};
use thiserror::Error;

use sy_core::Tier;

use crate::invoke::InvokeError;

/// Why a route failed.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The catalog was exhausted even after the free-tier fallback.
    #[error("no backend available in {tier} or its fallback")]
    NoBackendAvailable { tier: Tier },

    /// A backend call failed; propagated unchanged, no internal retry.
    #[error("backend invocation failed: {0}")]
    Invocation(InvokeError),

    /// The admission gate rejected the request before any backend call.
    #[error("quota exceeded: {reason}")]
    QuotaExceeded {
        reason: String,
        remaining_tokens: u64,
        resets_at: Option<DateTime<Utc>>,
    },

    /// A policy rule's action was deny.
    #[error("denied by policy {policy}: {reason}")]
    PolicyDenied { policy: String, reason: String },

    /// The caller cancelled; no partial cross-check result is returned.
    #[error("route cancelled")]
    Cancelled,
}

impl From<InvokeError> for RouteError {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::Cancelled => RouteError::Cancelled,
            other => RouteError::Invocation(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
