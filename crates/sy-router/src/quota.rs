//! Admission control gate.
//!
//! The quota gate is an external collaborator; the router consults it
//! exactly once per route, before any backend call, and aborts with
//! `QuotaExceeded` on denial. It stacks independently of policy-level
//! cost thresholds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Verdict from the admission gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    /// Tokens left in the caller's budget window.
    pub remaining_tokens: u64,
    /// When the budget window resets, if known.
    pub resets_at: Option<DateTime<Utc>>,
    /// Denial reason; `None` when allowed.
    pub reason: Option<String>,
}

impl QuotaDecision {
    pub fn allow(remaining_tokens: u64) -> Self {
        Self {
            allowed: true,
            remaining_tokens,
            resets_at: None,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            remaining_tokens: 0,
            resets_at: None,
            reason: Some(reason.into()),
        }
    }
}

/// Pre-flight budget check, evaluated once before routing invokes anything.
#[async_trait]
pub trait QuotaGate: Send + Sync {
    async fn check_quota(
        &self,
        user: Option<&str>,
        project: Option<&str>,
        estimated_tokens: u64,
        estimated_cost: f64,
    ) -> QuotaDecision;
}

/// Gate that admits everything. The default when no quota service is wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl QuotaGate for AllowAll {
    async fn check_quota(
        &self,
        _user: Option<&str>,
        _project: Option<&str>,
        _estimated_tokens: u64,
        _estimated_cost: f64,
    ) -> QuotaDecision {
        QuotaDecision::allow(u64::MAX)
    }
}

/// Rough token estimate for admission checks, roughly four characters per
/// token.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() / 4) as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
