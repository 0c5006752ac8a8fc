//! Tiered inference routing.
//!
//! Routes a request to one of several cost/quality tiers of backends,
//! optionally cross-validates the result across multiple backends, and
//! decides whether to escalate to a more expensive tier when validation
//! disagrees — all as a pure decision engine over externally supplied
//! facts: a catalog snapshot, a policy rule set, and quota status.
//!
//! Pipeline: admission gate → complexity classification → policy matching
//! → tier selection → backend pick or cross-check → escalation decision.
//! An explicit tier preference bypasses everything between the gate and
//! the single backend call.

pub mod classifier;
pub mod config;
pub mod crosscheck;
pub mod error;
pub mod escalate;
pub mod invoke;
pub mod picker;
pub mod policy;
pub mod quota;
pub mod router;
pub mod selector;

pub use classifier::{classify, classify_heuristic, Complexity};
pub use config::RouterConfig;
pub use crosscheck::{ConflictDetector, CrossCheckResult, CrossChecker, KeywordConflictDetector};
pub use error::RouteError;
pub use escalate::{build_escalation_prompt, EscalationState, Resolution};
pub use invoke::{BackendInvoker, HttpInvoker, InvokeError, Invocation, Message, MockInvoker, Role};
pub use picker::pick_backend;
pub use policy::{
    builtin_policies, match_policies, MatchContext, PolicyAction, PolicyMatch, PolicyRule,
    RiskLevel, RoutingPolicy, RuleCondition, TimeWindow,
};
pub use quota::{estimate_tokens, AllowAll, QuotaDecision, QuotaGate};
pub use router::{PolicyPreview, RouteOutcome, Router, RoutingContext};
pub use selector::{select_tier, QualityPreference};
