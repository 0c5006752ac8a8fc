//! Request complexity classification.
//!
//! The primary path asks the cheapest general-purpose backend of the lowest
//! tier for a one-word verdict. Anything other than a clean answer — a
//! transport failure, an empty catalog, or free-form output — falls through
//! to a deterministic heuristic that needs no backend at all.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use sy_core::{cheapest, BackendCatalog, TaskType, Tier};

use crate::invoke::{BackendInvoker, InvokeError, Message};

// ---------------------------------------------------------------------------
// Complexity
// ---------------------------------------------------------------------------

/// Complexity bucket for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

/// Keywords whose presence signals a complex request.
const COMPLEXITY_KEYWORDS: &[&str] = &[
    "explain",
    "analyze",
    "implement",
    "architecture",
    "optimize",
    "refactor",
    "debug",
    "design",
];

/// Substrings that mark code-bearing text.
const CODE_MARKERS: &[&str] = &["```", "function", "class", "import"];

/// Deterministic, side-effect-free fallback classification.
pub fn classify_heuristic(text: &str) -> Complexity {
    let lower = text.to_lowercase();
    let words = text.split_whitespace().count();

    let has_code = CODE_MARKERS.iter().any(|m| lower.contains(m));
    let has_keyword = COMPLEXITY_KEYWORDS.iter().any(|k| lower.contains(k));

    if has_code || has_keyword || words > 50 {
        Complexity::High
    } else if words <= 5 {
        Complexity::Low
    } else {
        Complexity::Medium
    }
}

// ---------------------------------------------------------------------------
// Backend-assisted classification
// ---------------------------------------------------------------------------

const CLASSIFY_INSTRUCTION: &str = "Classify the complexity of the following request. \
Answer with exactly one word: low, medium, or high. No punctuation, no explanation.";

/// Classify `text`, preferring one constrained call to the cheapest
/// general-capable backend of the lowest tier.
///
/// Malformed output and call failures degrade to [`classify_heuristic`];
/// only cancellation is propagated, so a cancelled route fails fast.
pub async fn classify(
    text: &str,
    catalog: &dyn BackendCatalog,
    invoker: &dyn BackendInvoker,
    cancel: &CancellationToken,
) -> Result<Complexity, InvokeError> {
    let backends = catalog.backends_for_tier(Tier::lowest());
    let capable: Vec<_> = backends
        .iter()
        .filter(|b| b.supports(TaskType::General))
        .collect();

    let Some(backend) = cheapest(&capable) else {
        debug!("no classifier backend in lowest tier, using heuristic");
        return Ok(classify_heuristic(text));
    };

    let messages = [
        Message::system(CLASSIFY_INSTRUCTION),
        Message::user(text.to_string()),
    ];

    match invoker.invoke(&messages, backend, cancel).await {
        Ok(invocation) => match parse_verdict(&invocation.content) {
            Some(complexity) => Ok(complexity),
            None => {
                debug!(
                    backend = %backend.id,
                    "unparseable classifier output, using heuristic"
                );
                Ok(classify_heuristic(text))
            }
        },
        Err(InvokeError::Cancelled) => Err(InvokeError::Cancelled),
        Err(err) => {
            debug!(backend = %backend.id, error = %err, "classifier call failed, using heuristic");
            Ok(classify_heuristic(text))
        }
    }
}

fn parse_verdict(content: &str) -> Option<Complexity> {
    match content.trim().to_lowercase().as_str() {
        "low" => Some(Complexity::Low),
        "medium" => Some(Complexity::Medium),
        "high" => Some(Complexity::High),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::MockInvoker;
    use sy_core::{default_backend_table, CatalogSnapshot};

    // -- Heuristic --

    #[test]
    fn short_plain_text_is_low() {
        assert_eq!(classify_heuristic("hi"), Complexity::Low);
        assert_eq!(classify_heuristic("what time is it"), Complexity::Low);
    }

    #[test]
    fn keywords_force_high() {
        assert_eq!(
            classify_heuristic("explain the algorithm implementation"),
            Complexity::High
        );
        assert_eq!(
            classify_heuristic("please analyze this trace"),
            Complexity::High
        );
    }

    #[test]
    fn code_markers_force_high() {
        assert_eq!(classify_heuristic("```rust\nfn main() {}\n```"), Complexity::High);
        assert_eq!(
            classify_heuristic("why does this function return nil"),
            Complexity::High
        );
    }

    #[test]
    fn long_text_is_high() {
        let text = "word ".repeat(60);
        assert_eq!(classify_heuristic(&text), Complexity::High);
    }

    #[test]
    fn middling_text_is_medium() {
        assert_eq!(
            classify_heuristic("tell me about the weather in northern portugal"),
            Complexity::Medium
        );
    }

    #[test]
    fn complexity_ordering() {
        assert!(Complexity::Low < Complexity::Medium);
        assert!(Complexity::Medium < Complexity::High);
    }

    // -- Backend-assisted path --

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot::new(default_backend_table())
    }

    #[tokio::test]
    async fn uses_backend_verdict_when_clean() {
        let invoker = MockInvoker::new().with_reply("  High \n");
        let cancel = CancellationToken::new();

        let complexity = classify("hi", &catalog(), &invoker, &cancel).await.unwrap();
        assert_eq!(complexity, Complexity::High);
        assert_eq!(invoker.call_count(), 1);
    }

    #[tokio::test]
    async fn malformed_verdict_falls_back_to_heuristic() {
        let invoker = MockInvoker::new().with_reply("this looks moderately complex to me");
        let cancel = CancellationToken::new();

        let complexity = classify("hi", &catalog(), &invoker, &cancel).await.unwrap();
        assert_eq!(complexity, Complexity::Low);
    }

    #[tokio::test]
    async fn call_failure_falls_back_to_heuristic() {
        let invoker = MockInvoker::new().with_error(InvokeError::Timeout);
        let cancel = CancellationToken::new();

        let complexity = classify("explain this design", &catalog(), &invoker, &cancel)
            .await
            .unwrap();
        assert_eq!(complexity, Complexity::High);
    }

    #[tokio::test]
    async fn empty_catalog_uses_heuristic_without_calls() {
        let empty = CatalogSnapshot::new(Vec::new());
        let invoker = MockInvoker::new();
        let cancel = CancellationToken::new();

        let complexity = classify("hi", &empty, &invoker, &cancel).await.unwrap();
        assert_eq!(complexity, Complexity::Low);
        assert_eq!(invoker.call_count(), 0);
    }

    #[tokio::test]
    async fn cancellation_propagates() {
        let invoker = MockInvoker::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = classify("hi", &catalog(), &invoker, &cancel).await;
        assert!(matches!(result, Err(InvokeError::Cancelled)));
    }

    #[tokio::test]
    async fn classifier_prompt_constrains_output() {
        let invoker = MockInvoker::new().with_reply("low");
        let cancel = CancellationToken::new();

        classify("hi", &catalog(), &invoker, &cancel).await.unwrap();

        let calls = invoker.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1[0].content.contains("exactly one word"));
        assert_eq!(calls[0].1[1].content, "hi");
    }
}
