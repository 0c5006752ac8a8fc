//! Ordered cost/quality tiers.
//!
//! A tier is a bucket of backends at a comparable price point. Tiers are
//! totally ordered from the free tier up to the most expensive one, and the
//! ordering drives escalation: a conflict at one tier suggests a retry at
//! the tier directly above it.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// A cost/quality bucket of backends, ordered cheapest-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// No-cost backends (local models, free API allowances).
    Free,
    /// Entry-level paid backends.
    Standard,
    /// High-quality paid backends.
    Premium,
    /// Frontier backends reserved for critical work.
    Elite,
}

impl Tier {
    /// All tiers, cheapest first.
    pub fn all() -> [Tier; 4] {
        [Tier::Free, Tier::Standard, Tier::Premium, Tier::Elite]
    }

    /// Stable short code used in routing summaries and escalation prompts.
    pub fn code(&self) -> &'static str {
        match self {
            Tier::Free => "T0",
            Tier::Standard => "T1",
            Tier::Premium => "T2",
            Tier::Elite => "T3",
        }
    }

    /// The tier directly above this one, or `None` at the top.
    pub fn next_up(&self) -> Option<Tier> {
        match self {
            Tier::Free => Some(Tier::Standard),
            Tier::Standard => Some(Tier::Premium),
            Tier::Premium => Some(Tier::Elite),
            Tier::Elite => None,
        }
    }

    /// The cheapest tier.
    pub fn lowest() -> Tier {
        Tier::Free
    }

    /// The most expensive tier.
    pub fn highest() -> Tier {
        Tier::Elite
    }

    /// The tier directly below the most expensive one.
    pub fn second_highest() -> Tier {
        Tier::Premium
    }

    /// Whether backends in this tier cost nothing to call.
    pub fn is_free(&self) -> bool {
        matches!(self, Tier::Free)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ordering() {
        assert!(Tier::Free < Tier::Standard);
        assert!(Tier::Standard < Tier::Premium);
        assert!(Tier::Premium < Tier::Elite);
    }

    #[test]
    fn tier_next_up_chain() {
        assert_eq!(Tier::Free.next_up(), Some(Tier::Standard));
        assert_eq!(Tier::Standard.next_up(), Some(Tier::Premium));
        assert_eq!(Tier::Premium.next_up(), Some(Tier::Elite));
        assert_eq!(Tier::Elite.next_up(), None);
        assert_eq!(Tier::highest().next_up(), None);
        assert_eq!(Tier::lowest(), Tier::Free);
        assert_eq!(Tier::second_highest().next_up(), Some(Tier::highest()));
    }

    #[test]
    fn tier_codes_are_stable() {
        let codes: Vec<&str> = Tier::all().iter().map(|t| t.code()).collect();
        assert_eq!(codes, vec!["T0", "T1", "T2", "T3"]);
    }

    #[test]
    fn only_lowest_tier_is_free() {
        assert!(Tier::Free.is_free());
        assert!(!Tier::Standard.is_free());
        assert!(!Tier::Premium.is_free());
        assert!(!Tier::Elite.is_free());
    }

    #[test]
    fn tier_display_matches_code() {
        assert_eq!(Tier::Free.to_string(), "T0");
        assert_eq!(Tier::Elite.to_string(), "T3");
    }
}
