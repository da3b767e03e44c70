//! Aegis Compaction Aggregation Registry
//!
//! Translation between textual aggregation names and the internal
//! aggregation type, and the factory producing a fresh aggregator for a
//! type. Names are case-insensitive; matching dispatches on length first
//! and then compares whole tokens, so prefixes never match.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::aggregation::Aggregator;
use aegis_common::AegisError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Aggregation Type
// =============================================================================

/// Aggregation applied to each bucket of a compaction rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationType {
    #[serde(rename = "min")]
    Min,
    #[serde(rename = "max")]
    Max,
    #[serde(rename = "sum")]
    Sum,
    #[serde(rename = "avg")]
    Avg,
    #[serde(rename = "count")]
    Count,
    #[serde(rename = "first")]
    First,
    #[serde(rename = "last")]
    Last,
    #[serde(rename = "range")]
    Range,
    #[serde(rename = "std.p")]
    StdP,
    #[serde(rename = "std.s")]
    StdS,
    #[serde(rename = "var.p")]
    VarP,
    #[serde(rename = "var.s")]
    VarS,
    #[serde(rename = "twa")]
    Twa,
}

impl AggregationType {
    /// Every aggregation type, in registry order.
    pub const ALL: [AggregationType; 13] = [
        AggregationType::Min,
        AggregationType::Max,
        AggregationType::Sum,
        AggregationType::Avg,
        AggregationType::Count,
        AggregationType::First,
        AggregationType::Last,
        AggregationType::Range,
        AggregationType::StdP,
        AggregationType::StdS,
        AggregationType::VarP,
        AggregationType::VarS,
        AggregationType::Twa,
    ];

    /// Resolve a case-insensitive name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        let candidates: &[AggregationType] = match name.len() {
            3 => &[
                AggregationType::Min,
                AggregationType::Max,
                AggregationType::Sum,
                AggregationType::Avg,
                AggregationType::Twa,
            ],
            4 => &[AggregationType::Last],
            5 => &[
                AggregationType::Count,
                AggregationType::Range,
                AggregationType::First,
                AggregationType::StdP,
                AggregationType::StdS,
                AggregationType::VarP,
                AggregationType::VarS,
            ],
            _ => return None,
        };

        candidates
            .iter()
            .copied()
            .find(|agg| agg.as_str().eq_ignore_ascii_case(name))
    }

    /// Canonical lowercase token.
    pub const fn as_str(self) -> &'static str {
        match self {
            AggregationType::Min => "min",
            AggregationType::Max => "max",
            AggregationType::Sum => "sum",
            AggregationType::Avg => "avg",
            AggregationType::Count => "count",
            AggregationType::First => "first",
            AggregationType::Last => "last",
            AggregationType::Range => "range",
            AggregationType::StdP => "std.p",
            AggregationType::StdS => "std.s",
            AggregationType::VarP => "var.p",
            AggregationType::VarS => "var.s",
            AggregationType::Twa => "twa",
        }
    }

    /// Uppercase display name, as reported back to clients.
    pub const fn display_name(self) -> &'static str {
        match self {
            AggregationType::Min => "MIN",
            AggregationType::Max => "MAX",
            AggregationType::Sum => "SUM",
            AggregationType::Avg => "AVG",
            AggregationType::Count => "COUNT",
            AggregationType::First => "FIRST",
            AggregationType::Last => "LAST",
            AggregationType::Range => "RANGE",
            AggregationType::StdP => "STD.P",
            AggregationType::StdS => "STD.S",
            AggregationType::VarP => "VAR.P",
            AggregationType::VarS => "VAR.S",
            AggregationType::Twa => "TWA",
        }
    }

    /// True if finalize on an empty bucket is an error rather than a value.
    pub const fn requires_samples(self) -> bool {
        matches!(
            self,
            AggregationType::Avg
                | AggregationType::StdP
                | AggregationType::StdS
                | AggregationType::VarP
                | AggregationType::VarS
        )
    }

    /// True if the result depends on sample order and timestamps.
    pub const fn is_order_sensitive(self) -> bool {
        matches!(self, AggregationType::Twa)
    }

    /// Fresh aggregator for this type.
    pub fn create(self, reverse: bool) -> Aggregator {
        Aggregator::new(self, reverse)
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for AggregationType {
    type Err = AegisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| AegisError::UnknownAggregation(s.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        assert_eq!(AggregationType::from_name("AVG"), Some(AggregationType::Avg));
        assert_eq!(AggregationType::from_name("avg"), Some(AggregationType::Avg));
        assert_eq!(AggregationType::from_name("Std.P"), Some(AggregationType::StdP));
        assert_eq!(AggregationType::from_name("tWa"), Some(AggregationType::Twa));
    }

    #[test]
    fn test_unknown_names() {
        for name in ["bogus", "", "av", "avgs", "std", "std.x", "median", "lastt", "var_p"] {
            assert_eq!(AggregationType::from_name(name), None, "{name}");
        }
        let err = "bogus".parse::<AggregationType>().unwrap_err();
        assert!(matches!(err, AegisError::UnknownAggregation(ref n) if n == "bogus"));
    }

    #[test]
    fn test_display_round_trip() {
        for agg in AggregationType::ALL {
            let token = agg.as_str();
            let parsed: AggregationType = token.parse().expect("canonical token should parse");
            assert_eq!(parsed.to_string(), token.to_uppercase());
            assert_eq!(AggregationType::from_name(&token.to_uppercase()), Some(agg));
        }
    }

    #[test]
    fn test_factory_matches_type() {
        for agg in AggregationType::ALL {
            assert_eq!(agg.create(false).aggregation_type(), agg);
        }
    }

    #[test]
    fn test_serde_uses_canonical_tokens() {
        #[derive(Serialize, Deserialize)]
        struct Rule {
            aggregation: AggregationType,
        }

        let rule: Rule = toml::from_str("aggregation = \"var.s\"").expect("rule should parse");
        assert_eq!(rule.aggregation, AggregationType::VarS);
    }

    #[test]
    fn test_empty_semantics_flags() {
        assert!(AggregationType::Avg.requires_samples());
        assert!(AggregationType::VarS.requires_samples());
        assert!(!AggregationType::Count.requires_samples());
        assert!(!AggregationType::Last.requires_samples());
        assert!(AggregationType::Twa.is_order_sensitive());
        assert!(!AggregationType::Max.is_order_sensitive());
    }
}
