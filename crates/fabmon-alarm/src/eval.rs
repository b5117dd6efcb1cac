//! Pure threshold evaluation. No I/O, no clock.

use fabmon_common::types::{ConditionType, RuleSet, ThresholdRule};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
    Equal,
    NotEqual,
}

impl FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(Self::GreaterThan),
            "<" => Ok(Self::LessThan),
            ">=" => Ok(Self::GreaterEqual),
            "<=" => Ok(Self::LessEqual),
            "==" => Ok(Self::Equal),
            "!=" => Ok(Self::NotEqual),
            _ => Err(format!("unknown compare operator: {s}")),
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GreaterThan => write!(f, ">"),
            Self::LessThan => write!(f, "<"),
            Self::GreaterEqual => write!(f, ">="),
            Self::LessEqual => write!(f, "<="),
            Self::Equal => write!(f, "=="),
            Self::NotEqual => write!(f, "!="),
        }
    }
}

impl CompareOp {
    pub fn check(&self, sample: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => sample > threshold,
            Self::LessThan => sample < threshold,
            Self::GreaterEqual => sample >= threshold,
            Self::LessEqual => sample <= threshold,
            Self::Equal => sample == threshold,
            Self::NotEqual => sample != threshold,
        }
    }
}

/// True when `rule` matches `sample`. Operators are stored as strings; one
/// that does not parse to a known comparison never matches.
pub fn rule_matches(sample: f64, rule: &ThresholdRule) -> bool {
    rule.operator
        .parse::<CompareOp>()
        .map(|op| op.check(sample, rule.value))
        .unwrap_or(false)
}

/// The threshold reported as the cause of an alarm: the **first** rule in
/// list order that matches, regardless of the rule set's `condition_type`.
///
/// This is deliberately asymmetric with [`condition_satisfied`]: the live
/// poll path fires on any matching rule and reports the first match, while
/// the combinator-aware predicate is kept for display and validation
/// callers. Returns `None` for an empty rule set.
pub fn triggered_threshold<'a>(sample: f64, rules: &'a RuleSet) -> Option<&'a ThresholdRule> {
    rules.rules.iter().find(|rule| rule_matches(sample, rule))
}

/// Whether the rule set's boolean combinator is satisfied: `&&` requires
/// every rule to match, `||` any rule, and the empty combinator consults
/// the first rule only. Not consulted by the poll path.
pub fn condition_satisfied(sample: f64, rules: &RuleSet) -> bool {
    match rules.condition_type {
        ConditionType::All => {
            !rules.rules.is_empty() && rules.rules.iter().all(|r| rule_matches(sample, r))
        }
        ConditionType::Any => rules.rules.iter().any(|r| rule_matches(sample, r)),
        ConditionType::FirstOnly => rules
            .rules
            .first()
            .is_some_and(|r| rule_matches(sample, r)),
    }
}
