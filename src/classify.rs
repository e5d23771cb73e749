// 🏷️ Fee Classification - Rules as Data
// Encounter type → fee. Ordered list, first substring match wins.

use crate::error::ConfigError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Standard schedule: (pattern, fee in cents). Order is precedence.
const STANDARD_FEES: [(&str, i64); 3] = [
    ("new consult", 8500),
    ("non cts", 6500),
    ("follow up", 6500),
];

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeRule {
    /// Lowercase substring looked for in the encounter type
    pub pattern: String,

    /// Fee for a matching visit
    pub amount: Decimal,
}

impl FeeRule {
    pub fn new(pattern: &str, amount: Decimal) -> Self {
        FeeRule {
            pattern: pattern.to_lowercase(),
            amount,
        }
    }

    /// `lowered` must already be lowercase.
    fn matches(&self, lowered: &str) -> bool {
        lowered.contains(&self.pattern)
    }
}

// ============================================================================
// FEE SCHEDULE
// ============================================================================

/// FeeSchedule - ordered fee rules
///
/// Unlike a priority-sorted rule engine, insertion order *is* the precedence,
/// so appending a rule never changes how existing encounter types resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeSchedule {
    rules: Vec<FeeRule>,
}

impl FeeSchedule {
    /// The schedule used when no `[[fees]]` table is configured.
    pub fn standard() -> Self {
        FeeSchedule {
            rules: STANDARD_FEES
                .iter()
                .map(|(pattern, cents)| FeeRule::new(pattern, Decimal::new(*cents, 2)))
                .collect(),
        }
    }

    /// Build a schedule, keeping the given order.
    ///
    /// Patterns are lowercased. Empty patterns (which match every encounter)
    /// and negative fees are refused.
    pub fn from_rules(rules: Vec<FeeRule>) -> Result<Self, ConfigError> {
        let mut checked = Vec::with_capacity(rules.len());

        for rule in rules {
            if rule.pattern.trim().is_empty() {
                return Err(ConfigError::InvalidFee {
                    pattern: rule.pattern,
                    reason: "pattern must not be empty".to_string(),
                });
            }
            if rule.amount.is_sign_negative() && !rule.amount.is_zero() {
                return Err(ConfigError::InvalidFee {
                    pattern: rule.pattern,
                    reason: format!("fee must not be negative (got {})", rule.amount),
                });
            }
            checked.push(FeeRule::new(&rule.pattern, rule.amount));
        }

        Ok(FeeSchedule { rules: checked })
    }

    /// Fee for an encounter type. Total: unmatched or empty input is 0.00.
    pub fn classify(&self, encounter_type: &str) -> Decimal {
        self.matching_rule(encounter_type)
            .map(|rule| rule.amount)
            .unwrap_or_else(|| Decimal::new(0, 2))
    }

    /// First rule whose pattern occurs in the encounter type.
    pub fn matching_rule(&self, encounter_type: &str) -> Option<&FeeRule> {
        let lowered = encounter_type.to_lowercase();
        self.rules.iter().find(|rule| rule.matches(&lowered))
    }

    pub fn rules(&self) -> &[FeeRule] {
        &self.rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::standard()
    }
}

/// Classify against the standard schedule.
pub fn classify(encounter_type: &str) -> Decimal {
    static STANDARD: OnceLock<FeeSchedule> = OnceLock::new();
    STANDARD.get_or_init(FeeSchedule::standard).classify(encounter_type)
}

// ============================================================================
// TESTS
// ============================================================================
