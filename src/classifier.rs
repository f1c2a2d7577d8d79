//! Intent classifier
//!
//! Maps free-form query text onto the closed intent set. Rules form an
//! ordered list evaluated top to bottom and the first rule with a matching
//! synonym wins, so the rule order is part of the contract. Matching is
//! plain lowercase substring over explicit synonym tables, no scoring and
//! no fuzziness: the same text always yields the same intent.

use crate::models::Intent;

/// Ordered (synonyms, intent) rules.
///
/// Priority policy: budget comparison outranks everything because "budget"
/// is the strongest single signal, so "opex vs budget" routes to the
/// variance report (over the opex slice picked up by the dimension filter)
/// rather than the breakdown. Runway and margin sit above the broad opex
/// synonyms ("spend", "breakdown") to keep those from swallowing them.
const RULES: &[(&[&str], Intent)] = &[
    (
        &[
            "vs budget",
            "versus budget",
            "against budget",
            "compared to budget",
            "budget",
            "revenue",
            "sales",
        ],
        Intent::RevenueVsBudget,
    ),
    (
        &[
            "runway",
            "cash burn",
            "burn rate",
            "how long will our cash",
            "months of cash",
        ],
        Intent::CashRunway,
    ),
    (
        &["gross margin", "margin", "profitability", "cogs"],
        Intent::GrossMarginTrend,
    ),
    (
        &[
            "opex",
            "operating expense",
            "expense",
            "spend",
            "breakdown",
            "by category",
        ],
        Intent::OpexBreakdown,
    ),
    (
        &["ebitda", "operating profit", "earnings"],
        Intent::EbitdaProxy,
    ),
];

pub struct IntentClassifier;

impl IntentClassifier {
    /// Classify query text; `Unknown` when no rule matches. `Unknown` is
    /// not an error; it tells the orchestrator to answer with help.
    pub fn classify(query: &str) -> Intent {
        let text = query.to_lowercase();
        for (synonyms, intent) in RULES {
            if synonyms.iter().any(|synonym| text.contains(synonym)) {
                return *intent;
            }
        }
        Intent::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revenue_vs_budget_queries() {
        let cases = vec![
            "What was June 2025 revenue vs budget?",
            "Show me actual revenue compared to budget for June",
            "How did our revenue perform against budget in June?",
            "Revenue vs budget for June",
        ];
        for case in cases {
            assert_eq!(
                IntentClassifier::classify(case),
                Intent::RevenueVsBudget,
                "failed for: {case}"
            );
        }
    }

    #[test]
    fn test_budget_outranks_other_keywords() {
        // Both "opex" and "budget" appear; the budget rule is listed first.
        assert_eq!(
            IntentClassifier::classify("What was our opex vs budget in March 2024?"),
            Intent::RevenueVsBudget
        );
        assert_eq!(
            IntentClassifier::classify("margin vs budget for Q2"),
            Intent::RevenueVsBudget
        );
    }

    #[test]
    fn test_cash_runway_queries() {
        let cases = vec![
            "What is our cash runway?",
            "How long will our cash last?",
            "What's our runway looking like?",
            "burn rate analysis",
        ];
        for case in cases {
            assert_eq!(
                IntentClassifier::classify(case),
                Intent::CashRunway,
                "failed for: {case}"
            );
        }
    }

    #[test]
    fn test_gross_margin_queries() {
        let cases = vec![
            "Show gross margin trend for the last 3 months",
            "What's our margin percentage?",
            "How is our profitability looking?",
        ];
        for case in cases {
            assert_eq!(
                IntentClassifier::classify(case),
                Intent::GrossMarginTrend,
                "failed for: {case}"
            );
        }
    }

    #[test]
    fn test_opex_breakdown_queries() {
        let cases = vec![
            "Break down opex by category for June",
            "Show me the operating expense breakdown",
            "How much did we spend on R&D?",
        ];
        for case in cases {
            assert_eq!(
                IntentClassifier::classify(case),
                Intent::OpexBreakdown,
                "failed for: {case}"
            );
        }
    }

    #[test]
    fn test_ebitda_queries() {
        assert_eq!(
            IntentClassifier::classify("Show EBITDA for this month"),
            Intent::EbitdaProxy
        );
        assert_eq!(
            IntentClassifier::classify("what is our operating profit?"),
            Intent::EbitdaProxy
        );
    }

    #[test]
    fn test_unmatched_text_is_unknown() {
        assert_eq!(
            IntentClassifier::classify("what is the weather"),
            Intent::Unknown
        );
        assert_eq!(
            IntentClassifier::classify("asdfghjkl qwerty"),
            Intent::Unknown
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let query = "Break down opex by category for June";
        let first = IntentClassifier::classify(query);
        for _ in 0..100 {
            assert_eq!(IntentClassifier::classify(query), first);
        }
    }

    #[test]
    fn test_case_insensitive() {
        let variants = vec![
            "what was june 2025 revenue vs budget?",
            "WHAT WAS JUNE 2025 REVENUE VS BUDGET?",
            "What Was June 2025 Revenue Vs Budget?",
        ];
        for variant in variants {
            assert_eq!(
                IntentClassifier::classify(variant),
                Intent::RevenueVsBudget
            );
        }
    }
}
