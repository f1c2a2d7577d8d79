//! Query orchestrator
//!
//! Sequences classifier → extractor → metric engine and applies the
//! fallback policy: an unknown intent gets the help response and a missing
//! FX rate becomes a data-gap response. `answer` itself never fails; every
//! failure mode a query can hit ends as a narrative, not a crash.

use tracing::{debug, info, warn};

use crate::classifier::IntentClassifier;
use crate::context::DataContext;
use crate::extractor;
use crate::metrics;
use crate::models::{Intent, MetricResult, MetricValue, Narrative, Unit};

/// The copilot core. Owns the immutable dataset; each call to [`answer`]
/// classifies, extracts and computes one query end to end.
///
/// [`answer`]: Copilot::answer
pub struct Copilot {
    ctx: DataContext,
}

impl Copilot {
    pub fn new(ctx: DataContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &DataContext {
        &self.ctx
    }

    /// Answer one query. Classification and extraction are independent of
    /// each other; the metric keyed by the intent consumes both.
    pub fn answer(&self, query: &str) -> MetricResult {
        let intent = IntentClassifier::classify(query);
        let params = extractor::extract(query, &self.ctx);

        debug!(
            %intent,
            range = %params.range,
            category = ?params.category,
            currency = %params.currency,
            "query understood"
        );

        let computed = match intent {
            Intent::Unknown => {
                info!(query, "no intent matched, returning help response");
                return Self::help();
            }
            Intent::RevenueVsBudget => metrics::revenue_vs_budget(&self.ctx, &params),
            Intent::OpexBreakdown => metrics::opex_breakdown(&self.ctx, &params),
            Intent::GrossMarginTrend => metrics::gross_margin_trend(&self.ctx, &params),
            Intent::CashRunway => metrics::cash_runway(&self.ctx, &params),
            Intent::EbitdaProxy => metrics::ebitda_proxy(&self.ctx, &params),
        };

        match computed {
            Ok(result) => result,
            Err(error) => {
                // MissingRate is the only error the engine produces on a
                // validated context; either way the caller gets a
                // narrative naming the gap, never a crash.
                warn!(%error, %intent, "metric aborted on incomplete data");
                Self::data_gap(intent, error.to_string())
            }
        }
    }

    fn help() -> MetricResult {
        MetricResult {
            intent: Intent::Unknown,
            value: MetricValue::None,
            unit: Unit::None,
            narrative: Narrative::Help,
        }
    }

    fn data_gap(intent: Intent, detail: String) -> MetricResult {
        MetricResult {
            intent,
            value: MetricValue::None,
            unit: Unit::None,
            narrative: Narrative::DataGap { detail },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CashBalance, FinancialRecord, FxRate};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn record(
        month: &str,
        category: &str,
        actual: Decimal,
        budget: Decimal,
        currency: &str,
    ) -> FinancialRecord {
        FinancialRecord {
            period: month.parse().expect("period"),
            category: category.to_string(),
            actual,
            budget,
            currency: currency.to_string(),
        }
    }

    fn sample_copilot() -> Copilot {
        let mut records = Vec::new();
        for (month, revenue, cogs) in [
            ("2025-04", dec!(730000), dec!(109500)),
            ("2025-05", dec!(765000), dec!(114750)),
            ("2025-06", dec!(780000), dec!(117000)),
        ] {
            records.push(record(month, "Revenue", revenue, revenue + dec!(20000), "USD"));
            records.push(record(month, "COGS", cogs, cogs - dec!(5000), "USD"));
            records.push(record(month, "Opex:Marketing", dec!(150000), dec!(140000), "USD"));
            records.push(record(month, "Opex:R&D", dec!(60000), dec!(62000), "USD"));
        }
        let fx = vec![FxRate {
            period: "2025-06".parse().expect("period"),
            currency: "EUR".to_string(),
            rate: dec!(1.10),
        }];
        let cash = vec![
            CashBalance {
                period: "2025-04".parse().expect("period"),
                balance: dec!(4800000),
                currency: "USD".to_string(),
            },
            CashBalance {
                period: "2025-05".parse().expect("period"),
                balance: dec!(4600000),
                currency: "USD".to_string(),
            },
            CashBalance {
                period: "2025-06".parse().expect("period"),
                balance: dec!(4400000),
                currency: "USD".to_string(),
            },
        ];
        let ctx = DataContext::new(records, fx, cash, "USD").expect("context");
        Copilot::new(ctx)
    }

    #[test]
    fn test_opex_vs_budget_scenario() {
        let records = vec![record("2024-03", "Opex", dec!(115000), dec!(100000), "USD")];
        let ctx = DataContext::new(records, vec![], vec![], "USD").expect("context");
        let copilot = Copilot::new(ctx);

        let result = copilot.answer("What was our opex vs budget in March 2024?");
        assert_eq!(result.intent, Intent::RevenueVsBudget);
        assert_eq!(result.value, MetricValue::Scalar(dec!(15000)));
        match result.narrative {
            Narrative::Variance {
                variance,
                variance_pct,
                ref period,
                ..
            } => {
                assert_eq!(variance, dec!(15000));
                assert_eq!(variance_pct, Some(dec!(15)));
                assert_eq!(period, "March 2024");
            }
            other => panic!("unexpected narrative: {other:?}"),
        }
    }

    #[test]
    fn test_nonsense_query_falls_back_to_help() {
        let copilot = sample_copilot();
        let result = copilot.answer("what is the weather");
        assert_eq!(result.intent, Intent::Unknown);
        assert_eq!(result.value, MetricValue::None);
        assert_eq!(result.narrative, Narrative::Help);
    }

    #[test]
    fn test_missing_rate_becomes_data_gap() {
        // GBP has no rate anywhere in the table.
        let records = vec![record("2025-06", "Revenue", dec!(1000), dec!(900), "GBP")];
        let ctx = DataContext::new(records, vec![], vec![], "USD").expect("context");
        let copilot = Copilot::new(ctx);

        let result = copilot.answer("revenue vs budget for June 2025");
        assert_eq!(result.value, MetricValue::None);
        match result.narrative {
            Narrative::DataGap { ref detail } => {
                assert!(detail.contains("GBP"), "detail was: {detail}");
            }
            other => panic!("unexpected narrative: {other:?}"),
        }
    }

    #[test]
    fn test_runway_query_end_to_end() {
        let copilot = sample_copilot();
        let result = copilot.answer("What is our cash runway right now?");
        assert_eq!(result.intent, Intent::CashRunway);
        assert_eq!(result.value, MetricValue::Scalar(dec!(22)));
        assert_eq!(result.unit, Unit::Months);
    }

    #[test]
    fn test_margin_trend_query_end_to_end() {
        let copilot = sample_copilot();
        let result = copilot.answer("Show gross margin trend for the last 3 months");
        assert_eq!(result.intent, Intent::GrossMarginTrend);
        let MetricValue::Series(points) = &result.value else {
            panic!("expected series, got {:?}", result.value);
        };
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].0, "April 2025");
        // 15% COGS -> 85% margin.
        assert_eq!(points[2].1, Some(dec!(85)));
    }

    #[test]
    fn test_breakdown_query_end_to_end() {
        let copilot = sample_copilot();
        let result = copilot.answer("Break down opex by category for June");
        assert_eq!(result.intent, Intent::OpexBreakdown);
        let MetricValue::Series(entries) = &result.value else {
            panic!("expected series, got {:?}", result.value);
        };
        assert_eq!(entries[0].0, "Marketing");
        assert_eq!(entries[1].0, "R&D");
    }

    #[test]
    fn test_explicit_currency_is_restated() {
        let copilot = sample_copilot();
        let result = copilot.answer("June 2025 revenue vs budget in EUR");
        assert_eq!(result.unit, Unit::Currency("EUR".to_string()));
        match result.narrative {
            Narrative::Variance { actual, .. } => {
                // 780,000 USD at 1.10 USD/EUR.
                assert_eq!(actual.round_dp(2), dec!(709090.91));
            }
            other => panic!("unexpected narrative: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_currency_is_a_data_gap_not_a_crash() {
        let copilot = sample_copilot();
        let result = copilot.answer("June 2025 revenue vs budget in CHF");
        assert_eq!(result.value, MetricValue::None);
        assert!(matches!(result.narrative, Narrative::DataGap { .. }));
    }

    #[test]
    fn test_identical_queries_identical_answers() {
        let copilot = sample_copilot();
        let first = copilot.answer("What was June 2025 revenue vs budget?");
        for _ in 0..5 {
            assert_eq!(
                copilot.answer("What was June 2025 revenue vs budget?"),
                first
            );
        }
    }
}
