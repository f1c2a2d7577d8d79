//! Immutable dataset shared by every query
//!
//! Built once at startup from the four source tables and never mutated
//! afterwards, so it can be read concurrently without locking.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;

use crate::error::{CopilotError, Result};
use crate::models::{CashBalance, FinancialRecord, FxRate, Period, PeriodRange};

/// Read-only aggregate of actuals, budget, FX rates and cash balances,
/// indexed for lookup by period, category and currency.
#[derive(Debug, Clone)]
pub struct DataContext {
    records: Vec<FinancialRecord>,
    /// currency -> period -> rate-to-reporting, sorted for prior-period lookup
    rates: BTreeMap<String, BTreeMap<Period, Decimal>>,
    /// sorted by period
    cash: Vec<CashBalance>,
    /// distinct category values, sorted
    categories: Vec<String>,
    reporting_currency: String,
    latest: Period,
}

impl DataContext {
    /// Validate and index the source collections.
    ///
    /// Rejects duplicate (period, category) records and duplicate
    /// per-period cash balances; an empty dataset is an error because
    /// relative period phrases need a "now" to resolve against.
    pub fn new(
        records: Vec<FinancialRecord>,
        fx: Vec<FxRate>,
        cash: Vec<CashBalance>,
        reporting_currency: impl Into<String>,
    ) -> Result<Self> {
        let reporting_currency = reporting_currency.into();

        let mut seen = BTreeSet::new();
        for record in &records {
            if !seen.insert((record.period, record.category.clone())) {
                return Err(CopilotError::Data(format!(
                    "duplicate record for {} / {}",
                    record.period, record.category
                )));
            }
        }

        let mut rates: BTreeMap<String, BTreeMap<Period, Decimal>> = BTreeMap::new();
        for fx_rate in fx {
            rates
                .entry(fx_rate.currency)
                .or_default()
                .insert(fx_rate.period, fx_rate.rate);
        }

        let mut cash_seen = BTreeSet::new();
        for balance in &cash {
            if !cash_seen.insert(balance.period) {
                return Err(CopilotError::Data(format!(
                    "duplicate cash balance for {}",
                    balance.period
                )));
            }
        }
        let mut cash = cash;
        cash.sort_by_key(|balance| balance.period);

        let categories: Vec<String> = records
            .iter()
            .map(|record| record.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let latest = records
            .iter()
            .map(|record| record.period)
            .chain(cash.iter().map(|balance| balance.period))
            .max()
            .ok_or_else(|| CopilotError::Data("dataset is empty".to_string()))?;

        Ok(Self {
            records,
            rates,
            cash,
            categories,
            reporting_currency,
            latest,
        })
    }

    pub fn reporting_currency(&self) -> &str {
        &self.reporting_currency
    }

    /// Most recent period present anywhere in the dataset. Relative period
    /// phrases ("last month", "YTD") resolve against this.
    pub fn latest_period(&self) -> Period {
        self.latest
    }

    /// Distinct category values, sorted.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Records whose period falls inside `range`.
    pub fn records_in(&self, range: PeriodRange) -> impl Iterator<Item = &FinancialRecord> {
        self.records
            .iter()
            .filter(move |record| range.contains(record.period))
    }

    /// Cash balances in period order.
    pub fn cash_balances(&self) -> &[CashBalance] {
        &self.cash
    }

    /// Exact or nearest-prior rate for (currency, period). Zero and
    /// negative stored rates are skipped as if missing.
    pub(crate) fn rate_at_or_before(
        &self,
        currency: &str,
        period: Period,
    ) -> Option<(Period, Decimal)> {
        self.rates
            .get(currency)?
            .range(..=period)
            .rev()
            .find(|(_, rate)| **rate > Decimal::ZERO)
            .map(|(found, rate)| (*found, *rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(month: &str, category: &str) -> FinancialRecord {
        FinancialRecord {
            period: month.parse().expect("period"),
            category: category.to_string(),
            actual: dec!(100),
            budget: dec!(90),
            currency: "USD".to_string(),
        }
    }

    #[test]
    fn test_duplicate_record_rejected() {
        let result = DataContext::new(
            vec![record("2025-01", "Revenue"), record("2025-01", "Revenue")],
            vec![],
            vec![],
            "USD",
        );
        assert!(matches!(result, Err(CopilotError::Data(_))));
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let result = DataContext::new(vec![], vec![], vec![], "USD");
        assert!(matches!(result, Err(CopilotError::Data(_))));
    }

    #[test]
    fn test_latest_period_spans_records_and_cash() {
        let ctx = DataContext::new(
            vec![record("2025-03", "Revenue")],
            vec![],
            vec![CashBalance {
                period: "2025-05".parse().expect("period"),
                balance: dec!(1000),
                currency: "USD".to_string(),
            }],
            "USD",
        )
        .expect("context");
        assert_eq!(ctx.latest_period().to_string(), "2025-05");
    }

    #[test]
    fn test_categories_sorted_and_distinct() {
        let ctx = DataContext::new(
            vec![
                record("2025-01", "Revenue"),
                record("2025-02", "Revenue"),
                record("2025-01", "Opex:Marketing"),
            ],
            vec![],
            vec![],
            "USD",
        )
        .expect("context");
        assert_eq!(ctx.categories(), ["Opex:Marketing", "Revenue"]);
    }

    #[test]
    fn test_rate_lookup_prefers_exact_then_prior() {
        let rate = |month: &str, value: Decimal| FxRate {
            period: month.parse().expect("period"),
            currency: "EUR".to_string(),
            rate: value,
        };
        let ctx = DataContext::new(
            vec![record("2025-03", "Revenue")],
            vec![rate("2025-01", dec!(1.10)), rate("2025-03", dec!(1.12))],
            vec![],
            "USD",
        )
        .expect("context");

        let march = "2025-03".parse().expect("period");
        let feb = "2025-02".parse().expect("period");
        assert_eq!(
            ctx.rate_at_or_before("EUR", march),
            Some((march, dec!(1.12)))
        );
        // February has no rate of its own; January's is the nearest prior.
        assert_eq!(
            ctx.rate_at_or_before("EUR", feb),
            Some(("2025-01".parse().expect("period"), dec!(1.10)))
        );
        assert_eq!(ctx.rate_at_or_before("GBP", march), None);
    }

    #[test]
    fn test_zero_rate_is_skipped() {
        let ctx = DataContext::new(
            vec![record("2025-02", "Revenue")],
            vec![
                FxRate {
                    period: "2025-01".parse().expect("period"),
                    currency: "EUR".to_string(),
                    rate: dec!(1.10),
                },
                FxRate {
                    period: "2025-02".parse().expect("period"),
                    currency: "EUR".to_string(),
                    rate: Decimal::ZERO,
                },
            ],
            vec![],
            "USD",
        )
        .expect("context");

        let feb = "2025-02".parse().expect("period");
        assert_eq!(
            ctx.rate_at_or_before("EUR", feb),
            Some(("2025-01".parse().expect("period"), dec!(1.10)))
        );
    }
}
