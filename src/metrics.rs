//! Metric engine
//!
//! One pure function per intent. Each consumes the shared context plus the
//! extracted parameters and returns a typed result; nothing here mutates
//! the context, so identical inputs always produce identical outputs.
//!
//! All aggregation happens in the reporting currency. When the query asked
//! for a different target currency, currency-valued outputs are restated at
//! the end of the resolved range; ratios need no restatement.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::context::DataContext;
use crate::error::Result;
use crate::fx;
use crate::models::{
    category_label, AccountKind, ExtractedParams, Intent, MetricResult, MetricValue, Narrative,
    PeriodRange, Unit,
};

/// Trailing window for the burn-rate average, in months.
const BURN_WINDOW: usize = 3;

/// Trailing window for the margin trend when the query names a single month.
const MARGIN_WINDOW: u32 = 3;

/// Guarded percentage: `None` when the denominator is zero, never a
/// divide-by-zero and never a silently substituted value.
fn pct(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator.is_zero() {
        None
    } else {
        Some(numerator / denominator * Decimal::ONE_HUNDRED)
    }
}

fn range_label(range: PeriodRange) -> String {
    if range.is_single() {
        range.end.label()
    } else {
        format!("{} to {}", range.start.label(), range.end.label())
    }
}

fn no_data(intent: Intent, scope: &str, period: String) -> MetricResult {
    MetricResult {
        intent,
        value: MetricValue::None,
        unit: Unit::None,
        narrative: Narrative::NoData {
            scope: scope.to_string(),
            period,
        },
    }
}

/// Actual vs budget variance over the resolved range.
///
/// The slice is the dimension filter when the query named one, otherwise
/// the revenue accounts. variance% is undefined (not zero) on a zero
/// budget.
pub fn revenue_vs_budget(ctx: &DataContext, params: &ExtractedParams) -> Result<MetricResult> {
    let mut actual = Decimal::ZERO;
    let mut budget = Decimal::ZERO;
    let mut matched = false;

    for record in ctx.records_in(params.range) {
        let selected = match &params.category {
            Some(category) => &record.category == category,
            None => record.kind() == AccountKind::Revenue,
        };
        if !selected {
            continue;
        }
        matched = true;
        actual += fx::to_reporting(ctx, record.actual, &record.currency, record.period)?;
        budget += fx::to_reporting(ctx, record.budget, &record.currency, record.period)?;
    }

    let scope = params
        .category
        .as_deref()
        .map(category_label)
        .unwrap_or("Revenue");
    let period = range_label(params.range);

    if !matched {
        return Ok(no_data(Intent::RevenueVsBudget, scope, period));
    }

    let end = params.range.end;
    let actual = fx::from_reporting(ctx, actual, &params.currency, end)?;
    let budget = fx::from_reporting(ctx, budget, &params.currency, end)?;
    let variance = actual - budget;
    let variance_pct = pct(variance, budget);

    Ok(MetricResult {
        intent: Intent::RevenueVsBudget,
        value: MetricValue::Scalar(variance),
        unit: Unit::Currency(params.currency.clone()),
        narrative: Narrative::Variance {
            scope: scope.to_string(),
            period,
            actual,
            budget,
            variance,
            variance_pct,
        },
    })
}

/// Opex actuals grouped by category over the resolved range, sorted by
/// amount descending (labels break ties). The entries sum to the total by
/// construction.
pub fn opex_breakdown(ctx: &DataContext, params: &ExtractedParams) -> Result<MetricResult> {
    let mut by_category: BTreeMap<String, Decimal> = BTreeMap::new();

    for record in ctx.records_in(params.range) {
        if record.kind() != AccountKind::Opex {
            continue;
        }
        if let Some(category) = &params.category {
            if &record.category != category {
                continue;
            }
        }
        let amount = fx::to_reporting(ctx, record.actual, &record.currency, record.period)?;
        *by_category
            .entry(category_label(&record.category).to_string())
            .or_default() += amount;
    }

    let period = range_label(params.range);
    if by_category.is_empty() {
        return Ok(no_data(Intent::OpexBreakdown, "operating expense", period));
    }

    let mut entries: Vec<(String, Decimal)> = by_category.into_iter().collect();
    // Stable sort; equal amounts keep the BTreeMap's label order.
    entries.sort_by(|a, b| b.1.cmp(&a.1));

    let end = params.range.end;
    let mut total = Decimal::ZERO;
    let mut series = Vec::with_capacity(entries.len());
    for (label, amount) in entries {
        let amount = fx::from_reporting(ctx, amount, &params.currency, end)?;
        total += amount;
        series.push((label, Some(amount)));
    }

    Ok(MetricResult {
        intent: Intent::OpexBreakdown,
        value: MetricValue::Series(series),
        unit: Unit::Currency(params.currency.clone()),
        narrative: Narrative::OpexBreakdown { period, total },
    })
}

/// Gross margin percentage per period over a trailing window ending at the
/// resolved period (or over the explicit range when the query gave one).
/// Zero-revenue months report an undefined point, not a number.
pub fn gross_margin_trend(ctx: &DataContext, params: &ExtractedParams) -> Result<MetricResult> {
    let range = if params.range.is_single() {
        PeriodRange {
            start: params.range.end.months_back(MARGIN_WINDOW - 1),
            end: params.range.end,
        }
    } else {
        params.range
    };

    let mut series = Vec::new();
    for period in range.periods() {
        let mut revenue = Decimal::ZERO;
        let mut cost = Decimal::ZERO;
        let mut any = false;
        for record in ctx.records_in(PeriodRange::single(period)) {
            match record.kind() {
                AccountKind::Revenue => {
                    any = true;
                    revenue += fx::to_reporting(ctx, record.actual, &record.currency, period)?;
                }
                AccountKind::CostOfGoods => {
                    any = true;
                    cost += fx::to_reporting(ctx, record.actual, &record.currency, period)?;
                }
                AccountKind::Opex => {}
            }
        }
        // Months with no records at all (window reaching past the dataset
        // edge) are skipped rather than reported as undefined.
        if !any {
            continue;
        }
        series.push((period.label(), pct(revenue - cost, revenue)));
    }

    if series.is_empty() {
        return Ok(no_data(
            Intent::GrossMarginTrend,
            "gross margin",
            range_label(range),
        ));
    }

    Ok(MetricResult {
        intent: Intent::GrossMarginTrend,
        value: MetricValue::Series(series),
        unit: Unit::Percent,
        narrative: Narrative::MarginTrend {
            start: range.start.label(),
            end: range.end.label(),
        },
    })
}

/// Months of cash left at the trailing burn rate.
///
/// Burn is the average of the declines among the last `BURN_WINDOW`
/// period-over-period balance changes. Stable or growing cash makes the
/// runway unbounded, never a negative number or a division error.
pub fn cash_runway(ctx: &DataContext, params: &ExtractedParams) -> Result<MetricResult> {
    let cash = ctx.cash_balances();
    let Some(latest_entry) = cash.last() else {
        return Ok(no_data(Intent::CashRunway, "cash", "any period".to_string()));
    };
    let asof = latest_entry.period;

    // Normalize the window (plus the balance just before it) so deltas
    // compare like for like.
    let window = &cash[cash.len().saturating_sub(BURN_WINDOW + 1)..];
    let mut balances = Vec::with_capacity(window.len());
    for entry in window {
        balances.push(fx::to_reporting(ctx, entry.balance, &entry.currency, entry.period)?);
    }
    let Some(&latest_balance) = balances.last() else {
        return Ok(no_data(Intent::CashRunway, "cash", "any period".to_string()));
    };

    let balance_out = fx::from_reporting(ctx, latest_balance, &params.currency, asof)?;

    if balances.len() < 2 {
        // A single balance says nothing about burn.
        return Ok(MetricResult {
            intent: Intent::CashRunway,
            value: MetricValue::Undefined,
            unit: Unit::Months,
            narrative: Narrative::Runway {
                balance: balance_out,
                burn: None,
                currency: params.currency.clone(),
            },
        });
    }

    let declines: Vec<Decimal> = balances
        .windows(2)
        .filter_map(|pair| {
            let delta = pair[0] - pair[1];
            (delta > Decimal::ZERO).then_some(delta)
        })
        .collect();

    if declines.is_empty() {
        return Ok(MetricResult {
            intent: Intent::CashRunway,
            value: MetricValue::Unbounded,
            unit: Unit::Months,
            narrative: Narrative::Runway {
                balance: balance_out,
                burn: None,
                currency: params.currency.clone(),
            },
        });
    }

    let burn =
        declines.iter().copied().sum::<Decimal>() / Decimal::from(declines.len() as u64);
    let runway = latest_balance / burn;
    let burn_out = fx::from_reporting(ctx, burn, &params.currency, asof)?;

    Ok(MetricResult {
        intent: Intent::CashRunway,
        value: MetricValue::Scalar(runway),
        unit: Unit::Months,
        narrative: Narrative::Runway {
            balance: balance_out,
            burn: Some(burn_out),
            currency: params.currency.clone(),
        },
    })
}

/// Revenue − cost of goods − opex over the resolved range. Interest, tax
/// and depreciation are not in the dataset; the proxy deliberately leaves
/// them out.
pub fn ebitda_proxy(ctx: &DataContext, params: &ExtractedParams) -> Result<MetricResult> {
    let mut revenue = Decimal::ZERO;
    let mut cost = Decimal::ZERO;
    let mut opex = Decimal::ZERO;
    let mut matched = false;

    for record in ctx.records_in(params.range) {
        let amount = fx::to_reporting(ctx, record.actual, &record.currency, record.period)?;
        matched = true;
        match record.kind() {
            AccountKind::Revenue => revenue += amount,
            AccountKind::CostOfGoods => cost += amount,
            AccountKind::Opex => opex += amount,
        }
    }

    let period = range_label(params.range);
    if !matched {
        return Ok(no_data(Intent::EbitdaProxy, "EBITDA", period));
    }

    let end = params.range.end;
    let revenue = fx::from_reporting(ctx, revenue, &params.currency, end)?;
    let cost = fx::from_reporting(ctx, cost, &params.currency, end)?;
    let opex = fx::from_reporting(ctx, opex, &params.currency, end)?;
    let ebitda = revenue - cost - opex;
    let margin_pct = pct(ebitda, revenue);

    Ok(MetricResult {
        intent: Intent::EbitdaProxy,
        value: MetricValue::Scalar(ebitda),
        unit: Unit::Currency(params.currency.clone()),
        narrative: Narrative::Ebitda {
            period,
            revenue,
            cost_of_goods: cost,
            opex,
            margin_pct,
        },
    })
}
