//! Core data models for the CFO copilot
//!
//! Everything here is a plain immutable value. Monetary amounts stay
//! `Decimal` end to end; nothing is rounded before aggregation.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CopilotError;

//
// ================= Periods =================
//

/// A calendar month, the atomic reporting period.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Period {
    pub year: i32,
    /// 1..=12
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// The month immediately before this one.
    pub fn prev(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// The month immediately after this one.
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The period `n` months before this one (`n = 0` is `self`).
    pub fn months_back(self, n: u32) -> Self {
        let mut period = self;
        for _ in 0..n {
            period = period.prev();
        }
        period
    }

    /// Calendar quarter (1..=4) this month falls in.
    pub fn quarter(self) -> u32 {
        (self.month - 1) / 3 + 1
    }

    /// Human-readable label, e.g. "June 2025".
    pub fn label(self) -> String {
        match NaiveDate::from_ymd_opt(self.year, self.month, 1) {
            Some(date) => date.format("%B %Y").to_string(),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = CopilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CopilotError::Parse(format!("invalid period '{s}', expected YYYY-MM"));

        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Period::new(year, month).ok_or_else(invalid)
    }
}

/// Inclusive month range resolved from a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRange {
    pub start: Period,
    pub end: Period,
}

impl PeriodRange {
    pub fn single(period: Period) -> Self {
        Self {
            start: period,
            end: period,
        }
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, period: Period) -> bool {
        self.start <= period && period <= self.end
    }

    /// Every period from start to end, in order.
    pub fn periods(&self) -> Vec<Period> {
        let mut out = Vec::new();
        let mut period = self.start;
        while period <= self.end {
            out.push(period);
            period = period.next();
        }
        out
    }
}

impl fmt::Display for PeriodRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.end)
        } else {
            write!(f, "{}..{}", self.start, self.end)
        }
    }
}

//
// ================= Source records =================
//

/// P&L account buckets derived from the category text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Revenue,
    CostOfGoods,
    Opex,
}

/// One (period, category) slice of the P&L: actual and budget side by
/// side, in the currency the entity reports in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub period: Period,
    pub category: String,
    pub actual: Decimal,
    pub budget: Decimal,
    pub currency: String,
}

impl FinancialRecord {
    pub fn kind(&self) -> AccountKind {
        account_kind(&self.category)
    }
}

/// Classify a ledger category. An `Opex:` prefix always wins, so
/// "Opex:Sales" is not mistaken for revenue.
pub fn account_kind(category: &str) -> AccountKind {
    let lower = category.to_ascii_lowercase();
    if lower.starts_with("opex") {
        AccountKind::Opex
    } else if ["cogs", "cost of goods", "cost of sales"]
        .iter()
        .any(|term| lower.contains(term))
    {
        AccountKind::CostOfGoods
    } else if lower.contains("revenue") || lower.contains("sales") {
        AccountKind::Revenue
    } else {
        AccountKind::Opex
    }
}

/// Breakdown label for a category, with the ledger prefix stripped
/// ("Opex:Marketing" reads as "Marketing").
pub fn category_label(category: &str) -> &str {
    category
        .split_once(':')
        .map(|(_, rest)| rest)
        .unwrap_or(category)
}

/// Rate for converting one unit of `currency` into the reporting currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxRate {
    pub period: Period,
    pub currency: String,
    pub rate: Decimal,
}

/// End-of-period cash position. One per period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashBalance {
    pub period: Period,
    pub balance: Decimal,
    pub currency: String,
}

//
// ================= Query understanding =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    RevenueVsBudget,
    OpexBreakdown,
    GrossMarginTrend,
    CashRunway,
    EbitdaProxy,
    Unknown,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Intent::RevenueVsBudget => "revenue_vs_budget",
            Intent::OpexBreakdown => "opex_breakdown",
            Intent::GrossMarginTrend => "gross_margin_trend",
            Intent::CashRunway => "cash_runway",
            Intent::EbitdaProxy => "ebitda_proxy",
            Intent::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Structured parameters pulled out of the query text. Created fresh per
/// query and discarded with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedParams {
    pub range: PeriodRange,
    pub category: Option<String>,
    pub currency: String,
}

//
// ================= Results =================
//

/// Numeric payload of a metric. Guarded divisions surface here as
/// `Unbounded` / `Undefined` instead of NaN or infinity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricValue {
    Scalar(Decimal),
    /// Ordered (label, value) points; a `None` value is an undefined point.
    Series(Vec<(String, Option<Decimal>)>),
    Unbounded,
    Undefined,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Currency(String),
    Percent,
    Months,
    None,
}

/// Narrative template key plus the values the renderer needs to fill it.
/// The core never turns these into display text itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "template")]
pub enum Narrative {
    Variance {
        scope: String,
        period: String,
        actual: Decimal,
        budget: Decimal,
        variance: Decimal,
        /// `None` when the budget is zero: the percentage is undefined,
        /// not a divide-by-zero.
        variance_pct: Option<Decimal>,
    },
    OpexBreakdown {
        period: String,
        total: Decimal,
    },
    MarginTrend {
        start: String,
        end: String,
    },
    Runway {
        balance: Decimal,
        /// `None` when no burn could be established (cash stable, growing,
        /// or too little history).
        burn: Option<Decimal>,
        currency: String,
    },
    Ebitda {
        period: String,
        revenue: Decimal,
        cost_of_goods: Decimal,
        opex: Decimal,
        margin_pct: Option<Decimal>,
    },
    NoData {
        scope: String,
        period: String,
    },
    DataGap {
        detail: String,
    },
    Help,
}

/// The one value object a query produces. Consumed by an external
/// renderer; immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub intent: Intent,
    pub value: MetricValue,
    pub unit: Unit,
    pub narrative: Narrative,
}
