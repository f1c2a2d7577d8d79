//! CSV ingestion
//!
//! Loads the four source tables (actuals, budget, FX rates, cash balances)
//! and builds the immutable [`DataContext`]. This is the only I/O in the
//! process and it runs once, before any query is answered.
//!
//! Expected files in the data directory:
//! - `actuals.csv` / `budget.csv`: month,category,amount,currency
//! - `fx.csv`: month,currency,rate (reporting units per native unit)
//! - `cash.csv`: month,balance,currency

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use crate::context::DataContext;
use crate::error::{CopilotError, Result};
use crate::models::{CashBalance, FinancialRecord, FxRate, Period};

#[derive(Debug, Deserialize)]
struct AmountRow {
    month: String,
    category: String,
    amount: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct FxRow {
    month: String,
    currency: String,
    rate: String,
}

#[derive(Debug, Deserialize)]
struct CashRow {
    month: String,
    balance: String,
    currency: String,
}

/// Load a data directory and build the context.
pub fn load_dir(dir: impl AsRef<Path>, reporting_currency: &str) -> Result<DataContext> {
    let dir = dir.as_ref();
    load_readers(
        open(dir, "actuals.csv")?,
        open(dir, "budget.csv")?,
        open(dir, "fx.csv")?,
        open(dir, "cash.csv")?,
        reporting_currency,
    )
}

/// Reader-based variant of [`load_dir`], used directly by tests.
pub fn load_readers(
    actuals: impl Read,
    budget: impl Read,
    fx: impl Read,
    cash: impl Read,
    reporting_currency: &str,
) -> Result<DataContext> {
    let actuals = parse_amounts(actuals, "actuals")?;
    let budget = parse_amounts(budget, "budget")?;
    let records = join_records(actuals, budget)?;
    let fx = parse_fx(fx)?;
    let cash = parse_cash(cash)?;

    info!(
        records = records.len(),
        rates = fx.len(),
        balances = cash.len(),
        "dataset loaded"
    );

    DataContext::new(records, fx, cash, reporting_currency)
}

fn open(dir: &Path, name: &str) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(dir.join(name))?))
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal> {
    value
        .parse::<Decimal>()
        .map_err(|e| CopilotError::Parse(format!("{field} '{value}': {e}")))
}

type AmountTable = BTreeMap<(Period, String), (Decimal, String)>;

fn parse_amounts(reader: impl Read, table: &str) -> Result<AmountTable> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut out = AmountTable::new();

    for row in csv.deserialize::<AmountRow>() {
        let row = row?;
        let period: Period = row.month.parse()?;
        let amount = parse_decimal(&format!("{table} amount"), &row.amount)?;
        if out
            .insert((period, row.category.clone()), (amount, row.currency))
            .is_some()
        {
            return Err(CopilotError::Data(format!(
                "duplicate {table} row for {period} / {}",
                row.category
            )));
        }
    }
    Ok(out)
}

/// Join actuals and budget on (period, category). A row present on only
/// one side takes zero for the missing amount; a currency disagreement
/// between the two sides is a data error.
fn join_records(actuals: AmountTable, budget: AmountTable) -> Result<Vec<FinancialRecord>> {
    let mut records: BTreeMap<(Period, String), FinancialRecord> = BTreeMap::new();

    for ((period, category), (amount, currency)) in actuals {
        records.insert(
            (period, category.clone()),
            FinancialRecord {
                period,
                category,
                actual: amount,
                budget: Decimal::ZERO,
                currency,
            },
        );
    }

    for ((period, category), (amount, currency)) in budget {
        match records.get_mut(&(period, category.clone())) {
            Some(record) => {
                if record.currency != currency {
                    return Err(CopilotError::Data(format!(
                        "currency mismatch for {period} / {category}: actuals in {}, budget in {currency}",
                        record.currency
                    )));
                }
                record.budget = amount;
            }
            None => {
                records.insert(
                    (period, category.clone()),
                    FinancialRecord {
                        period,
                        category,
                        actual: Decimal::ZERO,
                        budget: amount,
                        currency,
                    },
                );
            }
        }
    }

    Ok(records.into_values().collect())
}

fn parse_fx(reader: impl Read) -> Result<Vec<FxRate>> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut out = Vec::new();

    for row in csv.deserialize::<FxRow>() {
        let row = row?;
        out.push(FxRate {
            period: row.month.parse()?,
            rate: parse_decimal("fx rate", &row.rate)?,
            currency: row.currency,
        });
    }
    Ok(out)
}

fn parse_cash(reader: impl Read) -> Result<Vec<CashBalance>> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut out = Vec::new();

    for row in csv.deserialize::<CashRow>() {
        let row = row?;
        out.push(CashBalance {
            period: row.month.parse()?,
            balance: parse_decimal("cash balance", &row.balance)?,
            currency: row.currency,
        });
    }
    Ok(out)
}
