use std::env;
use std::io::{self, BufRead, Write};

use cfo_copilot::{
    agent::Copilot,
    ingest,
    models::{MetricResult, MetricValue, Narrative, Unit},
};
use rust_decimal::Decimal;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let data_dir = env::var("COPILOT_DATA_DIR").unwrap_or_else(|_| "fixtures".to_string());
    let reporting =
        env::var("COPILOT_REPORTING_CURRENCY").unwrap_or_else(|_| "USD".to_string());

    info!(%data_dir, %reporting, "CFO Copilot starting");

    let ctx = ingest::load_dir(&data_dir, &reporting)?;
    let copilot = Copilot::new(ctx);

    // One-shot mode: the query is the command line.
    let args: Vec<String> = env::args().skip(1).collect();
    if !args.is_empty() {
        println!("{}", render(&copilot.answer(&args.join(" "))));
        return Ok(());
    }

    println!(
        "CFO Copilot ready (data through {}). Ask about revenue vs budget, opex, \
         margin, runway or EBITDA; 'quit' to exit.",
        copilot.context().latest_period()
    );

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("quit") || query.eq_ignore_ascii_case("exit") {
            break;
        }
        println!("{}", render(&copilot.answer(query)));
    }

    Ok(())
}

/// Render a result into terminal text. The core hands back a narrative
/// template key plus values; all display formatting lives here.
fn render(result: &MetricResult) -> String {
    match &result.narrative {
        Narrative::Variance {
            scope,
            period,
            actual,
            budget,
            variance,
            variance_pct,
        } => {
            let currency = unit_currency(&result.unit);
            let pct = match variance_pct {
                Some(p) => format!("{}%", signed(*p)),
                None => "undefined (budget is zero)".to_string(),
            };
            format!(
                "{scope} vs budget, {period}:\n  Actual:   {}\n  Budget:   {}\n  Variance: {} ({})",
                money(*actual, currency),
                money(*budget, currency),
                money(*variance, currency),
                pct
            )
        }
        Narrative::OpexBreakdown { period, total } => {
            let currency = unit_currency(&result.unit);
            let mut out = format!(
                "Operating expenses, {period} (total {}):",
                money(*total, currency)
            );
            if let MetricValue::Series(entries) = &result.value {
                for (label, amount) in entries {
                    if let Some(amount) = amount {
                        out.push_str(&format!("\n  {label}: {}", money(*amount, currency)));
                    }
                }
            }
            out
        }
        Narrative::MarginTrend { start, end } => {
            let mut out = if start == end {
                format!("Gross margin, {end}:")
            } else {
                format!("Gross margin, {start} to {end}:")
            };
            if let MetricValue::Series(points) = &result.value {
                for (label, margin) in points {
                    match margin {
                        Some(p) => out.push_str(&format!("\n  {label}: {}%", p.round_dp(1))),
                        None => out.push_str(&format!("\n  {label}: undefined (no revenue)")),
                    }
                }
            }
            out
        }
        Narrative::Runway {
            balance,
            burn,
            currency,
        } => match (&result.value, burn) {
            (MetricValue::Scalar(months), Some(burn)) => format!(
                "Cash runway: {} months\n  Cash:             {}\n  Avg monthly burn: {}",
                months.round_dp(1),
                money(*balance, currency),
                money(*burn, currency)
            ),
            (MetricValue::Unbounded, _) => format!(
                "Cash runway: unbounded (cash is stable or growing)\n  Cash: {}",
                money(*balance, currency)
            ),
            _ => format!(
                "Cash runway: undefined (not enough balance history)\n  Cash: {}",
                money(*balance, currency)
            ),
        },
        Narrative::Ebitda {
            period,
            revenue,
            cost_of_goods,
            opex,
            margin_pct,
        } => {
            let currency = unit_currency(&result.unit);
            let ebitda = match &result.value {
                MetricValue::Scalar(v) => money(*v, currency),
                _ => "undefined".to_string(),
            };
            let mut out = format!(
                "EBITDA (proxy), {period}: {ebitda}\n  Revenue: {}\n  COGS:    {}\n  Opex:    {}",
                money(*revenue, currency),
                money(*cost_of_goods, currency),
                money(*opex, currency)
            );
            if let Some(p) = margin_pct {
                out.push_str(&format!("\n  EBITDA margin: {}%", p.round_dp(1)));
            }
            out
        }
        Narrative::NoData { scope, period } => {
            format!("No {scope} data found for {period}.")
        }
        Narrative::DataGap { detail } => {
            format!("Cannot answer from the loaded data: {detail}.")
        }
        Narrative::Help => "\
I can answer questions about the loaded financials. Try:
  - What was June 2025 revenue vs budget?
  - Break down opex by category for June
  - Show gross margin trend for the last 3 months
  - What is our cash runway?
  - EBITDA for this month"
            .to_string(),
    }
}

fn unit_currency(unit: &Unit) -> &str {
    match unit {
        Unit::Currency(code) => code,
        _ => "",
    }
}

fn signed(value: Decimal) -> String {
    let rounded = value.round_dp(1);
    if rounded.is_sign_negative() {
        rounded.to_string()
    } else {
        format!("+{rounded}")
    }
}

fn money(amount: Decimal, currency: &str) -> String {
    let million = Decimal::from(1_000_000u32);
    if amount.abs() >= million {
        format!("{}M {currency}", (amount / million).round_dp(1))
    } else {
        format!("{} {currency}", amount.round_dp(2))
    }
}
