//! Entity extractor
//!
//! Parses the raw query into structured parameters against the loaded
//! dataset: a period range, an optional category filter and a target
//! currency. Extraction is total: anything unresolvable falls back to a
//! default (latest period, no filter, reporting currency), so a semantic
//! mismatch shows up in the narrative instead of crashing the pipeline.

use crate::context::DataContext;
use crate::models::{category_label, ExtractedParams, Period, PeriodRange};

/// Month names and abbreviations recognized as explicit period references.
const MONTHS: &[(&str, u32)] = &[
    ("january", 1),
    ("jan", 1),
    ("february", 2),
    ("feb", 2),
    ("march", 3),
    ("mar", 3),
    ("april", 4),
    ("apr", 4),
    ("may", 5),
    ("june", 6),
    ("jun", 6),
    ("july", 7),
    ("jul", 7),
    ("august", 8),
    ("aug", 8),
    ("september", 9),
    ("sept", 9),
    ("sep", 9),
    ("october", 10),
    ("oct", 10),
    ("november", 11),
    ("nov", 11),
    ("december", 12),
    ("dec", 12),
];

/// Uppercase 3-letter tokens that are not currency codes.
const NOT_CURRENCIES: &[&str] = &["YTD"];

/// Extract query parameters. Never fails; see module docs for defaults.
pub fn extract(query: &str, ctx: &DataContext) -> ExtractedParams {
    let lower = query.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect();

    ExtractedParams {
        range: resolve_range(&lower, &tokens, ctx),
        category: resolve_category(&lower, ctx),
        currency: resolve_currency(query, ctx),
    }
}

/// Resolve the period phrase against the dataset's latest period, which
/// stands in for "now".
fn resolve_range(lower: &str, tokens: &[&str], ctx: &DataContext) -> PeriodRange {
    let latest = ctx.latest_period();
    let year = explicit_year(tokens);

    // Absolute month, with or without a year ("March 2024", "Feb").
    for (name, month) in MONTHS {
        if tokens.iter().any(|token| token == name) {
            if let Some(period) = Period::new(year.unwrap_or(latest.year), *month) {
                return PeriodRange::single(period);
            }
        }
    }

    // Named quarter ("Q2", "q3 2024").
    for token in tokens {
        if let Some(quarter) = token
            .strip_prefix('q')
            .and_then(|rest| rest.parse::<u32>().ok())
            .filter(|quarter| (1..=4).contains(quarter))
        {
            let year = year.unwrap_or(latest.year);
            return PeriodRange {
                start: Period { year, month: (quarter - 1) * 3 + 1 },
                end: Period { year, month: quarter * 3 },
            };
        }
    }
    if lower.contains("this quarter") {
        let start = Period {
            year: latest.year,
            month: (latest.quarter() - 1) * 3 + 1,
        };
        // Truncated at "now": months past the latest period have no data.
        return PeriodRange { start, end: latest };
    }

    // Relative windows.
    if let Some(window) = trailing_window(tokens) {
        return PeriodRange {
            start: latest.months_back(window - 1),
            end: latest,
        };
    }
    if lower.contains("last month") {
        return PeriodRange::single(latest.prev());
    }
    if lower.contains("this month") || lower.contains("current month") {
        return PeriodRange::single(latest);
    }
    if tokens.contains(&"ytd") || lower.contains("year to date") {
        return PeriodRange {
            start: Period { year: latest.year, month: 1 },
            end: latest,
        };
    }

    // No period phrase at all.
    PeriodRange::single(latest)
}

fn explicit_year(tokens: &[&str]) -> Option<i32> {
    tokens.iter().find_map(|token| {
        if token.len() != 4 {
            return None;
        }
        token
            .parse::<i32>()
            .ok()
            .filter(|year| (1900..=2999).contains(year))
    })
}

/// "last 3 months", "past 6 months", "trailing 12 months".
fn trailing_window(tokens: &[&str]) -> Option<u32> {
    tokens.windows(3).find_map(|window| {
        let lead = window[0] == "last" || window[0] == "past" || window[0] == "trailing";
        let tail = window[2] == "months" || window[2] == "month";
        if lead && tail {
            window[1].parse::<u32>().ok().filter(|n| (1..=36).contains(n))
        } else {
            None
        }
    })
}

/// First category whose value (or prefix-stripped label) appears in the
/// query, tested in sorted order so ties resolve the same way every time.
fn resolve_category(lower: &str, ctx: &DataContext) -> Option<String> {
    for category in ctx.categories() {
        let full = category.to_lowercase();
        let label = category_label(category).to_lowercase();
        if lower.contains(&full) || lower.contains(&label) {
            return Some(category.clone());
        }
    }
    None
}

/// First all-uppercase 3-letter token is taken as an explicit currency
/// code; unknown codes are accepted here and surface later as a data gap.
fn resolve_currency(query: &str, ctx: &DataContext) -> String {
    query
        .split(|c: char| !c.is_ascii_alphanumeric())
        .find(|token| {
            token.len() == 3
                && token.chars().all(|c| c.is_ascii_uppercase())
                && !NOT_CURRENCIES.contains(token)
        })
        .map(str::to_string)
        .unwrap_or_else(|| ctx.reporting_currency().to_string())
}
