// Display helpers shared by the CLI

use chrono::{Datelike, Local, NaiveDate};

use crate::error::{Result, SessionError};
use crate::models::Period;

/// Direction for [`navigate_period`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

/// Format an amount as Singapore dollars, e.g. `$1,234.50` or `-$3.00`
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

/// Current month as `YYYY-MM`
pub fn current_month() -> String {
    Local::now().format("%Y-%m").to_string()
}

/// Current year as `YYYY`
pub fn current_year() -> String {
    Local::now().year().to_string()
}

/// Step a `YYYY-MM` (monthly) or `YYYY` (yearly) date one period back or forward
pub fn navigate_period(period: Period, date: &str, direction: Direction) -> Result<String> {
    let step: i32 = match direction {
        Direction::Prev => -1,
        Direction::Next => 1,
    };
    match period {
        Period::Monthly => {
            let parsed = NaiveDate::parse_from_str(&format!("{}-01", date.trim()), "%Y-%m-%d")
                .map_err(|_| invalid_date(period, date))?;
            let months = parsed.year() * 12 + parsed.month0() as i32 + step;
            Ok(format!("{:04}-{:02}", months.div_euclid(12), months.rem_euclid(12) + 1))
        }
        Period::Yearly => {
            let year: i32 = date.trim().parse().map_err(|_| invalid_date(period, date))?;
            Ok((year + step).to_string())
        }
    }
}

/// Human label for a period, e.g. `March 2026` for monthly `2026-03`.
/// Yearly dates and unparseable input are returned unchanged.
pub fn format_period_display(period: Period, date: &str) -> String {
    match period {
        Period::Monthly => NaiveDate::parse_from_str(&format!("{}-01", date.trim()), "%Y-%m-%d")
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_else(|_| date.to_string()),
        Period::Yearly => date.to_string(),
    }
}

/// Expense date as `2 Mar 2026`. Accepts a bare date or an RFC 3339 timestamp.
pub fn format_expense_date(date: &str) -> String {
    let day = date.get(..10).unwrap_or(date);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map(|d| d.format("%-d %b %Y").to_string())
        .unwrap_or_else(|_| date.to_string())
}

fn invalid_date(period: Period, date: &str) -> SessionError {
    anyhow::anyhow!("Invalid {} date '{}'", period, date).into()
}
