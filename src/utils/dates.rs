//! Date handling for transaction queries. Dates are local calendar days in
//! `YYYY-MM-DD` form.

use anyhow::{anyhow, bail, Result};
use chrono::{Days, Local, NaiveDate};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// The day `days` before `day`; saturates at the earliest representable date
fn days_before(day: NaiveDate, days: u32) -> NaiveDate {
    day.checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Parse a `YYYY-MM-DD` date
///
/// # Errors
/// Returns an error naming the expected format
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
        .map_err(|_| anyhow!("Invalid date: {input}. Use YYYY-MM-DD format."))
}

#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// An inclusive range of days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    /// `(from, to)` query parameters
    #[must_use]
    pub fn query(&self) -> [(&'static str, String); 2] {
        [("from", format_date(self.from)), ("to", format_date(self.to))]
    }
}

/// Resolve `--days`, `--from` and `--to` into a concrete range.
///
/// Explicit dates win; `from` otherwise falls back to `days` before today and
/// `to` to today.
///
/// # Errors
/// Returns an error when `from` is after `to`
pub fn resolve_range(
    days: u32,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<DateRange> {
    resolve_range_at(today(), days, from, to)
}

fn resolve_range_at(
    now: NaiveDate,
    days: u32,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<DateRange> {
    let from = from.unwrap_or_else(|| days_before(now, days));
    let to = to.unwrap_or(now);

    if from > to {
        bail!(
            "Start date {} is after end date {}",
            format_date(from),
            format_date(to)
        );
    }
    Ok(DateRange { from, to })
}
