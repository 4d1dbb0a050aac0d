use anyhow::{anyhow, Result};
use chrono::{Datelike, Local, Months, NaiveDate};

/// Parse `"YYYYMM"` (or `"YYYY-MM"`) into the first day of that month.
pub fn parse_yyyymm(s: &str) -> Result<NaiveDate> {
    let digits: String = s.trim().chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 6 {
        return Err(anyhow!("expected YYYYMM, got {:?}", s));
    }
    let year: i32 = digits[0..4].parse()?;
    let month: u32 = digits[4..6].parse()?;
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| anyhow!("invalid month in {:?}", s))
}

/// First day of the current local month.
pub fn current_month() -> NaiveDate {
    let today = Local::now().date_naive();
    today.with_day(1).unwrap_or(today)
}

/// Last day of the month that `first` belongs to.
pub fn month_end(first: NaiveDate) -> NaiveDate {
    let first = first.with_day(1).unwrap_or(first);
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(first)
}

/// Every month start between `start` and `end`, both inclusive.
pub fn month_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut cur = start.with_day(1).unwrap_or(start);
    let last = end.with_day(1).unwrap_or(end);
    while cur <= last {
        out.push(cur);
        match cur.checked_add_months(Months::new(1)) {
            Some(next) => cur = next,
            None => break,
        }
    }
    out
}

/// Build a date string from separate year and month cells, e.g. `("2024", "3")` → `2024-03`
/// with format `%Y-%m`. Returns `None` when either part is not a valid number.
pub fn format_year_month(year: &str, month: &str, format: &str) -> Option<String> {
    let year: i32 = year.trim().parse().ok()?;
    let month: u32 = month.trim().trim_start_matches('M').parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some(date.format(format).to_string())
}
