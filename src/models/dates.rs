//! Calendar helpers. Trip and attendance dates are stored as `YYYY-MM-DD`
//! strings so lexical order matches calendar order in Mongo range queries.

use chrono::{Datelike, Duration, NaiveDate};

use crate::error::{AppError, AppResult};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| AppError::validation(format!("'{}' is not a YYYY-MM-DD date", value)))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Last day of a trip that starts on `start` and lasts `duration_days`.
pub fn trip_end(start: NaiveDate, duration_days: i32) -> NaiveDate {
    start + Duration::days(i64::from(duration_days.max(1) - 1))
}

/// A calendar month: its canonical `YYYY-MM` key plus first and last day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthRange {
    pub key: String,
    pub first_day: String,
    pub last_day: String,
}

/// Parse a `YYYY-MM` month. Loose spellings such as `2026-1` are accepted
/// but always come back as the canonical `2026-01` key, which is the only
/// form that may be stored or queried.
pub fn parse_month(month: &str) -> AppResult<MonthRange> {
    let first = NaiveDate::parse_from_str(&format!("{}-01", month.trim()), DATE_FORMAT)
        .map_err(|_| AppError::validation(format!("'{}' is not a YYYY-MM month", month)))?;
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    }
    .ok_or_else(|| AppError::validation(format!("'{}' is out of range", month)))?;
    let last = next_month - Duration::days(1);
    Ok(MonthRange {
        key: first.format("%Y-%m").to_string(),
        first_day: format_date(first),
        last_day: format_date(last),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trip_end_counts_start_day() {
        let start = parse_date("2026-12-30").unwrap();
        assert_eq!(format_date(trip_end(start, 1)), "2026-12-30");
        assert_eq!(format_date(trip_end(start, 3)), "2027-01-01");
    }

    #[test]
    fn month_bounds_handle_year_end_and_leap_years() {
        let december = parse_month("2026-12").unwrap();
        assert_eq!(december.first_day, "2026-12-01");
        assert_eq!(december.last_day, "2026-12-31");
        assert_eq!(parse_month("2028-02").unwrap().last_day, "2028-02-29");
        assert!(parse_month("2026-13").is_err());
        assert!(parse_month("October").is_err());
    }

    #[test]
    fn loose_month_spellings_share_one_key() {
        for raw in ["2026-01", "2026-1", " 2026-01", "2026-01 ", "+2026-01"] {
            let month = parse_month(raw).unwrap();
            assert_eq!(month.key, "2026-01", "{:?}", raw);
            assert_eq!(month.first_day, "2026-01-01");
            assert_eq!(month.last_day, "2026-01-31");
        }
    }

    #[test]
    fn rejects_malformed_dates() {
        assert!(parse_date("2026/11/01").is_err());
        assert!(parse_date("2026-02-30").is_err());
    }
}
