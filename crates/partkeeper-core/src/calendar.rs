//! Calendar-month arithmetic for partition ranges
//!
//! Every partition covers exactly one calendar month `[first day, first day of next month)`.
//! The helpers here normalize arbitrary dates to month boundaries and walk month ranges.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, TimeDelta, Utc};

use crate::{Error, Result};

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

/// Add `months` calendar months to `date`
///
/// The day of month is clamped to the length of the target month.
pub fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| Error::InvalidRange(format!("{} + {} months overflows", date, months)))
}

/// First day of the month following the month containing `date`
pub fn next_month_start(date: NaiveDate) -> Result<NaiveDate> {
    add_months(month_start(date), 1)
}

/// Month starts for every calendar month intersecting `[start, end]`
///
/// Walks from the first day of `start`'s month while the cursor is `<= end`.
/// The day of month of both bounds is otherwise ignored.
pub fn months_in_range(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    if start > end {
        return Err(Error::InvalidRange(format!(
            "start date {} is after end date {}",
            start, end
        )));
    }

    let mut months = Vec::new();
    let mut cursor = month_start(start);
    while cursor <= end {
        months.push(cursor);
        cursor = add_months(cursor, 1)?;
    }

    Ok(months)
}

/// Smallest number of months `m >= 1` such that `from + m months >= target`
pub fn months_until(from: NaiveDate, target: NaiveDate) -> Result<u32> {
    let diff = (target.year() - from.year()) * 12 + target.month() as i32 - from.month() as i32;
    let mut months = diff.max(1) as u32;
    if add_months(from, months)? < target {
        months += 1;
    }
    Ok(months)
}

/// Calendar date `days` days before `now`
pub fn days_before(now: DateTime<Utc>, days: u32) -> Result<NaiveDate> {
    now.checked_sub_signed(TimeDelta::days(i64::from(days)))
        .map(|cutoff| cutoff.date_naive())
        .ok_or_else(|| Error::InvalidRange(format!("{} - {} days overflows", now, days)))
}

/// Deterministic partition name: `<table>_<YYYY>_<MM>`
pub fn partition_name(table_name: &str, month: NaiveDate) -> String {
    format!("{}_{:04}_{:02}", table_name, month.year(), month.month())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_start() {
        assert_eq!(month_start(date(2025, 3, 17)), date(2025, 3, 1));
        assert_eq!(month_start(date(2025, 3, 1)), date(2025, 3, 1));
        assert_eq!(month_start(date(2024, 2, 29)), date(2024, 2, 1));
    }

    #[test]
    fn test_next_month_start_crosses_year() {
        assert_eq!(next_month_start(date(2024, 12, 31)).unwrap(), date(2025, 1, 1));
        assert_eq!(next_month_start(date(2025, 1, 15)).unwrap(), date(2025, 2, 1));
    }

    #[test]
    fn test_months_in_range_ignores_day_of_month() {
        let months = months_in_range(date(2025, 1, 31), date(2025, 4, 2)).unwrap();
        assert_eq!(
            months,
            vec![date(2025, 1, 1), date(2025, 2, 1), date(2025, 3, 1), date(2025, 4, 1)]
        );
    }

    #[test]
    fn test_months_in_range_single_month() {
        let months = months_in_range(date(2025, 6, 10), date(2025, 6, 20)).unwrap();
        assert_eq!(months, vec![date(2025, 6, 1)]);
    }

    #[test]
    fn test_months_in_range_rejects_inverted_range() {
        let result = months_in_range(date(2025, 6, 10), date(2025, 5, 1));
        assert!(matches!(result, Err(Error::InvalidRange(_))));
    }

    #[test]
    fn test_months_until() {
        assert_eq!(months_until(date(2025, 3, 1), date(2025, 3, 15)).unwrap(), 1);
        assert_eq!(months_until(date(2025, 3, 1), date(2025, 4, 1)).unwrap(), 1);
        assert_eq!(months_until(date(2025, 3, 1), date(2025, 4, 2)).unwrap(), 2);
        assert_eq!(months_until(date(2024, 11, 1), date(2025, 2, 10)).unwrap(), 4);
        // Target already covered still asks for one month
        assert_eq!(months_until(date(2025, 6, 1), date(2025, 4, 1)).unwrap(), 1);
    }

    #[test]
    fn test_days_before_leap_year() {
        let now = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(days_before(now, 365).unwrap(), date(2024, 2, 2));
    }

    #[test]
    fn test_days_before_out_of_calendar() {
        let now = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        assert!(matches!(days_before(now, 100_000_000), Err(Error::InvalidRange(_))));
        assert!(matches!(days_before(now, u32::MAX), Err(Error::InvalidRange(_))));
    }

    #[test]
    fn test_partition_name_is_zero_padded() {
        assert_eq!(partition_name("StudySession", date(2025, 3, 1)), "StudySession_2025_03");
        assert_eq!(partition_name("ActivityLog", date(2024, 11, 9)), "ActivityLog_2024_11");
    }
}
