//! Parsing of range-partition boundary literals
//!
//! PostgreSQL reports partition bounds through `pg_get_expr(relpartbound, oid)` as text:
//!
//! ```text
//! FOR VALUES FROM ('2025-03-01') TO ('2025-04-01')
//! FOR VALUES FROM ('2025-03-01 00:00:00+00') TO ('2025-04-01 00:00:00+00')
//! DEFAULT
//! ```
//!
//! Only the calendar date of each bound is kept. Bounds that carry no concrete
//! date (`DEFAULT`, `MINVALUE`, `MAXVALUE`, multi-column or malformed literals)
//! yield `None` so callers can exclude the partition from date reasoning.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static RANGE_BOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*FOR\s+VALUES\s+FROM\s+\('(\d{4}-\d{2}-\d{2})[^',)]*'\)\s+TO\s+\('(\d{4}-\d{2}-\d{2})[^',)]*'\)\s*$",
    )
    .expect("range bound pattern is valid")
});

/// Parsed `[start, end)` bound of a range partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateBound {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Parse a range-partition bound expression into its date range
///
/// Returns `None` for catch-all partitions and anything that is not a
/// well-formed single-column date range with `start < end`.
pub fn parse_range_bound(expression: &str) -> Option<DateBound> {
    let captures = RANGE_BOUND.captures(expression)?;
    let start = NaiveDate::parse_from_str(captures.get(1)?.as_str(), "%Y-%m-%d").ok()?;
    let end = NaiveDate::parse_from_str(captures.get(2)?.as_str(), "%Y-%m-%d").ok()?;

    if start >= end {
        return None;
    }

    Some(DateBound { start, end })
}

/// Render a date range the way PostgreSQL prints it for a `DATE` partition key
pub fn format_range_bound(start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "FOR VALUES FROM ('{}') TO ('{}')",
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_bound() {
        let bound = parse_range_bound("FOR VALUES FROM ('2025-03-01') TO ('2025-04-01')").unwrap();
        assert_eq!(bound.start, date(2025, 3, 1));
        assert_eq!(bound.end, date(2025, 4, 1));
    }

    #[test]
    fn test_parse_timestamptz_bound() {
        let bound = parse_range_bound(
            "FOR VALUES FROM ('2024-12-01 00:00:00+00') TO ('2025-01-01 00:00:00+00')",
        )
        .unwrap();
        assert_eq!(bound.start, date(2024, 12, 1));
        assert_eq!(bound.end, date(2025, 1, 1));
    }

    #[test]
    fn test_parse_bound_with_offset_and_fraction() {
        let bound = parse_range_bound(
            "FOR VALUES FROM ('2025-03-01 00:00:00.000-05') TO ('2025-04-01 00:00:00.000-05')",
        )
        .unwrap();
        assert_eq!(bound.start, date(2025, 3, 1));
        assert_eq!(bound.end, date(2025, 4, 1));
    }

    #[test]
    fn test_default_partition_has_no_bound() {
        assert!(parse_range_bound("DEFAULT").is_none());
    }

    #[test]
    fn test_unbounded_ranges_are_rejected() {
        assert!(parse_range_bound("FOR VALUES FROM (MINVALUE) TO ('2025-01-01')").is_none());
        assert!(parse_range_bound("FOR VALUES FROM ('2025-01-01') TO (MAXVALUE)").is_none());
    }

    #[test]
    fn test_multi_column_bound_is_rejected() {
        assert!(
            parse_range_bound("FOR VALUES FROM ('2025-01-01', 1) TO ('2025-02-01', 1)").is_none()
        );
    }

    #[test]
    fn test_inverted_or_invalid_dates_are_rejected() {
        assert!(parse_range_bound("FOR VALUES FROM ('2025-04-01') TO ('2025-03-01')").is_none());
        assert!(parse_range_bound("FOR VALUES FROM ('2025-02-30') TO ('2025-03-01')").is_none());
        assert!(parse_range_bound("garbage").is_none());
    }

    #[test]
    fn test_format_matches_parser() {
        let rendered = format_range_bound(date(2023, 1, 1), date(2023, 2, 1));
        assert_eq!(rendered, "FOR VALUES FROM ('2023-01-01') TO ('2023-02-01')");
        assert_eq!(
            parse_range_bound(&rendered),
            Some(DateBound {
                start: date(2023, 1, 1),
                end: date(2023, 2, 1)
            })
        );
    }
}
