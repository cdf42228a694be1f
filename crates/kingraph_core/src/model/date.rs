//! Precision-tagged genealogical dates.
//!
//! # Responsibility
//! - Parse the date shapes found in person records into comparable values.
//! - Keep the original text so nothing is lost on round trips.
//!
//! # Invariants
//! - `year` is `None` exactly when `precision == DatePrecision::Unknown`.
//! - `end_year` is only set for `DatePrecision::Range`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

static FULL_ISO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("valid full iso regex"));
static YEAR_MONTH_ISO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})$").expect("valid year-month regex"));
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{3,4})$").expect("valid year regex"));
static GEDCOM_FULL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})\s+([A-Za-z]{3})\s+(\d{3,4})$").expect("valid gedcom date regex")
});
static GEDCOM_MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{3})\s+(\d{3,4})$").expect("valid gedcom month regex")
});
static APPROX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(ABT\.?|ABOUT|CA\.?|CIRCA|CAL|EST|BEF\.?|AFT\.?|~|c\.)\s*(?:\d{1,2}\s+)?(?:[A-Za-z]{3}\s+)?(\d{3,4})$")
        .expect("valid approximate regex")
});
static RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:BET\s+|FROM\s+)?(\d{3,4})\s*(?:-|/|AND|TO)\s*(\d{3,4})$")
        .expect("valid range regex")
});

/// How much of a date is actually known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePrecision {
    Year,
    YearMonth,
    Full,
    Approximate,
    Range,
    Unknown,
}

/// A date as written in a record, plus whatever could be parsed from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecisionDate {
    /// Text exactly as supplied by the record store.
    pub raw: String,
    pub precision: DatePrecision,
    pub year: Option<i32>,
    pub month: Option<u8>,
    pub day: Option<u8>,
    /// Upper bound year for ranges.
    pub end_year: Option<i32>,
}

impl PrecisionDate {
    /// Parses one date string. Never fails; unrecognized input is `Unknown`.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let text = raw.trim();

        if let Some(caps) = FULL_ISO_RE.captures(text) {
            let month = parse_u8(&caps[2]).filter(|m| (1..=12).contains(m));
            let day = parse_u8(&caps[3]).filter(|d| (1..=31).contains(d));
            if month.is_some() && day.is_some() {
                return Self::known(&raw, DatePrecision::Full, parse_i32(&caps[1]), month, day);
            }
        }
        if let Some(caps) = YEAR_MONTH_ISO_RE.captures(text) {
            let month = parse_u8(&caps[2]).filter(|m| (1..=12).contains(m));
            if month.is_some() {
                return Self::known(&raw, DatePrecision::YearMonth, parse_i32(&caps[1]), month, None);
            }
        }
        if let Some(caps) = YEAR_RE.captures(text) {
            return Self::known(&raw, DatePrecision::Year, parse_i32(&caps[1]), None, None);
        }
        if let Some(caps) = GEDCOM_FULL_RE.captures(text) {
            let month = month_from_abbrev(&caps[2]);
            let day = parse_u8(&caps[1]).filter(|d| (1..=31).contains(d));
            if month.is_some() && day.is_some() {
                return Self::known(&raw, DatePrecision::Full, parse_i32(&caps[3]), month, day);
            }
        }
        if let Some(caps) = GEDCOM_MONTH_RE.captures(text) {
            if let Some(month) = month_from_abbrev(&caps[1]) {
                return Self::known(
                    &raw,
                    DatePrecision::YearMonth,
                    parse_i32(&caps[2]),
                    Some(month),
                    None,
                );
            }
        }
        if let Some(caps) = APPROX_RE.captures(text) {
            return Self::known(&raw, DatePrecision::Approximate, parse_i32(&caps[2]), None, None);
        }
        if let Some(caps) = RANGE_RE.captures(text) {
            let start = parse_i32(&caps[1]);
            let end = parse_i32(&caps[2]);
            if let (Some(start), Some(end)) = (start, end) {
                let mut date =
                    Self::known(&raw, DatePrecision::Range, Some(start.min(end)), None, None);
                date.end_year = Some(start.max(end));
                return date;
            }
        }

        Self::unknown(raw)
    }

    /// Builds an `Unknown` date that keeps the raw text.
    pub fn unknown(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            precision: DatePrecision::Unknown,
            year: None,
            month: None,
            day: None,
            end_year: None,
        }
    }

    fn known(
        raw: &str,
        precision: DatePrecision,
        year: Option<i32>,
        month: Option<u8>,
        day: Option<u8>,
    ) -> Self {
        match year {
            Some(year) => Self {
                raw: raw.to_string(),
                precision,
                year: Some(year),
                month,
                day,
                end_year: None,
            },
            None => Self::unknown(raw),
        }
    }

    /// Ordering key. Dates without a year sort after every dated value.
    pub fn sort_key(&self) -> DateSortKey {
        match self.year {
            Some(year) => DateSortKey::Dated(year, self.month.unwrap_or(0), self.day.unwrap_or(0)),
            None => DateSortKey::Undated,
        }
    }
}

impl Display for PrecisionDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Comparable projection of a `PrecisionDate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateSortKey {
    Dated(i32, u8, u8),
    Undated,
}

impl DateSortKey {
    /// Key for an optional date; absent dates behave like undated ones.
    pub fn of(date: Option<&PrecisionDate>) -> Self {
        date.map_or(Self::Undated, PrecisionDate::sort_key)
    }
}

impl PartialOrd for DateSortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DateSortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Dated(y1, m1, d1), Self::Dated(y2, m2, d2)) => (y1, m1, d1).cmp(&(y2, m2, d2)),
            (Self::Dated(..), Self::Undated) => Ordering::Less,
            (Self::Undated, Self::Dated(..)) => Ordering::Greater,
            (Self::Undated, Self::Undated) => Ordering::Equal,
        }
    }
}

fn parse_i32(value: &str) -> Option<i32> {
    value.parse::<i32>().ok()
}

fn parse_u8(value: &str) -> Option<u8> {
    value.parse::<u8>().ok()
}

fn month_from_abbrev(value: &str) -> Option<u8> {
    let month = match value.to_ascii_uppercase().as_str() {
        "JAN" => 1,
        "FEB" => 2,
        "MAR" => 3,
        "APR" => 4,
        "MAY" => 5,
        "JUN" => 6,
        "JUL" => 7,
        "AUG" => 8,
        "SEP" => 9,
        "OCT" => 10,
        "NOV" => 11,
        "DEC" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use super::{DatePrecision, DateSortKey, PrecisionDate};

    #[test]
    fn parses_iso_shapes_with_matching_precision() {
        let full = PrecisionDate::parse("1850-03-12");
        assert_eq!(full.precision, DatePrecision::Full);
        assert_eq!((full.year, full.month, full.day), (Some(1850), Some(3), Some(12)));

        let month = PrecisionDate::parse("1850-03");
        assert_eq!(month.precision, DatePrecision::YearMonth);
        assert_eq!(month.month, Some(3));

        let year = PrecisionDate::parse(" 1850 ");
        assert_eq!(year.precision, DatePrecision::Year);
        assert_eq!(year.year, Some(1850));
    }

    #[test]
    fn parses_gedcom_and_qualified_forms() {
        let full = PrecisionDate::parse("12 MAR 1850");
        assert_eq!(full.precision, DatePrecision::Full);
        assert_eq!(full.month, Some(3));

        let approx = PrecisionDate::parse("ABT 1850");
        assert_eq!(approx.precision, DatePrecision::Approximate);
        assert_eq!(approx.year, Some(1850));

        let range = PrecisionDate::parse("BET 1860 AND 1850");
        assert_eq!(range.precision, DatePrecision::Range);
        assert_eq!(range.year, Some(1850));
        assert_eq!(range.end_year, Some(1860));
    }

    #[test]
    fn unrecognized_text_is_unknown_and_keeps_raw() {
        let date = PrecisionDate::parse("the spring after the flood");
        assert_eq!(date.precision, DatePrecision::Unknown);
        assert_eq!(date.year, None);
        assert_eq!(date.raw, "the spring after the flood");
    }

    #[test]
    fn invalid_month_falls_through_to_unknown() {
        let date = PrecisionDate::parse("1850-13");
        assert_eq!(date.precision, DatePrecision::Unknown);
    }

    #[test]
    fn undated_sorts_after_dated() {
        let early = PrecisionDate::parse("1800").sort_key();
        let later = PrecisionDate::parse("1800-02").sort_key();
        assert!(early < later);
        assert!(later < DateSortKey::Undated);
        assert!(DateSortKey::of(None) > early);
    }
}
