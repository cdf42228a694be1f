//! Shareable anonymized copies of a record set.
//!
//! # Responsibility
//! - Replace names, group labels, places and dates with stable placeholders.
//!
//! # Invariants
//! - Ids and every relationship field are untouched, so the anonymized set
//!   builds the same graph, components, trees and layouts.
//! - Equal inputs map to equal placeholders within one run.
//! - Placeholder dates keep the precision of the original.

use crate::model::date::{DatePrecision, PrecisionDate};
use crate::model::person::PersonRecord;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const PLACEHOLDER_YEAR: i32 = 1900;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnonymizeOptions {
    pub keep_dates: bool,
    pub keep_places: bool,
}

/// Numbered placeholder allocator for one kind of value.
struct Placeholders {
    prefix: &'static str,
    seen: HashMap<String, String>,
}

impl Placeholders {
    fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            seen: HashMap::new(),
        }
    }

    fn replace(&mut self, value: &str) -> String {
        let next = self.seen.len() + 1;
        let prefix = self.prefix;
        self.seen
            .entry(value.trim().to_string())
            .or_insert_with(|| format!("{prefix} {next}"))
            .clone()
    }

    fn replace_opt(&mut self, value: &mut Option<String>) {
        if let Some(current) = value.as_deref() {
            if !current.trim().is_empty() {
                *value = Some(self.replace(current));
            }
        }
    }
}

/// Returns an anonymized copy of `records`, in the same order.
pub fn anonymize(records: &[PersonRecord], options: AnonymizeOptions) -> Vec<PersonRecord> {
    let mut names = Placeholders::new("Person");
    let mut groups = Placeholders::new("Family");
    let mut places = Placeholders::new("Place");

    let anonymized: Vec<PersonRecord> = records
        .iter()
        .map(|record| {
            let mut copy = record.clone();
            names.replace_opt(&mut copy.name);
            groups.replace_opt(&mut copy.group_name);

            if !options.keep_places {
                places.replace_opt(&mut copy.birth_place);
                places.replace_opt(&mut copy.death_place);
                places.replace_opt(&mut copy.burial_place);
                for place in &mut copy.residence_places {
                    *place = places.replace(place);
                }
                for entry in &mut copy.spouses {
                    places.replace_opt(&mut entry.metadata.marriage_place);
                }
            }

            if !options.keep_dates {
                placeholder_date(&mut copy.birth_date);
                placeholder_date(&mut copy.death_date);
                for entry in &mut copy.spouses {
                    placeholder_date(&mut entry.metadata.marriage_date);
                    placeholder_date(&mut entry.metadata.divorce_date);
                }
            }
            copy
        })
        .collect();

    info!(
        "event=anonymize module=privacy status=ok records={} names={} places={}",
        anonymized.len(),
        names.seen.len(),
        places.seen.len()
    );
    anonymized
}

fn placeholder_date(date: &mut Option<PrecisionDate>) {
    if let Some(current) = date.as_ref() {
        *date = Some(placeholder_for(current));
    }
}

fn placeholder_for(date: &PrecisionDate) -> PrecisionDate {
    let year = PLACEHOLDER_YEAR;
    let raw = match date.precision {
        DatePrecision::Full => format!("1 JAN {year}"),
        DatePrecision::YearMonth => format!("JAN {year}"),
        DatePrecision::Year => year.to_string(),
        DatePrecision::Approximate => {
            let qualifier = date.raw.split_whitespace().next().unwrap_or("ABT");
            if qualifier.chars().any(|ch| ch.is_ascii_digit()) {
                format!("ABT {year}")
            } else {
                format!("{} {year}", qualifier.to_ascii_uppercase())
            }
        }
        DatePrecision::Range => format!("BET {year} AND {}", year + 10),
        DatePrecision::Unknown => return PrecisionDate::unknown("unknown"),
    };
    PrecisionDate::parse(raw)
}

#[cfg(test)]
mod tests {
    use super::{anonymize, AnonymizeOptions};
    use crate::model::date::DatePrecision;
    use crate::model::person::PersonRecord;

    fn sample() -> Vec<PersonRecord> {
        let mut first = PersonRecord::new("a")
            .with_name("Ada Byron")
            .with_birth("10 DEC 1815")
            .with_birth_place("London")
            .with_group_name("Byron")
            .with_spouse("b");
        first.spouses[0].metadata.marriage_place = Some("London".to_string());
        let second = PersonRecord::new("b")
            .with_name("William King")
            .with_birth("ABT 1805")
            .with_birth_place("Ockham")
            .with_spouse("a");
        let third = PersonRecord::new("c")
            .with_name("Ada Byron")
            .with_father("b")
            .with_mother("a")
            .with_birth("1836-05");
        vec![first, second, third]
    }

    #[test]
    fn names_and_places_become_stable_placeholders() {
        let result = anonymize(&sample(), AnonymizeOptions::default());
        assert_eq!(result[0].name.as_deref(), Some("Person 1"));
        assert_eq!(result[1].name.as_deref(), Some("Person 2"));
        assert_eq!(result[2].name.as_deref(), Some("Person 1"));
        assert_eq!(result[0].group_name.as_deref(), Some("Family 1"));
        assert_eq!(result[0].birth_place.as_deref(), Some("Place 1"));
        assert_eq!(
            result[0].spouses[0].metadata.marriage_place.as_deref(),
            Some("Place 1")
        );
        assert_eq!(result[1].birth_place.as_deref(), Some("Place 2"));
    }

    #[test]
    fn dates_keep_their_precision() {
        let result = anonymize(&sample(), AnonymizeOptions::default());
        let full = result[0].birth_date.as_ref().unwrap();
        assert_eq!(full.raw, "1 JAN 1900");
        assert_eq!(full.precision, DatePrecision::Full);
        let approximate = result[1].birth_date.as_ref().unwrap();
        assert_eq!(approximate.raw, "ABT 1900");
        assert_eq!(approximate.precision, DatePrecision::Approximate);
        let month = result[2].birth_date.as_ref().unwrap();
        assert_eq!(month.precision, DatePrecision::YearMonth);
        assert_eq!(month.year, Some(1900));
    }

    #[test]
    fn relationships_survive_and_kept_fields_are_untouched() {
        let input = sample();
        let options = AnonymizeOptions {
            keep_dates: true,
            keep_places: true,
        };
        let result = anonymize(&input, options);
        for (before, after) in input.iter().zip(&result) {
            assert_eq!(before.id, after.id);
            assert_eq!(before.father, after.father);
            assert_eq!(before.mother, after.mother);
            assert_eq!(before.birth_date, after.birth_date);
            assert_eq!(before.birth_place, after.birth_place);
            let spouses: Vec<_> = after.spouses.iter().map(|entry| &entry.spouse).collect();
            let expected: Vec<_> = before.spouses.iter().map(|entry| &entry.spouse).collect();
            assert_eq!(spouses, expected);
        }
    }
}
