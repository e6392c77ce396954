//! Address book line parser
//!
//! Line format: `<name>, <Male|Female>, <dd>/<mm>/<yy>`, e.g.
//! `Horned Reaper, Male, 23/07/78`. Birthdays are stored as ISO dates; a
//! two-digit year up to the current one belongs to this century, anything
//! later to the previous one.

use chrono::Datelike;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

use super::ports::{LineParser, ParsedRecord};
use crate::domain::FieldValue;

lazy_static! {
    static ref ENTRY_PATTERN: Regex =
        Regex::new(r"([\w -]+), (Male|Female), ([0-2][0-9]|3[0-1])/(0[1-9]|1[0-2])/([0-9]{2})")
            .expect("address book pattern is valid");
}

#[derive(Debug, Clone)]
pub struct AddressBookParser {
    /// Last two digits of the current year
    current_year: u32,
}

impl AddressBookParser {
    pub fn new() -> Self {
        let year = chrono::Local::now().year().rem_euclid(100) as u32;
        Self::with_current_year(year)
    }

    /// Parser with a fixed "current" two-digit year
    pub fn with_current_year(current_year: u32) -> Self {
        Self { current_year }
    }

    /// `yy`, `mm`, `dd` -> `YYYY-MM-DD`
    pub fn iso_date(&self, year: &str, month: &str, day: &str) -> String {
        let century = match year.parse::<u32>() {
            Ok(yy) if yy <= self.current_year => 20,
            _ => 19,
        };
        format!("{}{}-{}-{}", century, year, month, day)
    }
}

impl Default for AddressBookParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser for AddressBookParser {
    fn parse_line(&self, line: &str, source: &str) -> Option<ParsedRecord> {
        if line.trim().is_empty() {
            return None;
        }

        let caps = ENTRY_PATTERN.captures(line)?;
        let birthday = self.iso_date(&caps[5], &caps[4], &caps[3]);

        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), FieldValue::from(caps[1].trim()));
        fields.insert("gender".to_string(), FieldValue::from(&caps[2]));
        fields.insert("birthday".to_string(), FieldValue::from(birthday));

        Some(ParsedRecord {
            fields,
            source: source.to_string(),
        })
    }
}
