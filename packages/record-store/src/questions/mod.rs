//! Address book questions
//!
//! The three fixed questions asked of an imported address book, answered
//! through index views:
//!
//! 1. How many women are in the address book? (`byGender`)
//! 2. Who is the oldest person? (first `byBirthday` key; ISO dates sort by age)
//! 3. How many days older is Bill than Paul? (`byName`)

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::Record;
use crate::error::{Result, StoreError};
use crate::store::RecordStore;

pub const BILL: &str = "Bill McKnight";
pub const PAUL: &str = "Paul Robinson";

const BIRTHDAY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Question {
    WomenCount,
    OldestPerson,
    BillOlderThanPaul,
}

impl Question {
    pub const ALL: [Question; 3] = [
        Question::WomenCount,
        Question::OldestPerson,
        Question::BillOlderThanPaul,
    ];

    /// 1-based question number
    pub fn from_number(number: usize) -> Option<Self> {
        Self::ALL.get(number.checked_sub(1)?).copied()
    }

    pub fn number(&self) -> usize {
        match self {
            Question::WomenCount => 1,
            Question::OldestPerson => 2,
            Question::BillOlderThanPaul => 3,
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            Question::WomenCount => "How many women are in the address book?",
            Question::OldestPerson => "Who is the oldest person in the address book?",
            Question::BillOlderThanPaul => "How many days older is Bill than Paul?",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Answer {
    Count(usize),
    Person(String),
    Days(i64),
    /// People the question needs but the store does not hold
    Missing(Vec<String>),
    /// Nothing has been imported
    NoData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionAnswer {
    pub number: usize,
    pub question: &'static str,
    pub answer: Answer,
}

/// Answer one question against the current store contents
///
/// # Errors
/// Returns error if a required index is not registered or a birthday is not
/// an ISO date
pub fn answer(store: &RecordStore, question: Question) -> Result<QuestionAnswer> {
    let answer = if store.entry_count() == 0 {
        Answer::NoData
    } else {
        match question {
            Question::WomenCount => Answer::Count(women_count(store)?),
            Question::OldestPerson => match oldest_person(store)? {
                Some(name) => Answer::Person(name),
                None => Answer::NoData,
            },
            Question::BillOlderThanPaul => days_older(store, BILL, PAUL)?,
        }
    };

    Ok(QuestionAnswer {
        number: question.number(),
        question: question.text(),
        answer,
    })
}

pub fn answer_all(store: &RecordStore) -> Result<Vec<QuestionAnswer>> {
    Question::ALL
        .iter()
        .map(|question| answer(store, *question))
        .collect()
}

pub fn women_count(store: &RecordStore) -> Result<usize> {
    Ok(store.view("byGender", Some("Female"))?.len())
}

/// Name of the first person born on the earliest birthday
pub fn oldest_person(store: &RecordStore) -> Result<Option<String>> {
    let birthdays = store.view("byBirthday", None)?;
    let Some(&earliest) = birthdays.keys().first() else {
        return Ok(None);
    };

    let oldest = store.view("byBirthday", Some(earliest))?;
    Ok(oldest
        .records()
        .first()
        .and_then(|record| record.field("name"))
        .map(|name| name.to_string()))
}

/// Days between the birthdays of `older` and `younger`
///
/// Negative when `older` is in fact the younger one.
pub fn days_older(store: &RecordStore, older: &str, younger: &str) -> Result<Answer> {
    let older_view = store.view("byName", Some(older))?;
    let younger_view = store.view("byName", Some(younger))?;

    let missing: Vec<String> = [(older, &older_view), (younger, &younger_view)]
        .into_iter()
        .filter(|(_, view)| view.is_empty())
        .map(|(name, _)| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Ok(Answer::Missing(missing));
    }

    let older_birthday = birthday(older_view.records()[0])?;
    let younger_birthday = birthday(younger_view.records()[0])?;
    Ok(Answer::Days((younger_birthday - older_birthday).num_days()))
}

fn birthday(record: &Record) -> Result<NaiveDate> {
    let value = record
        .field("birthday")
        .map(|v| v.to_string())
        .unwrap_or_default();
    NaiveDate::parse_from_str(&value, BIRTHDAY_FORMAT).map_err(|e| {
        StoreError::parse(format!("Invalid birthday '{}'", value)).with_source(e)
    })
}
