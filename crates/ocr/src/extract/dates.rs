//! Date pass: four date shapes tried in a fixed order, first hit wins.

use chrono::{NaiveDate, Utc};
use regex::{Captures, Regex};
use thiserror::Error;
use tracing::debug;

use crate::types::{Candidate, ExtractedField};

re!(re_numeric_mdy,
    r"(\d{1,2})[/\-](\d{1,2})[/\-](\d{2,4})");
re!(re_month_day_year,
    r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b\.?\s+(\d{1,2}),?\s+(\d{4})");
re!(re_day_month_year,
    r"(?i)(\d{1,2})\s+(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b\.?,?\s+(\d{4})");
re!(re_numeric_ymd,
    r"(\d{4})[/\-](\d{1,2})[/\-](\d{1,2})");

/// Why a date-shaped match could not be turned into a calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateShapeError {
    #[error("unparseable {0} '{1}'")]
    Component(&'static str, String),
    #[error("unsupported year '{0}'")]
    Year(String),
    #[error("unknown month '{0}'")]
    Month(String),
    #[error("no such calendar date {0:04}-{1:02}-{2:02}")]
    Calendar(i32, u32, u32),
}

/// A date layout: the pattern that finds it and how to read its groups.
struct DateShape {
    name: &'static str,
    pattern: fn() -> &'static Regex,
    build: fn(&Captures<'_>) -> Result<NaiveDate, DateShapeError>,
}

/// Evaluated strictly in this order.
const DATE_SHAPES: [DateShape; 4] = [
    DateShape { name: "m/d/y", pattern: re_numeric_mdy, build: build_numeric_mdy },
    DateShape { name: "month d, y", pattern: re_month_day_year, build: build_month_day_year },
    DateShape { name: "d month y", pattern: re_day_month_year, build: build_day_month_year },
    DateShape { name: "y-m-d", pattern: re_numeric_ymd, build: build_numeric_ymd },
];

/// Date found in the (normalized) text, or today's UTC date.
pub fn extract_date(normalized: &str) -> ExtractedField<NaiveDate> {
    extract_date_or(normalized, Utc::now().date_naive())
}

pub fn extract_date_or(normalized: &str, fallback: NaiveDate) -> ExtractedField<NaiveDate> {
    match first_date(normalized) {
        Some(c) => ExtractedField::matched(c.value),
        None => {
            debug!(%fallback, "no date found, using fallback");
            ExtractedField::fallback(fallback)
        }
    }
}

/// Only the first occurrence of each shape is considered; a bad one moves on to the next shape.
pub fn first_date(text: &str) -> Option<Candidate<'_, NaiveDate>> {
    for shape in &DATE_SHAPES {
        let Some(caps) = (shape.pattern)().captures(text) else {
            continue;
        };
        let source = caps.get(0).map_or("", |m| m.as_str()).trim();
        match (shape.build)(&caps) {
            Ok(date) => {
                debug!(shape = shape.name, source, %date, "date matched");
                return Some(Candidate { source, value: date });
            }
            Err(e) => debug!(shape = shape.name, source, error = %e, "date candidate rejected"),
        }
    }
    None
}

// ── Builders ──────────────────────────────────────────────────────────────────

fn build_numeric_mdy(c: &Captures<'_>) -> Result<NaiveDate, DateShapeError> {
    // US order: month first.
    let month = number(c, 1, "month")?;
    let day = number(c, 2, "day")?;
    let year = expand_year(&c[3])?;
    calendar_date(year, month, day)
}

fn build_month_day_year(c: &Captures<'_>) -> Result<NaiveDate, DateShapeError> {
    let month = month_from_name(&c[1])?;
    let day = number(c, 2, "day")?;
    let year = expand_year(&c[3])?;
    calendar_date(year, month, day)
}

fn build_day_month_year(c: &Captures<'_>) -> Result<NaiveDate, DateShapeError> {
    let day = number(c, 1, "day")?;
    let month = month_from_name(&c[2])?;
    let year = expand_year(&c[3])?;
    calendar_date(year, month, day)
}

fn build_numeric_ymd(c: &Captures<'_>) -> Result<NaiveDate, DateShapeError> {
    let year = expand_year(&c[1])?;
    let month = number(c, 2, "month")?;
    let day = number(c, 3, "day")?;
    calendar_date(year, month, day)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn number(c: &Captures<'_>, group: usize, what: &'static str) -> Result<u32, DateShapeError> {
    let raw = &c[group];
    raw.parse().map_err(|_| DateShapeError::Component(what, raw.to_string()))
}

/// Two-digit years live in the 2000s; three-digit years are OCR debris.
fn expand_year(raw: &str) -> Result<i32, DateShapeError> {
    let y: i32 = raw
        .parse()
        .map_err(|_| DateShapeError::Component("year", raw.to_string()))?;
    match raw.len() {
        2 => Ok(2000 + y),
        4 => Ok(y),
        _ => Err(DateShapeError::Year(raw.to_string())),
    }
}

fn month_from_name(name: &str) -> Result<u32, DateShapeError> {
    let abbr: String = name.chars().take(3).collect::<String>().to_lowercase();
    let month = match abbr.as_str() {
        "jan" => 1, "feb" => 2, "mar" => 3, "apr" => 4,
        "may" => 5, "jun" => 6, "jul" => 7, "aug" => 8,
        "sep" => 9, "oct" => 10, "nov" => 11, "dec" => 12,
        _ => return Err(DateShapeError::Month(name.to_string())),
    };
    Ok(month)
}

fn calendar_date(year: i32, month: u32, day: u32) -> Result<NaiveDate, DateShapeError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or(DateShapeError::Calendar(year, month, day))
}
