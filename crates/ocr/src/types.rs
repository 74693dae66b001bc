use chrono::NaiveDate;
use expensa_core::{Amount, CurrencyCode};
use serde::{Deserialize, Serialize};

/// Merchant value used when no line qualifies.
pub const UNKNOWN_MERCHANT: &str = "Unknown Merchant";
/// Description value used when no line item was collected.
pub const NO_DESCRIPTION: &str = "No description available";

/// One OCR transcript, viewed as its raw text plus its non-empty trimmed lines.
#[derive(Debug, Clone)]
pub struct RawDocument<'a> {
    text: &'a str,
    lines: Vec<&'a str>,
}

impl<'a> RawDocument<'a> {
    pub fn new(text: &'a str) -> Self {
        let lines = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        Self { text, lines }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn lines(&self) -> &[&'a str] {
        &self.lines
    }
}

/// Whether a field came from the document or from its documented default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    Matched,
    Default,
}

/// The outcome of a single extraction pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedField<T> {
    pub value: T,
    pub source: FieldSource,
}

impl<T> ExtractedField<T> {
    pub fn matched(value: T) -> Self {
        Self { value, source: FieldSource::Matched }
    }

    pub fn fallback(value: T) -> Self {
        Self { value, source: FieldSource::Default }
    }

    pub fn is_default(&self) -> bool {
        self.source == FieldSource::Default
    }
}

/// A match found while scanning: the substring it came from and what was parsed out of it.
/// Only the winning candidate per field makes it into the record.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a, T> {
    pub source: &'a str,
    pub value: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Amount,
    Currency,
    Date,
    Merchant,
    Description,
}

/// The structured expense pulled out of a receipt. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub amount: Amount,
    pub currency: CurrencyCode,
    pub date: NaiveDate,
    pub merchant: String,
    pub description: String,
    /// Fields that fell back to their default value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defaulted: Vec<RecordField>,
}

impl ExtractedRecord {
    /// True when at least one field is a fallback rather than something read off the receipt.
    pub fn needs_review(&self) -> bool {
        !self.defaulted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_document_drops_blank_lines_and_trims() {
        let doc = RawDocument::new("  ACME  \r\n\n   \nTotal: 7\n");
        assert_eq!(doc.lines(), &["ACME", "Total: 7"]);
        assert_eq!(doc.text(), "  ACME  \r\n\n   \nTotal: 7\n");
    }

    #[test]
    fn extracted_field_source() {
        assert!(!ExtractedField::matched(1).is_default());
        assert!(ExtractedField::fallback(1).is_default());
    }

    #[test]
    fn record_serializes_plain_values() {
        let record = ExtractedRecord {
            amount: Amount::from_cents(700),
            currency: CurrencyCode::usd(),
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            merchant: UNKNOWN_MERCHANT.to_string(),
            description: NO_DESCRIPTION.to_string(),
            defaulted: vec![],
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["amount"], "7.00");
        assert_eq!(json["currency"], "USD");
        assert_eq!(json["date"], "2024-03-04");
        assert!(json.get("defaulted").is_none());
        assert!(!record.needs_review());
    }

    #[test]
    fn defaulted_fields_are_listed() {
        let record = ExtractedRecord {
            amount: Amount::zero(),
            currency: CurrencyCode::usd(),
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            merchant: "Acme".to_string(),
            description: NO_DESCRIPTION.to_string(),
            defaulted: vec![RecordField::Amount, RecordField::Description],
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["defaulted"], serde_json::json!(["amount", "description"]));
        assert!(record.needs_review());
    }
}
