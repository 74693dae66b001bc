//! Heuristic extraction of an expense record from raw receipt OCR text.
//!
//! Four independent passes read the same transcript: date, amount/currency,
//! merchant and description. None of them can fail; each falls back to a fixed
//! default when nothing on the page qualifies.

use chrono::{NaiveDate, Utc};
use expensa_core::CurrencyCode;
use serde::{Deserialize, Serialize};

use crate::types::{ExtractedRecord, RawDocument, RecordField};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static ::regex::Regex {
            static R: ::std::sync::OnceLock<::regex::Regex> = ::std::sync::OnceLock::new();
            R.get_or_init(|| ::regex::Regex::new($pat).expect("invalid regex"))
        }
    };
}

pub mod amounts;
pub mod dates;
pub mod description;
pub mod merchant;
pub mod normalize;

pub use amounts::{AmountAndCurrency, LastTaggedAmountWins, TaggedAmount};
pub use dates::DateShapeError;
pub use normalize::normalize;

/// Knobs for the amount/currency pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Currency reported when no currency token is found.
    pub default_currency: CurrencyCode,
    /// When non-empty, only these codes are recognised as currency tokens.
    pub currencies: Vec<CurrencyCode>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self { default_currency: CurrencyCode::usd(), currencies: Vec::new() }
    }
}

impl ExtractionConfig {
    /// Turn a raw 3-letter token into a currency code, honouring the allowlist.
    pub fn accept_currency(&self, token: &str) -> Option<CurrencyCode> {
        let code = CurrencyCode::new(token).ok()?;
        if self.currencies.is_empty() || self.currencies.contains(&code) {
            Some(code)
        } else {
            None
        }
    }
}

// ── Public extraction API ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractionConfig,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract an expense record from raw OCR text. Missing dates fall back to today (UTC).
    pub fn extract(&self, ocr_text: &str) -> ExtractedRecord {
        self.extract_on(ocr_text, Utc::now().date_naive())
    }

    /// Same as [`Extractor::extract`] with an explicit fallback date.
    pub fn extract_on(&self, ocr_text: &str, today: NaiveDate) -> ExtractedRecord {
        let doc = RawDocument::new(ocr_text);

        let date = dates::extract_date_or(&normalize(doc.text()), today);
        let AmountAndCurrency { amount, currency } =
            amounts::extract_amount_and_currency(doc.text(), &self.config);
        let merchant = merchant::extract_merchant(&doc);
        let description = description::extract_description(&doc);

        let defaulted = [
            (RecordField::Amount, amount.is_default()),
            (RecordField::Currency, currency.is_default()),
            (RecordField::Date, date.is_default()),
            (RecordField::Merchant, merchant.is_default()),
            (RecordField::Description, description.is_default()),
        ]
        .into_iter()
        .filter_map(|(field, defaulted)| defaulted.then_some(field))
        .collect();

        ExtractedRecord {
            amount: amount.value,
            currency: currency.value,
            date: date.value,
            merchant: merchant.value,
            description: description.value,
            defaulted,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
