//! Amount & currency pass.
//!
//! Two stages. A labeled total (`Total`, `Amount`, `Balance`, `Grand Total`,
//! tried in that order) gives a provisional amount. Then every
//! currency-tagged number in the document is scanned and the last one
//! overrides both amount and currency; see [`LastTaggedAmountWins`].

use expensa_core::{Amount, CurrencyCode};
use regex::Regex;
use std::str::FromStr;
use tracing::debug;

use super::ExtractionConfig;
use crate::types::{Candidate, ExtractedField};

// Number token: digits with optional comma-grouped thousands and an optional
// fraction. Extra fractional digits are rounded by `Amount`, not cut off.
re!(re_label_total,
    r"(?i)total[:\s]*(?:([a-z]{3})\s*)?((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?)");
re!(re_label_amount,
    r"(?i)amount[:\s]*(?:([a-z]{3})\s*)?((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?)");
re!(re_label_balance,
    r"(?i)balance[:\s]*(?:([a-z]{3})\s*)?((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?)");
re!(re_label_grand_total,
    r"(?i)grand\s+total[:\s]*(?:([a-z]{3})\s*)?((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?)");
re!(re_tagged_amount,
    r"(?i)([a-z]{3})\s*((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?)");

/// Labeled-total patterns, evaluated strictly in this order; the first that matches wins.
const TOTAL_LABELS: [(&str, fn() -> &'static Regex); 4] = [
    ("total", re_label_total),
    ("amount", re_label_amount),
    ("balance", re_label_balance),
    ("grand total", re_label_grand_total),
];

#[derive(Debug, Clone, PartialEq)]
pub struct AmountAndCurrency {
    pub amount: ExtractedField<Amount>,
    pub currency: ExtractedField<CurrencyCode>,
}

/// A labeled total; the currency token is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledTotal {
    pub amount: Amount,
    pub currency: Option<CurrencyCode>,
}

/// A number immediately preceded by a 3-letter currency token.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedAmount {
    pub amount: Amount,
    pub currency: CurrencyCode,
}

pub fn extract_amount_and_currency(text: &str, config: &ExtractionConfig) -> AmountAndCurrency {
    let mut result = AmountAndCurrency {
        amount: ExtractedField::fallback(Amount::zero()),
        currency: ExtractedField::fallback(config.default_currency.clone()),
    };

    if let Some(labeled) = labeled_total(text, config) {
        debug!(source = labeled.source, amount = %labeled.value.amount, "labeled total");
        result.amount = ExtractedField::matched(labeled.value.amount);
        // A label without a currency token leaves the current currency alone.
        if let Some(code) = labeled.value.currency {
            result.currency = ExtractedField::matched(code);
        }
    }

    if let Some(tagged) = LastTaggedAmountWins::select(text, config) {
        debug!(
            source = tagged.source,
            amount = %tagged.value.amount,
            currency = %tagged.value.currency,
            "currency-tagged amount overrides"
        );
        result.amount = ExtractedField::matched(tagged.value.amount);
        result.currency = ExtractedField::matched(tagged.value.currency);
    }

    result
}

/// First labeled total by label priority, then by position.
pub fn labeled_total<'a>(
    text: &'a str,
    config: &ExtractionConfig,
) -> Option<Candidate<'a, LabeledTotal>> {
    for (label, pattern) in TOTAL_LABELS {
        let Some(caps) = pattern().captures(text) else {
            continue;
        };
        let Ok(amount) = Amount::from_str(&caps[2]) else {
            debug!(label, raw = &caps[2], "labeled total not a number");
            continue;
        };
        let currency = caps.get(1).and_then(|m| config.accept_currency(m.as_str()));
        let source = caps.get(0).map_or("", |m| m.as_str());
        return Some(Candidate { source, value: LabeledTotal { amount, currency } });
    }
    None
}

/// Override policy for currency-tagged numbers: of all `XXX 12.34` occurrences in
/// the document, the one furthest down wins. Not the first one, not the largest.
///
/// Receipts frequently repeat the total on a later payment-confirmation line
/// tagged with its currency, and that later figure is the one to trust.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastTaggedAmountWins;

impl LastTaggedAmountWins {
    pub fn select<'a>(
        text: &'a str,
        config: &ExtractionConfig,
    ) -> Option<Candidate<'a, TaggedAmount>> {
        re_tagged_amount()
            .captures_iter(text)
            .filter_map(|caps| {
                let currency = config.accept_currency(&caps[1])?;
                let amount = Amount::from_str(&caps[2]).ok()?;
                let source = caps.get(0)?.as_str();
                Some(Candidate { source, value: TaggedAmount { amount, currency } })
            })
            .last()
    }
}
