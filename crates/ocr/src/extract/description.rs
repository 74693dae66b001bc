//! Description pass: line-item text collected into an ordered, de-duplicated list.

use std::collections::HashSet;

use tracing::debug;

use crate::types::{ExtractedField, RawDocument, NO_DESCRIPTION};

re!(re_numeric_line, r"^[\d\s$.,]+$");
re!(re_item_priced, r"(?i)([a-z\s]{3,})\s+\d+\s+(?:usd|\$)");
re!(re_item_leading, r"(?i)^([a-z\s]{5,})(?:\s+\d+|\s+usd|\s+\$)");
re!(re_letter_run, r"[a-zA-Z]{3,}");
re!(re_upper_only, r"^[A-Z\s]+$");

pub const MAX_DESCRIPTIONS: usize = 10;

/// Lines starting with any of these are headers or totals, not items.
const STOP_PREFIXES: [&str; 10] = [
    "date", "daze", "total", "subtotal", "tax", "amount", "time", "invoice", "receipt", "payment",
];
const WEB_MARKERS: [&str; 3] = [".com", "@", "http"];
const DOMAIN_KEYWORDS: [&str; 7] =
    ["transportation", "disposal", "service", "product", "item", "barrel", "waste"];

/// Pulls zero or one description string out of a line.
type Collector = fn(&str) -> Option<String>;

/// Both collectors see every surviving line; the first to add a string fixes its position.
const COLLECTORS: [Collector; 2] = [captured_item_text, keyword_line];

pub fn extract_description(doc: &RawDocument<'_>) -> ExtractedField<String> {
    let mut found = OrderedSet::default();

    for line in doc.lines().iter().copied().filter(|l| !is_skipped(l)) {
        for collect in COLLECTORS {
            if let Some(text) = collect(line) {
                found.insert(text);
            }
        }
    }

    if found.is_empty() {
        return ExtractedField::fallback(NO_DESCRIPTION.to_string());
    }
    debug!(entries = found.len(), "description lines");
    let kept: Vec<String> = found.into_vec().into_iter().take(MAX_DESCRIPTIONS).collect();
    ExtractedField::matched(kept.join("\n"))
}

fn is_skipped(line: &str) -> bool {
    let starts_with_stop_word = STOP_PREFIXES.iter().any(|p| {
        line.get(..p.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(p))
    });
    if starts_with_stop_word || re_numeric_line().is_match(line) {
        return true;
    }
    let lower = line.to_lowercase();
    line.chars().count() < 5 || WEB_MARKERS.iter().any(|m| lower.contains(m))
}

/// "Widget 2 USD" / "Disposal fee 40" style lines: keep the text part.
fn captured_item_text(line: &str) -> Option<String> {
    let caps = re_item_priced()
        .captures(line)
        .or_else(|| re_item_leading().captures(line))?;
    let text = caps[1].trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Whole lines that mention a known service/product word.
fn keyword_line(line: &str) -> Option<String> {
    let lower = line.to_lowercase();
    let qualifies = DOMAIN_KEYWORDS.iter().any(|k| lower.contains(k))
        && re_letter_run().is_match(line)
        && line.chars().count() > 10
        && !re_upper_only().is_match(line);
    qualifies.then(|| line.to_string())
}

/// Insertion-ordered set of strings, exact (case-sensitive) dedup.
#[derive(Debug, Default)]
struct OrderedSet {
    items: Vec<String>,
    seen: HashSet<String>,
}

impl OrderedSet {
    fn insert(&mut self, value: String) -> bool {
        if self.seen.contains(&value) {
            return false;
        }
        self.seen.insert(value.clone());
        self.items.push(value);
        true
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn into_vec(self) -> Vec<String> {
        self.items
    }
}
