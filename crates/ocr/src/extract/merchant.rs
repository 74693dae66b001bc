//! Merchant pass: the most likely business-name line.

use tracing::debug;

use crate::types::{ExtractedField, RawDocument, UNKNOWN_MERCHANT};

// ASCII word characters only; accented letters count as noise.
re!(re_merchant_noise, r"[^A-Za-z0-9_\s.\-&]");

/// Generic receipt header that is never the merchant.
const HEADER_LINE: &str = "PAYMENT RECEIPT";
const EXCLUDED_WORDS: [&str; 3] = ["date", "total", "tax"];
const PREFERRED_WORD: &str = "enterprises";

/// A line naming "... Enterprises" wins wherever it sits; otherwise the first
/// qualifying line that is not the generic header.
pub fn extract_merchant(doc: &RawDocument<'_>) -> ExtractedField<String> {
    let candidates: Vec<String> = doc.lines().iter().filter_map(|l| clean_candidate(l)).collect();

    let pick = candidates
        .iter()
        .find(|c| c.to_lowercase().contains(PREFERRED_WORD))
        .or_else(|| candidates.iter().find(|c| c.as_str() != HEADER_LINE));

    match pick {
        Some(name) => {
            debug!(merchant = %name, "merchant line");
            ExtractedField::matched(name.clone())
        }
        None => ExtractedField::fallback(UNKNOWN_MERCHANT.to_string()),
    }
}

/// Strip OCR junk and decide whether what is left could be a business name.
fn clean_candidate(line: &str) -> Option<String> {
    let cleaned = re_merchant_noise().replace_all(line, "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() < 3 || cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let lower = cleaned.to_lowercase();
    if EXCLUDED_WORDS.iter().any(|w| lower.contains(w)) {
        return None;
    }
    Some(cleaned.to_string())
}
