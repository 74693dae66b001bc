//! Clean-up applied to the transcript before the date pass.

re!(re_date_misreading, r"(?i)daze|dace|dale");

/// Rewrite common OCR misreadings of "date" and drop one trailing period.
pub fn normalize(text: &str) -> String {
    let fixed = re_date_misreading().replace_all(text, "date");
    match fixed.strip_suffix('.') {
        Some(stripped) => stripped.to_string(),
        None => fixed.into_owned(),
    }
}
