// Text helpers shared by the slot extractor and the dialogue policy.

use sha3::{Digest, Sha3_256};

pub fn contains_any_keyword(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| text.contains(keyword))
}

pub fn tokenize_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
        .collect()
}

/// First positive number found in the text, if any.
///
/// Accepts `12`, `12.5`, `$40` and the decimal-comma form `1,5`; thousands
/// separators (`1,000.50`) are dropped.
pub fn extract_amount_from_text(text: &str) -> Option<f64> {
    text.split_whitespace().find_map(|word| {
        let cleaned: String = word
            .chars()
            .skip_while(|ch| !ch.is_ascii_digit())
            .take_while(|ch| ch.is_ascii_digit() || *ch == '.' || *ch == ',')
            .collect();
        let cleaned = cleaned.trim_end_matches(['.', ',']);
        if cleaned.is_empty() {
            return None;
        }
        let normalized = if is_decimal_comma(cleaned) {
            cleaned.replace(',', ".")
        } else {
            cleaned.replace(',', "")
        };
        normalized.parse::<f64>().ok().filter(|value| *value > 0.0)
    })
}

// `1,5` is a decimal comma; `1,000` and `1,000.50` use it as a thousands separator.
fn is_decimal_comma(number: &str) -> bool {
    if number.contains('.') {
        return false;
    }
    let mut parts = number.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(fraction), None) => fraction.len() != 3,
        _ => false,
    }
}

/// Stable, non-reversible key for a bearer credential.
pub fn credential_fingerprint(credential: &str) -> String {
    let digest = Sha3_256::digest(credential.as_bytes());
    hex::encode(digest)
}
