//! Masking helpers applied before anything user-supplied is stored or logged.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

use crate::credentials::normalize_spoken_digits;

/// Short stable digest of an identity id, safe to log and to expose on the
/// admin surface.
pub fn hash_identity_id(identity_id: &str) -> String {
    let digest = Sha256::digest(identity_id.as_bytes());
    digest.iter().take(4).map(|byte| format!("{byte:02x}")).collect()
}

/// Masks typed credentials in place. When the spoken-digit reading of the
/// text still reveals a credential ("pin is two two two two"), the
/// normalized, masked reading is returned instead of the original wording.
pub fn redact_sensitive_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let masked = mask_digits(text);
    let spoken = normalize_spoken_digits(&masked);
    let spoken_masked = mask_digits(&spoken);
    if spoken_masked != spoken {
        return spoken_masked;
    }
    masked
}

fn mask_digits(text: &str) -> String {
    let text = labeled_pin_pattern().replace_all(text, "PIN ****");
    let text = labeled_id_pattern().replace_all(&text, "${label} ****");
    let text = four_digit_pattern().replace_all(&text, "****");
    long_number_pattern()
        .replace_all(&text, |captures: &Captures<'_>| mask_keep_last_four(&captures[0]))
        .into_owned()
}

pub fn mask_keep_last_four(value: &str) -> String {
    let length = value.chars().count();
    if length <= 4 {
        return "****".to_string();
    }
    let visible = value.chars().skip(length - 4).collect::<String>();
    format!("{}{visible}", "*".repeat(length - 4))
}

fn labeled_pin_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?:pin|ping)\b\s*[:#-]?\s*(?:is\s+)?\d(?:[\s-]?\d)*")
            .expect("labeled pin pattern")
    })
}

fn labeled_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?P<label>customer id|customer_id|cust id|id)\b\s*[:#-]?\s*(?:is\s+)?\d(?:[\s-]?\d)*",
        )
        .expect("labeled id pattern")
    })
}

fn four_digit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\d{4}\b").expect("four digit pattern"))
}

fn long_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\d{8,16}\b").expect("long number pattern"))
}
