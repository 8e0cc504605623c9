//! Credential extraction from free-form and voice-transcribed utterances.
//!
//! Voice transcripts arrive with numbers spelled out ("one two three four")
//! and with homophones ("to", "ate"), so every utterance is normalized before
//! any digit matching happens.

use std::sync::OnceLock;

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

const MAX_LABELED_DIGITS: usize = 10;
const PIN_LENGTH: usize = 4;

const SPOKEN_DIGITS: &[(&str, &str)] = &[
    ("zero", "0"),
    ("oh", "0"),
    ("o", "0"),
    ("one", "1"),
    ("won", "1"),
    ("two", "2"),
    ("to", "2"),
    ("too", "2"),
    ("three", "3"),
    ("tree", "3"),
    ("four", "4"),
    ("for", "4"),
    ("fore", "4"),
    ("five", "5"),
    ("six", "6"),
    ("sex", "6"),
    ("seven", "7"),
    ("eight", "8"),
    ("ate", "8"),
    ("nine", "9"),
    ("niner", "9"),
    ("hundred", "00"),
    ("thousand", "000"),
];

/// Identity claims found in one utterance. Either half may be missing.
#[derive(Debug, Default)]
pub struct ExtractedCredentials {
    pub identity_id: Option<String>,
    pub pin: Option<SecretString>,
}

impl ExtractedCredentials {
    pub fn is_empty(&self) -> bool {
        self.identity_id.is_none() && self.pin.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.identity_id.is_some() && self.pin.is_some()
    }

    pub fn pin_str(&self) -> Option<&str> {
        self.pin.as_ref().map(|pin| pin.expose_secret())
    }
}

#[derive(Clone, Debug, Default)]
pub struct CredentialExtractor;

impl CredentialExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, utterance: &str) -> ExtractedCredentials {
        let text = normalize_spoken_digits(utterance);
        if text.is_empty() {
            return ExtractedCredentials::default();
        }

        let mut identity_id = digits_after_label(&text, id_label_pattern());
        let mut pin = digits_after_label(&text, pin_label_pattern()).map(truncate_pin);

        if identity_id.is_none() || pin.is_none() {
            if let Some(captures) = id_then_pin_pattern().captures(&text) {
                if identity_id.is_none() {
                    identity_id = captures.get(1).map(|value| value.as_str().to_string());
                }
                if pin.is_none() {
                    pin = captures.get(2).map(|value| truncate_pin(value.as_str().to_string()));
                }
            }
        }

        if identity_id.is_none() || pin.is_none() {
            let mut candidates = four_digit_pattern()
                .find_iter(&text)
                .map(|found| found.as_str().to_string())
                .collect::<Vec<_>>();
            for known in [pin.as_deref(), identity_id.as_deref()].into_iter().flatten() {
                if let Some(index) = candidates.iter().position(|candidate| candidate == known) {
                    candidates.remove(index);
                }
            }

            let mut remaining = candidates.into_iter();
            if identity_id.is_none() {
                identity_id = remaining.next();
            }
            if pin.is_none() {
                pin = remaining.next();
            }
        }

        ExtractedCredentials { identity_id, pin: pin.map(SecretString::from) }
    }

    /// Removes label words and digit runs, leaving whatever intent text the
    /// user sent alongside their credentials.
    pub fn strip(&self, utterance: &str) -> String {
        let text = normalize_spoken_digits(utterance);
        let without_labels = credential_word_pattern().replace_all(&text, " ");
        let without_digits = digit_run_pattern().replace_all(&without_labels, " ");
        without_digits.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Lowercases the text and rewrites spoken numbers as digits. Consecutive
/// spoken digits collapse into one number, typed digits are left untouched.
pub fn normalize_spoken_digits(text: &str) -> String {
    let lowered = text.to_lowercase().replace('-', " ");
    let mut output = Vec::new();
    let mut spoken_run = String::new();

    for token in lowered.split_whitespace() {
        let word = token.trim_matches(|ch: char| !ch.is_alphanumeric());
        let Some(digits) = spoken_digit(word) else {
            if !spoken_run.is_empty() {
                output.push(std::mem::take(&mut spoken_run));
            }
            output.push(token.to_string());
            continue;
        };

        let leading = &token[..token.find(word).unwrap_or(0)];
        if !leading.is_empty() && !spoken_run.is_empty() {
            output.push(std::mem::take(&mut spoken_run));
        }
        if spoken_run.is_empty() {
            spoken_run.push_str(leading);
        }
        spoken_run.push_str(digits);

        let trailing = &token[leading.len() + word.len()..];
        if !trailing.is_empty() {
            spoken_run.push_str(trailing);
            output.push(std::mem::take(&mut spoken_run));
        }
    }

    if !spoken_run.is_empty() {
        output.push(spoken_run);
    }
    output.join(" ")
}

fn spoken_digit(word: &str) -> Option<&'static str> {
    SPOKEN_DIGITS.iter().find(|(spoken, _)| *spoken == word).map(|(_, digits)| *digits)
}

fn truncate_pin(mut pin: String) -> String {
    pin.truncate(PIN_LENGTH);
    pin
}

fn digits_after_label(text: &str, label: &Regex) -> Option<String> {
    label.find_iter(text).find_map(|found| {
        let captures = labeled_digits_pattern().captures(&text[found.end()..])?;
        let digits = captures
            .get(1)?
            .as_str()
            .chars()
            .filter(char::is_ascii_digit)
            .take(MAX_LABELED_DIGITS)
            .collect::<String>();
        (!digits.is_empty()).then_some(digits)
    })
}

fn id_label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b(?:customer id|customer_id|cust id|id)\b").expect("id label pattern")
    })
}

fn pin_label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b(?:pin|ping)\b").expect("pin label pattern"))
}

fn labeled_digits_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*[:#]?\s*(?:is\s+)?([0-9\s]+?)[.,?!]*(?:\s+[a-z]|$)")
            .expect("labeled digits pattern")
    })
}

fn id_then_pin_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\bid\s+(?:is\s+)?(\d+).*?\bpin\s+(?:is\s+)?(\d+)").expect("id/pin pattern")
    })
}

fn four_digit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\d{4}\b").expect("four digit pattern"))
}

fn credential_word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b(?:customer id|customer_id|cust id|id|pin|ping)\b")
            .expect("credential word pattern")
    })
}

fn digit_run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+").expect("digit run pattern"))
}
