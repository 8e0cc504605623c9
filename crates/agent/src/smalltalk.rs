use std::sync::OnceLock;

use regex::Regex;

use crate::router::{has_intent_keyword, mentions_any};

pub const AGENT_NAME: &str = "Alex";
pub const AGENT_ROLE: &str = "Vaulta Voice Assistant";

const HUMAN_REQUEST_PHRASES: &[&str] = &[
    "talk to a human",
    "speak to a human",
    "real person",
    "talk to an agent",
    "speak to an agent",
    "speak with an agent",
    "representative",
    "live agent",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmallTalk {
    Greeting,
    Thanks,
    Goodbye,
    Help,
    Identity,
}

impl SmallTalk {
    pub fn label(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Thanks => "thanks",
            Self::Goodbye => "goodbye",
            Self::Help => "help",
            Self::Identity => "identity",
        }
    }

    pub fn reply(self) -> String {
        match self {
            Self::Greeting => "Hi! How can I help you today?".to_string(),
            Self::Thanks => "You're welcome! Is there anything else I can help with?".to_string(),
            Self::Goodbye => "Thank you for banking with Vaulta. Have a great day!".to_string(),
            Self::Help => format!(
                "I'm {AGENT_NAME}, {AGENT_ROLE}. I can help you with:\n\n\
                 • Check account balance\n\
                 • View recent transactions\n\
                 • Request statements\n\
                 • Report lost or stolen cards\n\
                 • Card declined issues\n\
                 • General banking support\n\n\
                 What would you like to do?"
            ),
            Self::Identity => format!(
                "I'm {AGENT_NAME}, {AGENT_ROLE}. I'm here to help Vaulta customers with \
                 account inquiries, card services, and general banking questions. \
                 How may I assist you today?"
            ),
        }
    }
}

/// Classifies pure small talk. Anything carrying a banking keyword or a digit
/// is never small talk, so "hello, what's my balance" goes to routing.
pub fn detect_small_talk(text: &str) -> Option<SmallTalk> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty()
        || has_intent_keyword(&lowered)
        || lowered.chars().any(|ch| ch.is_ascii_digit())
    {
        return None;
    }

    patterns().iter().find(|(_, pattern)| pattern.is_match(&lowered)).map(|(kind, _)| *kind)
}

pub fn is_human_request(text: &str) -> bool {
    mentions_any(&text.to_lowercase(), HUMAN_REQUEST_PHRASES)
}

fn patterns() -> &'static [(SmallTalk, Regex)] {
    static PATTERNS: OnceLock<Vec<(SmallTalk, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (SmallTalk::Greeting, r"\b(hi|hello|hey|good morning|good afternoon|good evening)\b"),
            (SmallTalk::Thanks, r"\b(thank you|thanks|thx|appreciate)\b"),
            (SmallTalk::Goodbye, r"\b(bye|goodbye|see you|later)\b"),
            (SmallTalk::Help, r"\b(what can you do|help|services|capabilities)\b"),
            (SmallTalk::Identity, r"\b(who are you|what are you|who made you|what (ai )?model)\b"),
        ]
        .into_iter()
        .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("small talk pattern")))
        .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::{detect_small_talk, is_human_request, SmallTalk};

    #[test]
    fn buckets_are_detected() {
        assert_eq!(detect_small_talk("Hello there"), Some(SmallTalk::Greeting));
        assert_eq!(detect_small_talk("thanks a lot"), Some(SmallTalk::Thanks));
        assert_eq!(detect_small_talk("ok bye"), Some(SmallTalk::Goodbye));
        assert_eq!(detect_small_talk("what can you do?"), Some(SmallTalk::Help));
        assert_eq!(detect_small_talk("Who are you?"), Some(SmallTalk::Identity));
        assert_eq!(detect_small_talk("what ai model is this"), Some(SmallTalk::Identity));
        assert_eq!(detect_small_talk("I really appreciate it"), Some(SmallTalk::Thanks));
    }

    #[test]
    fn banking_intent_or_digits_are_never_small_talk() {
        assert_eq!(detect_small_talk("hello, what's my balance"), None);
        assert_eq!(detect_small_talk("hi my id is 1234"), None);
        assert_eq!(detect_small_talk("thanks, I lost my card"), None);
    }

    #[test]
    fn unrelated_text_is_not_small_talk() {
        assert_eq!(detect_small_talk("the weather is nice"), None);
        assert_eq!(detect_small_talk(""), None);
    }

    #[test]
    fn human_requests_are_recognized() {
        assert!(is_human_request("Can I talk to a human please"));
        assert!(is_human_request("get me a representative"));
        assert!(!is_human_request("what's my balance"));
    }

    #[test]
    fn help_reply_introduces_the_assistant() {
        assert!(SmallTalk::Help.reply().starts_with("I'm Alex, Vaulta Voice Assistant."));
    }
}
