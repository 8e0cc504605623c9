//! Fixed customer-facing text used outside the topic handlers.

use vaulta_core::PendingAction;

pub const CLASSIFIER_SYSTEM_PROMPT: &str = "You are an intent classifier for Vaulta's voice assistant.

Analyze the user's message and classify it into one of these categories:

1. card_issues - Lost/stolen cards, declined payments, ATM problems
2. account_servicing - Balance inquiries, transactions, statements, profile updates
3. account_opening - New account applications, onboarding
4. digital_support - Mobile app issues, login problems, OTP
5. transfers - Money transfers, bill payments, beneficiaries
6. account_closure - Account closure requests, retention

Respond with ONLY the category name (e.g., \"card_issues\").";

pub const GENERAL_HELP: &str = "I can help with account balances, recent transactions, statements, \
card issues, and general banking support. If you have a specific request, just tell me and I'll \
take care of it.";

pub const ESCALATION: &str = "I'll connect you with a specialist who can better assist with your \
request. Please hold for a moment...";

pub const LOCKED: &str = "For your security, I've locked verification after too many failed \
attempts. I'll connect you with a specialist to complete this safely.";

pub const NEED_BOTH: &str = "For security, I need to verify your identity before we proceed. \
Please provide your Customer ID and your 4-digit PIN.";

pub const NEED_PIN: &str = "Thanks. Please provide your 4-digit PIN.";

pub const NEED_IDENTITY_ID: &str = "Thanks. Please provide your Customer ID.";

pub const VERIFIED_READY: &str = "Thank you, you're verified. How can I help you today?";

pub const VERIFICATION_UNAVAILABLE: &str = "I'm having trouble reaching our verification \
service right now. Please give me your Customer ID and PIN again in a moment.";

pub const HANDLER_APOLOGY: &str = "I'm sorry, something went wrong while handling that request. \
Please try again, or ask to speak with a specialist.";

pub fn verification_failed(remaining_attempts: u32) -> String {
    format!(
        "I couldn't verify your identity with those credentials. Please check your Customer ID \
         and PIN and try again. You have {remaining_attempts} attempt(s) remaining."
    )
}

pub fn unclear_confirmation(action: &PendingAction) -> String {
    format!(
        "I need a clear confirmation. Do you want to {}? Please say YES to proceed or NO to cancel.",
        action.description
    )
}

pub fn confirmation_cancelled(action: &PendingAction) -> String {
    format!(
        "Okay, I won't {}. Nothing has been changed. Is there anything else I can help with?",
        action.description
    )
}

pub fn action_failed(action: &PendingAction) -> String {
    format!(
        "I'm sorry, I wasn't able to {} just now. I'll connect you with a specialist who can \
         finish this for you.",
        action.description
    )
}
