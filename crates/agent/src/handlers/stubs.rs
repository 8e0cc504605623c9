use anyhow::Result;
use async_trait::async_trait;
use vaulta_core::FlowCategory;

use super::{general_help, HandlerContext, HandlerReply, TopicHandler};

const ACCOUNT_OPENING: &str = "Thank you for your interest in Vaulta!

To open a new account, you can:
1. Visit vaulta.com/apply
2. Schedule an appointment at a branch
3. Call our new accounts team at 1-800-VAULTA

Would you like me to send you the application link via SMS?";

const DIGITAL_SUPPORT: &str = "I can help with app issues!

Common solutions:
• Login problems: Reset password at vaulta.com/reset
• OTP not received: Check spam, request new code
• App crashes: Update to latest version

If these don't help, I'll transfer you to digital support.";

const TRANSFERS: &str = "I can assist with transfers and payments.

Currently, I can route you to:
• Domestic Transfers (ACH/Wire)
• International Payments
• Bill Pay Support
• Beneficiary Management

Which area do you need help with?";

const ACCOUNT_CLOSURE: &str = "We're sorry to hear you're considering closing your account.

To ensure this is handled correctly and to discuss alternatives that might better suit your \
needs, I'll need to connect you with our Account Specialist team.

Would you like to speak with them now?";

/// Canned guidance for flows that are routed but not served in depth.
#[derive(Clone, Copy, Debug)]
pub struct InformationalHandler {
    flow: FlowCategory,
}

impl InformationalHandler {
    pub fn new(flow: FlowCategory) -> Self {
        Self { flow }
    }

    fn text(&self) -> Option<&'static str> {
        match self.flow {
            FlowCategory::AccountOpening => Some(ACCOUNT_OPENING),
            FlowCategory::DigitalSupport => Some(DIGITAL_SUPPORT),
            FlowCategory::Transfers => Some(TRANSFERS),
            FlowCategory::AccountClosure => Some(ACCOUNT_CLOSURE),
            FlowCategory::CardIssues | FlowCategory::AccountServicing => None,
        }
    }
}

#[async_trait]
impl TopicHandler for InformationalHandler {
    fn flow(&self) -> FlowCategory {
        self.flow
    }

    async fn handle(&self, _context: HandlerContext<'_>) -> Result<HandlerReply> {
        Ok(self.text().map(HandlerReply::say).unwrap_or_else(general_help))
    }
}
