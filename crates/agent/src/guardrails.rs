/// Outcome of checking a user message before it enters the conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub max_message_chars: usize,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { max_message_chars: 4_000 }
    }
}

impl GuardrailPolicy {
    pub fn new(max_message_chars: usize) -> Self {
        Self { max_message_chars }
    }

    pub fn evaluate(&self, message: &str) -> GuardrailDecision {
        if message.trim().is_empty() {
            return GuardrailDecision::Deny {
                reason_code: "empty_message",
                user_message: "Please type a question or request.".to_string(),
            };
        }

        let length = message.chars().count();
        if length > self.max_message_chars {
            return GuardrailDecision::Deny {
                reason_code: "message_too_long",
                user_message: format!(
                    "Messages are limited to {} characters; yours has {length}.",
                    self.max_message_chars
                ),
            };
        }

        GuardrailDecision::Allow
    }
}
