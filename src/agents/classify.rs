//! Intent classification for the user's initial query.

use anyhow::Result;
use serde_json::Value;

use super::{AgentChat, AgentReply};

const CLASSIFY_ROLE: &str = "You classify requests made to a microscope control assistant.\n\
Decide whether the request needs more information, needs a coding strategy, or can be answered without code.\n\
Respond with a JSON object {\"intent\": ..., \"message\": ...} and nothing else.\n\
Use intent \"ask_information\" when details are missing and put the clarifying question in message.\n\
Use intent \"strategy\" when the request needs Python code executed on the microscope; leave message empty.\n\
Use intent \"no_coding\" when a direct answer suffices; leave message empty.\n\
Do not wrap the JSON in Markdown fences.";

pub struct ClassifyAgent {
    chat: AgentChat,
}

impl ClassifyAgent {
    pub fn new(chat: AgentChat) -> Self {
        Self { chat }
    }

    /// Returns the detected intent, with a clarification question in
    /// `message` when more information is needed.
    pub async fn classify_user_intent(&self, context: &Value) -> Result<AgentReply> {
        self.chat.reply(CLASSIFY_ROLE, "ask_information", context).await
    }
}
