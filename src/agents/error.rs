//! Error-analysis agent.

use anyhow::Result;
use serde_json::Value;

use super::{AgentChat, AgentReply};

const ANALYZE_ROLE: &str = "You analyze Python errors raised by microscope control code.\n\
The context contains the code and the error text from its execution.\n\
Explain the most likely cause and what to change, in a few sentences.\n\
Respond with a JSON object {\"intent\": \"error_analysis\", \"message\": <the analysis>}.\n\
Do not wrap the JSON in Markdown fences.";

pub struct ErrorAgent {
    chat: AgentChat,
}

impl ErrorAgent {
    pub fn new(chat: AgentChat) -> Self {
        Self { chat }
    }

    pub async fn analyze_error(&self, context: &Value) -> Result<AgentReply> {
        self.chat.reply(ANALYZE_ROLE, "error_analysis", context).await
    }
}
