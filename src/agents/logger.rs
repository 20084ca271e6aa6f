//! Session summarization for the log store.

use anyhow::Result;
use serde_json::Value;

use super::{AgentChat, AgentReply};

const SUMMARY_ROLE: &str = "Summarize the finished session between the user and the microscope agents.\n\
State the goal, the approach taken, and whether it worked, in under 120 words.\n\
Respond with a JSON object {\"intent\": \"summary\", \"message\": <the summary>}.\n\
Do not wrap the JSON in Markdown fences.";

pub struct LoggerAgent {
    chat: AgentChat,
}

impl LoggerAgent {
    pub fn new(chat: AgentChat) -> Self {
        Self { chat }
    }

    pub async fn prepare_summary(&self, context: &Value) -> Result<AgentReply> {
        self.chat.reply(SUMMARY_ROLE, "summary", context).await
    }
}
