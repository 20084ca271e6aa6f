//! Direct answers for queries that need no code.

use anyhow::Result;
use serde_json::Value;

use super::{AgentChat, AgentReply};

const ANSWER_ROLE: &str = "Answer the user's microscopy question directly; no code is required.\n\
Use the retrieved context in the request when it is relevant. Keep the answer short and factual.\n\
Respond with a JSON object {\"intent\": \"no_coding\", \"message\": <the answer>}.\n\
Do not wrap the JSON in Markdown fences.";

pub struct NoCodingAgent {
    chat: AgentChat,
}

impl NoCodingAgent {
    pub fn new(chat: AgentChat) -> Self {
        Self { chat }
    }

    pub async fn no_coding_answer(&self, context: &Value) -> Result<AgentReply> {
        self.chat.reply(ANSWER_ROLE, "no_coding", context).await
    }
}
