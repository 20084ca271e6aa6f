//! Strategy agent: plans and revises how to solve a request.

use anyhow::Result;
use serde_json::Value;

use super::{AgentChat, AgentReply};

const GENERATE_ROLE: &str = "You are the planning agent for a microscope controlled through pymmcore-plus.\n\
Produce a short numbered strategy for solving the user's request with Python code against the mmc core object.\n\
Respond with a JSON object {\"intent\": \"strategy\", \"message\": <the strategy>}.\n\
If the request cannot be planned without more information, respond with {\"intent\": \"need_information\", \"message\": <the question>}.\n\
Do not wrap the JSON in Markdown fences.";

const REVISE_ROLE: &str = "You are the planning agent for a microscope controlled through pymmcore-plus.\n\
Revise the previous strategy in the context using the feedback or new information it contains.\n\
Respond with a JSON object {\"intent\": \"new_strategy\", \"message\": <the revised strategy>}.\n\
Do not wrap the JSON in Markdown fences.";

pub struct StrategyAgent {
    chat: AgentChat,
}

impl StrategyAgent {
    pub fn new(chat: AgentChat) -> Self {
        Self { chat }
    }

    pub async fn generate_strategy(&self, context: &Value) -> Result<AgentReply> {
        self.chat.reply(GENERATE_ROLE, "strategy", context).await
    }

    pub async fn revise_strategy(&self, context: &Value) -> Result<AgentReply> {
        self.chat.reply(REVISE_ROLE, "new_strategy", context).await
    }
}
