//! Thin LLM agent wrappers: prompt construction and JSON shuttling.
//!
//! Every agent sends one chat request built from a role prompt plus the
//! caller's serialized context, and maps the reply into an `AgentReply`.

pub mod classify;
pub mod error;
pub mod logger;
pub mod no_coding;
pub mod software;
pub mod strategy;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::execution::prepare::strip_code_fences;
use crate::llm::{ChatMessage, ChatOptions, LlmClient};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    pub intent: String,
    pub message: String,
}

/// Shared chat settings handed to each agent at construction.
#[derive(Debug, Clone)]
pub struct AgentChat {
    client: LlmClient,
    opts: ChatOptions,
}

impl AgentChat {
    pub fn new(client: LlmClient, model: String) -> Self {
        Self {
            client,
            opts: ChatOptions { model, temperature: 0.0, top_p: 1.0 },
        }
    }

    pub(crate) async fn reply(
        &self,
        role_text: &str,
        fallback_intent: &str,
        context: &Value,
    ) -> Result<AgentReply> {
        let messages = vec![
            ChatMessage::system(role_text),
            ChatMessage::user(serde_json::to_string(context)?),
        ];
        let text = self.client.chat(&messages, &self.opts).await?;
        Ok(parse_reply(&text, fallback_intent))
    }
}

/// Models occasionally ignore the no-fences instruction or answer in plain
/// prose; a reply that does not parse becomes a plain message under the
/// agent's fallback intent rather than an error.
fn parse_reply(text: &str, fallback_intent: &str) -> AgentReply {
    let unfenced = strip_code_fences(text);
    match serde_json::from_str::<AgentReply>(&unfenced) {
        Ok(reply) => reply,
        Err(_) => AgentReply {
            intent: fallback_intent.to_string(),
            message: text.trim().to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_reply_parses() {
        let reply = parse_reply(r#"{"intent": "code", "message": "print(1)"}"#, "x");
        assert_eq!(reply.intent, "code");
        assert_eq!(reply.message, "print(1)");
    }

    #[test]
    fn fenced_json_reply_parses() {
        let reply = parse_reply("```json\n{\"intent\": \"strategy\", \"message\": \"plan\"}\n```", "x");
        assert_eq!(reply.intent, "strategy");
    }

    #[test]
    fn prose_reply_falls_back() {
        let reply = parse_reply("Sure, here is the plan.", "strategy");
        assert_eq!(reply.intent, "strategy");
        assert_eq!(reply.message, "Sure, here is the plan.");
    }
}
