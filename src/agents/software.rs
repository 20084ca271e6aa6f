//! Software agent: writes and repairs the Python code units.

use anyhow::Result;
use serde_json::Value;

use super::{AgentChat, AgentReply};

const GENERATE_ROLE: &str = "You write Python code for a microscope controlled through pymmcore-plus.\n\
Follow the strategy in the context. The core object mmc is already bound in the execution namespace; never create a new core instance.\n\
Use print(...) for every value the caller must see.\n\
Respond with a JSON object {\"intent\": \"code\", \"message\": <the code>}.\n\
The message must contain only plain Python without Markdown fences.";

const FIX_ROLE: &str = "You repair Python code for a microscope controlled through pymmcore-plus.\n\
The context contains the failing code and an analysis of its error; return a corrected version.\n\
The core object mmc is already bound in the execution namespace; never create a new core instance.\n\
Respond with a JSON object {\"intent\": \"code\", \"message\": <the fixed code>}.\n\
The message must contain only plain Python without Markdown fences.";

pub struct SoftwareAgent {
    chat: AgentChat,
}

impl SoftwareAgent {
    pub fn new(chat: AgentChat) -> Self {
        Self { chat }
    }

    pub async fn generate_code(&self, context: &Value) -> Result<AgentReply> {
        self.chat.reply(GENERATE_ROLE, "code", context).await
    }

    pub async fn fix_code(&self, context: &Value) -> Result<AgentReply> {
        self.chat.reply(FIX_ROLE, "code", context).await
    }
}
