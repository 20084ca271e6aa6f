//! Stdio JSON-RPC tool server wiring the agents to the execution engine.
//!
//! Stdout carries only protocol frames; diagnostics go to stderr via tracing.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::agents::{
    classify::ClassifyAgent, error::ErrorAgent, logger::LoggerAgent, no_coding::NoCodingAgent,
    software::SoftwareAgent, strategy::StrategyAgent, AgentChat, AgentReply,
};
use crate::execution::{prepare::strip_code_fences, Engine};
use crate::store::{LogEntry, LogStore};

/// MCP JSON-RPC request
#[derive(Debug, Deserialize)]
struct McpRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// MCP JSON-RPC response
#[derive(Debug, Serialize)]
struct McpResponse {
    jsonrpc: String,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<McpError>,
}

#[derive(Debug, Serialize)]
struct McpError {
    code: i32,
    message: String,
}

/// Tool definition for MCP
#[derive(Debug, Serialize)]
struct Tool {
    name: String,
    description: String,
    #[serde(rename = "inputSchema")]
    input_schema: Value,
}

/// Everything the tools dispatch to: the execution engine, the agents, and
/// the session log store. Initialized once at startup.
pub struct Toolset {
    engine: Engine,
    classify: ClassifyAgent,
    strategy: StrategyAgent,
    software: SoftwareAgent,
    error: ErrorAgent,
    no_coding: NoCodingAgent,
    logger: LoggerAgent,
    store: LogStore,
}

impl Toolset {
    pub fn new(engine: Engine, chat: AgentChat, store: LogStore) -> Self {
        Self {
            engine,
            classify: ClassifyAgent::new(chat.clone()),
            strategy: StrategyAgent::new(chat.clone()),
            software: SoftwareAgent::new(chat.clone()),
            error: ErrorAgent::new(chat.clone()),
            no_coding: NoCodingAgent::new(chat.clone()),
            logger: LoggerAgent::new(chat),
            store,
        }
    }
}

/// Run the tool server over stdio until stdin closes.
pub async fn run_server(mut toolset: Toolset) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    info!("toolset server ready");

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "read error");
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let request: McpRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "unparseable request");
                continue;
            }
        };
        debug!(method = %request.method, "request");

        let response = handle_request(&mut toolset, request).await;

        writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
        stdout.flush()?;
    }
    Ok(())
}

async fn handle_request(toolset: &mut Toolset, request: McpRequest) -> McpResponse {
    let id = request.id.unwrap_or(Value::Null);

    match request.method.as_str() {
        "initialize" => ok_response(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": "mscope",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        ),

        "tools/list" => ok_response(id, json!({ "tools": tool_catalog() })),

        "tools/call" => {
            let tool_name = request.params.get("name").and_then(|v| v.as_str()).unwrap_or("");
            let arguments = request.params.get("arguments").cloned().unwrap_or(json!({}));

            match call_tool(toolset, tool_name, arguments).await {
                Ok(result) => ok_response(
                    id,
                    json!({
                        "content": [{
                            "type": "text",
                            "text": result.to_string()
                        }]
                    }),
                ),
                Err(message) => err_response(id, -32000, message),
            }
        }

        // No payload expected back for the initialized notification
        "notifications/initialized" => ok_response(id, json!(null)),

        _ => err_response(id, -32601, format!("Method not found: {}", request.method)),
    }
}

fn ok_response(id: Value, result: Value) -> McpResponse {
    McpResponse { jsonrpc: "2.0".to_string(), id, result: Some(result), error: None }
}

fn err_response(id: Value, code: i32, message: String) -> McpResponse {
    McpResponse { jsonrpc: "2.0".to_string(), id, result: None, error: Some(McpError { code, message }) }
}

async fn call_tool(toolset: &mut Toolset, name: &str, args: Value) -> Result<Value, String> {
    match name {
        "retrieve_db_context" => {
            let query = str_arg(&args, "user_query")?;
            let hits = toolset.store.lookup(query, 5).map_err(|e| e.to_string())?;
            let context = hits
                .iter()
                .map(|e| format!("prompt: {}\ncode: {}", e.prompt, e.output))
                .collect::<Vec<_>>()
                .join("\n---\n");
            Ok(json!({ "context": context }))
        }

        "classify_user_intent" => {
            reply_value(toolset.classify.classify_user_intent(&ctx_arg(&args)?).await)
        }

        "answer_no_coding_query" => {
            reply_value(toolset.no_coding.no_coding_answer(&ctx_arg(&args)?).await)
        }

        "generate_strategy" => {
            reply_value(toolset.strategy.generate_strategy(&ctx_arg(&args)?).await)
        }

        "revise_strategy" => {
            reply_value(toolset.strategy.revise_strategy(&ctx_arg(&args)?).await)
        }

        "generate_code" => reply_value(toolset.software.generate_code(&ctx_arg(&args)?).await),

        "fix_code" => reply_value(toolset.software.fix_code(&ctx_arg(&args)?).await),

        "execute_python_code" => {
            let code = str_arg(&args, "code_string")?;
            Ok(execute_code(&mut toolset.engine, code))
        }

        "analyze_errors" => reply_value(toolset.error.analyze_error(&ctx_arg(&args)?).await),

        "awaiting_user_approval" => {
            let reply = str_arg(&args, "user_query")?;
            if reply.eq_ignore_ascii_case("yes") {
                Ok(json!({ "approved": true, "message": "User approved the action." }))
            } else {
                Ok(json!({ "approved": false, "message": "User did not approve the action." }))
            }
        }

        "save_result" => {
            let context = ctx_arg(&args)?;
            let reply = str_arg(&args, "user_query")?.to_string();
            save_result(toolset, &context, &reply).await
        }

        _ => Err(format!("Unknown tool: {name}")),
    }
}

/// Prepare and run one code unit; the outcome is reported as data either way.
fn execute_code(engine: &mut Engine, code: &str) -> Value {
    let prepared = strip_code_fences(code);
    let outcome = engine.run_code(&prepared);
    let status = if outcome.is_success() { "success" } else { "error" };
    json!({ "status": status, "output": outcome.output })
}

async fn save_result(toolset: &mut Toolset, context: &Value, user_reply: &str) -> Result<Value, String> {
    let success = user_reply == "correct";
    let summary = toolset.logger.prepare_summary(context).await.map_err(|e| e.to_string())?;
    if summary.intent == "summary" {
        let code = context.get("code").and_then(|v| v.as_str()).unwrap_or_default();
        let entry = LogEntry {
            prompt: summary.message,
            output: code.to_string(),
            feedback: success,
            category: String::new(),
        };
        toolset.store.add(&entry).map_err(|e| e.to_string())?;
    }
    Ok(json!({ "intent": "save", "message": "The previous result was added to the log database." }))
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing string argument: {key}"))
}

fn ctx_arg(args: &Value) -> Result<Value, String> {
    args.get("data_dict")
        .cloned()
        .ok_or_else(|| "missing argument: data_dict".to_string())
}

fn reply_value(reply: Result<AgentReply>) -> Result<Value, String> {
    match reply {
        Ok(r) => serde_json::to_value(&r).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn context_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "data_dict": {
                "type": "object",
                "description": "The current context dictionary of the main agent."
            }
        },
        "required": ["data_dict"]
    })
}

fn tool_catalog() -> Vec<Tool> {
    vec![
        Tool {
            name: "retrieve_db_context".to_string(),
            description: "Retrieve the most relevant information from the session log database.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "user_query": {
                        "type": "string",
                        "description": "The user's original query."
                    }
                },
                "required": ["user_query"]
            }),
        },
        Tool {
            name: "classify_user_intent".to_string(),
            description: "Classifies the user's initial query to determine their intent (e.g., ask for info, propose strategy, no code needed).".to_string(),
            input_schema: context_schema(),
        },
        Tool {
            name: "answer_no_coding_query".to_string(),
            description: "Provides a direct answer to a user query that does not require code generation.".to_string(),
            input_schema: context_schema(),
        },
        Tool {
            name: "generate_strategy".to_string(),
            description: "Generates a strategic plan for solving a user's request, especially for coding tasks.".to_string(),
            input_schema: context_schema(),
        },
        Tool {
            name: "revise_strategy".to_string(),
            description: "Revises an existing strategy based on new information or user feedback.".to_string(),
            input_schema: context_schema(),
        },
        Tool {
            name: "generate_code".to_string(),
            description: "Generates Python code based on the current strategy and context.".to_string(),
            input_schema: context_schema(),
        },
        Tool {
            name: "fix_code".to_string(),
            description: "Fixes existing Python code based on error analysis and context.".to_string(),
            input_schema: context_schema(),
        },
        Tool {
            name: "execute_python_code".to_string(),
            description: "Executes a given Python code string and returns its output or any errors.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "code_string": {
                        "type": "string",
                        "description": "The Python code to execute, as a string."
                    }
                },
                "required": ["code_string"]
            }),
        },
        Tool {
            name: "analyze_errors".to_string(),
            description: "Analyzes an error message from code execution to provide insights for fixing the code.".to_string(),
            input_schema: context_schema(),
        },
        Tool {
            name: "awaiting_user_approval".to_string(),
            description: "Processes a user's 'yes' or 'no' response for a previously asked approval.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "user_query": {
                        "type": "string",
                        "description": "The user's response, typically 'yes' or 'no'."
                    }
                },
                "required": ["user_query"]
            }),
        },
        Tool {
            name: "save_result".to_string(),
            description: "Summarizes the finished session and adds it to the session log database.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "data_dict": {
                        "type": "object",
                        "description": "The current context dictionary of the main agent."
                    },
                    "user_query": {
                        "type": "string",
                        "description": "The user's response, typically 'correct' or 'wrong'."
                    }
                },
                "required": ["data_dict", "user_query"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::execution::{resolver::PackageInstaller, EngineConfig};
    use crate::llm::LlmClient;
    use std::time::Duration;
    use tempfile::tempdir;

    fn bench_toolset(store: LogStore) -> Toolset {
        let engine_cfg = EngineConfig {
            installer: PackageInstaller::new("false", vec![], Duration::from_secs(5)),
            max_heal_attempts: 8,
        };
        let engine = Engine::new("", engine_cfg).unwrap();
        let cfg = Config::load();
        let chat = AgentChat::new(LlmClient::from_config(&cfg).unwrap(), "gpt-4o".into());
        Toolset::new(engine, chat, store)
    }

    fn request(method: &str, params: Value) -> McpRequest {
        McpRequest {
            jsonrpc: "2.0".into(),
            id: Some(json!(1)),
            method: method.into(),
            params,
        }
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let dir = tempdir().unwrap();
        let mut toolset = bench_toolset(LogStore::at(dir.path().join("s.jsonl")));
        let resp = handle_request(&mut toolset, request("initialize", json!({}))).await;
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "mscope");
    }

    #[tokio::test]
    async fn tools_list_names_every_tool() {
        let dir = tempdir().unwrap();
        let mut toolset = bench_toolset(LogStore::at(dir.path().join("s.jsonl")));
        let resp = handle_request(&mut toolset, request("tools/list", json!({}))).await;
        let result = resp.result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 11);
        assert!(tools.iter().any(|t| t["name"] == "execute_python_code"));
        assert!(tools.iter().any(|t| t["name"] == "generate_strategy"));
    }

    #[tokio::test]
    async fn unknown_method_is_rejected() {
        let dir = tempdir().unwrap();
        let mut toolset = bench_toolset(LogStore::at(dir.path().join("s.jsonl")));
        let resp = handle_request(&mut toolset, request("tools/nope", json!({}))).await;
        assert_eq!(resp.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn execute_tool_returns_success_payload() {
        let _stdout = crate::execution::test_support::stdout_lock();
        let dir = tempdir().unwrap();
        let mut toolset = bench_toolset(LogStore::at(dir.path().join("s.jsonl")));
        let value = call_tool(
            &mut toolset,
            "execute_python_code",
            json!({ "code_string": "```python\nprint('ready')\n```" }),
        )
        .await
        .unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["output"], "ready");
    }

    #[tokio::test]
    async fn execute_tool_reports_failure_as_data() {
        let _stdout = crate::execution::test_support::stdout_lock();
        let dir = tempdir().unwrap();
        let mut toolset = bench_toolset(LogStore::at(dir.path().join("s.jsonl")));
        let value = call_tool(
            &mut toolset,
            "execute_python_code",
            json!({ "code_string": "1/0" }),
        )
        .await
        .unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["output"], "ZeroDivisionError: division by zero");
    }

    #[tokio::test]
    async fn approval_tool_maps_yes_and_no() {
        let dir = tempdir().unwrap();
        let mut toolset = bench_toolset(LogStore::at(dir.path().join("s.jsonl")));
        let yes = call_tool(&mut toolset, "awaiting_user_approval", json!({ "user_query": "Yes" }))
            .await
            .unwrap();
        assert_eq!(yes["approved"], true);
        let no = call_tool(&mut toolset, "awaiting_user_approval", json!({ "user_query": "no" }))
            .await
            .unwrap();
        assert_eq!(no["approved"], false);
    }

    #[tokio::test]
    async fn retrieve_context_reads_the_store() {
        let dir = tempdir().unwrap();
        let store = LogStore::at(dir.path().join("s.jsonl"));
        store
            .add(&LogEntry {
                prompt: "snap an image".into(),
                output: "mmc.snapImage()".into(),
                feedback: true,
                category: String::new(),
            })
            .unwrap();
        let mut toolset = bench_toolset(store);
        let value = call_tool(
            &mut toolset,
            "retrieve_db_context",
            json!({ "user_query": "snap an image now" }),
        )
        .await
        .unwrap();
        let context = value["context"].as_str().unwrap();
        assert!(context.contains("mmc.snapImage()"));
    }

    #[tokio::test]
    async fn missing_arguments_are_reported() {
        let dir = tempdir().unwrap();
        let mut toolset = bench_toolset(LogStore::at(dir.path().join("s.jsonl")));
        let err = call_tool(&mut toolset, "execute_python_code", json!({}))
            .await
            .unwrap_err();
        assert!(err.contains("code_string"));
        let err = call_tool(&mut toolset, "no_such_tool", json!({})).await.unwrap_err();
        assert!(err.contains("Unknown tool"));
    }
}
