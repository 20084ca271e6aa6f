mod agents;
mod cli;
mod config;
mod execution;
mod llm;
mod mcp;
mod store;

use anyhow::{anyhow, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use agents::AgentChat;
use config::Config;
use execution::{env, Engine, EngineConfig, ExecStatus};
use llm::LlmClient;
use store::LogStore;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = cli::Cli::parse();
    let cfg = Config::load();

    // Resolve model: CLI overrides config; fall back to DEFAULT_MODEL
    let model = args
        .model
        .clone()
        .or_else(|| cfg.get("DEFAULT_MODEL"))
        .unwrap_or_else(|| "gpt-4o".to_string());

    let bootstrap = if args.no_hardware {
        String::new()
    } else {
        let path = args
            .hardware_cfg
            .clone()
            .or_else(|| cfg.get_path("HARDWARE_CFG_PATH"))
            .ok_or_else(|| {
                anyhow!(
                    "no hardware configuration; set HARDWARE_CFG_PATH or pass --hardware-cfg (or use --no-hardware)"
                )
            })?;
        env::hardware_bootstrap(&path)
    };
    let mut engine = Engine::new(&bootstrap, EngineConfig::from_config(&cfg))?;

    if !args.serve {
        if let Some(code) = args.exec.as_deref() {
            let outcome = engine.run_code(code);
            match outcome.status {
                ExecStatus::Success => {
                    println!("{}", outcome.output);
                }
                ExecStatus::Failed => {
                    eprintln!("{}", outcome.output.red());
                    std::process::exit(1);
                }
            }
            return Ok(());
        }

        if let Some(code) = args.check.as_deref() {
            if engine.test_code(code) {
                println!("{}", "ok".green());
                return Ok(());
            }
            eprintln!("{}", "failed".red());
            std::process::exit(1);
        }
    }

    // Serve is the default mode
    let client = LlmClient::from_config(&cfg)?;
    let chat = AgentChat::new(client, model);
    let toolset = mcp::Toolset::new(engine, chat, LogStore::from_config(&cfg));
    mcp::run_server(toolset).await
}

fn init_tracing() {
    // stdout belongs to the tool-call protocol; diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}
