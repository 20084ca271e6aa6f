use std::path::PathBuf;

use clap::{ArgGroup, Parser};

#[derive(Parser, Debug, Clone)]
#[command(name = "mscope", about = "Microscope agent toolset", version)]
#[command(group(ArgGroup::new("mode").args(["serve", "exec", "check"]).multiple(false)))]
pub struct Cli {
    /// Run the stdio tool-call server (default when no mode is given).
    #[arg(long)]
    pub serve: bool,

    /// Execute one code unit through the engine and print its output.
    #[arg(long, value_name = "CODE")]
    pub exec: Option<String>,

    /// Validate one code unit offline without capturing output.
    #[arg(long, value_name = "CODE")]
    pub check: Option<String>,

    /// Hardware configuration file loaded into the Micro-Manager core.
    #[arg(long = "hardware-cfg", value_name = "PATH")]
    pub hardware_cfg: Option<PathBuf>,

    /// Skip the hardware bootstrap and start from an empty environment.
    #[arg(long = "no-hardware")]
    pub no_hardware: bool,

    /// Large language model used by the agents.
    #[arg(long)]
    pub model: Option<String>,
}
