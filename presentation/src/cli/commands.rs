//! CLI command definitions

use clap::Parser;
use quorum_domain::{DebateId, ExportFormat};
use std::path::PathBuf;

/// One `-p model[:persona]` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantArg {
    pub model: String,
    pub persona: Option<String>,
}

impl std::str::FromStr for ParticipantArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (model, persona) = match s.split_once(':') {
            Some((model, persona)) => (model.trim(), Some(persona.trim())),
            None => (s.trim(), None),
        };
        if model.is_empty() {
            return Err(format!("Participant '{}' is missing a model name", s));
        }
        Ok(Self {
            model: model.to_string(),
            persona: persona.filter(|p| !p.is_empty()).map(str::to_string),
        })
    }
}

/// CLI arguments for quorum-debate
#[derive(Parser, Debug)]
#[command(name = "quorum-debate")]
#[command(author, version, about = "Structured debates between LLMs, scored by an LLM judge")]
#[command(long_about = r#"
Quorum Debate runs a debate between two or more LLM participants on a topic.
After every round a judge model scores each participant against a rubric,
and the debate stops on round limits, convergence, repetition, judge
decision or cost limits. The judge then writes a final verdict.

Configuration files are loaded from (in priority order):
1. --config <path>     Explicit config file
2. ./quorum.toml       Project-level config
3. ~/.config/quorum-debate/config.toml   Global config
QUORUM_* environment variables override all files.

Example:
  quorum-debate "Should cities ban cars downtown?" \
      -p "gpt-4o:Argue in favor" -p "claude-sonnet-4:Argue against" \
      --judge claude-opus-4 --format round-limited --max-rounds 3
  quorum-debate --config debate.toml --export markdown --out debate.md
"#)]
pub struct Cli {
    /// Debate topic (overrides [debate] topic)
    pub topic: Option<String>,

    /// Participant as MODEL or MODEL:PERSONA (repeatable; replaces [[participants]])
    #[arg(short = 'p', long = "participant", value_name = "MODEL[:PERSONA]")]
    pub participants: Vec<ParticipantArg>,

    /// Judge model
    #[arg(short, long, value_name = "MODEL")]
    pub judge: Option<String>,

    /// Debate format: free-form, structured-rounds, round-limited, convergence-seeking
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Execution mode: simultaneous or sequential
    #[arg(long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Maximum number of rounds
    #[arg(long, value_name = "N")]
    pub max_rounds: Option<u32>,

    /// Hard cost limit in USD
    #[arg(long, value_name = "USD")]
    pub cost_limit: Option<f64>,

    /// Context budget in tokens
    #[arg(long, value_name = "TOKENS")]
    pub budget: Option<usize>,

    /// Context strategy: last-n-rounds, exponential-decay, importance-weighted, summarization
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<String>,

    /// Export the transcript after the debate (markdown or json)
    #[arg(long, value_name = "FORMAT")]
    pub export: Option<ExportFormat>,

    /// Export destination (default: quorum-<id>.<ext>)
    #[arg(short, long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Record every progress event to a JSONL file
    #[arg(long, value_name = "PATH")]
    pub event_log: Option<PathBuf>,

    /// Persist rounds and verdicts under this directory
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Resume a persisted debate (requires a data directory)
    #[arg(long, value_name = "DEBATE_ID")]
    pub resume: Option<DebateId>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Plain line-by-line progress instead of progress bars
    #[arg(long)]
    pub plain: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}
