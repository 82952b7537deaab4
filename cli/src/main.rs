//! CLI entrypoint for Quorum Debate
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod overrides;

use anyhow::{Context, Result, bail};
use clap::Parser;
use quorum_application::{DebateEngine, DebateRepository, DebateSnapshot, EngineError};
use quorum_domain::{DebateConfiguration, DebateId, DebateState, PricingTable, ProgressEvent};
use quorum_infrastructure::{
    ConfigLoader, FileConfig, InMemoryDebateRepository, JsonlDebateRepository, JsonlEventLog,
    OpenAiGateway,
};
use quorum_presentation::{
    Cli, ConsoleFormatter, ProgressRenderer, ProgressReporter, SimpleProgress, follow,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Base delay before an automatic retry; doubles per attempt.
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli)?;

    info!("Starting Quorum Debate");

    if cli.show_config {
        for line in ConfigLoader::describe_sources(cli.config.as_ref()) {
            println!("{}", line);
        }
        return Ok(());
    }

    let mut file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?
    };
    overrides::apply(&cli, &mut file_config);

    if !file_config.output.color {
        colored::control::set_override(false);
    }

    let (debate_config, mut issues) = file_config.to_debate_configuration();
    let (pricing, pricing_issues) = file_config.to_pricing_table();
    issues.extend(pricing_issues);
    if !issues.is_empty() {
        eprintln!("{}", ConsoleFormatter::format_issues(&issues));
    }
    let Some(debate_config) = debate_config else {
        bail!("Configuration has errors; not starting the debate");
    };

    // === Dependency Injection ===
    let engine = Arc::new(build_engine(&file_config, pricing)?);

    let id = match cli.resume {
        Some(id) => {
            if file_config.output.data_dir.is_none() {
                bail!("--resume needs a data directory (--data-dir or [output] data_dir)");
            }
            let state = engine.restore(id, debate_config.clone()).await?;
            info!("Resuming debate {} from state {}", id, state);
            id
        }
        None => engine.configure(debate_config.clone())?,
    };

    if !cli.quiet {
        println!("{}", ConsoleFormatter::format_header(&debate_config));
        println!("Debate id: {}\n", id);
    }

    let snapshot = if engine.state(id)?.is_terminal() {
        engine.snapshot(id)?
    } else {
        spawn_interrupt_handler(Arc::clone(&engine), id);
        run_with_retries(&engine, id, &cli, &debate_config).await?
    };

    match snapshot.state {
        DebateState::Completed => {
            if let Some(verdict) = &snapshot.verdict {
                println!("{}", ConsoleFormatter::format_verdict(verdict, &debate_config));
            }
        }
        _ => eprintln!("{}", ConsoleFormatter::format_failure(&snapshot)),
    }

    if let Some(format) = file_config.output.export {
        let path = file_config
            .output
            .export_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("quorum-{}.{}", id, format.extension())));
        let text = engine.export(id, format)?;
        tokio::fs::write(&path, text)
            .await
            .with_context(|| format!("Failed to write transcript to {}", path.display()))?;
        println!("Transcript written to {}", path.display());
    }

    if snapshot.state != DebateState::Completed {
        bail!("Debate {} ended in state {}", id, snapshot.state);
    }
    Ok(())
}

/// Initialize tracing based on verbosity; `--log-file` routes it through a
/// non-blocking file writer.
fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

fn build_engine(
    config: &FileConfig,
    pricing: PricingTable,
) -> Result<DebateEngine> {
    let gateway_config = config.provider.to_gateway_config();
    if gateway_config.api_key.is_none() {
        warn!(
            "No API key found in ${}; requests are sent unauthenticated",
            config.provider.api_key_env
        );
    }
    let gateway = Arc::new(OpenAiGateway::new(gateway_config)?);

    let repository: Arc<dyn DebateRepository> = match &config.output.data_dir {
        Some(dir) => {
            info!("Persisting debates under {}", dir.display());
            Arc::new(JsonlDebateRepository::new(dir))
        }
        None => Arc::new(InMemoryDebateRepository::new()),
    };

    let mut engine = DebateEngine::new(gateway, repository, pricing, config.engine.clone());
    if let Some(path) = &config.output.event_log {
        match JsonlEventLog::new(path) {
            Some(log) => engine = engine.with_event_sink(Arc::new(log)),
            None => warn!("Event log disabled: cannot open {}", path.display()),
        }
    }
    Ok(engine)
}

/// First Ctrl-C asks the debate to stop after the current round.
fn spawn_interrupt_handler(engine: Arc<DebateEngine>, id: DebateId) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nStopping after the current round...");
            if let Err(e) = engine.stop(id) {
                warn!("Stop request ignored: {}", e);
            }
        }
    });
}

/// Start the debate, render its progress and retry retryable failures
/// until the lifecycle's retry budget is spent.
async fn run_with_retries(
    engine: &DebateEngine,
    id: DebateId,
    cli: &Cli,
    config: &DebateConfiguration,
) -> Result<DebateSnapshot> {
    let mut renderer: Box<dyn ProgressRenderer> = if cli.quiet {
        Box::new(Silent)
    } else if cli.plain {
        Box::new(SimpleProgress::new(cli.verbose > 0))
    } else {
        Box::new(ProgressReporter::new(config))
    };

    let mut subscription = engine.subscribe(id)?;
    engine.start(id)?;
    let mut attempt = 0u32;

    loop {
        let (followed, snapshot) =
            tokio::join!(follow(subscription, renderer.as_mut()), engine.wait(id));
        let snapshot = snapshot?;

        let retryable = snapshot.last_error.as_ref().is_some_and(|e| e.retryable);
        if snapshot.state != DebateState::Error || !retryable {
            return Ok(snapshot);
        }

        attempt += 1;
        let delay = RETRY_BACKOFF * 2u32.saturating_pow(attempt - 1);
        eprintln!("Retrying in {}s (attempt {})...", delay.as_secs(), attempt);
        tokio::time::sleep(delay).await;

        subscription = engine.subscribe_after(id, followed.cursor)?;
        match engine.retry(id).await {
            Ok(_) => {}
            Err(EngineError::Transition(e)) => {
                warn!("Not retrying: {}", e);
                return Ok(engine.snapshot(id)?);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Renderer for `--quiet`.
struct Silent;

impl ProgressRenderer for Silent {
    fn on_event(&mut self, _event: &ProgressEvent) {}
}
