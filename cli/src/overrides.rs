//! Command-line flags layered over the loaded configuration

use quorum_infrastructure::FileConfig;
use quorum_infrastructure::config::FileParticipantConfig;
use quorum_presentation::Cli;

/// Apply every flag the user passed. `-p` replaces the configured
/// participants; ids are derived from the position.
pub fn apply(cli: &Cli, config: &mut FileConfig) {
    if let Some(topic) = &cli.topic {
        config.debate.topic = Some(topic.clone());
    }

    if !cli.participants.is_empty() {
        config.participants = cli
            .participants
            .iter()
            .enumerate()
            .map(|(index, arg)| FileParticipantConfig {
                id: format!("p{}", index + 1),
                name: Some(display_name(&arg.model, index)),
                model: arg.model.clone(),
                persona: arg.persona.clone().unwrap_or_default(),
                system_prompt: None,
            })
            .collect();
    }

    if let Some(judge) = &cli.judge {
        config.judge.model = Some(judge.clone());
    }
    if let Some(format) = &cli.format {
        config.debate.format = format.clone();
    }
    if let Some(mode) = &cli.mode {
        config.debate.mode = mode.clone();
    }
    if let Some(max_rounds) = cli.max_rounds {
        config.limits.max_rounds = Some(max_rounds);
    }
    if let Some(limit) = cli.cost_limit {
        config.limits.cost_hard_limit = Some(limit);
    }
    if let Some(budget) = cli.budget {
        config.context.budget_tokens = budget;
    }
    if let Some(strategy) = &cli.strategy {
        config.context.strategy = strategy.clone();
    }
    if let Some(export) = cli.export {
        config.output.export = Some(export);
    }
    if let Some(out) = &cli.out {
        config.output.export_path = Some(out.clone());
    }
    if let Some(event_log) = &cli.event_log {
        config.output.event_log = Some(event_log.clone());
    }
    if let Some(data_dir) = &cli.data_dir {
        config.output.data_dir = Some(data_dir.clone());
    }
    if cli.no_color {
        config.output.color = false;
    }
}

/// "gpt-4o (1)" style names keep duplicates of one model apart.
fn display_name(model: &str, index: usize) -> String {
    format!("{} ({})", model, index + 1)
}
