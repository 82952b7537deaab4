//! Console output for verdicts and configuration issues

use colored::Colorize;
use quorum_application::DebateSnapshot;
use quorum_domain::{
    ConfigIssue, DebateConfiguration, FinalVerdict, ParticipantResponse, VerdictOutcome,
};

/// Formats debate results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Opening banner: topic and line-up
    pub fn format_header(config: &DebateConfiguration) -> String {
        let mut output = String::new();
        output.push_str(&Self::header("Quorum Debate"));
        output.push('\n');
        output.push_str(&format!("{} {}\n", "Topic:".cyan().bold(), config.topic));
        output.push_str(&format!(
            "{} {} ({})\n",
            "Format:".cyan().bold(),
            config.format.as_str(),
            config.execution_mode.as_str()
        ));
        output.push_str(&format!("{}\n", "Participants:".cyan().bold()));
        for p in &config.participants {
            let persona = if p.persona.is_empty() {
                String::new()
            } else {
                format!(" - {}", p.persona)
            };
            output.push_str(&format!(
                "  * {} [{}]{}\n",
                p.display_name.bold(),
                p.model,
                persona.dimmed()
            ));
        }
        output.push_str(&format!(
            "{} {}\n",
            "Judge:".cyan().bold(),
            config.judge.model
        ));
        output
    }

    /// The final verdict with scores and cost
    pub fn format_verdict(verdict: &FinalVerdict, config: &DebateConfiguration) -> String {
        let mut output = String::new();
        output.push_str(&Self::section_header("Verdict"));

        match &verdict.outcome {
            VerdictOutcome::Winner {
                participant_id,
                justification,
            } => {
                let name = config
                    .participants
                    .iter()
                    .find(|p| &p.id == participant_id)
                    .map(|p| p.display_name.as_str())
                    .unwrap_or(participant_id);
                output.push_str(&format!("\n{} {}\n", "Winner:".green().bold(), name.bold()));
                output.push_str(&format!("{}\n", justification));
            }
            VerdictOutcome::NoWinner { justification } => {
                output.push_str(&format!("\n{}\n", "No winner".yellow().bold()));
                output.push_str(&format!("{}\n", justification));
            }
        }

        output.push_str(&format!("\n{}\n", verdict.summary));

        Self::push_list(&mut output, "Key Points:", &verdict.key_points);
        Self::push_list(&mut output, "Agreements:", &verdict.agreements);
        Self::push_list(&mut output, "Disagreements:", &verdict.disagreements);

        if !verdict.participant_totals.is_empty() {
            output.push_str(&format!("\n{}\n", "Scores:".cyan().bold()));
            for (id, total) in &verdict.participant_totals {
                output.push_str(&format!("  {:<20} {:>7.2}\n", id, total));
            }
        }

        output.push_str(&format!(
            "\n{} {}   {} ${:.4} ({} tokens)\n",
            "Stopped:".dimmed(),
            verdict.stop_reason,
            "Cost:".dimmed(),
            verdict.cost.total,
            verdict.cost.tokens.total()
        ));
        if verdict.fallback {
            output.push_str(&format!(
                "{}\n",
                "Verdict derived from round scores; the judge did not produce one.".yellow()
            ));
        }

        output.push_str(&Self::footer());
        output
    }

    /// Summary line for a debate that ended in `error`
    pub fn format_failure(snapshot: &DebateSnapshot) -> String {
        let message = snapshot
            .last_error
            .as_ref()
            .map(|e| e.message.as_str())
            .unwrap_or("unknown error");
        let retry = match &snapshot.last_error {
            Some(e) if e.retryable => " (retryable)",
            _ => "",
        };
        format!(
            "{} debate {} failed after {} round(s): {}{}",
            "x".red(),
            snapshot.debate_id,
            snapshot.round,
            message,
            retry.dimmed()
        )
    }

    /// One line per configuration issue, errors first
    pub fn format_issues(issues: &[ConfigIssue]) -> String {
        let mut sorted: Vec<&ConfigIssue> = issues.iter().collect();
        sorted.sort_by_key(|i| !i.is_error());
        sorted
            .iter()
            .map(|issue| {
                if issue.is_error() {
                    format!("{} {}", "error:".red().bold(), issue.message)
                } else {
                    format!("{} {}", "warning:".yellow().bold(), issue.message)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// A completed turn, as printed in plain progress mode
    pub fn format_response(response: &ParticipantResponse) -> String {
        let title = format!("── {} ({}) ──", response.display_name, response.model);
        if response.status.is_completed() {
            format!("\n{}\n{}\n", title.yellow().bold(), response.content)
        } else {
            format!(
                "\n{}\n{}: {}\n",
                title.red().bold(),
                response.status,
                response.error.as_deref().unwrap_or("no response")
            )
        }
    }

    fn push_list(output: &mut String, title: &str, items: &[String]) {
        if items.is_empty() {
            return;
        }
        output.push_str(&format!("\n{}\n", title.cyan().bold()));
        for item in items {
            output.push_str(&format!("  * {}\n", item));
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_domain::{
        ConfigIssueCode, CostSnapshot, DebateHistory, JudgeSpec, ParticipantSpec, StopReason,
    };

    fn config() -> DebateConfiguration {
        DebateConfiguration::new(
            "Tabs or spaces?",
            vec![
                ParticipantSpec::new("tabs", "gpt-4o", "Argue for tabs").with_display_name("Tabby"),
                ParticipantSpec::new("spaces", "claude-sonnet-4", "Argue for spaces"),
            ],
            JudgeSpec::new("claude-opus-4"),
        )
    }

    #[test]
    fn test_verdict_names_winner_by_display_name() {
        colored::control::set_override(false);
        let config = config();
        let mut verdict = FinalVerdict::from_scores(
            &DebateHistory::new(),
            &config.participants,
            StopReason::RoundLimit,
            CostSnapshot::default(),
        );
        verdict.outcome = VerdictOutcome::Winner {
            participant_id: "tabs".into(),
            justification: "Sharper rebuttals".into(),
        };
        verdict.key_points = vec!["Alignment".into()];

        let text = ConsoleFormatter::format_verdict(&verdict, &config);
        assert!(text.contains("Winner: Tabby"));
        assert!(text.contains("Sharper rebuttals"));
        assert!(text.contains("* Alignment"));
        assert!(text.contains("round_limit"));
    }

    #[test]
    fn test_issues_list_errors_first() {
        colored::control::set_override(false);
        let issues = vec![
            ConfigIssue::warning(ConfigIssueCode::UnknownValue, "mode ignored"),
            ConfigIssue::error(ConfigIssueCode::MissingJudge, "judge.model is required"),
        ];
        let text = ConsoleFormatter::format_issues(&issues);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "error: judge.model is required");
        assert_eq!(lines[1], "warning: mode ignored");
    }

    #[test]
    fn test_header_lists_lineup() {
        colored::control::set_override(false);
        let text = ConsoleFormatter::format_header(&config());
        assert!(text.contains("Topic: Tabs or spaces?"));
        assert!(text.contains("Tabby [gpt-4o]"));
        assert!(text.contains("Judge: claude-opus-4"));
    }
}
