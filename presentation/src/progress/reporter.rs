//! Progress reporting for debate execution
//!
//! Both reporters consume the engine's event stream; [`follow`] drives one
//! to the end of the stream.

use crate::output::console::ConsoleFormatter;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use quorum_application::EventSubscription;
use quorum_domain::{
    CostTier, CostWarning, DebateConfiguration, DebateState, ErrorKind, EventKind, FinalVerdict,
    JudgeAssessment, ParticipantResponse, ProgressEvent,
};
use std::collections::HashMap;
use std::time::Duration;

/// Renders progress events as they arrive.
pub trait ProgressRenderer {
    fn on_event(&mut self, event: &ProgressEvent);

    /// Called once after the stream ends.
    fn finish(&mut self) {}
}

/// What [`follow`] saw before the stream ended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Followed {
    pub verdict: Option<FinalVerdict>,
    /// Sequence of the last event delivered; resume with `subscribe_after`.
    pub cursor: u64,
}

/// Feed every event of `subscription` to `renderer` until the terminal
/// state event.
pub async fn follow<R: ProgressRenderer + ?Sized>(
    mut subscription: EventSubscription,
    renderer: &mut R,
) -> Followed {
    let mut verdict = None;
    while let Some(event) = subscription.next_event().await {
        if let EventKind::VerdictReady { verdict: v } = &event.kind {
            verdict = Some(v.clone());
        }
        renderer.on_event(&event);
    }
    renderer.finish();
    Followed {
        verdict,
        cursor: subscription.cursor(),
    }
}

fn state_label(state: DebateState) -> &'static str {
    match state {
        DebateState::Configuring => "Configuring",
        DebateState::Initializing => "Initializing",
        DebateState::AwaitingOpening => "Opening statements",
        DebateState::RunningRound => "Debating",
        DebateState::EvaluatingRound => "Judge scoring round",
        DebateState::Paused => "Paused",
        DebateState::JudgingFinal => "Judge writing verdict",
        DebateState::Completed => "Completed",
        DebateState::Error => "Error",
    }
}

fn tier_line(warning: &CostWarning) -> String {
    let text = format!(
        "cost {} tier: ${:.4} crossed ${:.4}",
        warning.tier.as_str(),
        warning.cost_at_firing,
        warning.threshold
    );
    match warning.tier {
        CostTier::Warn => text.yellow().to_string(),
        CostTier::Escalate => text.yellow().bold().to_string(),
        CostTier::Critical => text.red().bold().to_string(),
    }
}

fn assessment_line(round: u32, assessment: &JudgeAssessment) -> String {
    let scores = assessment
        .scores
        .iter()
        .map(|s| format!("{} {:.2}", s.participant_id, s.weighted_total))
        .collect::<Vec<_>>()
        .join(", ");
    let flags = assessment.flags.labels();
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };
    let fallback = if assessment.fallback { " (fallback)" } else { "" };
    format!(
        "{} round {}: {}{}{}",
        "Judge".magenta().bold(),
        round,
        scores,
        flags.yellow(),
        fallback.dimmed()
    )
}

fn response_mark(response: &ParticipantResponse) -> String {
    if response.status.is_completed() {
        format!(
            "{} {} ({} tokens, {:.1}s)",
            "v".green(),
            response.display_name,
            response.usage.completion_tokens,
            response.duration_ms as f64 / 1000.0
        )
    } else {
        format!("{} {} ({})", "x".red(), response.display_name, response.status)
    }
}

fn error_line(kind: ErrorKind, message: &str, retryable: bool) -> String {
    let label = if retryable {
        "warning:".yellow().bold()
    } else {
        "error:".red().bold()
    };
    format!("{} {} ({})", label, message, kind)
}

/// Reports progress with indicatif bars: one per round, one spinner per
/// participant while it streams.
pub struct ProgressReporter {
    multi: MultiProgress,
    participants: usize,
    names: HashMap<String, String>,
    round_bar: Option<ProgressBar>,
    speakers: HashMap<String, (ProgressBar, usize)>,
}

impl ProgressReporter {
    pub fn new(config: &DebateConfiguration) -> Self {
        Self {
            multi: MultiProgress::new(),
            participants: config.participants.len(),
            names: config
                .participants
                .iter()
                .map(|p| (p.id.clone(), p.display_name.clone()))
                .collect(),
            round_bar: None,
            speakers: HashMap::new(),
        }
    }

    fn round_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn speaker_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("  {spinner:.green} {prefix:.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn println(&self, line: impl AsRef<str>) {
        let _ = self.multi.println(line);
    }

    fn speaker(&mut self, participant_id: &str) -> &mut (ProgressBar, usize) {
        let name = self
            .names
            .get(participant_id)
            .cloned()
            .unwrap_or_else(|| participant_id.to_string());
        let multi = &self.multi;
        self.speakers
            .entry(participant_id.to_string())
            .or_insert_with(|| {
                let bar = multi.add(ProgressBar::new_spinner());
                bar.set_style(Self::speaker_style());
                bar.set_prefix(name);
                bar.enable_steady_tick(Duration::from_millis(120));
                (bar, 0)
            })
    }

    fn clear_speakers(&mut self) {
        for (_, (bar, _)) in self.speakers.drain() {
            bar.finish_and_clear();
        }
    }
}

impl ProgressRenderer for ProgressReporter {
    fn on_event(&mut self, event: &ProgressEvent) {
        match &event.kind {
            EventKind::StateChanged {
                state, stop_reason, ..
            } => {
                if let (Some(reason), DebateState::JudgingFinal) = (stop_reason, state) {
                    self.println(format!("{} {}", "Stopping:".cyan().bold(), reason));
                }
                if let Some(bar) = &self.round_bar {
                    bar.set_message(state_label(*state).to_string());
                }
            }
            EventKind::RoundStarted { round, phase } => {
                self.clear_speakers();
                let bar = self.multi.add(ProgressBar::new(self.participants as u64));
                bar.set_style(Self::round_style());
                let prefix = match phase {
                    Some(phase) => format!("Round {} ({})", round, phase.as_str()),
                    None => format!("Round {}", round),
                };
                bar.set_prefix(prefix);
                bar.set_message("Waiting for participants...");
                if let Some(previous) = self.round_bar.replace(bar) {
                    previous.finish_and_clear();
                }
            }
            EventKind::ParticipantChunk {
                participant_id,
                chunk,
                ..
            } => {
                let (bar, chars) = self.speaker(participant_id);
                *chars += chunk.chars().count();
                bar.set_message(format!("streaming... {} chars", chars));
            }
            EventKind::ParticipantComplete { response, .. } => {
                if let Some((bar, _)) = self.speakers.remove(&response.participant_id) {
                    bar.finish_and_clear();
                }
                if let Some(bar) = &self.round_bar {
                    bar.set_message(response_mark(response));
                    bar.inc(1);
                }
            }
            EventKind::RoundComplete {
                round,
                cost,
                aborted,
                ..
            } => {
                self.clear_speakers();
                if let Some(bar) = self.round_bar.take() {
                    let status = if *aborted {
                        "aborted".red().to_string()
                    } else {
                        "complete".green().to_string()
                    };
                    bar.finish_with_message(format!("{} (${:.4})", status, cost));
                } else {
                    self.println(format!("Round {} complete (${:.4})", round, cost));
                }
            }
            EventKind::JudgeAssessment { round, assessment } => {
                self.println(assessment_line(*round, assessment));
            }
            EventKind::CostUpdate { .. } => {}
            EventKind::CostWarning { warning } => self.println(tier_line(warning)),
            EventKind::VerdictReady { .. } => {
                self.println(format!("{}", "Verdict ready".green().bold()));
            }
            EventKind::Error {
                kind,
                message,
                retryable,
                ..
            } => self.println(error_line(*kind, message, *retryable)),
        }
    }

    fn finish(&mut self) {
        self.clear_speakers();
        if let Some(bar) = self.round_bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Simple text-based progress (no fancy UI)
#[derive(Default)]
pub struct SimpleProgress {
    /// Print every finished turn in full.
    pub show_responses: bool,
}

impl SimpleProgress {
    pub fn new(show_responses: bool) -> Self {
        Self { show_responses }
    }

    /// The line printed for `event`, if any.
    pub fn render(&self, event: &ProgressEvent) -> Option<String> {
        match &event.kind {
            EventKind::StateChanged {
                state, stop_reason, ..
            } => Some(match stop_reason {
                Some(reason) if state.is_terminal() || *state == DebateState::JudgingFinal => {
                    format!("{} {} ({})", "->".cyan(), state_label(*state).bold(), reason)
                }
                _ => format!("{} {}", "->".cyan(), state_label(*state).bold()),
            }),
            EventKind::RoundStarted { round, phase } => Some(match phase {
                Some(phase) => format!("{} Round {} ({})", "->".cyan(), round, phase.as_str()),
                None => format!("{} Round {}", "->".cyan(), round),
            }),
            EventKind::ParticipantChunk { .. } | EventKind::CostUpdate { .. } => None,
            EventKind::ParticipantComplete { response, .. } => Some(if self.show_responses {
                ConsoleFormatter::format_response(response)
            } else {
                format!("  {}", response_mark(response))
            }),
            EventKind::RoundComplete {
                round,
                usage,
                cost,
                aborted,
            } => Some(format!(
                "  Round {} {} ({} tokens, ${:.4})",
                round,
                if *aborted { "aborted" } else { "complete" },
                usage.total(),
                cost
            )),
            EventKind::JudgeAssessment { round, assessment } => {
                Some(format!("  {}", assessment_line(*round, assessment)))
            }
            EventKind::CostWarning { warning } => Some(format!("  {}", tier_line(warning))),
            EventKind::VerdictReady { .. } => None,
            EventKind::Error {
                kind,
                message,
                retryable,
                ..
            } => Some(format!("  {}", error_line(*kind, message, *retryable))),
        }
    }
}

impl ProgressRenderer for SimpleProgress {
    fn on_event(&mut self, event: &ProgressEvent) {
        if let Some(line) = self.render(event) {
            println!("{}", line);
        }
    }

    fn finish(&mut self) {
        println!();
    }
}
