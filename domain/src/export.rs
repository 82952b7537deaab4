//! Transcript export.
//!
//! Rendering is deterministic: the same history and verdict always produce
//! the same document.

use crate::debate::assessment::{FinalVerdict, VerdictOutcome};
use crate::debate::config::{DebateConfiguration, DebateFormat, ParticipantSpec};
use crate::debate::history::{DebateHistory, Round};
use crate::debate::id::DebateId;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("Unknown export format: {}. Valid: markdown, json", other)),
        }
    }
}

/// Everything an export needs, detached from the running debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateTranscript {
    pub debate_id: DebateId,
    pub topic: String,
    pub format: DebateFormat,
    pub participants: Vec<ParticipantSpec>,
    pub rounds: Vec<Round>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<FinalVerdict>,
    #[serde(skip)]
    show_assessments: bool,
}

impl DebateTranscript {
    pub fn new(
        debate_id: DebateId,
        config: &DebateConfiguration,
        history: &DebateHistory,
        verdict: Option<&FinalVerdict>,
    ) -> Self {
        let show = config.judge.show_assessments;
        let rounds = history
            .iter()
            .cloned()
            .map(|mut round| {
                if !show {
                    round.assessment = None;
                }
                round
            })
            .collect();
        Self {
            debate_id,
            topic: config.topic.clone(),
            format: config.format,
            participants: config.participants.clone(),
            rounds,
            verdict: verdict.cloned(),
            show_assessments: show,
        }
    }

    pub fn render(&self, format: ExportFormat) -> Result<String, serde_json::Error> {
        match format {
            ExportFormat::Markdown => Ok(self.to_markdown()),
            ExportFormat::Json => serde_json::to_string_pretty(self),
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Debate: {}\n", self.topic);
        let _ = writeln!(
            out,
            "Format: {} | Rounds: {}\n",
            self.format,
            self.rounds.len()
        );

        out.push_str("## Participants\n\n");
        for p in &self.participants {
            let _ = writeln!(out, "- **{}** (`{}`, {}): {}", p.display_name, p.id, p.model, p.persona);
        }
        out.push('\n');

        for round in &self.rounds {
            self.write_round(&mut out, round);
        }

        out.push_str("## Final Verdict\n\n");
        match &self.verdict {
            Some(verdict) => self.write_verdict(&mut out, verdict),
            None => out.push_str("_No verdict was reached._\n"),
        }
        out
    }

    fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.participants
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.display_name.as_str())
            .unwrap_or(id)
    }

    fn write_round(&self, out: &mut String, round: &Round) {
        match round.phase {
            Some(phase) => {
                let _ = writeln!(out, "## Round {} ({})\n", round.number, phase.display_name());
            }
            None => {
                let _ = writeln!(out, "## Round {}\n", round.number);
            }
        }
        if round.aborted {
            out.push_str("_Cut short by the cost limit._\n\n");
        }

        for response in &round.responses {
            let _ = writeln!(out, "### {}\n", response.display_name);
            if response.is_completed() {
                let _ = writeln!(out, "{}\n", response.content.trim_end());
            } else {
                let _ = writeln!(
                    out,
                    "_No response ({}): {}_\n",
                    response.status,
                    response.error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        if let Some(assessment) = round.assessment.as_ref().filter(|_| self.show_assessments) {
            out.push_str("**Judge assessment**");
            if assessment.fallback {
                out.push_str(" (judge unavailable)");
            }
            let _ = writeln!(out, ": {}\n", assessment.summary);
            if !assessment.scores.is_empty() {
                out.push_str("| Participant | Weighted score |\n|---|---|\n");
                for score in &assessment.scores {
                    let _ = writeln!(
                        out,
                        "| {} | {:.2} |",
                        self.display_name(&score.participant_id),
                        score.weighted_total
                    );
                }
                out.push('\n');
            }
            let flags = assessment.flags.labels();
            if !flags.is_empty() {
                let _ = writeln!(out, "Flags: {}\n", flags.join(", "));
            }
        }
    }

    fn write_verdict(&self, out: &mut String, verdict: &FinalVerdict) {
        let _ = writeln!(out, "{}\n", verdict.summary);

        match &verdict.outcome {
            VerdictOutcome::Winner {
                participant_id,
                justification,
            } => {
                let _ = writeln!(
                    out,
                    "**Winner:** {}. {}\n",
                    self.display_name(participant_id),
                    justification
                );
            }
            VerdictOutcome::NoWinner { justification } => {
                let _ = writeln!(out, "**No winner.** {}\n", justification);
            }
        }

        for (title, items) in [
            ("Key points", &verdict.key_points),
            ("Agreements", &verdict.agreements),
            ("Disagreements", &verdict.disagreements),
        ] {
            if items.is_empty() {
                continue;
            }
            let _ = writeln!(out, "### {}\n", title);
            for item in items {
                let _ = writeln!(out, "- {}", item);
            }
            out.push('\n');
        }

        if !verdict.participant_totals.is_empty() {
            out.push_str("### Scores\n\n");
            for (id, total) in &verdict.participant_totals {
                let _ = writeln!(out, "- {}: {:.2}", self.display_name(id), total);
            }
            out.push('\n');
        }

        let _ = writeln!(
            out,
            "Stopped: {} | Total cost: ${:.4}",
            verdict.stop_reason, verdict.cost.total
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::ledger::CostSnapshot;
    use crate::debate::assessment::{AssessmentFlags, JudgeAssessment};
    use crate::debate::config::JudgeSpec;
    use crate::debate::guards::StopReason;
    use crate::debate::history::{ParticipantResponse, ResponseStatus};
    use crate::session::usage::TokenUsage;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn config() -> DebateConfiguration {
        DebateConfiguration::new(
            "Should homework be banned?",
            vec![
                ParticipantSpec::new("pro", "model-a", "Ban it").with_display_name("Alice"),
                ParticipantSpec::new("con", "model-b", "Keep it").with_display_name("Bob"),
            ],
            JudgeSpec::new("judge"),
        )
        .with_max_rounds(2)
    }

    fn history(config: &DebateConfiguration) -> DebateHistory {
        let [a, b] = [&config.participants[0], &config.participants[1]];
        let assessment = JudgeAssessment {
            scores: vec![],
            summary: "Even round.".into(),
            should_continue: true,
            flags: AssessmentFlags::default(),
            fallback: false,
        };
        let r1 = Round::new(
            1,
            None,
            vec![
                ParticipantResponse::completed(a, "Homework causes stress.", TokenUsage::new(10, 10), 5),
                ParticipantResponse::completed(b, "Homework builds habits.", TokenUsage::new(10, 10), 5),
            ],
        )
        .with_assessment(assessment.clone());
        let r2 = Round::new(
            2,
            None,
            vec![
                ParticipantResponse::completed(a, "Studies show no benefit.", TokenUsage::new(10, 10), 5),
                ParticipantResponse::failed(b, ResponseStatus::Timeout, "timed out", true, 90_000),
            ],
        )
        .with_assessment(assessment);
        DebateHistory::from_rounds(vec![r1, r2]).unwrap()
    }

    fn verdict() -> FinalVerdict {
        FinalVerdict {
            summary: "Alice made the stronger case.".into(),
            key_points: vec!["Stress".into()],
            agreements: vec![],
            disagreements: vec!["Value of practice".into()],
            outcome: VerdictOutcome::Winner {
                participant_id: "pro".into(),
                justification: "Higher cumulative score".into(),
            },
            participant_totals: BTreeMap::from([("pro".into(), 15.0), ("con".into(), 11.0)]),
            stop_reason: StopReason::RoundLimit,
            cost: CostSnapshot::default(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            fallback: false,
        }
    }

    #[test]
    fn test_markdown_structure() {
        let c = config();
        let v = verdict();
        let md = DebateTranscript::new(DebateId::new(), &c, &history(&c), Some(&v)).to_markdown();

        assert!(md.starts_with("# Debate: Should homework be banned?"));
        let headers: Vec<&str> = md.lines().filter(|l| l.starts_with('#')).collect();
        let round_headers: Vec<&&str> = headers.iter().filter(|h| h.contains("Round")).collect();
        assert_eq!(round_headers.len(), 2);

        let title = md.find("# Debate:").unwrap();
        let r1 = md.find("## Round 1").unwrap();
        let r2 = md.find("## Round 2").unwrap();
        let verdict_at = md.find("## Final Verdict").unwrap();
        assert!(title < r1 && r1 < r2 && r2 < verdict_at);

        assert!(md.contains("Homework causes stress."));
        assert!(md.contains("_No response (timeout): timed out_"));
        assert!(md.contains("**Winner:** Alice."));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let c = config();
        let h = history(&c);
        let v = verdict();
        let id = DebateId::new();
        let a = DebateTranscript::new(id, &c, &h, Some(&v));
        let b = DebateTranscript::new(id, &c, &h, Some(&v));
        assert_eq!(a.to_markdown(), b.to_markdown());
        assert_eq!(
            a.render(ExportFormat::Json).unwrap(),
            b.render(ExportFormat::Json).unwrap()
        );
    }

    #[test]
    fn test_hidden_assessments_are_omitted() {
        let mut c = config();
        c.judge.show_assessments = false;
        let transcript = DebateTranscript::new(DebateId::new(), &c, &history(&c), None);
        let md = transcript.to_markdown();
        assert!(!md.contains("Judge assessment"));
        assert!(md.contains("_No verdict was reached._"));
        let json = transcript.render(ExportFormat::Json).unwrap();
        assert!(!json.contains("Even round."));
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }
}
