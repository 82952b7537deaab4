//! Prompt templates for the debate flow

use crate::debate::config::{DebateConfiguration, DebateFormat, DebatePhase, ParticipantSpec};
use crate::debate::history::ParticipantResponse;
use std::collections::BTreeMap;

/// Templates for generating prompts at each stage
pub struct DebatePromptTemplate;

impl DebatePromptTemplate {
    /// System prompt for a participant. A configured override wins.
    pub fn participant_system(config: &DebateConfiguration, participant: &ParticipantSpec) -> String {
        if let Some(custom) = &participant.system_prompt {
            return custom.clone();
        }
        let opponents: Vec<&str> = config
            .participants
            .iter()
            .filter(|p| p.id != participant.id)
            .map(|p| p.display_name.as_str())
            .collect();
        format!(
            r#"You are {name}, a participant in a structured debate.

Topic: {topic}

Your position: {persona}

Other participants: {opponents}

Rules:
- Argue your position clearly and honestly; support claims with reasoning and evidence.
- Engage directly with the strongest points made by the other participants.
- Do not repeat earlier arguments verbatim; build on them or concede where warranted.
- Keep each turn focused and under 300 words."#,
            name = participant.display_name,
            topic = config.topic,
            persona = participant.persona,
            opponents = opponents.join(", "),
        )
    }

    /// Instruction for one participant's turn.
    ///
    /// `earlier_this_round` holds responses already produced in the same
    /// round (sequential mode).
    pub fn turn_instruction(
        config: &DebateConfiguration,
        round_number: u32,
        earlier_this_round: &[ParticipantResponse],
    ) -> String {
        let mut prompt = match config.phase_for_round(round_number) {
            Some(DebatePhase::Opening) => {
                "Give your opening statement: present your position and your main arguments.".to_string()
            }
            Some(DebatePhase::Rebuttal) => {
                "Rebut the other participants: identify the weakest points in their arguments and answer their criticisms of yours.".to_string()
            }
            Some(DebatePhase::CrossExamination) => {
                "Cross-examine: pose pointed questions to the other participants and answer any posed to you.".to_string()
            }
            Some(DebatePhase::Closing) => {
                "Give your closing statement: summarize why your position is stronger. Do not introduce new arguments.".to_string()
            }
            None if round_number == 1 => {
                "This is round 1. Present your opening position on the topic.".to_string()
            }
            None => format!(
                "This is round {}. Respond to the previous round and advance your position.",
                round_number
            ),
        };

        if config.format == DebateFormat::ConvergenceSeeking {
            prompt.push_str(
                "\nLook for common ground: state plainly where you now agree with others.",
            );
        }

        let earlier: Vec<&ParticipantResponse> =
            earlier_this_round.iter().filter(|r| r.is_completed()).collect();
        if !earlier.is_empty() {
            prompt.push_str("\n\nAlready said this round:\n");
            for response in earlier {
                prompt.push_str(&format!("\n--- {} ---\n{}\n", response.display_name, response.content));
            }
        }
        prompt
    }

    /// System prompt for the judge
    pub fn judge_system() -> &'static str {
        r#"You are an impartial debate judge.
You score each participant against a rubric on a 0-10 scale, summarize the round,
and decide whether the debate is still productive.
You always answer with a single JSON object and nothing else."#
    }

    /// Prompt asking the judge to assess one round.
    pub fn judge_round_prompt(
        config: &DebateConfiguration,
        history_text: &str,
        round_number: u32,
        responses: &[ParticipantResponse],
    ) -> String {
        let judge = &config.judge;
        let criteria: Vec<String> = judge
            .rubric
            .criteria
            .iter()
            .map(|c| format!("- {} (weight {:.2})", c.name, c.weight))
            .collect();
        let criteria_json: Vec<String> = judge
            .rubric
            .criterion_names()
            .map(|n| format!("\"{}\": <0-10>", n))
            .collect();

        let mut prompt = format!(
            r#"Debate topic: {topic}

Rubric:
{criteria}

Stop-detection sensitivity (0 = never flag, 1 = flag readily):
- repetition: {rep:.2}
- topic drift: {drift:.2}
- convergence: {conv:.2}
"#,
            topic = config.topic,
            criteria = criteria.join("\n"),
            rep = judge.sensitivity.repetition,
            drift = judge.sensitivity.drift,
            conv = judge.sensitivity.convergence,
        );

        if !history_text.is_empty() {
            prompt.push_str(&format!("\nEarlier rounds:\n{}\n", history_text));
        }

        prompt.push_str(&format!("\nRound {} responses:\n", round_number));
        for response in responses {
            if response.is_completed() {
                prompt.push_str(&format!(
                    "\n--- {} (id: {}) ---\n{}\n",
                    response.display_name, response.participant_id, response.content
                ));
            } else {
                prompt.push_str(&format!(
                    "\n--- {} (id: {}) ---\n(no response: {})\n",
                    response.display_name, response.participant_id, response.status
                ));
            }
        }

        prompt.push_str(&format!(
            r#"
Score every participant listed above on every criterion. A participant with no
response scores 0 on all criteria.

Respond with JSON in exactly this shape:
{{
  "scores": [
    {{"participant_id": "<id>", "criteria": {{{criteria_json}}}}}
  ],
  "summary": "<two or three sentences>",
  "should_continue": <true|false>,
  "flags": {{
    "repetition_detected": <true|false>,
    "topic_drift": <true|false>,
    "convergence_reached": <true|false>,
    "diminishing_returns": <true|false>
  }}
}}"#,
            criteria_json = criteria_json.join(", ")
        ));
        prompt
    }

    /// Prompt asking the judge for the final verdict over the whole debate.
    pub fn verdict_prompt(
        config: &DebateConfiguration,
        history_text: &str,
        cumulative: &BTreeMap<String, f64>,
    ) -> String {
        let mut standings = String::new();
        for participant in &config.participants {
            let total = cumulative.get(&participant.id).copied().unwrap_or(0.0);
            standings.push_str(&format!(
                "- {} (id: {}): {:.2}\n",
                participant.display_name, participant.id, total
            ));
        }

        format!(
            r#"Debate topic: {topic}

Full debate:
{history}

Cumulative weighted scores from round assessments:
{standings}
Deliver the final verdict. Declare a winner only if one participant was clearly
stronger across the debate; tie your justification to the accumulated scores.

Respond with JSON in exactly this shape:
{{
  "summary": "<one paragraph>",
  "key_points": ["<point>", ...],
  "agreements": ["<area of agreement>", ...],
  "disagreements": ["<area of disagreement>", ...],
  "winner": "<participant id or null>",
  "justification": "<why this participant won, or why there is no winner>"
}}"#,
            topic = config.topic,
            history = history_text,
            standings = standings,
        )
    }

    /// System prompt for compressing old rounds
    pub fn summarization_system() -> &'static str {
        r#"You condense debate transcripts. Preserve each participant's position,
their strongest arguments, concessions, and any evidence cited. Be neutral and brief."#
    }

    /// Prompt asking for a summary of earlier rounds
    pub fn summarization_prompt(topic: &str, rounds_text: &str) -> String {
        format!(
            r#"Debate topic: {}

Summarize the following rounds in at most 200 words, attributing arguments to participants:

{}"#,
            topic, rounds_text
        )
    }
}
