//! Judge Evaluator
//!
//! Asks the judge model for a structured assessment after every round and
//! for the final verdict. Output that fails schema validation counts as a
//! failed attempt; attempts are retried with doubling backoff. When all
//! attempts fail, round evaluation falls back to a permissive default and
//! the verdict to `None`, for which the caller builds the deterministic
//! score-based verdict.

use crate::config::EngineParams;
use crate::ports::llm_gateway::{LlmGateway, LlmRequest};
use crate::use_cases::context_service::ContextService;
use quorum_domain::{
    DebateConfiguration, DebateHistory, DebatePromptTemplate, ErrorKind, GenerationParams,
    JudgeAssessment, JudgeSchemaError, Message, ModelId, ParticipantResponse, TokenUsage,
    VerdictDraft, cumulative_scores, parse_final_verdict, parse_round_assessment,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One failed judge attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub attempt: u32,
}

/// Result of a judge call plus everything it cost.
#[derive(Debug, Clone)]
pub struct JudgeOutcome<T> {
    pub value: T,
    pub charges: Vec<(ModelId, TokenUsage)>,
    pub failures: Vec<JudgeFailure>,
}

pub struct JudgeEvaluator {
    gateway: Arc<dyn LlmGateway>,
    context: Arc<ContextService>,
    params: EngineParams,
}

impl JudgeEvaluator {
    pub fn new(
        gateway: Arc<dyn LlmGateway>,
        context: Arc<ContextService>,
        params: EngineParams,
    ) -> Self {
        Self {
            gateway,
            context,
            params,
        }
    }

    /// Assess the round made of `responses`, given the earlier `history`.
    pub async fn evaluate_round(
        &self,
        config: &DebateConfiguration,
        history: &DebateHistory,
        round_number: u32,
        responses: &[ParticipantResponse],
    ) -> JudgeOutcome<JudgeAssessment> {
        let mut charges = Vec::new();
        let history_text = self.history_text(config, history, &mut charges).await;
        let prompt =
            DebatePromptTemplate::judge_round_prompt(config, &history_text, round_number, responses);
        let ids = participant_ids(config);

        let (parsed, outcome) = self
            .ask(config, prompt, charges, |text| {
                parse_round_assessment(text, &ids, &config.judge.rubric)
            })
            .await;

        let value = match parsed {
            Some(assessment) => assessment,
            None => {
                let reason = outcome
                    .failures
                    .last()
                    .map(|f| f.message.clone())
                    .unwrap_or_else(|| "judge unavailable".to_string());
                warn!(
                    "Round {} assessment fell back to defaults: {}",
                    round_number, reason
                );
                JudgeAssessment::fallback_default(&reason)
            }
        };
        JudgeOutcome {
            value,
            charges: outcome.charges,
            failures: outcome.failures,
        }
    }

    /// Final verdict over the whole debate; `None` after repeated failure.
    pub async fn generate_final_verdict(
        &self,
        config: &DebateConfiguration,
        history: &DebateHistory,
    ) -> JudgeOutcome<Option<VerdictDraft>> {
        let mut charges = Vec::new();
        let history_text = self.history_text(config, history, &mut charges).await;
        let prompt =
            DebatePromptTemplate::verdict_prompt(config, &history_text, &cumulative_scores(history));
        let ids = participant_ids(config);

        let (draft, outcome) = self
            .ask(config, prompt, charges, |text| parse_final_verdict(text, &ids))
            .await;
        if draft.is_none() {
            warn!("Final verdict unavailable from judge; using score-based verdict");
        }
        JudgeOutcome {
            value: draft,
            charges: outcome.charges,
            failures: outcome.failures,
        }
    }

    async fn history_text(
        &self,
        config: &DebateConfiguration,
        history: &DebateHistory,
        charges: &mut Vec<(ModelId, TokenUsage)>,
    ) -> String {
        let outcome = self
            .context
            .prepare(
                config,
                &config.judge.model,
                DebatePromptTemplate::judge_system(),
                history.rounds(),
                self.params.judge_budget_tokens,
            )
            .await;
        charges.extend(outcome.charges);
        if outcome.prepared.compressed {
            debug!(
                "Judge context compressed to ~{} tokens",
                outcome.prepared.estimated_tokens
            );
        }
        outcome.prepared.render_history()
    }

    /// Invoke the judge until `parse` accepts its output or attempts run out.
    async fn ask<T>(
        &self,
        config: &DebateConfiguration,
        prompt: String,
        charges: Vec<(ModelId, TokenUsage)>,
        parse: impl Fn(&str) -> Result<T, JudgeSchemaError>,
    ) -> (Option<T>, JudgeOutcome<()>) {
        let model = config.judge.model.clone();
        let request = LlmRequest::new(
            model.clone(),
            vec![
                Message::system(DebatePromptTemplate::judge_system()),
                Message::user(prompt),
            ],
            GenerationParams::structured(),
        );
        let mut outcome = JudgeOutcome {
            value: (),
            charges,
            failures: Vec::new(),
        };

        for attempt in 0..=self.params.judge_retries {
            if attempt > 0 {
                let backoff = self.params.backoff_for(attempt);
                debug!("Judge retry {} after {:?}", attempt, backoff);
                tokio::time::sleep(backoff).await;
            }

            let completion = match self.gateway.invoke(&request).await {
                Ok(completion) => completion,
                Err(e) => {
                    warn!("Judge invocation failed (attempt {}): {}", attempt + 1, e);
                    let fatal = e.is_fatal();
                    outcome.failures.push(JudgeFailure {
                        kind: ErrorKind::JudgeInvocation,
                        message: e.to_string(),
                        attempt: attempt + 1,
                    });
                    if fatal {
                        break;
                    }
                    continue;
                }
            };
            outcome.charges.push((model.clone(), completion.usage));

            match parse(&completion.text) {
                Ok(value) => {
                    info!("Judge answered on attempt {}", attempt + 1);
                    return (Some(value), outcome);
                }
                Err(e) => {
                    warn!("Judge output rejected (attempt {}): {}", attempt + 1, e);
                    outcome.failures.push(JudgeFailure {
                        kind: ErrorKind::JudgeOutputSchema,
                        message: e.to_string(),
                        attempt: attempt + 1,
                    });
                }
            }
        }
        (None, outcome)
    }
}

fn participant_ids(config: &DebateConfiguration) -> Vec<&str> {
    config.participants.iter().map(|p| p.id.as_str()).collect()
}
