//! Context preparation with provider support.
//!
//! Wraps the pure [`prepare_context`] window with the parts that need a
//! gateway: exact token counts and LLM summarization of older rounds.

use crate::ports::llm_gateway::{GatewayError, LlmGateway, LlmRequest};
use quorum_domain::{
    CompressionStrategy, DebateConfiguration, DebatePromptTemplate, GenerationParams, Message,
    ModelId, PreparedContext, Round, TokenUsage, estimate_tokens, prepare_context,
    summarization_split,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

const SUMMARY_CACHE_LIMIT: usize = 64;

/// A prepared context plus any model usage spent producing it.
#[derive(Debug, Clone)]
pub struct ContextOutcome {
    pub prepared: PreparedContext,
    pub charges: Vec<(ModelId, TokenUsage)>,
}

impl ContextOutcome {
    fn plain(prepared: PreparedContext) -> Self {
        Self {
            prepared,
            charges: Vec::new(),
        }
    }
}

pub struct ContextService {
    gateway: Arc<dyn LlmGateway>,
    exact_counts: bool,
    summaries: Mutex<HashMap<String, Round>>,
}

impl ContextService {
    pub fn new(gateway: Arc<dyn LlmGateway>, exact_counts: bool) -> Self {
        Self {
            gateway,
            exact_counts,
            summaries: Mutex::new(HashMap::new()),
        }
    }

    /// Fit `system_prompt` plus `rounds` into `budget_tokens` for `model`.
    pub async fn prepare(
        &self,
        config: &DebateConfiguration,
        model: &ModelId,
        system_prompt: &str,
        rounds: &[Round],
        budget_tokens: usize,
    ) -> ContextOutcome {
        let counts = self.token_counts(model, system_prompt, rounds).await;
        let count = |text: &str| {
            counts
                .get(text)
                .copied()
                .unwrap_or_else(|| estimate_tokens(text))
        };
        let settings = &config.context;

        let prepared = prepare_context(system_prompt, rounds, budget_tokens, settings, &count);
        if settings.strategy != CompressionStrategy::Summarization || !prepared.compressed {
            return ContextOutcome::plain(prepared);
        }

        let (older, recent) = summarization_split(rounds, settings.summarize_fraction);
        if older.is_empty() {
            return ContextOutcome::plain(prepared);
        }

        let (summary, charges) = match self.summarize(config, older).await {
            Ok(summarized) => summarized,
            Err(e) => {
                warn!("Summarization failed, falling back to last-n-rounds: {}", e);
                return ContextOutcome::plain(prepared);
            }
        };

        let mut condensed = Vec::with_capacity(recent.len() + 1);
        condensed.push(summary);
        condensed.extend_from_slice(recent);

        let mut windowed = prepare_context(system_prompt, &condensed, budget_tokens, settings, &count);
        let mut dropped: Vec<u32> = older.iter().map(|r| r.number).collect();
        dropped.extend(windowed.dropped_rounds.iter().filter(|&&n| n != 0));
        windowed.dropped_rounds = dropped;
        windowed.compressed = true;
        windowed.strategy = Some(CompressionStrategy::Summarization);

        debug!(
            "Summarized {} round(s) into ~{} tokens",
            older.len(),
            windowed.estimated_tokens
        );
        ContextOutcome {
            prepared: windowed,
            charges,
        }
    }

    async fn token_counts(
        &self,
        model: &ModelId,
        system_prompt: &str,
        rounds: &[Round],
    ) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        if !self.exact_counts {
            return counts;
        }
        let texts = std::iter::once(system_prompt.to_string()).chain(rounds.iter().map(Round::render));
        for text in texts {
            match self.gateway.count_tokens(model, &text).await {
                Some(n) => {
                    counts.insert(text, n);
                }
                // The provider has no exact counts; estimate everything.
                None => return HashMap::new(),
            }
        }
        counts
    }

    /// Summary round for `older`, reusing an earlier summary of the same text.
    async fn summarize(
        &self,
        config: &DebateConfiguration,
        older: &[Round],
    ) -> Result<(Round, Vec<(ModelId, TokenUsage)>), GatewayError> {
        let text: String = older
            .iter()
            .map(Round::render)
            .collect::<Vec<_>>()
            .join("\n\n");

        if let Some(cached) = self.cache().get(&text) {
            return Ok((cached.clone(), Vec::new()));
        }

        let model = config.judge.model.clone();
        let request = LlmRequest::new(
            model.clone(),
            vec![
                Message::system(DebatePromptTemplate::summarization_system()),
                Message::user(DebatePromptTemplate::summarization_prompt(&config.topic, &text)),
            ],
            GenerationParams::summary(),
        );
        let completion = self.gateway.invoke(&request).await?;
        let summary = Round::summary(completion.text, model.clone());

        let mut cache = self.cache();
        if cache.len() >= SUMMARY_CACHE_LIMIT {
            cache.clear();
        }
        cache.insert(text, summary.clone());

        Ok((summary, vec![(model, completion.usage)]))
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, Round>> {
        self.summaries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
