//! Round Coordinator
//!
//! Runs one round: builds each participant's prompt from the windowed
//! history, invokes the participants (all at once or one after another),
//! forwards streamed chunks and classifies failures.
//!
//! ```text
//! simultaneous:  ┌─ pro ──┐
//!                ├─ con ──┼─▶ fan-in ─▶ RoundResult
//!                └─ ... ──┘
//! sequential:    pro ─▶ con ─▶ ...     (later speakers see earlier turns)
//! ```
//!
//! Participants only ever see rounds already in the history plus, in
//! sequential mode, turns taken earlier in the same round. A failed
//! participant does not affect the others.

use crate::ports::llm_gateway::{GatewayError, LlmGateway, LlmRequest};
use crate::use_cases::context_service::ContextService;
use quorum_domain::{
    Completion, DebateConfiguration, DebateHistory, DebatePromptTemplate, ExecutionMode,
    GenerationParams, Message, ModelId, ParticipantResponse, ParticipantSpec, StreamEvent,
    TokenUsage,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Whether the round may keep running after a response is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverDecision {
    Continue,
    Abort,
}

/// Receives streamed output as it arrives.
///
/// `on_response` runs once per finalized response, before it is added to
/// the round; returning [`ObserverDecision::Abort`] cancels every
/// invocation still in flight.
pub trait RoundObserver: Send {
    fn on_chunk(&mut self, participant_id: &str, chunk: &str);
    fn on_response(&mut self, response: &mut ParticipantResponse) -> ObserverDecision;
}

/// Observer that ignores everything.
pub struct NoRoundObserver;

impl RoundObserver for NoRoundObserver {
    fn on_chunk(&mut self, _participant_id: &str, _chunk: &str) {}

    fn on_response(&mut self, _response: &mut ParticipantResponse) -> ObserverDecision {
        ObserverDecision::Continue
    }
}

pub struct RoundRequest<'a> {
    pub config: &'a DebateConfiguration,
    pub history: &'a DebateHistory,
    pub round_number: u32,
    /// Per-participant context budgets overriding the configured one.
    pub budgets: &'a HashMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticationFailure {
    pub participant_id: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct RoundResult {
    pub round_number: u32,
    /// In speaking order; participants cancelled by an abort are absent.
    pub responses: Vec<ParticipantResponse>,
    pub usage: TokenUsage,
    pub aborted: bool,
    pub authentication_failure: Option<AuthenticationFailure>,
    /// Model usage spent preparing contexts (summaries).
    pub charges: Vec<(ModelId, TokenUsage)>,
    /// Participants whose context was compressed this round.
    pub compressed_for: Vec<String>,
}

struct ChunkUpdate {
    participant_id: String,
    text: String,
}

struct Invocation {
    order: usize,
    participant: ParticipantSpec,
    request: LlmRequest,
    timeout: Duration,
}

struct InvocationResult {
    order: usize,
    response: ParticipantResponse,
    error: Option<GatewayError>,
}

#[derive(Default)]
struct Collected {
    responses: Vec<(usize, ParticipantResponse)>,
    aborted: bool,
    authentication_failure: Option<AuthenticationFailure>,
}

/// Stateless across debates; one instance serves any number of rounds.
pub struct RoundCoordinator {
    gateway: Arc<dyn LlmGateway>,
    context: Arc<ContextService>,
}

impl RoundCoordinator {
    pub fn new(gateway: Arc<dyn LlmGateway>, context: Arc<ContextService>) -> Self {
        Self { gateway, context }
    }

    pub async fn execute_round(
        &self,
        request: RoundRequest<'_>,
        observer: &mut dyn RoundObserver,
    ) -> RoundResult {
        let config = request.config;
        let speakers = config.speaking_order_for_round(request.round_number);
        let token = CancellationToken::new();
        let mut charges = Vec::new();
        let mut compressed_for = Vec::new();
        let mut collected = Collected::default();

        info!(
            "Round {}: {} participant(s), {:?} mode",
            request.round_number,
            speakers.len(),
            config.execution_mode
        );

        match config.execution_mode {
            ExecutionMode::Simultaneous => {
                let mut tasks = JoinSet::new();
                let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel();
                for (order, participant) in speakers.iter().enumerate() {
                    let invocation = self
                        .build_invocation(&request, order, participant, &[], &mut charges, &mut compressed_for)
                        .await;
                    tasks.spawn(invoke_participant(
                        Arc::clone(&self.gateway),
                        invocation,
                        chunk_tx.clone(),
                        token.clone(),
                    ));
                }
                drop(chunk_tx);
                drive(&mut tasks, &mut chunk_rx, observer, &token, &mut collected).await;
            }
            ExecutionMode::Sequential => {
                for (order, participant) in speakers.iter().enumerate() {
                    let earlier: Vec<ParticipantResponse> =
                        collected.responses.iter().map(|(_, r)| r.clone()).collect();
                    let invocation = self
                        .build_invocation(&request, order, participant, &earlier, &mut charges, &mut compressed_for)
                        .await;

                    let mut tasks = JoinSet::new();
                    let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel();
                    tasks.spawn(invoke_participant(
                        Arc::clone(&self.gateway),
                        invocation,
                        chunk_tx,
                        token.clone(),
                    ));
                    drive(&mut tasks, &mut chunk_rx, observer, &token, &mut collected).await;

                    if collected.aborted || collected.authentication_failure.is_some() {
                        break;
                    }
                }
            }
        }

        collected.responses.sort_by_key(|(order, _)| *order);
        let responses: Vec<ParticipantResponse> =
            collected.responses.into_iter().map(|(_, r)| r).collect();
        let usage = responses.iter().map(|r| r.usage).sum();

        RoundResult {
            round_number: request.round_number,
            responses,
            usage,
            aborted: collected.aborted,
            authentication_failure: collected.authentication_failure,
            charges,
            compressed_for,
        }
    }

    async fn build_invocation(
        &self,
        request: &RoundRequest<'_>,
        order: usize,
        participant: &ParticipantSpec,
        earlier_this_round: &[ParticipantResponse],
        charges: &mut Vec<(ModelId, TokenUsage)>,
        compressed_for: &mut Vec<String>,
    ) -> Invocation {
        let config = request.config;
        let system_prompt = DebatePromptTemplate::participant_system(config, participant);
        let budget = request
            .budgets
            .get(&participant.id)
            .copied()
            .unwrap_or(config.context.budget_tokens);

        let outcome = self
            .context
            .prepare(
                config,
                &participant.model,
                &system_prompt,
                request.history.rounds(),
                budget,
            )
            .await;
        charges.extend(outcome.charges);
        let prepared = outcome.prepared;
        if prepared.compressed {
            debug!(
                "Context for {} compressed to ~{} tokens (dropped rounds {:?})",
                participant.id, prepared.estimated_tokens, prepared.dropped_rounds
            );
            compressed_for.push(participant.id.clone());
        }

        let instruction =
            DebatePromptTemplate::turn_instruction(config, request.round_number, earlier_this_round);
        let history_text = prepared.render_history();
        let user = if history_text.is_empty() {
            instruction
        } else {
            format!("Debate so far:\n\n{}\n\n{}", history_text, instruction)
        };

        Invocation {
            order,
            participant: participant.clone(),
            request: LlmRequest::new(
                participant.model.clone(),
                vec![Message::system(prepared.system_prompt), Message::user(user)],
                GenerationParams::debate_turn(),
            ),
            timeout: config.limits.round_timeout(),
        }
    }
}

/// Fan-in: forward chunks, finalize responses, abort on request.
async fn drive(
    tasks: &mut JoinSet<InvocationResult>,
    chunks: &mut mpsc::UnboundedReceiver<ChunkUpdate>,
    observer: &mut dyn RoundObserver,
    token: &CancellationToken,
    collected: &mut Collected,
) {
    loop {
        tokio::select! {
            biased;
            Some(chunk) = chunks.recv() => {
                if !token.is_cancelled() {
                    observer.on_chunk(&chunk.participant_id, &chunk.text);
                }
            }
            joined = tasks.join_next() => {
                let Some(joined) = joined else { break };
                let mut result = match joined {
                    Ok(result) => result,
                    Err(e) if e.is_cancelled() => continue,
                    Err(e) => {
                        error!("Participant task failed: {}", e);
                        continue;
                    }
                };
                // Cancelled invocations produce no response.
                if token.is_cancelled() {
                    continue;
                }
                // Chunks sent before the task returned belong before its response.
                while let Ok(chunk) = chunks.try_recv() {
                    observer.on_chunk(&chunk.participant_id, &chunk.text);
                }

                if let Some(error) = &result.error {
                    warn!(
                        "Participant {} failed: {}",
                        result.response.participant_id, error
                    );
                    if error.is_fatal() && collected.authentication_failure.is_none() {
                        collected.authentication_failure = Some(AuthenticationFailure {
                            participant_id: result.response.participant_id.clone(),
                            message: error.to_string(),
                        });
                    }
                }

                let decision = observer.on_response(&mut result.response);
                collected.responses.push((result.order, result.response));
                if decision == ObserverDecision::Abort {
                    warn!("Round aborted; cancelling in-flight invocations");
                    token.cancel();
                    tasks.abort_all();
                    collected.aborted = true;
                }
            }
        }
    }
}

async fn invoke_participant(
    gateway: Arc<dyn LlmGateway>,
    invocation: Invocation,
    chunks: mpsc::UnboundedSender<ChunkUpdate>,
    token: CancellationToken,
) -> InvocationResult {
    let started = Instant::now();
    let participant = &invocation.participant;

    let result = tokio::select! {
        _ = token.cancelled() => Err(GatewayError::Cancelled),
        timed = tokio::time::timeout(
            invocation.timeout,
            stream_completion(gateway.as_ref(), &invocation.request, &participant.id, &chunks),
        ) => timed.unwrap_or(Err(GatewayError::Timeout)),
    };
    let duration_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(completion) => InvocationResult {
            order: invocation.order,
            response: ParticipantResponse::completed(
                participant,
                completion.text,
                completion.usage,
                duration_ms,
            ),
            error: None,
        },
        Err(error) => InvocationResult {
            order: invocation.order,
            response: ParticipantResponse::failed(
                participant,
                error.response_status(),
                error.to_string(),
                error.is_retryable(),
                duration_ms,
            )
            .with_retry_after(error.retry_after_secs()),
            error: Some(error),
        },
    }
}

async fn stream_completion(
    gateway: &dyn LlmGateway,
    request: &LlmRequest,
    participant_id: &str,
    chunks: &mpsc::UnboundedSender<ChunkUpdate>,
) -> Result<Completion, GatewayError> {
    let forward = |text: &str| {
        let _ = chunks.send(ChunkUpdate {
            participant_id: participant_id.to_string(),
            text: text.to_string(),
        });
    };

    let mut handle = gateway.invoke_streaming(request).await?;
    let mut text = String::new();
    while let Some(event) = handle.receiver.recv().await {
        match event {
            StreamEvent::Delta(chunk) => {
                forward(&chunk);
                text.push_str(&chunk);
            }
            StreamEvent::Completed(mut completion) => {
                if text.is_empty() {
                    // Non-streaming provider: the whole reply is one chunk.
                    if !completion.text.is_empty() {
                        forward(&completion.text);
                    }
                } else if completion.text.is_empty() {
                    completion.text = text;
                }
                return Ok(completion);
            }
            StreamEvent::Error(e) => return Err(GatewayError::RequestFailed(e)),
        }
    }
    Err(GatewayError::ConnectionError(
        "stream closed before completion".into(),
    ))
}
