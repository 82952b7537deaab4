//! Debate Runner
//!
//! Drives one debate through its lifecycle. The runner is the single writer
//! of the debate's history and cost ledger:
//!
//! ```text
//! loop {
//!     wait while paused
//!     initializing      → READY
//!     awaiting_opening  ┐
//!     running_round     ┴→ run round → judge → guards → CONTINUE | STOP
//!     judging_final     → verdict → VERDICT_READY
//!     completed | error → exit
//! }
//! ```
//!
//! Pause and stop are lazy: they take effect between rounds. A hard cost
//! breach aborts the in-flight round and goes straight to final judging.

use crate::ports::repository::DebateRepository;
use crate::use_cases::event_stream::EventPublisher;
use crate::use_cases::judge_evaluator::{JudgeEvaluator, JudgeFailure};
use crate::use_cases::round_coordinator::{
    ObserverDecision, RoundCoordinator, RoundObserver, RoundRequest,
};
use quorum_domain::{
    CostAccountant, CostSnapshot, DebateConfiguration, DebateHistory, DebateId, DebateLifecycle,
    DebateState, ErrorKind, EventKind, FinalVerdict, GuardContext, LifecycleError, LifecycleEvent,
    ModelId, ParticipantResponse, PricingTable, ResponseStatus, Round, StopReason, TokenUsage,
    TransitionError, cumulative_scores, evaluate_stop_guards,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Notify, watch};
use tracing::{debug, error, info, warn};

/// Lifecycle shared between the runner and the control surface.
pub struct DebateControl {
    lifecycle: Mutex<DebateLifecycle>,
    wake: Notify,
}

impl DebateControl {
    pub fn new(lifecycle: DebateLifecycle) -> Self {
        Self {
            lifecycle: Mutex::new(lifecycle),
            wake: Notify::new(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, DebateLifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> DebateState {
        self.lock().state()
    }

    /// Wake a runner parked on a pause.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    async fn wait_while_paused(&self) {
        loop {
            let notified = self.wake.notified();
            let paused = self.lock().is_paused();
            if !paused {
                return;
            }
            debug!("Debate paused; waiting");
            notified.await;
        }
    }
}

/// Point-in-time view of a debate for queries and export.
#[derive(Debug, Clone)]
pub struct DebateSnapshot {
    pub debate_id: DebateId,
    pub state: DebateState,
    pub round: u32,
    pub history: DebateHistory,
    pub cost: CostSnapshot,
    pub verdict: Option<FinalVerdict>,
    pub stop_reason: Option<StopReason>,
    pub last_error: Option<LifecycleError>,
}

impl DebateSnapshot {
    pub fn new(debate_id: DebateId, state: DebateState, history: DebateHistory) -> Self {
        Self {
            debate_id,
            state,
            round: history.last_number(),
            history,
            cost: CostSnapshot::default(),
            verdict: None,
            stop_reason: None,
            last_error: None,
        }
    }
}

/// Collaborators shared by every runner of an engine.
pub struct RunnerServices {
    pub coordinator: Arc<RoundCoordinator>,
    pub judge: Arc<JudgeEvaluator>,
    pub repository: Arc<dyn DebateRepository>,
    pub pricing: PricingTable,
    pub context_shrink_factor: f64,
}

enum PendingWrite {
    Round(Round),
    Verdict(FinalVerdict),
}

impl PendingWrite {
    fn describe(&self) -> String {
        match self {
            PendingWrite::Round(round) => format!("round {}", round.number),
            PendingWrite::Verdict(_) => "verdict".to_string(),
        }
    }
}

pub struct DebateRunner {
    id: DebateId,
    config: Arc<DebateConfiguration>,
    history: DebateHistory,
    accountant: CostAccountant,
    services: Arc<RunnerServices>,
    control: Arc<DebateControl>,
    events: Arc<EventPublisher>,
    snapshot: Arc<watch::Sender<DebateSnapshot>>,
    pending: VecDeque<PendingWrite>,
    budgets: HashMap<String, usize>,
    round: u32,
    latest_responses: Vec<ParticipantResponse>,
    verdict: Option<FinalVerdict>,
    halted: bool,
}

impl DebateRunner {
    pub fn new(
        id: DebateId,
        config: Arc<DebateConfiguration>,
        history: DebateHistory,
        services: Arc<RunnerServices>,
        control: Arc<DebateControl>,
        events: Arc<EventPublisher>,
        snapshot: Arc<watch::Sender<DebateSnapshot>>,
    ) -> Self {
        let mut accountant = CostAccountant::new(
            services.pricing.clone(),
            config.limits.cost_thresholds,
            config.limits.cost_hard_limit,
        );
        // Participant spend from a reloaded history.
        for response in history.iter().flat_map(|r| r.responses.iter()) {
            if !response.usage.is_zero() || response.cost > 0.0 {
                accountant.record_cost(&response.model, response.usage, response.cost);
            }
        }
        let _ = accountant.drain_warnings();

        Self {
            id,
            round: history.last_number(),
            config,
            history,
            accountant,
            services,
            control,
            events,
            snapshot,
            pending: VecDeque::new(),
            budgets: HashMap::new(),
            latest_responses: Vec::new(),
            verdict: None,
            halted: false,
        }
    }

    pub fn with_verdict(mut self, verdict: Option<FinalVerdict>) -> Self {
        self.verdict = verdict;
        self
    }

    pub fn history(&self) -> &DebateHistory {
        &self.history
    }

    pub fn cost_snapshot(&self) -> CostSnapshot {
        self.accountant.snapshot()
    }

    /// Run until the debate completes or errors; the runner is handed back
    /// so a retry can continue from the same history.
    pub async fn run(mut self) -> Self {
        info!("Debate {} running: {}", self.id, self.config.topic);
        self.sync_snapshot();

        loop {
            self.control.wait_while_paused().await;

            let step = match self.control.state() {
                DebateState::Initializing => self.apply(LifecycleEvent::Ready),
                DebateState::AwaitingOpening | DebateState::RunningRound => self.run_round().await,
                DebateState::EvaluatingRound => self.apply(LifecycleEvent::Continue),
                DebateState::JudgingFinal => self.judge_final().await,
                DebateState::Paused => continue,
                DebateState::Configuring | DebateState::Completed | DebateState::Error => break,
            };

            if let Err(e) = step {
                error!("Debate {} hit an invalid transition: {}", self.id, e);
                self.fail(e.to_string(), false);
            }
            if std::mem::take(&mut self.halted) {
                break;
            }
        }

        info!(
            "Debate {} stopped in state {} after {} round(s), ${:.4}",
            self.id,
            self.control.state(),
            self.history.len(),
            self.accountant.current_total()
        );
        self
    }

    async fn run_round(&mut self) -> Result<(), TransitionError> {
        let number = self.history.next_round_number();
        let phase = self.config.phase_for_round(number);
        self.round = number;
        self.events.publish(EventKind::RoundStarted { round: number, phase });

        let mut observer = CostObserver {
            accountant: &mut self.accountant,
            events: &self.events,
            round: number,
        };
        let result = self
            .services
            .coordinator
            .execute_round(
                RoundRequest {
                    config: &self.config,
                    history: &self.history,
                    round_number: number,
                    budgets: &self.budgets,
                },
                &mut observer,
            )
            .await;

        for (model, usage) in &result.charges {
            self.charge(model, *usage);
        }

        if let Some(failure) = &result.authentication_failure {
            self.events.publish(EventKind::Error {
                kind: ErrorKind::Authentication,
                message: failure.message.clone(),
                retryable: false,
                participant_id: Some(failure.participant_id.clone()),
            });
            self.fail(failure.message.clone(), false);
            return Ok(());
        }

        for response in result.responses.iter().filter(|r| !r.is_completed()) {
            self.events.publish(EventKind::Error {
                kind: ErrorKind::ParticipantInvocation,
                message: response.error.clone().unwrap_or_default(),
                retryable: response.retryable,
                participant_id: Some(response.participant_id.clone()),
            });
        }

        let cost: f64 = result.responses.iter().map(|r| r.cost).sum();
        self.latest_responses = result.responses.clone();

        if result.aborted {
            let mut round = Round::new(number, phase, result.responses);
            round.aborted = true;
            self.append_round(round).await;
            self.events.publish(EventKind::RoundComplete {
                round: number,
                usage: result.usage,
                cost,
                aborted: true,
            });
            self.events.publish(EventKind::error(
                ErrorKind::CostLimitBreach,
                format!(
                    "Spend of ${:.4} reached the cost limit; round {} aborted",
                    self.accountant.current_total(),
                    number
                ),
                false,
            ));
            self.apply(LifecycleEvent::Stop(StopReason::CostLimit))?;
            return Ok(());
        }

        self.shrink_budgets(&result.responses);
        if result.responses.iter().all(|r| !r.is_completed()) {
            // Recorded like any other round; the guards and round cap bound a failing streak.
            warn!("Debate {}: no participant responded in round {}", self.id, number);
        }

        self.advance_to_evaluation()?;

        let judged = self
            .services
            .judge
            .evaluate_round(&self.config, &self.history, number, &result.responses)
            .await;
        for (model, usage) in &judged.charges {
            self.charge(model, *usage);
        }
        self.report_judge_failures(&judged.failures);
        if self.config.judge.show_assessments {
            self.events.publish(EventKind::JudgeAssessment {
                round: number,
                assessment: judged.value.clone(),
            });
        }

        let round = Round::new(number, phase, result.responses).with_assessment(judged.value);
        self.append_round(round).await;
        self.events.publish(EventKind::RoundComplete {
            round: number,
            usage: result.usage,
            cost,
            aborted: false,
        });

        let reason = {
            let lifecycle = self.control.lock();
            evaluate_stop_guards(&GuardContext {
                config: &self.config,
                round_number: number,
                assessment: self.history.latest().and_then(|r| r.assessment.as_ref()),
                cost_limit_breached: self.accountant.is_hard_limit_breached(),
                stop_requested: lifecycle.stop_requested(),
            })
        };
        match reason {
            Some(reason) => {
                info!("Debate {} stopping after round {}: {}", self.id, number, reason);
                self.apply(LifecycleEvent::Stop(reason))?;
            }
            None => {
                self.apply(LifecycleEvent::Continue)?;
            }
        }
        Ok(())
    }

    async fn judge_final(&mut self) -> Result<(), TransitionError> {
        let stop_reason = self
            .control
            .lock()
            .stop_reason()
            .unwrap_or(StopReason::JudgeDecision);

        let judged = self
            .services
            .judge
            .generate_final_verdict(&self.config, &self.history)
            .await;
        for (model, usage) in &judged.charges {
            self.charge(model, *usage);
        }
        self.report_judge_failures(&judged.failures);

        let cost = self.accountant.snapshot();
        let verdict = match judged.value {
            Some(draft) => draft.into_verdict(cumulative_scores(&self.history), stop_reason, cost),
            None => FinalVerdict::from_scores(&self.history, &self.config.participants, stop_reason, cost),
        };
        info!(
            "Debate {} verdict: {}",
            self.id,
            verdict.outcome.winner().unwrap_or("no winner")
        );

        self.persist(PendingWrite::Verdict(verdict.clone())).await;
        self.verdict = Some(verdict.clone());
        self.events.publish(EventKind::VerdictReady { verdict });
        self.apply(LifecycleEvent::VerdictReady)?;
        Ok(())
    }

    /// RESPONSES_RECEIVED / ROUND_COMPLETE as the effective state requires.
    fn advance_to_evaluation(&mut self) -> Result<(), TransitionError> {
        let effective = self.control.lock().effective_state();
        match effective {
            DebateState::AwaitingOpening => {
                self.apply(LifecycleEvent::ResponsesReceived)?;
                self.apply(LifecycleEvent::RoundComplete)?;
            }
            DebateState::RunningRound => {
                self.apply(LifecycleEvent::RoundComplete)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn apply(&mut self, event: LifecycleEvent) -> Result<(), TransitionError> {
        let name = event.name();
        let (before, after, stop_reason) = {
            let mut lifecycle = self.control.lock();
            let before = lifecycle.state();
            let after = lifecycle.apply(event)?;
            (before, after, lifecycle.stop_reason())
        };
        debug!("Debate {}: {} {} -> {}", self.id, name, before, after);
        if before != after {
            self.events.publish(EventKind::StateChanged {
                state: after,
                round: self.round,
                latest_responses: self.latest_responses.clone(),
                cost: self.accountant.snapshot(),
                stop_reason,
            });
        }
        self.sync_snapshot();
        Ok(())
    }

    fn fail(&mut self, message: String, retryable: bool) {
        error!("Debate {} failed: {}", self.id, message);
        self.halted = true;
        if let Err(e) = self.apply(LifecycleEvent::FatalError { message, retryable }) {
            warn!("Could not record failure: {}", e);
        }
    }

    fn charge(&mut self, model: &ModelId, usage: TokenUsage) -> f64 {
        record_charge(&mut self.accountant, &self.events, model, usage)
    }

    fn report_judge_failures(&self, failures: &[JudgeFailure]) {
        for failure in failures {
            self.events.publish(EventKind::error(
                failure.kind,
                format!("Judge attempt {}: {}", failure.attempt, failure.message),
                true,
            ));
        }
    }

    /// Participants that overflowed their context get a smaller budget next round.
    fn shrink_budgets(&mut self, responses: &[ParticipantResponse]) {
        let default_budget = self.config.context.budget_tokens;
        let factor = self.services.context_shrink_factor;
        for response in responses
            .iter()
            .filter(|r| r.status == ResponseStatus::ContextExceeded)
        {
            let budget = self
                .budgets
                .entry(response.participant_id.clone())
                .or_insert(default_budget);
            *budget = ((*budget as f64) * factor) as usize;
            warn!(
                "Context exceeded for {}; budget reduced to {} tokens",
                response.participant_id, budget
            );
        }
    }

    async fn append_round(&mut self, round: Round) {
        if let Err(e) = self.history.append(round.clone()) {
            error!("Round {} rejected by history: {}", round.number, e);
            return;
        }
        self.sync_snapshot();
        self.persist(PendingWrite::Round(round)).await;
    }

    /// Queue `write` behind any earlier failed writes and flush in order.
    async fn persist(&mut self, write: PendingWrite) {
        self.pending.push_back(write);
        while let Some(write) = self.pending.front() {
            let result = match write {
                PendingWrite::Round(round) => self.services.repository.append_round(self.id, round).await,
                PendingWrite::Verdict(verdict) => {
                    self.services.repository.append_verdict(self.id, verdict).await
                }
            };
            match result {
                Ok(()) => {
                    self.pending.pop_front();
                }
                Err(e) => {
                    warn!(
                        "Persisting {} failed ({} pending): {}",
                        write.describe(),
                        self.pending.len(),
                        e
                    );
                    self.events.publish(EventKind::error(
                        ErrorKind::Persistence,
                        format!("Failed to persist {}: {}", write.describe(), e),
                        true,
                    ));
                    break;
                }
            }
        }
    }

    fn sync_snapshot(&self) {
        let (state, stop_reason, last_error) = {
            let lifecycle = self.control.lock();
            (
                lifecycle.state(),
                lifecycle.stop_reason(),
                lifecycle.last_error().cloned(),
            )
        };
        self.snapshot.send_replace(DebateSnapshot {
            debate_id: self.id,
            state,
            round: self.round,
            history: self.history.clone(),
            cost: self.accountant.snapshot(),
            verdict: self.verdict.clone(),
            stop_reason,
            last_error,
        });
    }
}

/// Price `usage`, publish the new totals and any threshold crossings.
fn record_charge(
    accountant: &mut CostAccountant,
    events: &EventPublisher,
    model: &ModelId,
    usage: TokenUsage,
) -> f64 {
    if usage.is_zero() {
        return 0.0;
    }
    let record = accountant.record_usage(model, usage);
    if record.fallback_pricing {
        warn!("No pricing configured for {}; using fallback rates", model);
    }
    events.publish(EventKind::CostUpdate {
        cost: accountant.snapshot(),
    });
    while let Some(warning) = accountant.check_thresholds() {
        warn!(
            "Cost {} threshold ${:.2} crossed at ${:.4}",
            warning.tier, warning.threshold, warning.cost_at_firing
        );
        events.publish(EventKind::CostWarning { warning });
    }
    record.cost
}

/// Records participant spend as responses land and aborts on a hard breach.
struct CostObserver<'a> {
    accountant: &'a mut CostAccountant,
    events: &'a EventPublisher,
    round: u32,
}

impl RoundObserver for CostObserver<'_> {
    fn on_chunk(&mut self, participant_id: &str, chunk: &str) {
        self.events.publish(EventKind::ParticipantChunk {
            round: self.round,
            participant_id: participant_id.to_string(),
            chunk: chunk.to_string(),
            done: false,
        });
    }

    fn on_response(&mut self, response: &mut ParticipantResponse) -> ObserverDecision {
        response.cost = record_charge(self.accountant, self.events, &response.model, response.usage);
        self.events.publish(EventKind::ParticipantComplete {
            round: self.round,
            response: response.clone(),
            done: true,
        });
        if self.accountant.is_hard_limit_breached() {
            ObserverDecision::Abort
        } else {
            ObserverDecision::Continue
        }
    }
}
