//! Debate Engine
//!
//! The inbound control surface. Each configured debate gets a lifecycle,
//! an event publisher and a [`DebateRunner`] that runs on its own task once
//! started. Control calls (`pause`, `resume`, `stop`, `retry`) act on the
//! shared lifecycle and return the resulting state, or a transition error
//! when the call is not valid from the current state.

use crate::config::EngineParams;
use crate::ports::event_sink::{EventSink, NoEventSink};
use crate::ports::llm_gateway::LlmGateway;
use crate::ports::repository::{DebateRepository, RepositoryError};
use crate::use_cases::context_service::ContextService;
use crate::use_cases::debate_runner::{DebateControl, DebateRunner, DebateSnapshot, RunnerServices};
use crate::use_cases::event_stream::{EventPublisher, EventSubscription};
use crate::use_cases::judge_evaluator::JudgeEvaluator;
use crate::use_cases::round_coordinator::RoundCoordinator;
use quorum_domain::{
    DebateConfiguration, DebateHistory, DebateId, DebateLifecycle, DebateState, DebateTranscript,
    DomainError, ErrorKind, EventKind, ExportFormat, FinalVerdict, LifecycleEvent, PricingTable,
    TransitionError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown debate: {0}")]
    UnknownDebate(DebateId),

    #[error("Debate already registered: {0}")]
    AlreadyExists(DebateId),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] DomainError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Debate task failed: {0}")]
    Task(String),
}

enum RunnerSlot {
    Idle(Box<DebateRunner>),
    Running(JoinHandle<DebateRunner>),
    /// Taken by a retry in progress.
    Detached,
}

struct DebateEntry {
    config: Arc<DebateConfiguration>,
    control: Arc<DebateControl>,
    events: Arc<EventPublisher>,
    snapshot: Arc<watch::Sender<DebateSnapshot>>,
    runner: RunnerSlot,
}

impl DebateEntry {
    fn publish_state(&self, state: DebateState) {
        let stop_reason = self.control.lock().stop_reason();
        self.snapshot.send_modify(|s| {
            s.state = state;
            s.stop_reason = stop_reason;
        });
        let snapshot = self.snapshot.borrow();
        self.events.publish(EventKind::StateChanged {
            state,
            round: snapshot.round,
            latest_responses: snapshot
                .history
                .latest()
                .map(|round| round.responses.clone())
                .unwrap_or_default(),
            cost: snapshot.cost.clone(),
            stop_reason,
        });
    }
}

pub struct DebateEngine {
    services: Arc<RunnerServices>,
    sink: Arc<dyn EventSink>,
    params: EngineParams,
    debates: Mutex<HashMap<DebateId, DebateEntry>>,
}

impl DebateEngine {
    pub fn new(
        gateway: Arc<dyn LlmGateway>,
        repository: Arc<dyn DebateRepository>,
        pricing: PricingTable,
        params: EngineParams,
    ) -> Self {
        let context = Arc::new(ContextService::new(
            Arc::clone(&gateway),
            params.exact_token_counts,
        ));
        let coordinator = Arc::new(RoundCoordinator::new(
            Arc::clone(&gateway),
            Arc::clone(&context),
        ));
        let judge = Arc::new(JudgeEvaluator::new(gateway, context, params.clone()));
        Self {
            services: Arc::new(RunnerServices {
                coordinator,
                judge,
                repository,
                pricing,
                context_shrink_factor: params.context_shrink_factor,
            }),
            sink: Arc::new(NoEventSink),
            params,
            debates: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Register a debate. Validation failures are reported without
    /// creating it.
    pub fn configure(&self, config: DebateConfiguration) -> Result<DebateId, EngineError> {
        config.validate()?;
        let id = DebateId::new();
        let entry = self.new_entry(id, config, DebateLifecycle::new(), DebateHistory::new(), None);
        self.lock().insert(id, entry);
        info!("Configured debate {}", id);
        Ok(id)
    }

    /// Reload a persisted debate. A debate with a stored verdict comes back
    /// `completed`; otherwise it is `configuring` and `start` continues
    /// after the last stored round.
    pub async fn restore(
        &self,
        id: DebateId,
        config: DebateConfiguration,
    ) -> Result<DebateState, EngineError> {
        config.validate()?;
        if self.lock().contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let history = self.services.repository.load_history(id).await?;
        let verdict = self.services.repository.load_verdict(id).await?;
        let lifecycle = match &verdict {
            Some(v) => DebateLifecycle::restored_completed(v.stop_reason),
            None => DebateLifecycle::new(),
        };
        let state = lifecycle.state();
        info!(
            "Restored debate {} with {} round(s) in state {}",
            id,
            history.len(),
            state
        );

        let entry = self.new_entry(id, config, lifecycle, history, verdict);
        let mut debates = self.lock();
        if debates.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        debates.insert(id, entry);
        Ok(state)
    }

    pub fn start(&self, id: DebateId) -> Result<DebateState, EngineError> {
        let mut debates = self.lock();
        let entry = debates.get_mut(&id).ok_or(EngineError::UnknownDebate(id))?;

        let started = entry.control.lock().start(&entry.config);
        let state = match started {
            Ok(state) => state,
            Err(e) => {
                if let TransitionError::Validation(domain) = &e {
                    entry.events.publish(EventKind::error(
                        ErrorKind::Validation,
                        domain.to_string(),
                        false,
                    ));
                    entry.publish_state(DebateState::Error);
                }
                return Err(e.into());
            }
        };
        entry.publish_state(state);

        match std::mem::replace(&mut entry.runner, RunnerSlot::Detached) {
            RunnerSlot::Idle(runner) => {
                entry.runner = RunnerSlot::Running(tokio::spawn(runner.run()));
            }
            other => entry.runner = other,
        }
        info!("Started debate {}", id);
        Ok(state)
    }

    pub fn pause(&self, id: DebateId) -> Result<DebateState, EngineError> {
        self.control(id, |entry| {
            let state = entry.control.lock().apply(LifecycleEvent::Pause)?;
            entry.publish_state(state);
            Ok(state)
        })
    }

    pub fn resume(&self, id: DebateId) -> Result<DebateState, EngineError> {
        self.control(id, |entry| {
            let state = entry.control.lock().apply(LifecycleEvent::Resume)?;
            entry.control.wake();
            entry.publish_state(state);
            Ok(state)
        })
    }

    /// Stop after the in-flight round; from `paused`, go straight to final
    /// judging.
    pub fn stop(&self, id: DebateId) -> Result<DebateState, EngineError> {
        self.control(id, |entry| {
            let (before, state) = {
                let mut lifecycle = entry.control.lock();
                let before = lifecycle.state();
                (before, lifecycle.request_stop()?)
            };
            if state != before {
                entry.control.wake();
                entry.publish_state(state);
            }
            Ok(state)
        })
    }

    /// Leave `error` and run again from the recorded history.
    pub async fn retry(&self, id: DebateId) -> Result<DebateState, EngineError> {
        let slot = {
            let mut debates = self.lock();
            let entry = debates.get_mut(&id).ok_or(EngineError::UnknownDebate(id))?;
            if entry.control.state() != DebateState::Error {
                return Err(TransitionError::InvalidTransition {
                    state: entry.control.state(),
                    event: LifecycleEvent::Retry.name(),
                }
                .into());
            }
            std::mem::replace(&mut entry.runner, RunnerSlot::Detached)
        };

        // The runner exits right after moving to `error`.
        let runner = match slot {
            RunnerSlot::Idle(runner) => runner,
            RunnerSlot::Running(handle) => match handle.await {
                Ok(runner) => Box::new(runner),
                Err(e) => return Err(EngineError::Task(e.to_string())),
            },
            RunnerSlot::Detached => {
                return Err(EngineError::Task("retry already in progress".into()));
            }
        };

        let mut debates = self.lock();
        let entry = debates.get_mut(&id).ok_or(EngineError::UnknownDebate(id))?;
        let retried = entry.control.lock().apply(LifecycleEvent::Retry);
        match retried {
            Ok(state) => {
                entry.publish_state(state);
                entry.runner = RunnerSlot::Running(tokio::spawn(runner.run()));
                info!("Retrying debate {}", id);
                Ok(state)
            }
            Err(e) => {
                warn!("Retry of debate {} refused: {}", id, e);
                entry.runner = RunnerSlot::Idle(runner);
                Err(e.into())
            }
        }
    }

    pub fn subscribe(&self, id: DebateId) -> Result<EventSubscription, EngineError> {
        self.with_entry(id, |entry| entry.events.subscribe())
    }

    /// Events with a sequence number greater than `after`.
    pub fn subscribe_after(&self, id: DebateId, after: u64) -> Result<EventSubscription, EngineError> {
        self.with_entry(id, |entry| entry.events.subscribe_after(after))
    }

    pub fn state(&self, id: DebateId) -> Result<DebateState, EngineError> {
        self.with_entry(id, |entry| entry.control.state())
    }

    pub fn snapshot(&self, id: DebateId) -> Result<DebateSnapshot, EngineError> {
        self.with_entry(id, |entry| {
            let mut snapshot = entry.snapshot.borrow().clone();
            snapshot.state = entry.control.state();
            snapshot
        })
    }

    pub fn config(&self, id: DebateId) -> Result<Arc<DebateConfiguration>, EngineError> {
        self.with_entry(id, |entry| Arc::clone(&entry.config))
    }

    /// Wait until the debate reaches `completed` or `error`.
    pub async fn wait(&self, id: DebateId) -> Result<DebateSnapshot, EngineError> {
        let mut receiver = self.with_entry(id, |entry| entry.snapshot.subscribe())?;
        let snapshot = receiver
            .wait_for(|s| s.state.is_terminal())
            .await
            .map_err(|e| EngineError::Task(e.to_string()))?;
        Ok(snapshot.clone())
    }

    pub fn export(&self, id: DebateId, format: ExportFormat) -> Result<String, EngineError> {
        let (config, snapshot) = self.with_entry(id, |entry| {
            (Arc::clone(&entry.config), entry.snapshot.borrow().clone())
        })?;
        DebateTranscript::new(id, &config, &snapshot.history, snapshot.verdict.as_ref())
            .render(format)
            .map_err(|e| EngineError::Export(e.to_string()))
    }

    fn new_entry(
        &self,
        id: DebateId,
        config: DebateConfiguration,
        lifecycle: DebateLifecycle,
        history: DebateHistory,
        verdict: Option<FinalVerdict>,
    ) -> DebateEntry {
        let config = Arc::new(config);
        let stop_reason = lifecycle.stop_reason();
        let control = Arc::new(DebateControl::new(lifecycle));
        let events = Arc::new(EventPublisher::new(
            id,
            self.params.event_buffer,
            Arc::clone(&self.sink),
        ));

        let mut initial = DebateSnapshot::new(id, control.state(), history.clone());
        initial.verdict = verdict.clone();
        initial.stop_reason = stop_reason;
        let (snapshot, _) = watch::channel(initial);
        let snapshot = Arc::new(snapshot);

        let runner = DebateRunner::new(
            id,
            Arc::clone(&config),
            history,
            Arc::clone(&self.services),
            Arc::clone(&control),
            Arc::clone(&events),
            Arc::clone(&snapshot),
        )
        .with_verdict(verdict);
        snapshot.send_modify(|s| s.cost = runner.cost_snapshot());

        DebateEntry {
            config,
            control,
            events,
            snapshot,
            runner: RunnerSlot::Idle(Box::new(runner)),
        }
    }

    fn control(
        &self,
        id: DebateId,
        f: impl FnOnce(&DebateEntry) -> Result<DebateState, EngineError>,
    ) -> Result<DebateState, EngineError> {
        let debates = self.lock();
        let entry = debates.get(&id).ok_or(EngineError::UnknownDebate(id))?;
        f(entry)
    }

    fn with_entry<T>(&self, id: DebateId, f: impl FnOnce(&DebateEntry) -> T) -> Result<T, EngineError> {
        let debates = self.lock();
        debates.get(&id).map(f).ok_or(EngineError::UnknownDebate(id))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DebateId, DebateEntry>> {
        self.debates.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
