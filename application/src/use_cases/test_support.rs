//! Scripted doubles shared by the use case tests.

use crate::ports::llm_gateway::{GatewayError, LlmGateway, LlmRequest, StreamHandle};
use crate::ports::repository::{DebateRepository, RepositoryError};
use async_trait::async_trait;
use quorum_domain::{
    Completion, DebateConfiguration, DebateFormat, DebateHistory, DebateId, FinalVerdict,
    JudgeSpec, ModelId, ParticipantResponse, ParticipantSpec, Round, StreamEvent, TokenUsage,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Queue key used when no model-specific script is left.
const ANY_MODEL: &str = "*";

pub struct Script {
    pub result: Result<Completion, GatewayError>,
    pub delay: Option<Duration>,
}

/// Gateway answering from per-model queues of scripted results.
///
/// Models with an empty queue get a generic reply so long debates need only
/// the interesting turns scripted.
pub struct ScriptedGateway {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    requests: Mutex<Vec<LlmRequest>>,
    calls: AtomicUsize,
    token_count: Option<usize>,
    chunked: AtomicBool,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            token_count: None,
            chunked: AtomicBool::new(false),
        }
    }

    pub fn with_token_count(mut self, count: usize) -> Self {
        self.token_count = Some(count);
        self
    }

    /// Stream completions as word chunks instead of one final event.
    pub fn with_chunked_streaming(self) -> Self {
        self.chunked.store(true, Ordering::SeqCst);
        self
    }

    pub fn push(&self, model: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(script);
    }

    pub fn push_reply(&self, model: &str, text: &str, usage: TokenUsage) {
        self.push(
            model,
            Script {
                result: Ok(Completion::new(text, usage)),
                delay: None,
            },
        );
    }

    pub fn push_model_error(&self, model: &str, error: GatewayError) {
        self.push(
            model,
            Script {
                result: Err(error),
                delay: None,
            },
        );
    }

    pub fn push_delayed(&self, model: &str, text: &str, delay: Duration) {
        self.push(
            model,
            Script {
                result: Ok(Completion::new(text, TokenUsage::new(100, 50))),
                delay: Some(delay),
            },
        );
    }

    /// Reply for whichever model asks next.
    pub fn push_text(&self, text: &str) {
        self.push_reply(ANY_MODEL, text, TokenUsage::new(100, 50));
    }

    pub fn push_error(&self, error: GatewayError) {
        self.push_model_error(ANY_MODEL, error);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, model: &str) -> Vec<LlmRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.model.as_str() == model)
            .collect()
    }

    fn next_script(&self, model: &ModelId) -> Script {
        let mut scripts = self.scripts.lock().unwrap();
        for key in [model.as_str(), ANY_MODEL] {
            if let Some(script) = scripts.get_mut(key).and_then(VecDeque::pop_front) {
                return script;
            }
        }
        Script {
            result: Ok(Completion::new(
                format!("{} argues its case.", model),
                TokenUsage::new(100, 50),
            )),
            delay: None,
        }
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    async fn invoke(&self, request: &LlmRequest) -> Result<Completion, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let script = self.next_script(&request.model);
        if let Some(delay) = script.delay {
            tokio::time::sleep(delay).await;
        }
        script.result
    }

    async fn invoke_streaming(&self, request: &LlmRequest) -> Result<StreamHandle, GatewayError> {
        let completion = self.invoke(request).await?;
        let (tx, rx) = mpsc::channel(64);
        if self.chunked.load(Ordering::SeqCst) {
            for word in completion.text.split_inclusive(' ') {
                let _ = tx.send(StreamEvent::Delta(word.to_string())).await;
            }
            let _ = tx
                .send(StreamEvent::Completed(Completion::new("", completion.usage)))
                .await;
        } else {
            let _ = tx.send(StreamEvent::Completed(completion)).await;
        }
        Ok(StreamHandle::new(rx))
    }

    async fn count_tokens(&self, _model: &ModelId, _text: &str) -> Option<usize> {
        self.token_count
    }
}

/// Repository keeping everything in memory, with switchable write failures.
#[derive(Default)]
pub struct MemoryRepository {
    rounds: Mutex<HashMap<DebateId, Vec<Round>>>,
    verdicts: Mutex<HashMap<DebateId, FinalVerdict>>,
    pub failing: AtomicBool,
}

impl MemoryRepository {
    pub fn rounds_for(&self, id: DebateId) -> Vec<Round> {
        self.rounds.lock().unwrap().get(&id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl DebateRepository for MemoryRepository {
    async fn append_round(&self, debate_id: DebateId, round: &Round) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("disk full".into()));
        }
        self.rounds
            .lock()
            .unwrap()
            .entry(debate_id)
            .or_default()
            .push(round.clone());
        Ok(())
    }

    async fn append_verdict(
        &self,
        debate_id: DebateId,
        verdict: &FinalVerdict,
    ) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("disk full".into()));
        }
        self.verdicts.lock().unwrap().insert(debate_id, verdict.clone());
        Ok(())
    }

    async fn load_history(&self, debate_id: DebateId) -> Result<DebateHistory, RepositoryError> {
        DebateHistory::from_rounds(self.rounds_for(debate_id)).map_err(|e| RepositoryError::Corrupt {
            debate_id,
            message: e.to_string(),
        })
    }

    async fn load_verdict(
        &self,
        debate_id: DebateId,
    ) -> Result<Option<FinalVerdict>, RepositoryError> {
        Ok(self.verdicts.lock().unwrap().get(&debate_id).cloned())
    }
}

/// Two participants on distinct models, judged by `judge`.
pub fn config() -> DebateConfiguration {
    DebateConfiguration::new(
        "Should cities ban cars from downtown?",
        vec![
            ParticipantSpec::new("pro", "model-a", "Ban cars downtown").with_display_name("Alice"),
            ParticipantSpec::new("con", "model-b", "Keep cars downtown").with_display_name("Bob"),
        ],
        JudgeSpec::new("judge"),
    )
    .with_format(DebateFormat::RoundLimited)
    .with_max_rounds(3)
}

pub fn round_with_text(number: u32, text: &str) -> Round {
    let c = config();
    Round::new(
        number,
        None,
        vec![ParticipantResponse::completed(
            &c.participants[0],
            text,
            TokenUsage::new(10, 10),
            1,
        )],
    )
}

/// Judge JSON scoring every rubric criterion with the same value per participant.
pub fn assessment_json(scores: &[(&str, f64)], should_continue: bool, flags: &[&str]) -> String {
    let rubric = config().judge.rubric;
    let scores: Vec<serde_json::Value> = scores
        .iter()
        .map(|(id, score)| {
            let criteria: serde_json::Map<String, serde_json::Value> = rubric
                .criterion_names()
                .map(|n| (n.to_string(), serde_json::json!(score)))
                .collect();
            serde_json::json!({"participant_id": id, "criteria": criteria})
        })
        .collect();
    let flag = |name: &str| flags.contains(&name);
    serde_json::json!({
        "scores": scores,
        "summary": "Both sides made their case.",
        "should_continue": should_continue,
        "flags": {
            "repetition_detected": flag("repetition_detected"),
            "topic_drift": flag("topic_drift"),
            "convergence_reached": flag("convergence_reached"),
            "diminishing_returns": flag("diminishing_returns"),
        }
    })
    .to_string()
}

pub fn verdict_json(winner: Option<&str>) -> String {
    serde_json::json!({
        "summary": "A close debate.",
        "key_points": ["Congestion", "Local business"],
        "agreements": ["Air quality matters"],
        "disagreements": ["Economic impact"],
        "winner": winner,
        "justification": "Consistently higher rubric scores.",
    })
    .to_string()
}
