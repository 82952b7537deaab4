//! Per-debate progress event publication with replay.
//!
//! Every published event gets the next sequence number, goes to the
//! [`EventSink`], into a bounded replay buffer, and out on a broadcast
//! channel. Subscribers first drain the buffered events after their cursor,
//! then follow the live channel; the stream ends after a terminal state
//! event that no later state change has superseded (an `error` followed by
//! a retry does not end a replay).

use crate::ports::event_sink::EventSink;
use futures::Stream;
use quorum_domain::{DebateId, EventKind, ProgressEvent};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::warn;

const LIVE_CHANNEL_CAPACITY: usize = 1024;

struct PublisherState {
    last_sequence: u64,
    replay: VecDeque<ProgressEvent>,
}

pub struct EventPublisher {
    debate_id: DebateId,
    state: Mutex<PublisherState>,
    sender: broadcast::Sender<ProgressEvent>,
    sink: Arc<dyn EventSink>,
    capacity: usize,
}

impl EventPublisher {
    pub fn new(debate_id: DebateId, capacity: usize, sink: Arc<dyn EventSink>) -> Self {
        let (sender, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
        Self {
            debate_id,
            state: Mutex::new(PublisherState {
                last_sequence: 0,
                replay: VecDeque::new(),
            }),
            sender,
            sink,
            capacity: capacity.max(1),
        }
    }

    pub fn debate_id(&self) -> DebateId {
        self.debate_id
    }

    pub fn last_sequence(&self) -> u64 {
        self.lock().last_sequence
    }

    pub fn publish(&self, kind: EventKind) -> ProgressEvent {
        let mut state = self.lock();
        state.last_sequence += 1;
        let event = ProgressEvent::new(state.last_sequence, self.debate_id, kind);

        state.replay.push_back(event.clone());
        while state.replay.len() > self.capacity {
            state.replay.pop_front();
        }
        self.sink.record(&event);
        // No receivers is fine; late subscribers replay from the buffer.
        let _ = self.sender.send(event.clone());
        event
    }

    /// All retained events from the beginning.
    pub fn subscribe(self: &Arc<Self>) -> EventSubscription {
        self.subscribe_after(0)
    }

    /// Retained events with `sequence > after`, then live events.
    pub fn subscribe_after(self: &Arc<Self>, after: u64) -> EventSubscription {
        let state = self.lock();
        let backlog = Self::events_after(&state, after);
        let live = self.sender.subscribe();
        drop(state);

        EventSubscription {
            publisher: Arc::clone(self),
            backlog,
            live,
            cursor: after,
            finished: false,
        }
    }

    /// A state change was published after `sequence`.
    fn state_changed_after(&self, sequence: u64) -> bool {
        self.lock()
            .replay
            .iter()
            .any(|e| e.sequence > sequence && matches!(e.kind, EventKind::StateChanged { .. }))
    }

    fn events_after(state: &PublisherState, after: u64) -> VecDeque<ProgressEvent> {
        state
            .replay
            .iter()
            .filter(|e| e.sequence > after)
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, PublisherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A subscriber's view of one debate's events.
pub struct EventSubscription {
    publisher: Arc<EventPublisher>,
    backlog: VecDeque<ProgressEvent>,
    live: broadcast::Receiver<ProgressEvent>,
    cursor: u64,
    finished: bool,
}

impl EventSubscription {
    /// Sequence number of the last event handed out.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Next event, or `None` once the latest terminal state event has been
    /// delivered.
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        if self.finished {
            return None;
        }
        loop {
            let event = match self.backlog.pop_front() {
                Some(event) => event,
                None => match self.live.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            "Subscriber lagged by {} events; refilling from replay buffer",
                            skipped
                        );
                        let state = self.publisher.lock();
                        self.backlog = EventPublisher::events_after(&state, self.cursor);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        self.finished = true;
                        return None;
                    }
                },
            };

            // Live events already delivered from the backlog are skipped.
            if event.sequence <= self.cursor {
                continue;
            }
            self.cursor = event.sequence;
            if event.is_terminal() && !self.publisher.state_changed_after(event.sequence) {
                self.finished = true;
            }
            return Some(event);
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next_event().await.map(|event| (event, sub))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::event_sink::NoEventSink;
    use futures::StreamExt;
    use quorum_domain::{
        CostSnapshot, DebateHistory, DebateState, ErrorKind, FinalVerdict, StopReason,
    };

    fn publisher(capacity: usize) -> Arc<EventPublisher> {
        Arc::new(EventPublisher::new(
            DebateId::new(),
            capacity,
            Arc::new(NoEventSink),
        ))
    }

    fn state(state: DebateState) -> EventKind {
        EventKind::StateChanged {
            state,
            round: 1,
            latest_responses: vec![],
            cost: CostSnapshot::default(),
            stop_reason: None,
        }
    }

    #[tokio::test]
    async fn test_sequences_strictly_increase() {
        let p = publisher(16);
        let a = p.publish(state(DebateState::Initializing));
        let b = p.publish(EventKind::error(ErrorKind::Persistence, "disk", true));
        assert_eq!(a.sequence, 1);
        assert_eq!(b.sequence, 2);
        assert_eq!(p.last_sequence(), 2);
    }

    #[tokio::test]
    async fn test_subscribe_after_replays_then_follows_live() {
        let p = publisher(16);
        p.publish(state(DebateState::Initializing));
        p.publish(state(DebateState::AwaitingOpening));
        p.publish(state(DebateState::RunningRound));

        let mut sub = p.subscribe_after(1);
        assert_eq!(sub.next_event().await.unwrap().sequence, 2);
        assert_eq!(sub.next_event().await.unwrap().sequence, 3);

        p.publish(state(DebateState::Completed));
        let last = sub.next_event().await.unwrap();
        assert_eq!(last.sequence, 4);
        assert!(last.is_terminal());
        assert!(sub.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_ends_after_terminal_event() {
        let p = publisher(16);
        p.publish(state(DebateState::Initializing));
        p.publish(state(DebateState::Error));

        let events: Vec<ProgressEvent> = p.subscribe().into_stream().collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_terminal());
    }

    #[tokio::test]
    async fn test_replay_runs_past_error_that_was_retried() {
        let p = publisher(32);
        p.publish(state(DebateState::RunningRound));
        p.publish(state(DebateState::Error));
        p.publish(state(DebateState::Initializing));
        p.publish(state(DebateState::JudgingFinal));
        p.publish(EventKind::VerdictReady {
            verdict: FinalVerdict::from_scores(
                &DebateHistory::new(),
                &[],
                StopReason::RoundLimit,
                CostSnapshot::default(),
            ),
        });
        p.publish(state(DebateState::Completed));

        for sub in [p.subscribe(), p.subscribe_after(1)] {
            let events: Vec<ProgressEvent> = sub.into_stream().collect().await;
            assert!(events.iter().any(|e| matches!(e.kind, EventKind::VerdictReady { .. })));
            assert_eq!(events.last().unwrap().sequence, 6);
        }
    }

    #[tokio::test]
    async fn test_live_error_ends_stream_until_retry() {
        let p = publisher(32);
        let mut sub = p.subscribe();
        p.publish(state(DebateState::Error));
        assert!(sub.next_event().await.unwrap().is_terminal());
        assert!(sub.next_event().await.is_none());

        p.publish(state(DebateState::Initializing));
        let mut resumed = p.subscribe_after(sub.cursor());
        assert_eq!(resumed.next_event().await.unwrap().sequence, 2);
    }

    #[tokio::test]
    async fn test_replay_buffer_is_bounded() {
        let p = publisher(2);
        for _ in 0..5 {
            p.publish(EventKind::error(ErrorKind::Persistence, "disk", true));
        }
        let mut sub = p.subscribe();
        assert_eq!(sub.next_event().await.unwrap().sequence, 4);
        assert_eq!(sub.next_event().await.unwrap().sequence, 5);
        assert_eq!(sub.cursor(), 5);
    }
}
