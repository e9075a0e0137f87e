// src/progress.rs
// =============================================================================
// Streams run state to whoever is watching (the /progress-stream endpoint).
//
// Built on a tokio broadcast channel:
// - every subscriber gets every event published after it subscribed
// - events arrive in publish order
// - a subscriber that connects mid-run misses what came before; the next
//   event still tells it where the run is (current/total)
//
// A subscriber that waits longer than the idle window gets a KeepAlive
// instead of an event, and stops reading once it has seen `complete`.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::model::Dataset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Starting,
    Fetching,
    Checking,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub state: RunState,
    pub message: String,
    pub current: usize,
    pub total: usize,
    pub dataset: Option<Dataset>,
}

impl ProgressEvent {
    pub fn is_complete(&self) -> bool {
        self.state == RunState::Complete
    }
}

// What a subscriber gets from one read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Event(ProgressEvent),
    /// Nothing happened within the idle window
    KeepAlive,
    /// The subscriber fell behind and `n` events were overwritten
    Lagged(u64),
    /// Every publisher is gone
    Closed,
}

#[derive(Debug, Clone)]
pub struct ProgressChannel {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: ProgressEvent) {
        log::debug!("progress: {:?} {} ({}/{})", event.state, event.message, event.current, event.total);
        // send() only fails when nobody is subscribed, which is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> ProgressSubscription {
        ProgressSubscription {
            receiver: self.sender.subscribe(),
            finished: false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new(4096)
    }
}

// One connected reader. Dropping it disconnects.
#[derive(Debug)]
pub struct ProgressSubscription {
    receiver: broadcast::Receiver<ProgressEvent>,
    finished: bool,
}

impl ProgressSubscription {
    // Waits up to `idle` for the next event
    pub async fn next(&mut self, idle: Duration) -> Delivery {
        if self.finished {
            return Delivery::Closed;
        }

        match tokio::time::timeout(idle, self.receiver.recv()).await {
            Err(_) => Delivery::KeepAlive,
            Ok(Ok(event)) => {
                if event.is_complete() {
                    self.finished = true;
                }
                Delivery::Event(event)
            }
            Ok(Err(RecvError::Lagged(missed))) => {
                log::warn!("Progress subscriber lagged, {} events overwritten", missed);
                Delivery::Lagged(missed)
            }
            Ok(Err(RecvError::Closed)) => {
                self.finished = true;
                Delivery::Closed
            }
        }
    }

    /// True once a `complete` event has been delivered
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(state: RunState, current: usize) -> ProgressEvent {
        ProgressEvent {
            state,
            message: String::new(),
            current,
            total: 2,
            dataset: Some(Dataset::Eforms),
        }
    }

    const IDLE: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_events_arrive_in_order_until_complete() {
        let channel = ProgressChannel::default();
        let mut sub = channel.subscribe();

        channel.publish(event(RunState::Checking, 1));
        channel.publish(event(RunState::Checking, 2));
        channel.publish(event(RunState::Complete, 0));
        channel.publish(event(RunState::Starting, 0));

        assert_eq!(sub.next(IDLE).await, Delivery::Event(event(RunState::Checking, 1)));
        assert_eq!(sub.next(IDLE).await, Delivery::Event(event(RunState::Checking, 2)));
        assert_eq!(sub.next(IDLE).await, Delivery::Event(event(RunState::Complete, 0)));
        assert!(sub.is_finished());
        assert_eq!(sub.next(IDLE).await, Delivery::Closed);
    }

    #[tokio::test]
    async fn test_idle_subscriber_gets_keep_alive() {
        let channel = ProgressChannel::default();
        let mut sub = channel.subscribe();
        assert_eq!(sub.next(IDLE).await, Delivery::KeepAlive);

        channel.publish(event(RunState::Fetching, 0));
        assert_eq!(sub.next(IDLE).await, Delivery::Event(event(RunState::Fetching, 0)));
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_every_event() {
        let channel = ProgressChannel::default();
        let mut first = channel.subscribe();
        let mut second = channel.subscribe();
        assert_eq!(channel.subscriber_count(), 2);

        channel.publish(event(RunState::Checking, 1));
        assert_eq!(first.next(IDLE).await, Delivery::Event(event(RunState::Checking, 1)));
        assert_eq!(second.next(IDLE).await, Delivery::Event(event(RunState::Checking, 1)));
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let channel = ProgressChannel::default();
        channel.publish(event(RunState::Checking, 1));

        let mut late = channel.subscribe();
        assert_eq!(late.next(IDLE).await, Delivery::KeepAlive);
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_told_it_lagged() {
        let channel = ProgressChannel::new(2);
        let mut sub = channel.subscribe();
        for i in 1..=4 {
            channel.publish(event(RunState::Checking, i));
        }
        assert_eq!(sub.next(IDLE).await, Delivery::Lagged(2));
        assert_eq!(sub.next(IDLE).await, Delivery::Event(event(RunState::Checking, 3)));
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(event(RunState::Complete, 0)).unwrap();
        assert_eq!(json["state"], "complete");
        assert_eq!(json["dataset"], "eforms");
        assert_eq!(json["total"], 2);
    }
}
