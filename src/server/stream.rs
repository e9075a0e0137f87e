// src/server/stream.rs
// =============================================================================
// Turns a progress subscription into Server-Sent Event frames.
//
// - every ProgressEvent becomes a `data:` frame with the event as JSON
// - an idle window without events produces a `:keep-alive` comment
// - the stream ends after a `complete` event, when the channel closes, or
//   when nothing but keep-alives has been sent for the idle ceiling
// =============================================================================

use futures::stream::{self, Stream};
use std::time::Duration;
use tokio::time::Instant;

use crate::progress::{Delivery, ProgressSubscription};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data(String),
    Comment(String),
}

pub fn frames(
    subscription: ProgressSubscription,
    idle: Duration,
    ceiling: Duration,
) -> impl Stream<Item = Frame> {
    stream::unfold(
        (subscription, Instant::now()),
        move |(mut sub, mut last_event)| async move {
            loop {
                match sub.next(idle).await {
                    Delivery::Event(event) => {
                        last_event = Instant::now();
                        if sub.is_finished() {
                            log::debug!("Run complete, progress stream ends after this frame");
                        }
                        match serde_json::to_string(&event) {
                            Ok(json) => return Some((Frame::Data(json), (sub, last_event))),
                            Err(e) => log::warn!("Could not encode progress event: {}", e),
                        }
                    }
                    Delivery::KeepAlive => {
                        if last_event.elapsed() >= ceiling {
                            log::debug!("Progress stream idle for {:?}, closing", ceiling);
                            return None;
                        }
                        return Some((Frame::Comment("keep-alive".to_string()), (sub, last_event)));
                    }
                    Delivery::Lagged(missed) => {
                        return Some((
                            Frame::Comment(format!("lagged {}", missed)),
                            (sub, last_event),
                        ));
                    }
                    Delivery::Closed => return None,
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dataset;
    use crate::progress::{ProgressChannel, ProgressEvent, RunState};
    use futures::StreamExt;

    fn event(state: RunState) -> ProgressEvent {
        ProgressEvent {
            state,
            message: "m".to_string(),
            current: 0,
            total: 0,
            dataset: Some(Dataset::Services),
        }
    }

    #[tokio::test]
    async fn test_stream_ends_after_complete() {
        let channel = ProgressChannel::default();
        let stream = frames(
            channel.subscribe(),
            Duration::from_millis(50),
            Duration::from_secs(60),
        );
        channel.publish(event(RunState::Fetching));
        channel.publish(event(RunState::Complete));

        let collected: Vec<Frame> = stream.collect().await;
        assert_eq!(collected.len(), 2);
        match &collected[1] {
            Frame::Data(json) => assert!(json.contains("\"state\":\"complete\"")),
            other => panic!("expected data frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_keep_alive_then_idle_ceiling() {
        let channel = ProgressChannel::default();
        let stream = frames(
            channel.subscribe(),
            Duration::from_millis(20),
            Duration::from_millis(70),
        );

        let collected: Vec<Frame> = stream.collect().await;
        assert!(!collected.is_empty());
        assert!(collected
            .iter()
            .all(|f| *f == Frame::Comment("keep-alive".to_string())));
    }
}
