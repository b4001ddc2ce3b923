//! Deterministic provider for tests.
//!
//! Plays back a fixed list of events with an optional failure injected at
//! a given position. Useful for exercising the executor and the stream
//! registry without a network.

use std::sync::Mutex;

use cr_domain::error::{Error, Result};
use cr_domain::stream::{BoxStream, ModelEvent};

use crate::traits::{ChatRequest, ModelProvider};

pub struct ScriptedProvider {
    /// Consumed on the first request.
    script: Mutex<Vec<Result<ModelEvent>>>,
}

impl ScriptedProvider {
    /// Provider that streams the given events and finishes.
    pub fn new(events: Vec<ModelEvent>) -> Self {
        Self {
            script: Mutex::new(events.into_iter().map(Ok).collect()),
        }
    }

    /// Provider that streams `events` and then fails with `message`.
    pub fn failing_after(events: Vec<ModelEvent>, message: impl Into<String>) -> Self {
        let mut script: Vec<Result<ModelEvent>> =
            events.into_iter().map(Ok).collect();
        script.push(Err(Error::Provider {
            provider: "scripted".into(),
            message: message.into(),
        }));
        Self {
            script: Mutex::new(script),
        }
    }
}

#[async_trait::async_trait]
impl ModelProvider for ScriptedProvider {
    async fn stream_chat(
        &self,
        _req: ChatRequest,
    ) -> Result<BoxStream<'static, Result<ModelEvent>>> {
        let events: Vec<Result<ModelEvent>> =
            std::mem::take(&mut *self.script.lock().unwrap());
        Ok(Box::pin(async_stream::stream! {
            for event in events {
                // Yield point so subscribers interleave like a real stream.
                tokio::task::yield_now().await;
                yield event;
            }
        }))
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn plays_back_script_once() {
        let provider = ScriptedProvider::new(vec![
            ModelEvent::TextDelta { text: "a".into() },
            ModelEvent::Finish {
                usage: None,
                finish_reason: Some("stop".into()),
            },
        ]);

        let mut stream = provider.stream_chat(ChatRequest::default()).await.unwrap();
        let mut count = 0;
        while let Some(ev) = stream.next().await {
            ev.unwrap();
            count += 1;
        }
        assert_eq!(count, 2);

        // A second request sees an empty script.
        let mut stream = provider.stream_chat(ChatRequest::default()).await.unwrap();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn failure_is_last_item() {
        let provider = ScriptedProvider::failing_after(
            vec![ModelEvent::TextDelta { text: "x".into() }],
            "socket reset",
        );
        let mut stream = provider.stream_chat(ChatRequest::default()).await.unwrap();
        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
