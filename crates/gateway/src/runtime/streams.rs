//! Resumable response stream buffers.
//!
//! Every turn's outbound SSE bytes are appended to an in-memory buffer
//! keyed by stream ID. Viewers subscribe at an offset and receive the
//! buffered chunks followed by live ones, so a dropped connection can
//! reattach without losing output. Exactly one pump task writes per
//! stream; viewer disconnects never cancel it.
//!
//! The registry is an explicitly constructed object living in `AppState`,
//! not a process-global. Producers push through the pump; consumers only
//! ever read, which keeps chunk delivery free of torn reads (chunks are
//! `Bytes` handles cloned whole under a read lock).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::StreamExt;
use parking_lot::RwLock;
use tokio::sync::Notify;

use cr_domain::error::{Error, Result};
use cr_domain::stream::{BoxStream, StreamStatus};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct EntryState {
    chunks: Vec<Bytes>,
    status: StreamStatus,
}

pub struct StreamEntry {
    stream_id: String,
    chat_id: String,
    created_at: Instant,
    state: RwLock<EntryState>,
    notify: Notify,
    /// Carries a permit, so an abort lands even before the pump's next poll.
    cancelled: Notify,
    subscribers: AtomicUsize,
}

impl StreamEntry {
    pub fn status(&self) -> StreamStatus {
        self.state.read().status
    }

    pub fn chunk_count(&self) -> usize {
        self.state.read().chunks.len()
    }

    fn set_status(&self, status: StreamStatus) {
        self.state.write().status = status;
        self.notify.notify_waiters();
    }

    /// Append-only; called by the pump task only. The first chunk moves
    /// the stream out of `Pending`.
    fn push_chunk(&self, chunk: Bytes) {
        let mut state = self.state.write();
        if state.status == StreamStatus::Pending {
            state.status = StreamStatus::Active;
        }
        state.chunks.push(chunk);
        drop(state);
        self.notify.notify_waiters();
    }
}

/// Decrements the subscriber count when a viewer stream is dropped.
struct SubscriberGuard(Arc<StreamEntry>);

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.0.subscribers.fetch_sub(1, Ordering::SeqCst);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct StreamRegistry {
    streams: RwLock<HashMap<String, Arc<StreamEntry>>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a buffer and spawn its single pump over `source`.
    ///
    /// The pump appends every chunk and on clean end marks the stream
    /// complete. Finished buffers stay replayable for late subscribers
    /// until the chat's next turn starts or the age sweeper runs. A
    /// source error discards the buffer entirely: partial output is
    /// never served as a completed response.
    pub fn start(
        self: &Arc<Self>,
        stream_id: &str,
        chat_id: &str,
        source: BoxStream<'static, Result<Bytes>>,
    ) -> Result<()> {
        // A new turn supersedes whatever finished buffers the chat has.
        self.clear_completed_for_chat(chat_id);

        let entry = {
            let mut streams = self.streams.write();
            if streams.contains_key(stream_id) {
                return Err(Error::Stream(format!("stream {stream_id} already exists")));
            }
            let entry = Arc::new(StreamEntry {
                stream_id: stream_id.to_owned(),
                chat_id: chat_id.to_owned(),
                created_at: Instant::now(),
                state: RwLock::new(EntryState {
                    chunks: Vec::new(),
                    status: StreamStatus::Pending,
                }),
                notify: Notify::new(),
                cancelled: Notify::new(),
                subscribers: AtomicUsize::new(0),
            });
            streams.insert(stream_id.to_owned(), entry.clone());
            entry
        };

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut source = source;
            loop {
                tokio::select! {
                    _ = entry.cancelled.notified() => {
                        tracing::info!(
                            stream_id = %entry.stream_id,
                            chat_id = %entry.chat_id,
                            "stream aborted, buffered output stands"
                        );
                        entry.set_status(StreamStatus::Complete);
                        return;
                    }
                    item = source.next() => match item {
                        Some(Ok(chunk)) => entry.push_chunk(chunk),
                        Some(Err(e)) => {
                            tracing::warn!(
                                stream_id = %entry.stream_id,
                                chat_id = %entry.chat_id,
                                error = %e,
                                "stream pump failed, discarding buffer"
                            );
                            registry.fail(&entry.stream_id);
                            return;
                        }
                        None => break,
                    },
                }
            }
            registry.mark_complete(&entry.stream_id);
        });

        Ok(())
    }

    /// Attach a viewer at a chunk offset. Buffered chunks are replayed
    /// first, then live chunks until the stream reaches a terminal status.
    pub fn subscribe(
        &self,
        stream_id: &str,
        from_offset: usize,
    ) -> Option<BoxStream<'static, Bytes>> {
        let entry = self.streams.read().get(stream_id).cloned()?;
        entry.subscribers.fetch_add(1, Ordering::SeqCst);
        let guard = SubscriberGuard(entry.clone());

        let mut next = from_offset;
        Some(Box::pin(async_stream::stream! {
            let _guard = guard;
            loop {
                // Register for wakeups before reading, so a chunk landing
                // between the read and the await is not missed.
                let notified = entry.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                let (batch, terminal) = {
                    let state = entry.state.read();
                    let batch: Vec<Bytes> =
                        state.chunks.get(next..).map(<[Bytes]>::to_vec).unwrap_or_default();
                    (batch, state.status.is_terminal())
                };
                next += batch.len();
                for chunk in batch {
                    yield chunk;
                }
                if terminal {
                    break;
                }
                notified.await;
            }
        }))
    }

    pub fn mark_complete(&self, stream_id: &str) {
        if let Some(entry) = self.streams.read().get(stream_id) {
            entry.set_status(StreamStatus::Complete);
        }
    }

    /// Discard a failed stream. Attached viewers end without a completion
    /// marker; the entry leaves the registry so it can never be resumed.
    fn fail(&self, stream_id: &str) {
        let entry = self.streams.write().remove(stream_id);
        if let Some(entry) = entry {
            entry.set_status(StreamStatus::Errored);
        }
    }

    /// Evict completed buffers for a chat, but only those nobody is
    /// still reading.
    pub fn clear_completed_for_chat(&self, chat_id: &str) {
        let mut streams = self.streams.write();
        streams.retain(|_, entry| {
            let evict = entry.chat_id == chat_id
                && entry.status() == StreamStatus::Complete
                && entry.subscribers.load(Ordering::SeqCst) == 0;
            !evict
        });
    }

    /// Stop a chat's running pumps. Whatever was buffered stands and the
    /// streams complete, so attached viewers finish cleanly. Returns how
    /// many pumps were signalled.
    pub fn abort_for_chat(&self, chat_id: &str) -> usize {
        let streams = self.streams.read();
        let mut aborted = 0;
        for entry in streams.values() {
            if entry.chat_id == chat_id && !entry.status().is_terminal() {
                entry.cancelled.notify_one();
                aborted += 1;
            }
        }
        aborted
    }

    /// The stream a reconnecting viewer should attach to: the first
    /// non-terminal stream for the chat.
    pub fn active_stream_for_chat(&self, chat_id: &str) -> Option<String> {
        self.streams
            .read()
            .values()
            .find(|e| e.chat_id == chat_id && !e.status().is_terminal())
            .map(|e| e.stream_id.clone())
    }

    /// Age-based eviction, run periodically. Buffers with live subscribers
    /// are spared regardless of age.
    pub fn sweep(&self, max_age: Duration) {
        let mut streams = self.streams.write();
        let before = streams.len();
        streams.retain(|_, entry| {
            entry.created_at.elapsed() <= max_age
                || entry.subscribers.load(Ordering::SeqCst) > 0
        });
        let evicted = before - streams.len();
        if evicted > 0 {
            tracing::debug!(evicted, "swept stale stream buffers");
        }
    }

    pub fn contains(&self, stream_id: &str) -> bool {
        self.streams.read().contains_key(stream_id)
    }

    pub fn status_of(&self, stream_id: &str) -> Option<StreamStatus> {
        self.streams.read().get(stream_id).map(|e| e.status())
    }

    pub fn len(&self) -> usize {
        self.streams.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.read().is_empty()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
