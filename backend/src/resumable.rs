//! Resumable stream registry.
//!
//! Each in-flight `POST /api/chat` response is mirrored into a registry entry
//! keyed by its stream id. A client that lost the connection can reattach
//! through `GET /api/chat/{id}/stream`: it first receives every frame sent so
//! far and then follows the live tail. Entries are evicted as soon as the
//! generating task drops its [`StreamPublisher`], so only unfinished streams
//! are resumable.
//!
//! The context is built once at startup and handed around in `AppState`;
//! when resumability is switched off it is [`StreamContext::Disabled`] and
//! every lookup answers `None`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use axum::body::Bytes;
use futures_util::Stream;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::Config;

/// Live-tail buffer per subscriber. A subscriber that falls further behind
/// than this skips ahead.
const LIVE_CAPACITY: usize = 256;

#[derive(Clone)]
pub enum StreamContext {
    Disabled,
    Enabled(Arc<StreamRegistry>),
}

impl StreamContext {
    pub fn init(config: &Config) -> Self {
        if config.resumable_streams {
            tracing::info!("resumable streams enabled (in-process registry)");
            StreamContext::Enabled(Arc::new(StreamRegistry::default()))
        } else {
            tracing::info!(" > Resumable streams are disabled");
            StreamContext::Disabled
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, StreamContext::Enabled(_))
    }

    /// Register a new stream. `None` when disabled.
    pub fn publisher(&self, stream_id: Uuid) -> Option<StreamPublisher> {
        match self {
            StreamContext::Enabled(registry) => Some(registry.register(stream_id)),
            StreamContext::Disabled => None,
        }
    }

    /// Attach to a live stream: already-sent frames first, then the tail.
    pub fn resume(&self, stream_id: Uuid) -> Option<impl Stream<Item = Bytes> + Send + 'static> {
        match self {
            StreamContext::Enabled(registry) => registry.subscribe(stream_id),
            StreamContext::Disabled => None,
        }
    }

    /// Number of streams currently resumable.
    pub fn live_count(&self) -> usize {
        match self {
            StreamContext::Enabled(registry) => registry.len(),
            StreamContext::Disabled => 0,
        }
    }
}

struct LiveStream {
    inner: Mutex<LiveInner>,
}

struct LiveInner {
    history: Vec<Bytes>,
    tx: broadcast::Sender<Bytes>,
}

#[derive(Default)]
pub struct StreamRegistry {
    streams: Mutex<HashMap<Uuid, Arc<LiveStream>>>,
}

impl StreamRegistry {
    fn register(self: &Arc<Self>, stream_id: Uuid) -> StreamPublisher {
        let (tx, _) = broadcast::channel(LIVE_CAPACITY);
        let live = Arc::new(LiveStream {
            inner: Mutex::new(LiveInner {
                history: Vec::new(),
                tx,
            }),
        });
        if let Ok(mut streams) = self.streams.lock() {
            streams.insert(stream_id, live.clone());
        }
        tracing::debug!(stream = %stream_id, "resumable: stream registered");
        StreamPublisher {
            stream_id,
            live,
            registry: Arc::downgrade(self),
        }
    }

    fn subscribe(&self, stream_id: Uuid) -> Option<impl Stream<Item = Bytes> + Send + 'static> {
        let live = self.streams.lock().ok()?.get(&stream_id).cloned()?;

        // Snapshot and subscribe under one lock so no frame falls in between.
        let (history, mut rx) = {
            let inner = live.inner.lock().ok()?;
            (inner.history.clone(), inner.tx.subscribe())
        };
        drop(live);

        tracing::debug!(stream = %stream_id, replayed = history.len(), "resumable: client reattached");
        Some(async_stream::stream! {
            for frame in history {
                yield frame;
            }
            loop {
                match rx.recv().await {
                    Ok(frame) => yield frame,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(stream = %stream_id, skipped, "resumable: subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn remove(&self, stream_id: Uuid) {
        if let Ok(mut streams) = self.streams.lock() {
            streams.remove(&stream_id);
        }
    }

    fn len(&self) -> usize {
        self.streams.lock().map(|s| s.len()).unwrap_or(0)
    }
}

/// Write side of a registered stream. Dropping it ends the stream for all
/// subscribers and removes it from the registry.
pub struct StreamPublisher {
    stream_id: Uuid,
    live: Arc<LiveStream>,
    registry: Weak<StreamRegistry>,
}

impl StreamPublisher {
    pub fn publish(&self, frame: Bytes) {
        if let Ok(mut inner) = self.live.inner.lock() {
            inner.history.push(frame.clone());
            // No subscribers is the common case.
            let _ = inner.tx.send(frame);
        }
    }
}

impl Drop for StreamPublisher {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.stream_id);
        }
        tracing::debug!(stream = %self.stream_id, "resumable: stream finished");
    }
}
