//! Feed Subscriber - snapshot once, then merge the live stream
//!
//! A [`FeedSource`] is anything that can hand out a snapshot and an event
//! stream: the in-process [`FeedStore`] or a remote room over HTTP. The
//! subscriber never retries. When the stream fails it records a `Lost` status
//! and returns; reconnecting is up to whoever owns it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::{watch, Notify, RwLock};
use tracing::{debug, info, warn};

use super::entry::Entry;
use super::store::FeedStore;
use super::view::{ConnectionStatus, FeedView};
use crate::types::{Result, RoomError};

/// One event off a feed stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Stream is live
    Hello,
    /// A newly appended entry
    Post(Entry),
    /// A `post` payload that did not decode
    Malformed(String),
}

pub type FeedEventStream = BoxStream<'static, Result<FeedEvent>>;

/// Something a subscriber can read a feed from
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Current contents, newest first
    async fn snapshot(&self) -> Result<Vec<Entry>>;

    /// Events from now on. Ends when the source closes the stream.
    async fn subscribe(&self) -> Result<FeedEventStream>;
}

#[async_trait]
impl FeedSource for FeedStore {
    async fn snapshot(&self) -> Result<Vec<Entry>> {
        Ok(FeedStore::snapshot(self).await)
    }

    async fn subscribe(&self) -> Result<FeedEventStream> {
        let subscription = FeedStore::subscribe(self).await;
        let posts = subscription
            .into_stream()
            .map(|entry| entry.map(FeedEvent::Post));
        Ok(stream::once(async { Ok::<_, RoomError>(FeedEvent::Hello) })
            .chain(posts)
            .boxed())
    }
}

#[async_trait]
impl<T: FeedSource + ?Sized> FeedSource for Arc<T> {
    async fn snapshot(&self) -> Result<Vec<Entry>> {
        (**self).snapshot().await
    }

    async fn subscribe(&self) -> Result<FeedEventStream> {
        (**self).subscribe().await
    }
}

/// Keeps a local [`FeedView`] in step with a source
pub struct FeedSubscriber<S> {
    source: S,
    view: Arc<RwLock<FeedView>>,
    status: watch::Sender<ConnectionStatus>,
    closing: AtomicBool,
    shutdown: Notify,
}

impl<S: FeedSource> FeedSubscriber<S> {
    pub fn new(source: S) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Connecting);
        Self {
            source,
            view: Arc::new(RwLock::new(FeedView::new())),
            status,
            closing: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    /// Shared handle to the merged view
    pub fn view(&self) -> Arc<RwLock<FeedView>> {
        Arc::clone(&self.view)
    }

    /// Watch connection status changes
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn current_status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Ask a running subscriber to stop. Ends as `Closed`, not `Lost`.
    ///
    /// Only affects the current run; a later `run` starts afresh.
    pub fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    /// Snapshot, then merge the stream until it ends, fails or is closed.
    ///
    /// `on_post` sees every entry that was actually merged (redeliveries are
    /// filtered out first). Returns the final status.
    pub async fn run<F>(&self, mut on_post: F) -> ConnectionStatus
    where
        F: FnMut(&Entry) + Send,
    {
        self.closing.store(false, Ordering::SeqCst);
        self.status.send_replace(ConnectionStatus::Connecting);

        match self.source.snapshot().await {
            Ok(snapshot) => {
                let mut view = self.view.write().await;
                *view = FeedView::from_snapshot(snapshot);
                debug!(entries = view.len(), "Loaded feed snapshot");
            }
            Err(e) => {
                warn!(error = %e, "Feed snapshot failed");
                return self.finish(ConnectionStatus::Lost(e.to_string()));
            }
        }

        let mut events = match self.source.subscribe().await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Unable to start feed stream");
                return self.finish(ConnectionStatus::Lost(e.to_string()));
            }
        };

        loop {
            // Register for the wake-up before checking the flag so a close in
            // between is not lost
            let shutdown = self.shutdown.notified();
            tokio::pin!(shutdown);
            shutdown.as_mut().enable();
            if self.closing.load(Ordering::SeqCst) {
                info!("Feed subscriber closed");
                return self.finish(ConnectionStatus::Closed);
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Feed subscriber closed");
                    return self.finish(ConnectionStatus::Closed);
                }
                event = events.next() => {
                    match event {
                        Some(Ok(FeedEvent::Hello)) => {
                            self.status.send_replace(ConnectionStatus::Live);
                        }
                        Some(Ok(FeedEvent::Post(entry))) => {
                            let merged = self.view.write().await.merge(entry.clone());
                            if merged {
                                on_post(&entry);
                            } else {
                                debug!(id = %entry.id, "Dropped redelivered entry");
                            }
                        }
                        Some(Ok(FeedEvent::Malformed(payload))) => {
                            debug!(len = payload.len(), "Dropped malformed feed payload");
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "Feed stream failed");
                            return self.finish(ConnectionStatus::Lost(e.to_string()));
                        }
                        None => {
                            debug!("Feed stream ended");
                            return self.finish(ConnectionStatus::Closed);
                        }
                    }
                }
            }
        }
    }

    fn finish(&self, status: ConnectionStatus) -> ConnectionStatus {
        self.status.send_replace(status.clone());
        status
    }
}
