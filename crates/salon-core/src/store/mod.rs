//! Remote store boundary.
//!
//! The store speaks JSON rows: bulk reads, writes that return the
//! authoritative row, and a per-table change feed. The mirror decodes rows
//! into typed records on its side of the boundary.

mod memory;
mod postgrest;
mod realtime;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::models::{RawChange, Table};

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;
pub use realtime::{parse_realtime_message, RealtimeClient};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid store configuration: {0}")]
    InvalidConfiguration(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Store API error: {0}")]
    Api(String),
    #[error("Invalid store payload: {0}")]
    InvalidPayload(String),
    #[error("Change feed error: {0}")]
    Feed(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One delivery from a change feed.
pub type FeedItem = StoreResult<RawChange>;

/// The authoritative backend holding the three tables.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Read every row of `table`.
    async fn select_all(&self, table: Table) -> StoreResult<Vec<Value>>;

    /// Create a row and return it as stored (with its assigned id).
    async fn insert(&self, table: Table, payload: Value) -> StoreResult<Value>;

    /// Apply a partial update and return the updated row.
    async fn update(&self, table: Table, id: &str, patch: Value) -> StoreResult<Value>;

    /// Delete a row. Deleting an absent row succeeds.
    async fn delete(&self, table: Table, id: &str) -> StoreResult<()>;

    /// Start receiving change events for `table`.
    async fn subscribe(&self, table: Table) -> StoreResult<Subscription>;
}

#[async_trait]
impl<T: RemoteStore + ?Sized> RemoteStore for Arc<T> {
    async fn select_all(&self, table: Table) -> StoreResult<Vec<Value>> {
        (**self).select_all(table).await
    }

    async fn insert(&self, table: Table, payload: Value) -> StoreResult<Value> {
        (**self).insert(table, payload).await
    }

    async fn update(&self, table: Table, id: &str, patch: Value) -> StoreResult<Value> {
        (**self).update(table, id, patch).await
    }

    async fn delete(&self, table: Table, id: &str) -> StoreResult<()> {
        (**self).delete(table, id).await
    }

    async fn subscribe(&self, table: Table) -> StoreResult<Subscription> {
        (**self).subscribe(table).await
    }
}

/// Cancellation capability for a feed subscription.
///
/// Clones share state; the first `cancel` wins and later calls are no-ops.
#[derive(Clone)]
pub struct SubscriptionHandle {
    table: Table,
    cancelled: Arc<AtomicBool>,
    signal: Arc<watch::Sender<bool>>,
}

impl SubscriptionHandle {
    #[must_use]
    pub fn new(table: Table) -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            table,
            cancelled: Arc::new(AtomicBool::new(false)),
            signal: Arc::new(signal),
        }
    }

    #[must_use]
    pub const fn table(&self) -> Table {
        self.table
    }

    /// Stop delivery. Returns `true` only for the call that actually cancelled.
    pub fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.signal.send_replace(true);
        tracing::debug!("Cancelled {} change subscription", self.table);
        true
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut receiver = self.signal.subscribe();
        // The sender lives in `self`, so waiting can only end by cancellation.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SubscriptionHandle")
            .field("table", &self.table)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A live change feed for one table.
///
/// The stream ends (`next` returns `None`) when the connection drops; the
/// consumer decides whether to resubscribe.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<FeedItem>,
    handle: SubscriptionHandle,
}

impl Subscription {
    #[must_use]
    pub const fn new(events: mpsc::UnboundedReceiver<FeedItem>, handle: SubscriptionHandle) -> Self {
        Self { events, handle }
    }

    /// Create a subscription together with the sender feeding it.
    #[must_use]
    pub fn channel(table: Table) -> (mpsc::UnboundedSender<FeedItem>, Self) {
        let (sender, events) = mpsc::unbounded_channel();
        (sender, Self::new(events, SubscriptionHandle::new(table)))
    }

    #[must_use]
    pub const fn table(&self) -> Table {
        self.handle.table
    }

    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Next delivery, or `None` once the feed is closed or cancelled.
    pub async fn next(&mut self) -> Option<FeedItem> {
        if self.handle.is_cancelled() {
            return None;
        }
        tokio::select! {
            item = self.events.recv() => item.filter(|_| !self.handle.is_cancelled()),
            () = self.handle.cancelled() => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_reports_only_the_first_call() {
        let handle = SubscriptionHandle::new(Table::Clients);
        let clone = handle.clone();
        assert!(handle.cancel());
        assert!(!clone.cancel());
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn subscription_ends_after_cancel() {
        let (sender, mut subscription) = Subscription::channel(Table::Services);
        subscription.handle().cancel();
        sender
            .send(Ok(RawChange::delete(
                Table::Services,
                serde_json::json!({ "id": "x" }),
            )))
            .unwrap();
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test]
    async fn subscription_ends_when_sender_drops() {
        let (sender, mut subscription) = Subscription::channel(Table::Clients);
        drop(sender);
        assert!(subscription.next().await.is_none());
    }
}
