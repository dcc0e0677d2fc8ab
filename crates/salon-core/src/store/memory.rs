//! In-process remote store.
//!
//! Behaves like the hosted backend (store-assigned ids and timestamps, every
//! committed write echoed to all feed subscribers) and adds fault injection
//! for degraded-path tests and offline demos.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{FeedItem, RemoteStore, StoreError, StoreResult, Subscription, SubscriptionHandle};
use crate::models::{RawChange, Table};

/// Shared, cloneable in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<Table, Vec<Value>>,
    subscribers: HashMap<Table, Vec<Subscriber>>,
    failing_reads: HashSet<Table>,
    failing_subscribes: HashMap<Table, u32>,
    subscribe_counts: HashMap<Table, usize>,
    rejected_writes: Option<String>,
    silent_writes: bool,
    cascade_deletes: bool,
}

struct Subscriber {
    sender: mpsc::UnboundedSender<FeedItem>,
    handle: SubscriptionHandle,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the rows of `table` without emitting events.
    pub fn seed(&self, table: Table, rows: Vec<Value>) {
        self.state().tables.insert(table, rows);
    }

    /// Current rows of `table`, as stored.
    #[must_use]
    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.state().tables.get(&table).cloned().unwrap_or_default()
    }

    /// Make bulk reads of `table` fail until [`Self::restore_reads`].
    pub fn fail_reads(&self, table: Table) {
        self.state().failing_reads.insert(table);
    }

    pub fn restore_reads(&self, table: Table) {
        self.state().failing_reads.remove(&table);
    }

    /// Make the next `count` subscribe calls for `table` fail.
    pub fn fail_next_subscribes(&self, table: Table, count: u32) {
        self.state().failing_subscribes.insert(table, count);
    }

    /// Refuse every write with `message` until [`Self::accept_writes`].
    pub fn reject_writes(&self, message: impl Into<String>) {
        self.state().rejected_writes = Some(message.into());
    }

    pub fn accept_writes(&self) {
        self.state().rejected_writes = None;
    }

    /// When disabled, writes made through [`RemoteStore`] are committed but
    /// not echoed on the feed. External writes are always echoed.
    pub fn set_echo_writes(&self, echo: bool) {
        self.state().silent_writes = !echo;
    }

    /// Delete dependent appointments when a client or service is deleted.
    pub fn set_cascade_deletes(&self, cascade: bool) {
        self.state().cascade_deletes = cascade;
    }

    /// Drop every live feed of `table`, as a lost connection would.
    pub fn disconnect(&self, table: Table) {
        let dropped = self.state().subscribers.remove(&table).unwrap_or_default();
        tracing::debug!("Disconnected {} feed subscriber(s) of {}", dropped.len(), table);
    }

    /// Number of live, uncancelled feeds for `table`.
    #[must_use]
    pub fn subscriber_count(&self, table: Table) -> usize {
        let mut state = self.state();
        let subscribers = state.subscribers.entry(table).or_default();
        subscribers.retain(|subscriber| !subscriber.handle.is_cancelled());
        subscribers.len()
    }

    /// Total successful subscribe calls for `table`.
    #[must_use]
    pub fn subscribe_count(&self, table: Table) -> usize {
        self.state()
            .subscribe_counts
            .get(&table)
            .copied()
            .unwrap_or_default()
    }

    /// Deliver a raw event to every subscriber of its table, bypassing storage.
    pub fn emit(&self, change: RawChange) {
        self.state().broadcast(change);
    }

    /// Insert on behalf of another writer.
    pub fn external_insert(&self, table: Table, payload: Value) -> StoreResult<Value> {
        self.state().insert(table, payload, true)
    }

    /// Update on behalf of another writer.
    pub fn external_update(&self, table: Table, id: &str, patch: Value) -> StoreResult<Value> {
        self.state().update(table, id, patch, true)
    }

    /// Delete on behalf of another writer.
    pub fn external_delete(&self, table: Table, id: &str) -> StoreResult<()> {
        self.state().delete(table, id, true);
        Ok(())
    }
}

impl MemoryState {
    fn check_writable(&self) -> StoreResult<()> {
        match &self.rejected_writes {
            Some(message) => Err(StoreError::Api(message.clone())),
            None => Ok(()),
        }
    }

    fn insert(&mut self, table: Table, payload: Value, emit: bool) -> StoreResult<Value> {
        let Value::Object(mut row) = payload else {
            return Err(StoreError::InvalidPayload(format!(
                "insert into {table} expects a JSON object"
            )));
        };

        let id = match row.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => Uuid::now_v7().to_string(),
        };
        let rows = self.tables.entry(table).or_default();
        if rows.iter().any(|existing| row_id(existing) == Some(id.as_str())) {
            return Err(StoreError::Api(format!(
                "duplicate key value violates unique constraint \"{table}_pkey\" ({id})"
            )));
        }

        row.insert("id".to_string(), Value::String(id));
        apply_column_defaults(table, &mut row);
        let row = Value::Object(row);
        rows.push(row.clone());

        if emit {
            self.broadcast(RawChange::insert(table, row.clone()));
        }
        Ok(row)
    }

    fn update(&mut self, table: Table, id: &str, patch: Value, emit: bool) -> StoreResult<Value> {
        let Value::Object(patch) = patch else {
            return Err(StoreError::InvalidPayload(format!(
                "update of {table} expects a JSON object"
            )));
        };

        let rows = self.tables.entry(table).or_default();
        let Some(row) = rows.iter_mut().find(|row| row_id(row) == Some(id)) else {
            return Err(StoreError::Api(format!("no row in {table} matches id {id}")));
        };

        let before = row.clone();
        if let Value::Object(fields) = row {
            for (key, value) in patch {
                if key != "id" {
                    fields.insert(key, value);
                }
            }
        }
        let after = row.clone();

        if emit {
            self.broadcast(RawChange::update(table, Some(before), after.clone()));
        }
        Ok(after)
    }

    fn delete(&mut self, table: Table, id: &str, emit: bool) {
        let rows = self.tables.entry(table).or_default();
        let Some(index) = rows.iter().position(|row| row_id(row) == Some(id)) else {
            return;
        };
        let before = rows.remove(index);
        if emit {
            self.broadcast(RawChange::delete(table, before));
        }

        let dependent_column = match table {
            Table::Clients => "client_id",
            Table::Services => "service_id",
            Table::Appointments => return,
        };
        if self.cascade_deletes {
            let appointments = self.tables.entry(Table::Appointments).or_default();
            let (removed, kept): (Vec<Value>, Vec<Value>) = appointments
                .drain(..)
                .partition(|row| row.get(dependent_column).and_then(Value::as_str) == Some(id));
            *appointments = kept;
            for before in removed {
                self.broadcast(RawChange::delete(Table::Appointments, before));
            }
        }
    }

    fn broadcast(&mut self, change: RawChange) {
        let subscribers = self.subscribers.entry(change.table).or_default();
        subscribers.retain(|subscriber| {
            !subscriber.handle.is_cancelled() && subscriber.sender.send(Ok(change.clone())).is_ok()
        });
    }
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

fn apply_column_defaults(table: Table, row: &mut Map<String, Value>) {
    match table {
        Table::Clients => {
            row.entry("created_at")
                .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
            row.entry("email").or_insert(Value::Null);
        }
        Table::Services => {}
        Table::Appointments => {
            row.entry("created_at")
                .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
            row.entry("is_paid").or_insert(Value::Bool(false));
            row.entry("notes").or_insert(Value::Null);
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select_all(&self, table: Table) -> StoreResult<Vec<Value>> {
        let state = self.state();
        if state.failing_reads.contains(&table) {
            return Err(StoreError::Unavailable(format!("reading {table} failed")));
        }
        Ok(state.tables.get(&table).cloned().unwrap_or_default())
    }

    async fn insert(&self, table: Table, payload: Value) -> StoreResult<Value> {
        let mut state = self.state();
        state.check_writable()?;
        let emit = !state.silent_writes;
        state.insert(table, payload, emit)
    }

    async fn update(&self, table: Table, id: &str, patch: Value) -> StoreResult<Value> {
        let mut state = self.state();
        state.check_writable()?;
        let emit = !state.silent_writes;
        state.update(table, id, patch, emit)
    }

    async fn delete(&self, table: Table, id: &str) -> StoreResult<()> {
        let mut state = self.state();
        state.check_writable()?;
        let emit = !state.silent_writes;
        state.delete(table, id, emit);
        Ok(())
    }

    async fn subscribe(&self, table: Table) -> StoreResult<Subscription> {
        let mut state = self.state();
        if let Some(remaining) = state.failing_subscribes.get_mut(&table) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Feed(format!("subscribing to {table} failed")));
            }
        }

        let (sender, subscription) = Subscription::channel(table);
        state.subscribers.entry(table).or_default().push(Subscriber {
            sender,
            handle: subscription.handle(),
        });
        *state.subscribe_counts.entry(table).or_default() += 1;
        Ok(subscription)
    }
}
