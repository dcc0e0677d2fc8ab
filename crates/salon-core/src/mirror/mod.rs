//! Local mirror of the remote tables.
//!
//! The mirror seeds itself with one bulk read per table, then follows each
//! table's change feed. Reads are synchronous snapshots; writes go to the
//! remote store first and reach the local collections only once the store
//! has acknowledged them (see [`ApplyPolicy`]).

mod collection;
mod feed;
mod tables;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;
use serde_json::{json, Value};
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::{ApplyPolicy, MirrorConfig, OrphanPolicy};
use crate::models::{
    Appointment, AppointmentId, AppointmentPatch, Client, ClientId, ClientPatch, NewAppointment,
    NewClient, NewService, RawChange, Record, RowChange, Service, ServiceId, ServicePatch, Table,
};
use crate::queries;
use crate::state::Readiness;
use crate::store::{RemoteStore, StoreError, Subscription, SubscriptionHandle};
use crate::{Error, Result};

pub use collection::Collection;
pub use tables::{Mirrored, Tables};

const DIAGNOSTIC_CAPACITY: usize = 64;

/// A write request for one row of `R`'s table.
#[derive(Debug)]
pub enum WriteIntent<R: Record> {
    Insert(R::Draft),
    Update(R::Id, R::Patch),
    Delete(R::Id),
}

/// What the store acknowledged for a write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<R: Record> {
    /// The row as stored after an insert or update
    Row(R),
    Deleted(R::Id),
}

impl<R: Record> WriteOutcome<R> {
    /// The stored row, if the write produced one.
    #[must_use]
    pub fn into_row(self) -> Option<R> {
        match self {
            Self::Row(row) => Some(row),
            Self::Deleted(_) => None,
        }
    }
}

/// Out-of-band notices about sync health. Never returned as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A bulk read failed; the table stays empty until events fill it.
    LoadPartialFailure { table: Table, message: String },
    /// A change feed dropped or could not be opened.
    FeedDisconnected { table: Table, message: String },
    /// A change feed is live again after `attempt` tries.
    FeedResubscribed { table: Table, attempt: u32 },
    /// Resubscription stopped after exhausting the retry budget.
    FeedGaveUp { table: Table },
    /// A feed event could not be applied and was discarded.
    DroppedEvent { table: Table, reason: String },
}

impl Diagnostic {
    #[must_use]
    pub const fn table(&self) -> Table {
        match self {
            Self::LoadPartialFailure { table, .. }
            | Self::FeedDisconnected { table, .. }
            | Self::FeedResubscribed { table, .. }
            | Self::FeedGaveUp { table }
            | Self::DroppedEvent { table, .. } => *table,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadPartialFailure { table, message } => {
                write!(f, "loading {table} failed: {message}")
            }
            Self::FeedDisconnected { table, message } => {
                write!(f, "{table} feed disconnected: {message}")
            }
            Self::FeedResubscribed { table, attempt } => {
                write!(f, "{table} feed resubscribed after {attempt} attempt(s)")
            }
            Self::FeedGaveUp { table } => write!(f, "{table} feed gave up reconnecting"),
            Self::DroppedEvent { table, reason } => write!(f, "{table} event dropped: {reason}"),
        }
    }
}

/// Result of a bulk load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<Table>,
    pub failed: Vec<(Table, String)>,
}

impl LoadReport {
    /// Whether every table was read successfully.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Uninitialized,
    Loading,
    Loaded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum TableStatus {
    /// Bulk read not installed yet; events are buffered
    #[default]
    Pending,
    Loaded,
    Failed(String),
}

#[derive(Default)]
struct MirrorState {
    tables: Tables,
    phase: Phase,
    status: HashMap<Table, TableStatus>,
    buffered: Vec<RawChange>,
    live_feeds: HashSet<Table>,
    disconnected: HashSet<Table>,
    echo_waiters: HashMap<(Table, String), Vec<oneshot::Sender<()>>>,
}

impl MirrorState {
    fn status(&self, table: Table) -> &TableStatus {
        static PENDING: TableStatus = TableStatus::Pending;
        self.status.get(&table).unwrap_or(&PENDING)
    }

    fn readiness(&self) -> Readiness {
        match self.phase {
            Phase::Uninitialized => Readiness::Uninitialized,
            Phase::Loading => Readiness::Loading,
            Phase::Loaded => {
                let failed = self
                    .status
                    .values()
                    .any(|status| matches!(status, TableStatus::Failed(_)));
                if failed || !self.disconnected.is_empty() {
                    Readiness::Degraded
                } else {
                    Readiness::Ready
                }
            }
        }
    }

    /// Route a feed event to its table, buffering while the table is pending.
    fn apply_raw(&mut self, raw: RawChange, orphans: OrphanPolicy) -> Result<bool> {
        if *self.status(raw.table) == TableStatus::Pending {
            tracing::debug!("Buffering {} event on {} until loaded", raw.kind, raw.table);
            self.buffered.push(raw);
            return Ok(false);
        }
        self.apply_decoded(&raw, orphans)
    }

    fn apply_decoded(&mut self, raw: &RawChange, orphans: OrphanPolicy) -> Result<bool> {
        match raw.table {
            Table::Clients => Ok(self.apply::<Client>(RowChange::decode(raw)?, orphans)),
            Table::Services => Ok(self.apply::<Service>(RowChange::decode(raw)?, orphans)),
            Table::Appointments => Ok(self.apply::<Appointment>(RowChange::decode(raw)?, orphans)),
        }
    }

    fn apply<R: Mirrored>(&mut self, change: RowChange<R>, orphans: OrphanPolicy) -> bool {
        let id = change.id().clone();
        let deleted = matches!(change, RowChange::Delete(_));
        let mut changed = R::collection_mut(&mut self.tables).apply(change);

        if deleted && orphans == OrphanPolicy::Cascade {
            let removed = R::cascade_delete(&mut self.tables, &id);
            if !removed.is_empty() {
                tracing::debug!(
                    "Cascaded {} deletion to {} appointment(s)",
                    R::TABLE,
                    removed.len()
                );
                changed = true;
            }
            for appointment_id in removed {
                self.wake(Table::Appointments, &appointment_id.to_string());
            }
        }

        self.wake(R::TABLE, &id.to_string());
        changed
    }

    fn wake(&mut self, table: Table, id: &str) {
        if let Some(waiters) = self.echo_waiters.remove(&(table, id.to_string())) {
            for waiter in waiters {
                let _ = waiter.send(());
            }
        }
    }

    /// Replace `table` with bulk-read rows, or mark it failed.
    fn install(&mut self, table: Table, rows: std::result::Result<Vec<Value>, String>) {
        let status = match rows {
            Ok(rows) => {
                match table {
                    Table::Clients => self.tables.clients.replace_all(decode_rows(table, rows)),
                    Table::Services => self.tables.services.replace_all(decode_rows(table, rows)),
                    Table::Appointments => {
                        self.tables.appointments.replace_all(decode_rows(table, rows));
                    }
                }
                TableStatus::Loaded
            }
            Err(message) => TableStatus::Failed(message),
        };
        self.status.insert(table, status);
    }

    /// Apply events buffered during loading, in arrival order.
    ///
    /// Runs once every table is installed so a cascading delete sees the
    /// dependent appointments.
    fn replay_buffered(&mut self, orphans: OrphanPolicy) -> usize {
        let buffered = std::mem::take(&mut self.buffered);
        let replayed = buffered.len();
        for raw in buffered {
            if let Err(error) = self.apply_decoded(&raw, orphans) {
                tracing::warn!("Dropping buffered {} event on {}: {}", raw.kind, raw.table, error);
            }
        }
        replayed
    }
}

fn decode_rows<R: Record>(table: Table, rows: Vec<Value>) -> Vec<R> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<R>(row) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                tracing::warn!("Skipping undecodable {} row: {}", table, error);
                None
            }
        })
        .collect()
}

fn to_raw<R: Record>(change: &RowChange<R>) -> Result<RawChange> {
    Ok(match change {
        RowChange::Insert(row) => RawChange::insert(R::TABLE, serde_json::to_value(row)?),
        RowChange::Update(row) => RawChange::update(R::TABLE, None, serde_json::to_value(row)?),
        RowChange::Delete(id) => RawChange::delete(R::TABLE, json!({ "id": id })),
    })
}

pub(crate) struct Shared<S> {
    store: S,
    config: MirrorConfig,
    state: RwLock<MirrorState>,
    revision: watch::Sender<u64>,
    diagnostics: broadcast::Sender<Diagnostic>,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
    subscriptions: Mutex<HashMap<Table, SubscriptionHandle>>,
    feed_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: RemoteStore> Shared<S> {
    fn read(&self) -> RwLockReadGuard<'_, MirrorState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MirrorState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscriptions(&self) -> MutexGuard<'_, HashMap<Table, SubscriptionHandle>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn feed_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.feed_tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    fn report(&self, diagnostic: Diagnostic) {
        // No receivers is fine; diagnostics are best effort.
        let _ = self.diagnostics.send(diagnostic);
    }

    fn apply_raw(&self, raw: RawChange) -> Result<bool> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let changed = self.write().apply_raw(raw, self.config.orphan_policy)?;
        if changed {
            self.bump_revision();
        }
        Ok(changed)
    }

    fn fold_in<R: Mirrored>(&self, change: RowChange<R>) -> Result<()> {
        let changed = {
            let mut state = self.write();
            if *state.status(R::TABLE) == TableStatus::Pending {
                // Replayed after the bulk read so the load cannot hide it.
                state.buffered.push(to_raw(&change)?);
            }
            state.apply(change, self.config.orphan_policy)
        };
        if changed {
            self.bump_revision();
        }
        Ok(())
    }

    /// Teardown. Returns the number of subscriptions cancelled by this call.
    fn close(&self) -> usize {
        if self.closed.swap(true, Ordering::SeqCst) {
            return 0;
        }
        self.shutdown.send_replace(true);

        let handles: Vec<SubscriptionHandle> =
            self.subscriptions().drain().map(|(_, handle)| handle).collect();
        let cancelled = handles.iter().filter(|handle| handle.cancel()).count();

        {
            let mut state = self.write();
            state.echo_waiters.clear();
            state.live_feeds.clear();
        }
        tracing::info!("Mirror closed, cancelled {} feed subscription(s)", cancelled);
        cancelled
    }
}

/// The local mirror of clients, services and appointments.
///
/// Owns its feed tasks; dropping the mirror tears them down.
pub struct Mirror<S: RemoteStore> {
    shared: Arc<Shared<S>>,
}

impl<S: RemoteStore> fmt::Debug for Mirror<S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Mirror")
            .field("readiness", &self.readiness())
            .field("config", &self.shared.config)
            .field("closed", &self.shared.is_closed())
            .finish_non_exhaustive()
    }
}

impl<S: RemoteStore> Mirror<S> {
    #[must_use]
    pub fn new(store: S, config: MirrorConfig) -> Self {
        let (revision, _) = watch::channel(0);
        let (diagnostics, _) = broadcast::channel(DIAGNOSTIC_CAPACITY);
        let (shutdown, _) = watch::channel(false);

        Self {
            shared: Arc::new(Shared {
                store,
                config,
                state: RwLock::new(MirrorState::default()),
                revision,
                diagnostics,
                closed: AtomicBool::new(false),
                shutdown,
                subscriptions: Mutex::new(HashMap::new()),
                feed_tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.shared.store
    }

    #[must_use]
    pub fn config(&self) -> &MirrorConfig {
        &self.shared.config
    }

    /// Subscribe the feeds, then bulk-read all three tables concurrently.
    ///
    /// Never fails: a table whose read fails stays empty and is reported as
    /// [`Diagnostic::LoadPartialFailure`]. Events that arrive while a table
    /// is loading are replayed on top of the loaded rows.
    pub async fn load(&self) -> LoadReport {
        let shared = &self.shared;
        if shared.is_closed() {
            return LoadReport {
                loaded: Vec::new(),
                failed: Table::ALL
                    .iter()
                    .map(|table| (*table, Error::Closed.to_string()))
                    .collect(),
            };
        }

        {
            let mut state = shared.write();
            state.phase = Phase::Loading;
            for table in Table::ALL {
                state.status.insert(table, TableStatus::Pending);
            }
        }
        tracing::info!("Loading clients, services and appointments");

        self.start_feeds().await;

        let store = &shared.store;
        let (clients, services, appointments) = tokio::join!(
            store.select_all(Table::Clients),
            store.select_all(Table::Services),
            store.select_all(Table::Appointments),
        );

        let mut report = LoadReport::default();
        {
            let mut state = shared.write();
            let orphans = shared.config.orphan_policy;
            for (table, result) in [
                (Table::Clients, clients),
                (Table::Services, services),
                (Table::Appointments, appointments),
            ] {
                let result = result.map_err(|error| error.to_string());
                match &result {
                    Ok(rows) => {
                        tracing::debug!("Fetched {} {} row(s)", rows.len(), table);
                        report.loaded.push(table);
                    }
                    Err(message) => {
                        tracing::error!("Failed to load {}: {}", table, message);
                        report.failed.push((table, message.clone()));
                    }
                }
                state.install(table, result);
            }
            let replayed = state.replay_buffered(orphans);
            if replayed > 0 {
                tracing::debug!("Replayed {} buffered event(s)", replayed);
            }
            state.phase = Phase::Loaded;
        }

        for (table, message) in &report.failed {
            shared.report(Diagnostic::LoadPartialFailure {
                table: *table,
                message: message.clone(),
            });
        }
        shared.bump_revision();
        tracing::info!("Mirror {}", self.readiness());
        report
    }

    async fn start_feeds(&self) {
        let shared = &self.shared;
        if !shared.feed_tasks().is_empty() {
            return;
        }

        let store = &shared.store;
        let (clients, services, appointments) = tokio::join!(
            store.subscribe(Table::Clients),
            store.subscribe(Table::Services),
            store.subscribe(Table::Appointments),
        );

        let mut tasks = shared.feed_tasks();
        if !tasks.is_empty() {
            return;
        }
        for (table, initial) in [
            (Table::Clients, clients),
            (Table::Services, services),
            (Table::Appointments, appointments),
        ] {
            let initial: Option<Subscription> = match initial {
                Ok(subscription) => {
                    feed::mark_live(shared, table, subscription.handle());
                    Some(subscription)
                }
                Err(error) => {
                    feed::mark_lost(shared, table, &error.to_string());
                    None
                }
            };
            tasks.push(tokio::spawn(feed::run(Arc::clone(shared), table, initial)));
        }
    }

    /// Fold one feed event into the collections.
    ///
    /// Returns whether anything visible changed. Fails with
    /// [`Error::Closed`] after teardown and with a decode error for events
    /// whose rows cannot be read.
    pub fn apply_change(&self, raw: RawChange) -> Result<bool> {
        self.shared.apply_raw(raw)
    }

    /// Send a write to the remote store and fold the acknowledged result in.
    ///
    /// Nothing changes locally unless the store accepts the write. Once this
    /// resolves, snapshots reflect the write.
    pub async fn write<R: Mirrored>(&self, intent: WriteIntent<R>) -> Result<WriteOutcome<R>> {
        let shared = &self.shared;
        if shared.is_closed() {
            return Err(Error::Closed);
        }
        let table = R::TABLE;
        let rejected = |source: StoreError| {
            tracing::warn!("Store rejected write to {}: {}", table, source);
            Error::WriteRejected { table, source }
        };

        let change: RowChange<R> = match intent {
            WriteIntent::Insert(draft) => {
                R::validate_draft(&draft)?;
                let payload = serde_json::to_value(&draft)?;
                let row = shared
                    .store
                    .insert(table, payload)
                    .await
                    .map_err(rejected)?;
                RowChange::Insert(serde_json::from_value(row)?)
            }
            WriteIntent::Update(id, patch) => {
                R::validate_patch(&patch)?;
                let payload = serde_json::to_value(&patch)?;
                let row = shared
                    .store
                    .update(table, &id.to_string(), payload)
                    .await
                    .map_err(rejected)?;
                RowChange::Update(serde_json::from_value(row)?)
            }
            WriteIntent::Delete(id) => {
                shared
                    .store
                    .delete(table, &id.to_string())
                    .await
                    .map_err(rejected)?;
                RowChange::Delete(id)
            }
        };

        let outcome = match &change {
            RowChange::Insert(row) | RowChange::Update(row) => WriteOutcome::Row(row.clone()),
            RowChange::Delete(id) => WriteOutcome::Deleted(id.clone()),
        };
        self.settle(change).await?;
        Ok(outcome)
    }

    async fn settle<R: Mirrored>(&self, change: RowChange<R>) -> Result<()> {
        let shared = &self.shared;
        if shared.config.apply_policy == ApplyPolicy::Direct {
            return shared.fold_in(change);
        }

        let key = (R::TABLE, change.id().to_string());
        let echo = {
            let mut state = shared.write();
            if R::collection(&state.tables).reflects(&change) {
                return Ok(());
            }
            if shared.is_closed() || !state.live_feeds.contains(&R::TABLE) {
                tracing::debug!("No live {} feed, applying acknowledged write", R::TABLE);
                drop(state);
                return shared.fold_in(change);
            }
            let (sender, receiver) = oneshot::channel();
            state.echo_waiters.entry(key.clone()).or_default().push(sender);
            receiver
        };

        match tokio::time::timeout(shared.config.echo_timeout, echo).await {
            // An event for this row landed after the acknowledgement; the feed
            // now holds the latest state, which may already supersede ours.
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => shared.fold_in(change),
            Err(_) => {
                tracing::warn!(
                    "No {} feed echo for {} within {:?}, applying acknowledged write",
                    R::TABLE,
                    key.1,
                    shared.config.echo_timeout
                );
                shared.fold_in(change)
            }
        }
    }

    /// Current rows of `R`'s table.
    #[must_use]
    pub fn snapshot<R: Mirrored>(&self) -> Vec<R> {
        R::collection(&self.shared.read().tables).rows().to_vec()
    }

    /// One consistent copy of all three tables.
    #[must_use]
    pub fn tables(&self) -> Tables {
        self.shared.read().tables.clone()
    }

    #[must_use]
    pub fn get<R: Mirrored>(&self, id: &R::Id) -> Option<R> {
        R::collection(&self.shared.read().tables).get(id).cloned()
    }

    #[must_use]
    pub fn readiness(&self) -> Readiness {
        self.shared.read().readiness()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.readiness().is_loading()
    }

    /// Revision counter bumped after every visible change.
    #[must_use]
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    #[must_use]
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.shared.diagnostics.subscribe()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Cancel every feed subscription and stop the feed tasks.
    ///
    /// Only the first call does anything; it returns how many subscriptions
    /// it cancelled. Events arriving afterwards are dropped.
    pub async fn shutdown(&self) -> usize {
        let cancelled = self.shared.close();
        let tasks: Vec<JoinHandle<()>> = self.shared.feed_tasks().drain(..).collect();
        for task in tasks {
            if let Err(error) = task.await {
                if !error.is_cancelled() {
                    tracing::warn!("Feed task ended abnormally: {}", error);
                }
            }
        }
        cancelled
    }

    // Derived reads

    #[must_use]
    pub fn appointments_on_date(&self, date: NaiveDate) -> Vec<Appointment> {
        queries::appointments_on_date(self.shared.read().tables.appointments.rows(), date)
    }

    #[must_use]
    pub fn appointments_for_client(&self, client_id: ClientId) -> Vec<Appointment> {
        queries::appointments_for_client(self.shared.read().tables.appointments.rows(), client_id)
    }

    #[must_use]
    pub fn dates_with_appointments(&self) -> BTreeSet<NaiveDate> {
        queries::dates_with_appointments(self.shared.read().tables.appointments.rows())
    }

    #[must_use]
    pub fn history(&self, client_id: Option<ClientId>, date: Option<NaiveDate>) -> Vec<Appointment> {
        queries::history(self.shared.read().tables.appointments.rows(), client_id, date)
    }

    #[must_use]
    pub fn client_name(&self, id: ClientId) -> String {
        queries::client_name(self.shared.read().tables.clients.rows(), id)
    }

    #[must_use]
    pub fn service_name(&self, id: ServiceId) -> String {
        queries::service_name(self.shared.read().tables.services.rows(), id)
    }

    #[must_use]
    pub fn clients_by_name(&self) -> Vec<Client> {
        queries::sorted_by_name(self.shared.read().tables.clients.rows())
    }

    #[must_use]
    pub fn services_by_name(&self) -> Vec<Service> {
        queries::sorted_by_name(self.shared.read().tables.services.rows())
    }

    #[must_use]
    pub fn search_clients(&self, query: &str) -> Vec<Client> {
        let state = self.shared.read();
        queries::search_by_name(state.tables.clients.rows(), query)
            .into_iter()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn search_services(&self, query: &str) -> Vec<Service> {
        let state = self.shared.read();
        queries::search_by_name(state.tables.services.rows(), query)
            .into_iter()
            .cloned()
            .collect()
    }

    // Convenience intents

    pub async fn add_client(&self, client: NewClient) -> Result<Client> {
        let outcome = self.write::<Client>(WriteIntent::Insert(client)).await?;
        expect_row(outcome)
    }

    pub async fn update_client(&self, id: ClientId, patch: ClientPatch) -> Result<Client> {
        let outcome = self.write::<Client>(WriteIntent::Update(id, patch)).await?;
        expect_row(outcome)
    }

    pub async fn remove_client(&self, id: ClientId) -> Result<()> {
        self.write::<Client>(WriteIntent::Delete(id)).await?;
        Ok(())
    }

    pub async fn add_service(&self, service: NewService) -> Result<Service> {
        let outcome = self.write::<Service>(WriteIntent::Insert(service)).await?;
        expect_row(outcome)
    }

    pub async fn update_service(&self, id: ServiceId, patch: ServicePatch) -> Result<Service> {
        let outcome = self.write::<Service>(WriteIntent::Update(id, patch)).await?;
        expect_row(outcome)
    }

    pub async fn remove_service(&self, id: ServiceId) -> Result<()> {
        self.write::<Service>(WriteIntent::Delete(id)).await?;
        Ok(())
    }

    pub async fn add_appointment(&self, appointment: NewAppointment) -> Result<Appointment> {
        let outcome = self
            .write::<Appointment>(WriteIntent::Insert(appointment))
            .await?;
        expect_row(outcome)
    }

    /// Whole-row update from an edited copy of an appointment.
    pub async fn update_appointment(&self, appointment: &Appointment) -> Result<Appointment> {
        let patch = AppointmentPatch::from_appointment(appointment);
        let outcome = self
            .write::<Appointment>(WriteIntent::Update(appointment.id, patch))
            .await?;
        expect_row(outcome)
    }

    pub async fn remove_appointment(&self, id: AppointmentId) -> Result<()> {
        self.write::<Appointment>(WriteIntent::Delete(id)).await?;
        Ok(())
    }

    /// Flip the paid flag of a locally known appointment.
    pub async fn toggle_paid(&self, id: AppointmentId) -> Result<Appointment> {
        let mut appointment = self.require_appointment(id)?;
        appointment.is_paid = !appointment.is_paid;
        self.update_appointment(&appointment).await
    }

    /// Replace the notes of a locally known appointment. Blank notes clear it.
    pub async fn update_notes(&self, id: AppointmentId, notes: Option<String>) -> Result<Appointment> {
        let mut appointment = self.require_appointment(id)?;
        appointment.notes = notes;
        self.update_appointment(&appointment).await
    }

    fn require_appointment(&self, id: AppointmentId) -> Result<Appointment> {
        self.get::<Appointment>(&id).ok_or_else(|| Error::NotFound {
            table: Table::Appointments,
            id: id.to_string(),
        })
    }
}

fn expect_row<R: Record>(outcome: WriteOutcome<R>) -> Result<R> {
    outcome
        .into_row()
        .ok_or_else(|| Error::InvalidInput(format!("{} write returned no row", R::TABLE)))
}

impl<S: RemoteStore> Drop for Mirror<S> {
    fn drop(&mut self) {
        if self.shared.is_closed() {
            return;
        }
        self.shared.close();
        for task in self.shared.feed_tasks().drain(..) {
            task.abort();
        }
    }
}
