//! Per-table change feed task with resubscription.

use std::sync::Arc;

use tokio::sync::watch;

use super::{Diagnostic, Shared};
use crate::models::{RawChange, Table};
use crate::store::{RemoteStore, Subscription, SubscriptionHandle};

/// Record `handle` as the current subscription of `table`.
pub(super) fn mark_live<S: RemoteStore>(shared: &Shared<S>, table: Table, handle: SubscriptionHandle) {
    if let Some(previous) = shared.subscriptions().insert(table, handle.clone()) {
        previous.cancel();
    }
    // Teardown may have drained the map before the insert above.
    if shared.is_closed() {
        shared.subscriptions().remove(&table);
        handle.cancel();
        return;
    }

    let mut state = shared.write();
    state.live_feeds.insert(table);
    state.disconnected.remove(&table);
}

pub(super) fn mark_lost<S: RemoteStore>(shared: &Shared<S>, table: Table, message: &str) {
    if let Some(handle) = shared.subscriptions().remove(&table) {
        handle.cancel();
    }
    if shared.is_closed() {
        return;
    }

    {
        let mut state = shared.write();
        state.live_feeds.remove(&table);
        state.disconnected.insert(table);
    }
    tracing::warn!("{} feed disconnected: {}", table, message);
    shared.report(Diagnostic::FeedDisconnected {
        table,
        message: message.to_string(),
    });
}

fn deliver<S: RemoteStore>(shared: &Shared<S>, raw: RawChange) {
    if shared.is_closed() {
        tracing::debug!("Dropping {} event on {} after teardown", raw.kind, raw.table);
        return;
    }
    let table = raw.table;
    let kind = raw.kind;
    if let Err(error) = shared.apply_raw(raw) {
        tracing::warn!("Dropping {} event on {}: {}", kind, table, error);
        shared.report(Diagnostic::DroppedEvent {
            table,
            reason: error.to_string(),
        });
    }
}

/// Follow the feed of `table` until teardown, resubscribing with backoff.
pub(super) async fn run<S: RemoteStore>(
    shared: Arc<Shared<S>>,
    table: Table,
    initial: Option<Subscription>,
) {
    let mut shutdown = shared.shutdown.subscribe();
    let mut pending = initial;
    let mut attempt: u32 = 0;

    loop {
        let mut subscription = match pending.take() {
            Some(subscription) => subscription,
            None => {
                if !wait_before_retry(&shared, table, attempt, &mut shutdown).await {
                    break;
                }
                attempt += 1;
                let result = tokio::select! {
                    _ = shutdown.wait_for(|stop| *stop) => break,
                    result = shared.store.subscribe(table) => result,
                };
                match result {
                    Ok(subscription) => {
                        mark_live(&shared, table, subscription.handle());
                        tracing::info!("{} feed resubscribed (attempt {})", table, attempt);
                        shared.report(Diagnostic::FeedResubscribed { table, attempt });
                        attempt = 0;
                        subscription
                    }
                    Err(error) => {
                        mark_lost(&shared, table, &error.to_string());
                        continue;
                    }
                }
            }
        };

        let reason = loop {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => break None,
                item = subscription.next() => match item {
                    Some(Ok(raw)) => deliver(&shared, raw),
                    Some(Err(error)) => break Some(error.to_string()),
                    None => break Some("subscription closed".to_string()),
                },
            }
        };

        match reason {
            Some(message) if !shared.is_closed() => mark_lost(&shared, table, &message),
            _ => break,
        }
    }
    tracing::debug!("{} feed task stopped", table);
}

/// Sleep out the backoff for `attempt`. Returns `false` when the task should stop.
async fn wait_before_retry<S: RemoteStore>(
    shared: &Shared<S>,
    table: Table,
    attempt: u32,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    if shared.is_closed() {
        return false;
    }
    let reconnect = &shared.config.reconnect;
    if !reconnect.should_retry(attempt) {
        tracing::error!("{} feed gave up after {} attempt(s)", table, attempt);
        shared.report(Diagnostic::FeedGaveUp { table });
        return false;
    }

    let delay = reconnect.delay_for_attempt(attempt);
    tracing::debug!("Resubscribing {} feed in {:?}", table, delay);
    tokio::select! {
        _ = shutdown.wait_for(|stop| *stop) => false,
        () = tokio::time::sleep(delay) => !shared.is_closed(),
    }
}
