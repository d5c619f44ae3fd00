use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::order::Order;
use crate::metrics::Metrics;
use crate::store::collections::ORDERS;
use crate::store::{Document, DocumentStore, Query, StoreError};
use crate::utils::bounded;

const CREATED_AT: &str = "createdAt";

/// How many recent orders the diagnostic probe samples after a fallback.
const DIAGNOSTIC_SAMPLE: usize = 5;

// ============================================================================
// Feed State
// ============================================================================

/// Whose orders a feed follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    /// Orders placed by this customer.
    Customer(Uuid),
    /// Orders incoming to this restaurant.
    Restaurant(Uuid),
}

impl OrderScope {
    pub fn key(&self) -> Uuid {
        match self {
            Self::Customer(id) | Self::Restaurant(id) => *id,
        }
    }

    pub fn filter_field(&self) -> &'static str {
        match self {
            Self::Customer(_) => "customerId",
            Self::Restaurant(_) => "restaurantId",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Customer(_) => "customer",
            Self::Restaurant(_) => "restaurant",
        }
    }

    /// The filter-only query. This shape never needs a composite index.
    fn fetch_query(&self) -> Query {
        Query::collection(ORDERS).filter_eq(self.filter_field(), self.key().to_string())
    }

    /// The live query: filtered and newest-first, which the store can only
    /// serve with a composite index over (filter field, createdAt).
    fn live_query(&self) -> Query {
        self.fetch_query().sort_desc(CREATED_AT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    /// Subscription being established; show a spinner, not an empty list.
    Subscribing,
    /// Streaming store snapshots as they happen.
    Live,
    /// Live sync failed; serving one-shot fetches on demand.
    Degraded,
}

/// The user-visible notice that realtime updates are off. Non-fatal: the
/// surface keeps rendering orders alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncWarning {
    pub message: String,
    /// True when the cause was a missing composite index, which an operator
    /// fixes in the store rather than in this code.
    pub missing_index: bool,
}

#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub phase: FeedPhase,
    pub orders: Vec<Order>,
    pub warning: Option<SyncWarning>,
}

enum FeedCommand {
    Refresh,
    Stop,
}

// ============================================================================
// Order Feed
// ============================================================================

/// A handle to one live order feed. Consumers read [`FeedSnapshot`]s through
/// [`watch`](OrderFeed::watch); dropping the handle (or calling
/// [`stop`](OrderFeed::stop)) detaches the store listener.
pub struct OrderFeed {
    state: watch::Receiver<FeedSnapshot>,
    commands: mpsc::UnboundedSender<FeedCommand>,
    task: JoinHandle<()>,
    metrics: Arc<Metrics>,
}

impl OrderFeed {
    pub fn open(
        store: Arc<dyn DocumentStore>,
        scope: OrderScope,
        op_timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(FeedSnapshot {
            phase: FeedPhase::Subscribing,
            orders: Vec::new(),
            warning: None,
        });
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        metrics.live_order_feeds.inc();
        let task = tokio::spawn(run_feed(
            store,
            scope,
            op_timeout,
            Arc::clone(&metrics),
            state_tx,
            command_rx,
        ));

        Self {
            state: state_rx,
            commands: command_tx,
            task,
            metrics,
        }
    }

    /// The latest snapshot, cloned out.
    pub fn snapshot(&self) -> FeedSnapshot {
        self.state.borrow().clone()
    }

    /// A receiver that observes every published snapshot.
    pub fn watch(&self) -> watch::Receiver<FeedSnapshot> {
        self.state.clone()
    }

    /// Asks a degraded feed to fetch again. A live feed ignores this; its
    /// snapshots are already current.
    pub fn refresh(&self) {
        let _ = self.commands.send(FeedCommand::Refresh);
    }

    /// Detaches from the store. Idempotent; dropping the handle does the
    /// same.
    pub fn stop(&self) {
        let _ = self.commands.send(FeedCommand::Stop);
    }
}

impl Drop for OrderFeed {
    fn drop(&mut self) {
        let _ = self.commands.send(FeedCommand::Stop);
        self.task.abort();
        self.metrics.live_order_feeds.dec();
    }
}

// ============================================================================
// Feed Task
// ============================================================================

async fn run_feed(
    store: Arc<dyn DocumentStore>,
    scope: OrderScope,
    op_timeout: Duration,
    metrics: Arc<Metrics>,
    state: watch::Sender<FeedSnapshot>,
    mut commands: mpsc::UnboundedReceiver<FeedCommand>,
) {
    let mut subscription = match bounded(op_timeout, store.subscribe(&scope.live_query())).await {
        Ok(subscription) => subscription,
        Err(cause) => {
            run_degraded(&*store, scope, op_timeout, &metrics, &state, &mut commands, cause).await;
            return;
        }
    };

    tracing::info!(scope = scope.label(), key = %scope.key(), "🔄 order feed live");
    let stream_lost = loop {
        tokio::select! {
            snapshot = subscription.next() => match snapshot {
                Some(docs) => {
                    let orders = decode_orders(docs);
                    tracing::debug!(scope = scope.label(), orders = orders.len(), "live order snapshot");
                    state.send_replace(FeedSnapshot {
                        phase: FeedPhase::Live,
                        orders,
                        warning: None,
                    });
                }
                // The store ended the stream under us, e.g. connectivity
                // loss. Same fallback as a failed subscribe.
                None => break true,
            },
            command = commands.recv() => match command {
                Some(FeedCommand::Refresh) => {
                    tracing::debug!(scope = scope.label(), "refresh ignored, feed is live");
                }
                Some(FeedCommand::Stop) | None => break false,
            },
        }
    };
    drop(subscription);

    if stream_lost {
        let cause = StoreError::Unavailable("live stream ended".into());
        run_degraded(&*store, scope, op_timeout, &metrics, &state, &mut commands, cause).await;
        return;
    }
    tracing::debug!(scope = scope.label(), "order feed stopped");
}

/// Fallback mode: one filtered, unsorted fetch now, another on every
/// refresh, plus a small diagnostic probe of global recent orders.
async fn run_degraded(
    store: &dyn DocumentStore,
    scope: OrderScope,
    op_timeout: Duration,
    metrics: &Metrics,
    state: &watch::Sender<FeedSnapshot>,
    commands: &mut mpsc::UnboundedReceiver<FeedCommand>,
    cause: StoreError,
) {
    metrics.record_feed_degraded(scope.label(), error_label(&cause));
    if cause.is_missing_index() {
        tracing::warn!(
            scope = scope.label(),
            error = %cause,
            "live order sync needs a composite index, serving one-shot fetches instead"
        );
    } else {
        tracing::warn!(
            scope = scope.label(),
            error = %cause,
            "live order sync unavailable, serving one-shot fetches instead"
        );
    }

    let warning = SyncWarning {
        message: format!("Realtime updates are off ({cause}); refresh to see new orders."),
        missing_index: cause.is_missing_index(),
    };

    publish_fetch(store, scope, op_timeout, metrics, state, &warning).await;
    sample_recent_orders(store, scope, op_timeout).await;

    while let Some(command) = commands.recv().await {
        match command {
            FeedCommand::Refresh => {
                publish_fetch(store, scope, op_timeout, metrics, state, &warning).await;
            }
            FeedCommand::Stop => break,
        }
    }
    tracing::debug!(scope = scope.label(), "order feed stopped");
}

/// One fallback fetch, published as a degraded snapshot. A failed fetch
/// keeps the previously published orders on screen next to the warning.
async fn publish_fetch(
    store: &dyn DocumentStore,
    scope: OrderScope,
    op_timeout: Duration,
    metrics: &Metrics,
    state: &watch::Sender<FeedSnapshot>,
    warning: &SyncWarning,
) {
    match bounded(op_timeout, store.query(&scope.fetch_query())).await {
        Ok(docs) => {
            metrics.record_fallback_fetch(scope.label());
            let orders = decode_orders(docs);
            tracing::info!(
                scope = scope.label(),
                orders = orders.len(),
                "fallback fetch served"
            );
            state.send_replace(FeedSnapshot {
                phase: FeedPhase::Degraded,
                orders,
                warning: Some(warning.clone()),
            });
        }
        Err(e) => {
            tracing::warn!(scope = scope.label(), error = %e, "fallback fetch failed");
            let stale = state.borrow().orders.clone();
            state.send_replace(FeedSnapshot {
                phase: FeedPhase::Degraded,
                orders: stale,
                warning: Some(SyncWarning {
                    message: format!("Orders may be out of date ({e}); refresh to retry."),
                    missing_index: warning.missing_index,
                }),
            });
        }
    }
}

/// Diagnostic probe: sample the most recent orders across the platform to
/// tell an index problem apart from a dead store. Outcome is only logged;
/// the fallback path never waits on or fails because of this.
async fn sample_recent_orders(store: &dyn DocumentStore, scope: OrderScope, op_timeout: Duration) {
    let probe = Query::collection(ORDERS)
        .sort_desc(CREATED_AT)
        .limit(DIAGNOSTIC_SAMPLE);
    match bounded(op_timeout, store.query(&probe)).await {
        Ok(rows) => tracing::info!(
            scope = scope.label(),
            sampled = rows.len(),
            "store reads work, degraded mode is query-specific"
        ),
        Err(e) => tracing::warn!(
            scope = scope.label(),
            error = %e,
            "diagnostic probe failed too, store reads are down"
        ),
    }
}

fn decode_orders(docs: Vec<(String, Document)>) -> Vec<Order> {
    docs.into_iter()
        .filter_map(|(id, doc)| match Order::from_document(&doc) {
            Ok(order) => Some(order),
            Err(e) => {
                tracing::warn!(doc_id = %id, error = %e, "skipping unreadable order document");
                None
            }
        })
        .collect()
}

fn error_label(e: &StoreError) -> &'static str {
    match e {
        StoreError::MissingIndex { .. } => "missing_index",
        StoreError::Unavailable(_) => "unavailable",
        StoreError::Timeout(_) => "timeout",
        StoreError::NotFound { .. } => "not_found",
        StoreError::Decode { .. } => "decode",
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
