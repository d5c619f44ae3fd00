//! In-process implementation of [`DocumentStore`].
//!
//! Faithful to the backend in the two places callers can observe: composite
//! index enforcement for compound queries, and snapshot-per-change delivery
//! for subscriptions. Tests flip `set_offline` to exercise outage paths and
//! withhold `register_index` to exercise degradation paths.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Value;
use tokio::sync::mpsc;

use super::error::StoreError;
use super::{Document, DocumentStore, DocWatch, Query, SortDirection, Subscription};

struct QueryWatcher {
    query: Query,
    tx: mpsc::UnboundedSender<Vec<(String, Document)>>,
}

struct DocWatcher {
    collection: String,
    id: String,
    tx: mpsc::UnboundedSender<Option<Document>>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, Document>>,
    // (collection, filter field, sort field)
    indexes: HashSet<(String, String, String)>,
    query_watchers: HashMap<u64, QueryWatcher>,
    doc_watchers: HashMap<u64, DocWatcher>,
    next_watcher: u64,
    offline: bool,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a composite index, enabling queries that filter on
    /// `filter_field` and sort on `sort_field` within `collection`.
    pub fn register_index(&self, collection: &str, filter_field: &str, sort_field: &str) {
        let mut inner = self.lock();
        inner.indexes.insert((
            collection.to_string(),
            filter_field.to_string(),
            sort_field.to_string(),
        ));
    }

    /// Simulates losing the backend. While offline every operation fails
    /// with [`StoreError::Unavailable`] and all live listeners are ended.
    pub fn set_offline(&self, offline: bool) {
        let mut inner = self.lock();
        inner.offline = offline;
        if offline {
            inner.query_watchers.clear();
            inner.doc_watchers.clear();
        }
    }

    /// Number of live listeners currently registered. Exposed for teardown
    /// diagnostics.
    pub fn active_watchers(&self) -> usize {
        let inner = self.lock();
        inner.query_watchers.len() + inner.doc_watchers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves the data intact; keep serving.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn guard_online(inner: &Inner) -> Result<(), StoreError> {
        if inner.offline {
            Err(StoreError::Unavailable("store is offline".into()))
        } else {
            Ok(())
        }
    }

    fn ensure_indexed(inner: &Inner, query: &Query) -> Result<(), StoreError> {
        if !query.needs_composite_index() {
            return Ok(());
        }
        let (filter, sort) = match (&query.filter, &query.sort) {
            (Some(f), Some(s)) => (f, s),
            _ => return Ok(()),
        };
        let key = (
            query.collection.clone(),
            filter.field.clone(),
            sort.field.clone(),
        );
        if inner.indexes.contains(&key) {
            Ok(())
        } else {
            Err(StoreError::MissingIndex {
                collection: query.collection.clone(),
                filter_field: filter.field.clone(),
                sort_field: sort.field.clone(),
            })
        }
    }

    fn eval(collections: &HashMap<String, BTreeMap<String, Document>>, query: &Query) -> Vec<(String, Document)> {
        let mut out: Vec<(String, Document)> = collections
            .get(&query.collection)
            .into_iter()
            .flatten()
            .filter(|(_, doc)| match &query.filter {
                Some(filter) => doc.get(&filter.field) == Some(&filter.equals),
                None => true,
            })
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect();

        if let Some(sort) = &query.sort {
            // Documents without the sort field are excluded, as the backend
            // does for order-by queries.
            out.retain(|(_, doc)| doc.contains_key(&sort.field));
            out.sort_by(|(_, a), (_, b)| {
                let ord = compare_values(&a[&sort.field], &b[&sort.field]);
                match sort.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        out
    }

    /// Re-evaluates and delivers every live query over `collection`, pruning
    /// listeners whose receivers are gone.
    fn notify_collection(inner: &mut Inner, collection: &str) {
        let Inner {
            collections,
            query_watchers,
            ..
        } = inner;
        query_watchers.retain(|_, watcher| {
            if watcher.query.collection != collection {
                return true;
            }
            let snapshot = Self::eval(collections, &watcher.query);
            watcher.tx.send(snapshot).is_ok()
        });
    }

    fn notify_doc(inner: &mut Inner, collection: &str, id: &str) {
        let current = inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned();
        inner.doc_watchers.retain(|_, watcher| {
            if watcher.collection != collection || watcher.id != id {
                return true;
            }
            watcher.tx.send(current.clone()).is_ok()
        });
    }

    fn unsubscribe(inner: &Arc<Mutex<Inner>>, watcher_id: u64) {
        let mut guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.query_watchers.remove(&watcher_id);
        guard.doc_watchers.remove(&watcher_id);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let inner = self.lock();
        Self::guard_online(&inner)?;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn put(&self, collection: &str, id: &str, doc: Document) -> Result<(), StoreError> {
        let mut inner = self.lock();
        Self::guard_online(&inner)?;
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        Self::notify_collection(&mut inner, collection);
        Self::notify_doc(&mut inner, collection, id);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: Document,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        Self::guard_online(&inner)?;
        let doc = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        for (field, value) in changes {
            doc.insert(field, value);
        }
        Self::notify_collection(&mut inner, collection);
        Self::notify_doc(&mut inner, collection, id);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        Self::guard_online(&inner)?;
        let removed = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            Self::notify_collection(&mut inner, collection);
            Self::notify_doc(&mut inner, collection, id);
        }
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<(String, Document)>, StoreError> {
        let inner = self.lock();
        Self::guard_online(&inner)?;
        Self::ensure_indexed(&inner, query)?;
        Ok(Self::eval(&inner.collections, query))
    }

    async fn subscribe(&self, query: &Query) -> Result<Subscription, StoreError> {
        let mut inner = self.lock();
        Self::guard_online(&inner)?;
        Self::ensure_indexed(&inner, query)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let initial = Self::eval(&inner.collections, query);
        // Receiver was just created; this send cannot fail.
        let _ = tx.send(initial);

        let watcher_id = inner.next_watcher;
        inner.next_watcher += 1;
        inner.query_watchers.insert(
            watcher_id,
            QueryWatcher {
                query: query.clone(),
                tx,
            },
        );

        let handle = Arc::clone(&self.inner);
        Ok(Subscription::new(rx, move || {
            Self::unsubscribe(&handle, watcher_id);
        }))
    }

    async fn watch_doc(&self, collection: &str, id: &str) -> Result<DocWatch, StoreError> {
        let mut inner = self.lock();
        Self::guard_online(&inner)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let current = inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned();
        let _ = tx.send(current);

        let watcher_id = inner.next_watcher;
        inner.next_watcher += 1;
        inner.doc_watchers.insert(
            watcher_id,
            DocWatcher {
                collection: collection.to_string(),
                id: id.to_string(),
                tx,
            },
        );

        let handle = Arc::clone(&self.inner);
        Ok(DocWatch::new(rx, move || {
            Self::unsubscribe(&handle, watcher_id);
        }))
    }
}

/// Typed comparison for sort keys: numbers numerically, RFC 3339 strings as
/// timestamps, everything else lexically within its type.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(dx), Ok(dy)) => dx.cmp(&dy),
                _ => x.cmp(y),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}
