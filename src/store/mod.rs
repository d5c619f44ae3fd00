//! Document store abstraction.
//!
//! The platform keeps all shared state in a schemaless document store:
//! collections of JSON-object documents addressed by string ids, with
//! last-write-wins updates and no transactions. [`DocumentStore`] is the
//! narrow seam the services talk through; [`MemoryStore`] is the in-process
//! implementation used by the demo binary and the test suite.
//!
//! Two properties of the real backend are modelled faithfully because the
//! rest of the system depends on them:
//!
//! - a query that combines an equality filter with an order-by on a
//!   *different* field needs a composite index, and fails with
//!   [`StoreError::MissingIndex`] when none exists;
//! - subscriptions deliver a full snapshot immediately on registration and
//!   again after every matching change.

pub mod document;
pub mod error;
pub mod memory;

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::Stream;
use serde_json::Value;
use tokio::sync::mpsc;

pub use document::Document;
pub use error::StoreError;
pub use memory::MemoryStore;

/// Collection names, shared between services, seeds and tests.
pub mod collections {
    pub const USERS: &str = "users";
    pub const RESTAURANTS: &str = "restaurants";
    pub const MENU_ITEMS: &str = "menuItems";
    pub const ORDERS: &str = "orders";
    pub const HIRING_REQUESTS: &str = "hiringRequests";
    pub const SETTINGS: &str = "settings";

    /// The single well-known document id in the `settings` collection.
    pub const SETTINGS_DOC: &str = "app";
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub equals: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filter: Option<Filter>,
    pub sort: Option<SortKey>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filter: None,
            sort: None,
            limit: None,
        }
    }

    pub fn filter_eq(mut self, field: impl Into<String>, equals: impl Into<Value>) -> Self {
        self.filter = Some(Filter {
            field: field.into(),
            equals: equals.into(),
        });
        self
    }

    pub fn sort_asc(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(SortKey {
            field: field.into(),
            direction: SortDirection::Ascending,
        });
        self
    }

    pub fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(SortKey {
            field: field.into(),
            direction: SortDirection::Descending,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// The same query with the sort key stripped. This is the degraded shape
    /// used when the sorted form cannot be served.
    pub fn without_sort(&self) -> Self {
        Self {
            sort: None,
            ..self.clone()
        }
    }

    /// True when serving this query requires a composite index: an equality
    /// filter combined with a sort on a different field.
    pub fn needs_composite_index(&self) -> bool {
        match (&self.filter, &self.sort) {
            (Some(filter), Some(sort)) => filter.field != sort.field,
            _ => false,
        }
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

/// Runs an arbitrary cleanup on drop. Subscriptions carry one so that
/// dropping the handle is all a consumer needs to do to detach.
pub struct CancelGuard(Option<Box<dyn FnOnce() + Send>>);

impl CancelGuard {
    pub fn new(on_cancel: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(on_cancel)))
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(cancel) = self.0.take() {
            cancel();
        }
    }
}

/// A live query: yields the full matching snapshot on registration and after
/// every relevant change. Ends when the store shuts down or the handle is
/// dropped.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Vec<(String, Document)>>,
    _guard: CancelGuard,
}

impl Subscription {
    pub fn new(
        rx: mpsc::UnboundedReceiver<Vec<(String, Document)>>,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            _guard: CancelGuard::new(on_cancel),
        }
    }
}

impl Stream for Subscription {
    type Item = Vec<(String, Document)>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// A live single-document watch. Yields `None` items when the document does
/// not exist (yet, or anymore).
pub struct DocWatch {
    rx: mpsc::UnboundedReceiver<Option<Document>>,
    _guard: CancelGuard,
}

impl DocWatch {
    pub fn new(
        rx: mpsc::UnboundedReceiver<Option<Document>>,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            _guard: CancelGuard::new(on_cancel),
        }
    }
}

impl Stream for DocWatch {
    type Item = Option<Document>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

// ============================================================================
// Store trait
// ============================================================================

#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Fetches one document. Absence is not an error.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Creates or fully replaces a document.
    async fn put(&self, collection: &str, id: &str, doc: Document) -> Result<(), StoreError>;

    /// Merges the given fields into an existing document, leaving every other
    /// field untouched. Fails with [`StoreError::NotFound`] when the document
    /// does not exist.
    async fn update(&self, collection: &str, id: &str, changes: Document)
        -> Result<(), StoreError>;

    /// Deletes a document. Deleting an absent document is a no-op.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Runs a one-shot query.
    async fn query(&self, query: &Query) -> Result<Vec<(String, Document)>, StoreError>;

    /// Registers a live query. The first snapshot is delivered immediately.
    async fn subscribe(&self, query: &Query) -> Result<Subscription, StoreError>;

    /// Watches a single document. The current state is delivered immediately.
    async fn watch_doc(&self, collection: &str, id: &str) -> Result<DocWatch, StoreError>;
}
