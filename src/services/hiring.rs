use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::access::AccessError;
use crate::domain::hiring::{HiringError, HiringRequest, HiringStatus};
use crate::domain::restaurant::Restaurant;
use crate::domain::user::{Role, UserProfile};
use crate::metrics::Metrics;
use crate::store::collections::HIRING_REQUESTS;
use crate::store::{Document, DocumentStore, Query, StoreError};
use crate::utils::bounded;

// ============================================================================
// Hiring Action Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum HiringActionError {
    #[error("hiring request {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Workflow(#[from] HiringError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// Hiring Service
// ============================================================================

/// Courier / restaurant hiring workflow: couriers apply, restaurant owners
/// (or platform staff) accept or reject, each request decided exactly once.
pub struct HiringService {
    store: Arc<dyn DocumentStore>,
    op_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl HiringService {
    pub fn new(store: Arc<dyn DocumentStore>, op_timeout: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            op_timeout,
            metrics,
        }
    }

    /// Files a new application from `courier` to `restaurant`.
    ///
    /// One pending application per courier/restaurant pair: a second submit
    /// while the first is undecided is rejected. A rejected or accepted
    /// request does not block a fresh one.
    pub async fn submit_request(
        &self,
        courier: &UserProfile,
        restaurant: &Restaurant,
    ) -> Result<HiringRequest, HiringActionError> {
        match courier.role {
            Role::Courier => {}
            Role::Customer | Role::Owner | Role::Admin | Role::Developer => {
                return Err(AccessError::Forbidden { role: courier.role }.into());
            }
        }

        if self
            .has_pending_request(courier.id, restaurant.id)
            .await?
        {
            return Err(HiringError::AlreadyPending.into());
        }

        let request = HiringRequest::submit(courier, restaurant, Utc::now());
        bounded(
            self.op_timeout,
            self.store.put(
                HIRING_REQUESTS,
                &request.id.to_string(),
                request.to_document()?,
            ),
        )
        .await?;

        self.metrics.hiring_requests.inc();
        tracing::info!(
            request_id = %request.id,
            courier = %request.courier_name,
            restaurant = %request.restaurant_name,
            "📨 hiring request filed"
        );
        Ok(request)
    }

    /// All requests filed against the caller's restaurant, newest first.
    pub async fn requests_for_restaurant(
        &self,
        actor: &UserProfile,
    ) -> Result<Vec<HiringRequest>, HiringActionError> {
        match actor.role {
            Role::Owner | Role::Admin | Role::Developer => {}
            Role::Customer | Role::Courier => {
                return Err(AccessError::Forbidden { role: actor.role }.into());
            }
        }

        let query = Query::collection(HIRING_REQUESTS)
            .filter_eq("restaurantId", actor.id.to_string());
        let docs = bounded(self.op_timeout, self.store.query(&query)).await?;

        let mut requests = decode_requests(docs);
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    /// Accepts or rejects a request on behalf of `actor`.
    pub async fn decide(
        &self,
        actor: &UserProfile,
        request_id: Uuid,
        accept: bool,
    ) -> Result<HiringRequest, HiringActionError> {
        let doc = bounded(
            self.op_timeout,
            self.store.get(HIRING_REQUESTS, &request_id.to_string()),
        )
        .await?
        .ok_or(HiringActionError::NotFound(request_id))?;
        let mut request = HiringRequest::from_document(&doc)?;

        match actor.role {
            Role::Owner if request.restaurant_id == actor.id => {}
            Role::Admin | Role::Developer => {}
            _ => return Err(AccessError::Forbidden { role: actor.role }.into()),
        }

        request.decide(accept)?;

        let mut changes = Document::new();
        changes.insert(
            "status".into(),
            serde_json::Value::String(request.status.as_str().to_string()),
        );
        bounded(
            self.op_timeout,
            self.store
                .update(HIRING_REQUESTS, &request_id.to_string(), changes),
        )
        .await?;

        self.metrics.record_hiring_decision(accept);
        tracing::info!(
            %request_id,
            decision = %request.status,
            actor_role = %actor.role,
            "hiring request decided"
        );
        Ok(request)
    }

    async fn has_pending_request(
        &self,
        courier_id: Uuid,
        restaurant_id: Uuid,
    ) -> Result<bool, StoreError> {
        let query =
            Query::collection(HIRING_REQUESTS).filter_eq("courierId", courier_id.to_string());
        let docs = bounded(self.op_timeout, self.store.query(&query)).await?;
        Ok(decode_requests(docs)
            .into_iter()
            .any(|r| r.restaurant_id == restaurant_id && r.status == HiringStatus::Pending))
    }
}

fn decode_requests(docs: Vec<(String, Document)>) -> Vec<HiringRequest> {
    docs.into_iter()
        .filter_map(|(id, doc)| match HiringRequest::from_document(&doc) {
            Ok(request) => Some(request),
            Err(e) => {
                tracing::warn!(doc_id = %id, error = %e, "skipping unreadable hiring request");
                None
            }
        })
        .collect()
}
