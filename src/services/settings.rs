use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::access::AccessError;
use crate::domain::settings::PlatformSettings;
use crate::domain::user::{Role, UserProfile};
use crate::store::collections::{SETTINGS, SETTINGS_DOC};
use crate::store::{DocumentStore, StoreError};
use crate::utils::bounded;

// ============================================================================
// Settings Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("commission rate {0} is outside the valid range 0..=1")]
    RateOutOfRange(Decimal),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// Live Settings Handle
// ============================================================================

/// A live view of `settings/app`. Checkout reads the commission rate from
/// here at the instant of submission; nothing downstream re-reads it.
///
/// A missing or malformed settings document yields the zero-commission
/// default rather than blocking orders.
pub struct SettingsHandle {
    current: watch::Receiver<PlatformSettings>,
    watcher: JoinHandle<()>,
}

impl SettingsHandle {
    /// Opens the watch and waits for the first value, so callers never see a
    /// made-up rate while the real one is in flight.
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        op_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let mut doc_watch = bounded(op_timeout, store.watch_doc(SETTINGS, SETTINGS_DOC)).await?;

        let initial = match tokio::time::timeout(op_timeout, doc_watch.next()).await {
            Ok(Some(doc)) => read_settings(doc.as_ref()),
            // Channel closed or first delivery overdue: start from the safe
            // default, the watcher below will correct it.
            Ok(None) | Err(_) => PlatformSettings::default(),
        };
        tracing::info!(rate = %initial.commission_rate, "platform settings loaded");

        let (tx, rx) = watch::channel(initial);
        let watcher = tokio::spawn(async move {
            while let Some(doc) = doc_watch.next().await {
                let settings = read_settings(doc.as_ref());
                tracing::info!(rate = %settings.commission_rate, "platform settings changed");
                tx.send_replace(settings);
            }
            tracing::debug!("settings watch ended");
        });

        Ok(Self {
            current: rx,
            watcher,
        })
    }

    pub fn current(&self) -> PlatformSettings {
        *self.current.borrow()
    }

    pub fn commission_rate(&self) -> Decimal {
        self.current.borrow().commission_rate
    }

    /// A receiver for code that wants to observe rate changes itself.
    pub fn subscribe(&self) -> watch::Receiver<PlatformSettings> {
        self.current.clone()
    }
}

impl Drop for SettingsHandle {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

fn read_settings(doc: Option<&crate::store::Document>) -> PlatformSettings {
    match doc {
        Some(doc) => PlatformSettings::from_document(doc),
        None => {
            tracing::warn!("no settings document, charging no commission");
            PlatformSettings::default()
        }
    }
}

// ============================================================================
// Settings Administration
// ============================================================================

/// Writes to `settings/app`. Only administrative roles get this far; the
/// new rate applies to future submissions only, never to existing orders.
pub struct SettingsService {
    store: Arc<dyn DocumentStore>,
    op_timeout: Duration,
}

impl SettingsService {
    pub fn new(store: Arc<dyn DocumentStore>, op_timeout: Duration) -> Self {
        Self { store, op_timeout }
    }

    pub async fn update_commission_rate(
        &self,
        actor: &UserProfile,
        rate: Decimal,
    ) -> Result<(), SettingsError> {
        match actor.role {
            Role::Admin | Role::Developer => {}
            Role::Customer | Role::Owner | Role::Courier => {
                return Err(AccessError::Forbidden { role: actor.role }.into());
            }
        }
        if !PlatformSettings::rate_in_range(rate) {
            return Err(SettingsError::RateOutOfRange(rate));
        }

        let settings = PlatformSettings::new(rate);
        bounded(
            self.op_timeout,
            self.store
                .put(SETTINGS, SETTINGS_DOC, settings.to_document()),
        )
        .await?;
        tracing::info!(%rate, actor_role = %actor.role, "✅ commission rate updated");
        Ok(())
    }
}
