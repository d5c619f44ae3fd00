use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use super::AccessError;

// ============================================================================
// Developer Console Gate
// ============================================================================

const DEV_CONSOLE_UNLOCKED: &str = "dev_console_unlocked";

/// Ephemeral per-session flags. Never persisted: signing out (or starting a
/// fresh session) drops every flag, so the developer console re-prompts.
#[derive(Debug, Default)]
pub struct SessionFlags {
    flags: Mutex<HashSet<String>>,
}

impl SessionFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, flag: &str) {
        self.lock().insert(flag.to_string());
    }

    pub fn is_set(&self, flag: &str) -> bool {
        self.lock().contains(flag)
    }

    pub fn clear_all(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Guards the developer console behind a deploy-time shared secret.
///
/// This is a convenience latch, not a trust boundary: the secret ships in
/// client configuration and real enforcement stays server-side. With no
/// secret configured the gate waves everyone with the developer role through.
#[derive(Debug, Clone)]
pub struct DeveloperGate {
    secret: Option<String>,
}

impl DeveloperGate {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn requires_secret(&self) -> bool {
        self.secret.is_some()
    }

    pub fn is_unlocked(&self, flags: &SessionFlags) -> bool {
        self.secret.is_none() || flags.is_set(DEV_CONSOLE_UNLOCKED)
    }

    /// Fails with [`AccessError::SecretRequired`] while the console is still
    /// locked for this session.
    pub fn check(&self, flags: &SessionFlags) -> Result<(), AccessError> {
        if self.is_unlocked(flags) {
            Ok(())
        } else {
            Err(AccessError::SecretRequired)
        }
    }

    /// Verifies a supplied secret and remembers success for the rest of the
    /// session, so the console prompts at most once.
    pub fn unlock(&self, flags: &SessionFlags, supplied: &str) -> Result<(), AccessError> {
        match &self.secret {
            None => Ok(()),
            Some(secret) if supplied == secret => {
                flags.set(DEV_CONSOLE_UNLOCKED);
                tracing::debug!("developer console unlocked for this session");
                Ok(())
            }
            Some(_) => {
                tracing::warn!("developer console unlock attempt with wrong secret");
                Err(AccessError::BadSecret)
            }
        }
    }
}
