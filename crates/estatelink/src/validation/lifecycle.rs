use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::batch::{run_batch, BatchOutcome};
use crate::config::ValidationConfig;
use crate::domain::{UserId, ValidatedEntity};
use crate::notify::{FanoutError, Notifier, NoticeTemplate};
use crate::store::{
    GuardedUpdate, StoreError, ValidationPatch, ValidationReminderEmail, ValidationStore,
};

const TOKEN_LENGTH: usize = 32;

/// Error raised by owner-facing validation operations. Sweep-side failures
/// never surface here; they are logged and collected per entity.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("validation token not recognized")]
    TokenNotFound,
    #[error("validation token has expired")]
    TokenExpired,
    #[error("no such listing or requirement")]
    NotFound,
    #[error("only the owner may reactivate this entry")]
    NotOwner,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-entity freshness state machine, identical for listings and
/// requirements: fresh → reminder sent → confirmed or expired →
/// deactivated → reactivatable by the owner.
///
/// State transitions are the source of truth; notification and email side
/// effects are best-effort and never block a transition.
pub struct ValidationLifecycle<S: ValidationStore> {
    store: Arc<S>,
    notifier: Notifier,
    config: ValidationConfig,
}

impl<S: ValidationStore> ValidationLifecycle<S> {
    pub fn new(store: Arc<S>, notifier: Notifier, config: ValidationConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Weekly pass: issues a fresh token to every entity whose validation or
    /// reminder timestamp has gone stale, then notifies and emails the owner.
    pub fn run_reminder_sweep(&self, now: DateTime<Utc>) -> Result<BatchOutcome, StoreError> {
        let cutoff = now - Duration::days(self.config.stale_after_days);
        let due = self.store.needing_validation(cutoff)?;
        tracing::info!(count = due.len(), "validation reminder sweep selected entities");

        Ok(run_batch(
            "validation reminders",
            due,
            |entity| entity.entity_id().to_string(),
            |mut entity| {
                let token = issue_token();
                {
                    let validation = entity.validation_mut();
                    validation.token = Some(token.clone());
                    validation.expires =
                        Some(now + Duration::hours(self.config.confirm_window_hours));
                    validation.last_reminder = Some(now);
                    validation.response_received = false;
                }
                self.store.update(&entity)?;
                self.remind_owner(&entity, &token);
                Ok::<(), StoreError>(())
            },
        ))
    }

    /// Daily pass: deactivates entities whose confirmation window has closed
    /// without a response. The write is guarded on the token still matching,
    /// so an entity confirmed concurrently is skipped rather than trampled.
    pub fn run_expiry_sweep(&self, now: DateTime<Utc>) -> Result<BatchOutcome, StoreError> {
        let expired = self.store.with_expired_validation(now)?;
        tracing::info!(count = expired.len(), "validation expiry sweep selected entities");

        Ok(run_batch(
            "validation expiry",
            expired,
            |entity| entity.entity_id().to_string(),
            |entity| {
                let Some(token) = entity.validation().token.clone() else {
                    // Token already consumed between select and write.
                    return Ok(());
                };

                let patch = ValidationPatch {
                    is_active: Some(false),
                    ..ValidationPatch::default()
                };
                match self.store.resolve_token(entity.entity_id(), &token, patch)? {
                    GuardedUpdate::Applied(updated) => {
                        self.notify_owner(
                            &updated,
                            NoticeTemplate::Deactivated {
                                kind: updated.kind(),
                                name: updated.display_name(),
                            },
                        );
                        Ok::<(), StoreError>(())
                    }
                    GuardedUpdate::StaleToken => {
                        tracing::info!(
                            entity = entity.entity_id(),
                            "expiry skipped, token resolved concurrently"
                        );
                        Ok(())
                    }
                }
            },
        ))
    }

    /// Consumes a reminder token. Reports `TokenExpired` both past the
    /// window and on losing the race against the expiry sweep; an unknown
    /// token reports `TokenNotFound`.
    pub fn confirm(&self, token: &str, now: DateTime<Utc>) -> Result<S::Entity, ValidationError> {
        let entity = self
            .store
            .by_validation_token(token)?
            .ok_or(ValidationError::TokenNotFound)?;

        let live = entity
            .validation()
            .expires
            .map_or(false, |expires| now <= expires);
        if !live {
            return Err(ValidationError::TokenExpired);
        }

        let patch = ValidationPatch {
            last_validated: Some(now),
            response_received: Some(true),
            ..ValidationPatch::default()
        };
        match self.store.resolve_token(entity.entity_id(), token, patch)? {
            GuardedUpdate::Applied(updated) => {
                self.notify_owner(
                    &updated,
                    NoticeTemplate::ValidationConfirmed {
                        kind: updated.kind(),
                        name: updated.display_name(),
                    },
                );
                Ok(updated)
            }
            GuardedUpdate::StaleToken => Err(ValidationError::TokenExpired),
        }
    }

    /// Owner-initiated revival of a deactivated entity. Unconditional once
    /// ownership is proven: no token required, stale validation fields are
    /// cleared.
    pub fn reactivate(
        &self,
        id: &str,
        caller: &UserId,
        now: DateTime<Utc>,
    ) -> Result<S::Entity, ValidationError> {
        let mut entity = self
            .store
            .by_entity_id(id)?
            .ok_or(ValidationError::NotFound)?;

        if entity.owner_id() != caller {
            return Err(ValidationError::NotOwner);
        }

        entity.set_active(true);
        {
            let validation = entity.validation_mut();
            validation.last_validated = Some(now);
            validation.response_received = false;
            validation.clear_token();
        }
        self.store.update(&entity)?;
        tracing::info!(entity = id, "entity reactivated by owner");
        Ok(entity)
    }

    /// Best-effort reminder side effects: one notification plus, when a
    /// transport is configured, one email with the token link.
    fn remind_owner(&self, entity: &S::Entity, token: &str) {
        let user = match self.notifier.user(entity.owner_id()) {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(
                    entity = entity.entity_id(),
                    "owner unknown to user directory, reminder dropped"
                );
                return;
            }
            Err(err) => {
                tracing::warn!(
                    entity = entity.entity_id(),
                    error = %err,
                    "owner lookup failed, reminder dropped"
                );
                return;
            }
        };

        let template = NoticeTemplate::ValidationReminder {
            kind: entity.kind(),
            name: entity.display_name(),
        };
        if let Err(err) = self
            .notifier
            .push(&user, template, Some(entity.entity_id().to_string()))
        {
            tracing::warn!(entity = entity.entity_id(), error = %err, "reminder notification failed");
        }

        if let Some(mailer) = self.notifier.mailer() {
            let email = ValidationReminderEmail {
                to: user.email.clone(),
                recipient_name: user.display_name.clone(),
                entity_kind: entity.kind(),
                entity_name: entity.display_name(),
                token: token.to_string(),
            };
            if let Err(err) = mailer.send_validation_reminder(email) {
                tracing::warn!(entity = entity.entity_id(), error = %err, "reminder email failed");
            }
        }
    }

    fn notify_owner(&self, entity: &S::Entity, template: NoticeTemplate) {
        let result: Result<(), FanoutError> = (|| {
            let Some(user) = self.notifier.user(entity.owner_id())? else {
                return Ok(());
            };
            self.notifier
                .push(&user, template, Some(entity.entity_id().to_string()))?;
            Ok(())
        })();
        if let Err(err) = result {
            tracing::warn!(entity = entity.entity_id(), error = %err, "lifecycle notification failed");
        }
    }
}

/// Opaque 32-character alphanumeric credential embedded in reminder links.
fn issue_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::issue_token;

    #[test]
    fn tokens_are_opaque_and_distinct() {
        let a = issue_token();
        let b = issue_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
