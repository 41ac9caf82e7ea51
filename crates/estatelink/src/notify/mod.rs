//! Notification fan-out: instant match alerts, daily match sweeps, and the
//! shared collaborator bundle they render notifications through.

pub mod content;
pub mod instant;
pub mod sweeps;

use std::sync::Arc;

use crate::domain::{NewNotification, Notification, User, UserId};
use crate::store::{Mailer, MailError, NotificationSink, StoreError, UserDirectory};

pub use content::{BuiltinCatalog, MatchDirection, MessageCatalog, NoticeTemplate, NoticeText};
pub use instant::InstantMatchFanout;
pub use sweeps::ScheduledMatchSweeps;

/// Collaborators every fan-out path needs: account lookup, the notification
/// log, the message catalog, and an optional mail transport.
#[derive(Clone)]
pub struct Notifier {
    users: Arc<dyn UserDirectory>,
    notifications: Arc<dyn NotificationSink>,
    catalog: Arc<dyn MessageCatalog>,
    mailer: Option<Arc<dyn Mailer>>,
}

impl Notifier {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        notifications: Arc<dyn NotificationSink>,
        catalog: Arc<dyn MessageCatalog>,
    ) -> Self {
        Self {
            users,
            notifications,
            catalog,
            mailer: None,
        }
    }

    /// Attaches an outbound mail transport. Without one, every email-bearing
    /// path degrades to notifications only.
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn mailer(&self) -> Option<&Arc<dyn Mailer>> {
        self.mailer.as_ref()
    }

    pub fn user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        self.users.user_by_id(id)
    }

    /// Renders the template in the recipient's language and appends it to
    /// their notification log.
    pub fn push(
        &self,
        user: &User,
        template: NoticeTemplate,
        related_id: Option<String>,
    ) -> Result<Notification, StoreError> {
        let text = self.catalog.render(&user.language, &template);
        self.notifications.create(NewNotification {
            user_id: user.id.clone(),
            kind: template.kind(),
            title: text.title,
            content: text.content,
            related_id,
        })
    }
}

/// Error raised inside a fan-out step; items failing with this are recorded
/// by the batch runner, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Mail(#[from] MailError),
}
