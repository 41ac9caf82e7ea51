use serde::{Deserialize, Serialize};

use crate::domain::{EntityKind, NotificationKind};

/// Which side of the marketplace a match notification speaks to: buyers
/// hear about listings, owners hear about buyer requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchDirection {
    Listings,
    Requirements,
}

/// Structured notification payload, rendered to localized text by a
/// [`MessageCatalog`] before it reaches the notification store or an email.
#[derive(Debug, Clone, PartialEq)]
pub enum NoticeTemplate {
    ValidationReminder {
        kind: EntityKind,
        name: String,
    },
    Deactivated {
        kind: EntityKind,
        name: String,
    },
    ValidationConfirmed {
        kind: EntityKind,
        name: String,
    },
    InstantMatch {
        direction: MatchDirection,
        name: String,
        score: u8,
    },
    InstantMatchBatch {
        direction: MatchDirection,
        count: usize,
        top_score: u8,
    },
    LatestMatches {
        direction: MatchDirection,
        count: usize,
    },
}

impl NoticeTemplate {
    pub fn kind(&self) -> NotificationKind {
        match self {
            NoticeTemplate::ValidationReminder { .. } => NotificationKind::ValidationReminder,
            NoticeTemplate::Deactivated {
                kind: EntityKind::Listing,
                ..
            } => NotificationKind::ListingDeactivated,
            NoticeTemplate::Deactivated {
                kind: EntityKind::Requirement,
                ..
            } => NotificationKind::RequirementDeactivated,
            NoticeTemplate::ValidationConfirmed { .. } => NotificationKind::ValidationConfirmed,
            NoticeTemplate::InstantMatch { direction, .. }
            | NoticeTemplate::InstantMatchBatch { direction, .. } => match direction {
                MatchDirection::Listings => NotificationKind::PropertyMatch,
                MatchDirection::Requirements => NotificationKind::RequirementMatch,
            },
            NoticeTemplate::LatestMatches { .. } => NotificationKind::LatestMatches,
        }
    }
}

/// Rendered title/content pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeText {
    pub title: String,
    pub content: String,
}

/// Localized rendering of notification templates. Pure lookup from the
/// core's perspective; the production implementation fronts the translation
/// service.
pub trait MessageCatalog: Send + Sync {
    fn render(&self, language: &str, template: &NoticeTemplate) -> NoticeText;
}

/// English-only catalog shipped with the library. Serves as the fallback for
/// any language until a translated catalog is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinCatalog;

impl MessageCatalog for BuiltinCatalog {
    fn render(&self, _language: &str, template: &NoticeTemplate) -> NoticeText {
        match template {
            NoticeTemplate::ValidationReminder { kind, name } => NoticeText {
                title: format!("Is your {} still available?", kind.label()),
                content: format!(
                    "Please confirm that \"{name}\" is still available. \
                     The confirmation link expires in 24 hours; without a \
                     confirmation the {} will be deactivated.",
                    kind.label()
                ),
            },
            NoticeTemplate::Deactivated { kind, name } => NoticeText {
                title: format!("Your {} was deactivated", kind.label()),
                content: format!(
                    "We did not receive a confirmation for \"{name}\", so it \
                     was deactivated. You can reactivate it from your \
                     dashboard at any time."
                ),
            },
            NoticeTemplate::ValidationConfirmed { kind, name } => NoticeText {
                title: "Thanks for confirming".to_string(),
                content: format!("\"{name}\" stays active as a {}.", kind.label()),
            },
            NoticeTemplate::InstantMatch {
                direction,
                name,
                score,
            } => match direction {
                MatchDirection::Listings => NoticeText {
                    title: "A new property matches your requirement".to_string(),
                    content: format!("\"{name}\" matches at {score}% compatibility."),
                },
                MatchDirection::Requirements => NoticeText {
                    title: "A buyer is looking for a property like yours".to_string(),
                    content: format!("\"{name}\" matches at {score}% compatibility."),
                },
            },
            NoticeTemplate::InstantMatchBatch {
                direction,
                count,
                top_score,
            } => match direction {
                MatchDirection::Listings => NoticeText {
                    title: format!("{count} new properties match your requirement"),
                    content: format!("Your best match scores {top_score}% compatibility."),
                },
                MatchDirection::Requirements => NoticeText {
                    title: format!("{count} buyers are looking for a property like yours"),
                    content: format!("Your best match scores {top_score}% compatibility."),
                },
            },
            NoticeTemplate::LatestMatches { direction, count } => match direction {
                MatchDirection::Listings => NoticeText {
                    title: format!("{count} matching properties today"),
                    content: format!(
                        "{count} active properties currently match your \
                         requirements. Open the app to review them."
                    ),
                },
                MatchDirection::Requirements => NoticeText {
                    title: format!("{count} interested buyers today"),
                    content: format!(
                        "{count} active buyer requirements currently match \
                         your properties. Open the app to review them."
                    ),
                },
            },
        }
    }
}
