use std::collections::BTreeMap;
use std::sync::Arc;

use crate::batch::{run_batch, BatchOutcome};
use crate::config::MatchingConfig;
use crate::domain::{Listing, Requirement, SubscriptionTier, User, UserId};
use crate::matching::{MatchEngine, MatchOutcome};
use crate::store::{InstantMatchEmail, ListingStore, RequirementStore, StoreError};

use super::{FanoutError, MatchDirection, Notifier, NoticeTemplate};

/// Synchronous match check run right after a listing or requirement is
/// created or updated. Premium recipients only; free-tier accounts wait for
/// the scheduled digest.
///
/// Intended as a best-effort post-commit step: the caller logs a returned
/// error, it never fails the triggering request.
pub struct InstantMatchFanout<L, R> {
    listings: Arc<L>,
    requirements: Arc<R>,
    notifier: Notifier,
    engine: MatchEngine,
    config: MatchingConfig,
}

impl<L, R> InstantMatchFanout<L, R>
where
    L: ListingStore,
    R: RequirementStore,
{
    pub fn new(
        listings: Arc<L>,
        requirements: Arc<R>,
        notifier: Notifier,
        config: MatchingConfig,
    ) -> Self {
        Self {
            listings,
            requirements,
            notifier,
            engine: MatchEngine::new(config.min_score),
            config,
        }
    }

    /// Alerts premium buyers whose active requirements match the new or
    /// updated listing. One notification and at most one email per buyer
    /// per event, capped at the configured batch size.
    pub fn listing_published(&self, listing: &Listing) -> Result<BatchOutcome, StoreError> {
        let requirements = self.requirements.active_requirements()?;
        let matches = self.engine.matches_for_listing(listing, &requirements);

        let mut per_buyer: BTreeMap<UserId, Vec<MatchOutcome>> = BTreeMap::new();
        for outcome in matches {
            per_buyer
                .entry(outcome.requirement.buyer.clone())
                .or_default()
                .push(outcome);
        }

        let related = listing.id.0.clone();
        let batches: Vec<(UserId, Vec<MatchOutcome>)> = per_buyer.into_iter().collect();
        Ok(run_batch(
            "instant listing fan-out",
            batches,
            |(buyer, _)| buyer.0.clone(),
            |(buyer, batch)| {
                self.deliver(&buyer, batch, MatchDirection::Listings, related.clone())
            },
        ))
    }

    /// The symmetric direction: alerts premium owners whose active listings
    /// match a freshly posted requirement.
    pub fn requirement_published(
        &self,
        requirement: &Requirement,
    ) -> Result<BatchOutcome, StoreError> {
        let listings = self.listings.active_listings()?;
        let matches = self.engine.matches_for_requirement(&listings, requirement);

        let mut per_owner: BTreeMap<UserId, Vec<MatchOutcome>> = BTreeMap::new();
        for outcome in matches {
            per_owner
                .entry(outcome.listing.owner.clone())
                .or_default()
                .push(outcome);
        }

        let related = requirement.id.0.clone();
        let batches: Vec<(UserId, Vec<MatchOutcome>)> = per_owner.into_iter().collect();
        Ok(run_batch(
            "instant requirement fan-out",
            batches,
            |(owner, _)| owner.0.clone(),
            |(owner, batch)| {
                self.deliver(&owner, batch, MatchDirection::Requirements, related.clone())
            },
        ))
    }

    fn deliver(
        &self,
        recipient: &UserId,
        mut batch: Vec<MatchOutcome>,
        direction: MatchDirection,
        related_id: String,
    ) -> Result<(), FanoutError> {
        let Some(user) = self.notifier.user(recipient)? else {
            tracing::warn!(user = %recipient.0, "match recipient unknown to user directory");
            return Ok(());
        };
        if user.tier != SubscriptionTier::Premium {
            return Ok(());
        }

        batch.truncate(self.config.instant_match_cap);
        let Some(best) = batch.first() else {
            return Ok(());
        };

        let best_name = counterpart_name(best, direction);
        let template = if batch.len() == 1 {
            NoticeTemplate::InstantMatch {
                direction,
                name: best_name.clone(),
                score: best.percentage(),
            }
        } else {
            NoticeTemplate::InstantMatchBatch {
                direction,
                count: batch.len(),
                top_score: best.percentage(),
            }
        };

        self.notifier.push(&user, template, Some(related_id))?;
        self.email_best(&user, best, direction, batch.len());
        Ok(())
    }

    /// Email delivery is best-effort on top of an already-recorded
    /// notification; a transport failure is logged and swallowed.
    fn email_best(
        &self,
        user: &User,
        best: &MatchOutcome,
        direction: MatchDirection,
        total_matches: usize,
    ) {
        let Some(mailer) = self.notifier.mailer() else {
            return;
        };
        let email = InstantMatchEmail {
            to: user.email.clone(),
            recipient_name: user.display_name.clone(),
            direction,
            best_match_name: counterpart_name(best, direction),
            best_match_score: best.percentage(),
            total_matches,
        };
        if let Err(err) = mailer.send_instant_match(email) {
            tracing::warn!(user = %user.id.0, error = %err, "instant match email failed");
        }
    }
}

/// The entity the recipient is being told about: buyers see the listing,
/// owners see the requirement.
fn counterpart_name(outcome: &MatchOutcome, direction: MatchDirection) -> String {
    match direction {
        MatchDirection::Listings => outcome.listing.title.clone(),
        MatchDirection::Requirements => outcome.requirement.summary(),
    }
}
