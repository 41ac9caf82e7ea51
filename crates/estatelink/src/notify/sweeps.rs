use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::batch::{run_batch, BatchOutcome};
use crate::config::MatchingConfig;
use crate::domain::{Listing, Requirement, UserId};
use crate::matching::{
    dedupe_by_listing, dedupe_by_requirement, MatchEngine, MatchOutcome,
};
use crate::store::{
    DailyDigestEmail, DigestEntry, ListingStore, RequirementStore, StoreError,
};

use super::{FanoutError, MatchDirection, Notifier, NoticeTemplate};

/// The two scheduled match sweeps: the in-app "latest matches" pass over the
/// whole active set, and the emailed daily digest over the trailing creation
/// window.
pub struct ScheduledMatchSweeps<L, R> {
    listings: Arc<L>,
    requirements: Arc<R>,
    notifier: Notifier,
    engine: MatchEngine,
    config: MatchingConfig,
}

impl<L, R> ScheduledMatchSweeps<L, R>
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

    /// One notification per user and direction carrying the deduped match
    /// count. The buyer-side and owner-side passes are independent: a user
    /// active on both sides receives two notifications in the same run.
    pub fn run_latest_matches_sweep(&self) -> Result<BatchOutcome, StoreError> {
        let listings = self.listings.active_listings()?;
        let requirements = self.requirements.active_requirements()?;

        let buyer_side = run_batch(
            "latest matches (buyers)",
            group_requirements(&requirements),
            |(buyer, _)| buyer.0.clone(),
            |(buyer, owned)| {
                let matched =
                    dedupe_by_listing(self.engine.matches_for_requirements(&listings, &owned));
                self.push_latest(&buyer, MatchDirection::Listings, matched.len())
            },
        );

        let owner_side = run_batch(
            "latest matches (owners)",
            group_listings(&listings),
            |(owner, _)| owner.0.clone(),
            |(owner, owned)| {
                let mut outcomes: Vec<MatchOutcome> = Vec::new();
                for listing in &owned {
                    outcomes.extend(self.engine.matches_for_listing(listing, &requirements));
                }
                let matched = dedupe_by_requirement(outcomes);
                self.push_latest(&owner, MatchDirection::Requirements, matched.len())
            },
        );

        Ok(buyer_side.merge(owner_side))
    }

    /// One combined email per verified user covering entities created within
    /// the trailing digest window. Skipped entirely when no mail transport
    /// is configured.
    pub fn run_digest_sweep(&self, now: DateTime<Utc>) -> Result<BatchOutcome, StoreError> {
        let Some(mailer) = self.notifier.mailer().cloned() else {
            tracing::debug!("no mail transport configured, skipping daily digest");
            return Ok(BatchOutcome::default());
        };

        let since = now - Duration::days(self.config.digest_window_days);
        let fresh_listings = self.listings.listings_created_after(since)?;
        let fresh_requirements = self.requirements.requirements_created_after(since)?;
        let listings = self.listings.active_listings()?;
        let requirements = self.requirements.active_requirements()?;

        let mut recipients: BTreeSet<UserId> = BTreeSet::new();
        recipients.extend(listings.iter().map(|l| l.owner.clone()));
        recipients.extend(requirements.iter().map(|r| r.buyer.clone()));

        Ok(run_batch(
            "daily digest",
            recipients.into_iter().collect(),
            |user_id: &UserId| user_id.0.clone(),
            |user_id| {
                let Some(user) = self.notifier.user(&user_id)? else {
                    return Ok(());
                };
                if !user.email_verified {
                    return Ok(());
                }

                let owned_requirements: Vec<Requirement> = requirements
                    .iter()
                    .filter(|r| r.buyer == user_id)
                    .cloned()
                    .collect();
                let mut property_matches = dedupe_by_listing(
                    self.engine
                        .matches_for_requirements(&fresh_listings, &owned_requirements),
                );
                property_matches.truncate(self.config.digest_match_cap);

                let mut outcomes: Vec<MatchOutcome> = Vec::new();
                for listing in listings.iter().filter(|l| l.owner == user_id) {
                    outcomes.extend(
                        self.engine
                            .matches_for_listing(listing, &fresh_requirements),
                    );
                }
                let mut requirement_matches = dedupe_by_requirement(outcomes);
                requirement_matches.truncate(self.config.digest_match_cap);

                if property_matches.is_empty() && requirement_matches.is_empty() {
                    return Ok(());
                }

                mailer.send_daily_digest(DailyDigestEmail {
                    to: user.email.clone(),
                    recipient_name: user.display_name.clone(),
                    property_matches: property_matches
                        .iter()
                        .map(|o| DigestEntry {
                            name: o.listing.title.clone(),
                            score: o.percentage(),
                        })
                        .collect(),
                    requirement_matches: requirement_matches
                        .iter()
                        .map(|o| DigestEntry {
                            name: o.requirement.summary(),
                            score: o.percentage(),
                        })
                        .collect(),
                })?;
                Ok::<(), FanoutError>(())
            },
        ))
    }

    fn push_latest(
        &self,
        recipient: &UserId,
        direction: MatchDirection,
        count: usize,
    ) -> Result<(), FanoutError> {
        if count == 0 {
            return Ok(());
        }
        let Some(user) = self.notifier.user(recipient)? else {
            tracing::warn!(user = %recipient.0, "sweep recipient unknown to user directory");
            return Ok(());
        };
        self.notifier
            .push(&user, NoticeTemplate::LatestMatches { direction, count }, None)?;
        Ok(())
    }
}

fn group_requirements(requirements: &[Requirement]) -> Vec<(UserId, Vec<Requirement>)> {
    let mut grouped: BTreeMap<UserId, Vec<Requirement>> = BTreeMap::new();
    for requirement in requirements {
        grouped
            .entry(requirement.buyer.clone())
            .or_default()
            .push(requirement.clone());
    }
    grouped.into_iter().collect()
}

fn group_listings(listings: &[Listing]) -> Vec<(UserId, Vec<Listing>)> {
    let mut grouped: BTreeMap<UserId, Vec<Listing>> = BTreeMap::new();
    for listing in listings {
        grouped
            .entry(listing.owner.clone())
            .or_default()
            .push(listing.clone());
    }
    grouped.into_iter().collect()
}
