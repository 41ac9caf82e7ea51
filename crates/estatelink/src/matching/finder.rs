use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Listing, Requirement};

use super::scoring::{score, Compatibility};

/// The product-wide definition of a "high-quality match"; used by instant
/// notifications, daily digests, and the in-app latest-matches feed alike.
pub const DEFAULT_MIN_SCORE: u8 = 80;

/// One qualifying (listing, requirement) pairing. Ephemeral by design: the
/// only durable trace of a match is the notification it produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub listing: Listing,
    pub requirement: Requirement,
    pub compatibility: Compatibility,
}

impl MatchOutcome {
    pub fn percentage(&self) -> u8 {
        self.compatibility.percentage
    }
}

/// Applies the pairwise scorer across collections with ownership exclusion
/// and threshold filtering.
#[derive(Debug, Clone, Copy)]
pub struct MatchEngine {
    min_score: u8,
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SCORE)
    }
}

impl MatchEngine {
    pub fn new(min_score: u8) -> Self {
        Self { min_score }
    }

    pub fn min_score(&self) -> u8 {
        self.min_score
    }

    /// Qualifying listings for a single requirement, best first. Inactive
    /// listings and the requirement owner's own listings are skipped; the
    /// requirement itself is trusted to be live, since callers passing a
    /// single requirement have already decided it is worth matching.
    pub fn matches_for_requirement(
        &self,
        listings: &[Listing],
        requirement: &Requirement,
    ) -> Vec<MatchOutcome> {
        let mut outcomes: Vec<MatchOutcome> = listings
            .iter()
            .filter(|listing| listing.is_active && listing.owner != requirement.buyer)
            .filter_map(|listing| self.qualify(listing, requirement))
            .collect();
        outcomes.sort_by(rank);
        outcomes
    }

    /// Concatenation of [`Self::matches_for_requirement`] over the active
    /// subset of `requirements`.
    pub fn matches_for_requirements(
        &self,
        listings: &[Listing],
        requirements: &[Requirement],
    ) -> Vec<MatchOutcome> {
        let mut outcomes: Vec<MatchOutcome> = requirements
            .iter()
            .filter(|requirement| requirement.is_active)
            .flat_map(|requirement| {
                listings
                    .iter()
                    .filter(|listing| listing.is_active && listing.owner != requirement.buyer)
                    .filter_map(|listing| self.qualify(listing, requirement))
            })
            .collect();
        outcomes.sort_by(rank);
        outcomes
    }

    /// The reverse direction: qualifying requirements for a single listing.
    pub fn matches_for_listing(
        &self,
        listing: &Listing,
        requirements: &[Requirement],
    ) -> Vec<MatchOutcome> {
        if !listing.is_active {
            return Vec::new();
        }
        let mut outcomes: Vec<MatchOutcome> = requirements
            .iter()
            .filter(|requirement| requirement.is_active && requirement.buyer != listing.owner)
            .filter_map(|requirement| self.qualify(listing, requirement))
            .collect();
        outcomes.sort_by(rank);
        outcomes
    }

    fn qualify(&self, listing: &Listing, requirement: &Requirement) -> Option<MatchOutcome> {
        let compatibility = score(listing, requirement);
        if compatibility.percentage < self.min_score {
            return None;
        }
        Some(MatchOutcome {
            listing: listing.clone(),
            requirement: requirement.clone(),
            compatibility,
        })
    }
}

/// Score descending, then newest listing, then newest requirement, then ids.
/// The secondary keys make tie order deterministic rather than an accident of
/// collection-sort stability.
fn rank(a: &MatchOutcome, b: &MatchOutcome) -> Ordering {
    b.compatibility
        .percentage
        .cmp(&a.compatibility.percentage)
        .then_with(|| b.listing.created_at.cmp(&a.listing.created_at))
        .then_with(|| b.requirement.created_at.cmp(&a.requirement.created_at))
        .then_with(|| a.listing.id.cmp(&b.listing.id))
        .then_with(|| a.requirement.id.cmp(&b.requirement.id))
}

/// Keeps the highest-scoring outcome per listing. Applied by callers that
/// aggregate matches across several requirements for one recipient, so the
/// same property never shows up twice in a notification batch.
pub fn dedupe_by_listing(outcomes: Vec<MatchOutcome>) -> Vec<MatchOutcome> {
    dedupe_by(outcomes, |outcome| outcome.listing.id.clone())
}

/// Keeps the highest-scoring outcome per requirement, the mirror of
/// [`dedupe_by_listing`] for the owner-facing direction.
pub fn dedupe_by_requirement(outcomes: Vec<MatchOutcome>) -> Vec<MatchOutcome> {
    dedupe_by(outcomes, |outcome| outcome.requirement.id.clone())
}

fn dedupe_by<K: Ord>(outcomes: Vec<MatchOutcome>, key: impl Fn(&MatchOutcome) -> K) -> Vec<MatchOutcome> {
    let mut best: BTreeMap<K, MatchOutcome> = BTreeMap::new();
    for outcome in outcomes {
        match best.entry(key(&outcome)) {
            Entry::Vacant(slot) => {
                slot.insert(outcome);
            }
            Entry::Occupied(mut slot) => {
                if rank(&outcome, slot.get()) == Ordering::Less {
                    slot.insert(outcome);
                }
            }
        }
    }

    let mut kept: Vec<MatchOutcome> = best.into_values().collect();
    kept.sort_by(rank);
    kept
}
