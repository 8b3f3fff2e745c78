//! Per-round vote collection.
//!
//! A [`VoteSet`] records which participant played which card in the current
//! round. It does not know the room's membership; callers pass the membership
//! in, which keeps derived views (`not_voted`, `all_voted`, reveal order)
//! consistent with whatever the session considers current.

use std::collections::HashMap;

use scrumdeck_proto::{CardValue, RevealedVote};

/// Votes recorded for one round.
///
/// # Invariants
///
/// - A participant appears at most once; re-voting replaces the prior card
///   without changing the vote count.
/// - Cards are validated against the deck before they get here (see
///   [`CardValue::from_json`]); the set itself only stores deck members.
#[derive(Debug, Clone, Default)]
pub struct VoteSet {
    votes: HashMap<String, CardValue>,
}

impl VoteSet {
    /// Create an empty vote set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a vote, replacing any prior card from the same participant.
    ///
    /// Returns the replaced card on a re-vote.
    pub fn record(&mut self, participant: &str, vote: CardValue) -> Option<CardValue> {
        self.votes.insert(participant.to_owned(), vote)
    }

    /// Discard a participant's vote, if any. Used when a participant leaves
    /// mid-round so their stale card no longer blocks reveal-readiness.
    pub fn retract(&mut self, participant: &str) -> Option<CardValue> {
        self.votes.remove(participant)
    }

    /// Whether the participant has a recorded vote this round.
    #[must_use]
    pub fn has_voted(&self, participant: &str) -> bool {
        self.votes.contains_key(participant)
    }

    /// Number of recorded votes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.votes.len()
    }

    /// True if no vote has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Members without a recorded vote, preserving the order of `membership`.
    pub fn not_voted<'a, I>(&self, membership: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        membership
            .into_iter()
            .filter(|name| !self.votes.contains_key(*name))
            .map(str::to_owned)
            .collect()
    }

    /// True iff every member of `membership` has a recorded vote.
    pub fn all_voted<'a, I>(&self, membership: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        membership.into_iter().all(|name| self.votes.contains_key(name))
    }

    /// Reveal the round: every member's card in membership order, plus the
    /// unanimity verdict.
    ///
    /// Members without a recorded vote appear voteless (`vote: None`) — that
    /// only happens under a forced reveal — and are excluded from the
    /// unanimity computation. Unanimity is defined over actual voters: one
    /// voter is unanimous by definition, zero voters never are (guards
    /// against vacuous advancement).
    pub fn reveal<'a, I>(&self, membership: I) -> (Vec<RevealedVote>, bool)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let revealed: Vec<RevealedVote> = membership
            .into_iter()
            .map(|name| RevealedVote {
                name: name.to_owned(),
                vote: self.votes.get(name).copied(),
            })
            .collect();

        let mut voted = revealed.iter().filter_map(|entry| entry.vote);
        let unanimity = match voted.next() {
            Some(first) => voted.all(|vote| vote == first),
            None => false,
        };

        (revealed, unanimity)
    }

    /// Clear every recorded vote. Used when a round restarts or the queue
    /// advances to the next feature.
    pub fn reset(&mut self) {
        self.votes.clear();
    }
}
