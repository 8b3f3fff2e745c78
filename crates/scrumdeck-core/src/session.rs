//! Room session state machine.
//!
//! One [`RoomSession`] owns a room's membership, the active round's
//! [`VoteSet`], and the [`FeatureQueue`]. Operations return the events to
//! broadcast; the runtime is responsible for serializing mutations per room
//! and fanning the events out in order.
//!
//! # State machine
//!
//! ```text
//!             vote / join / leave
//!                ┌────────┐
//!                ↓        │
//!            ┌────────────┴┐  reveal   ┌──────────┐
//!     ──────>│   Voting    │──────────>│ Revealed │
//!            └─────────────┘           └────┬─────┘
//!                ↑      ↑                   │ automatic resolution
//!                │      └───────────────────┤
//!                │   not unanimous, or      │ unanimous,
//!                │   unanimous w/ features  │ queue exhausted
//!                │   remaining              ↓
//!                │                     ┌───────────┐
//!                └─────────────────────│ Completed │ (terminal)
//!                                      └───────────┘
//! ```
//!
//! `Revealed` never outlives the reveal operation: resolution is automatic
//! and runs in the same per-room critical section, so no client can observe
//! it.

use scrumdeck_proto::{CardValue, Feature, ServerEvent};

use crate::{error::RoomError, feature_queue::FeatureQueue, vote_set::VoteSet};

/// Where a room is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// A round is open and the vote set accepts cards.
    Voting,
    /// Votes are shown; resolution is in progress.
    Revealed,
    /// The feature queue is exhausted. Terminal: no vote or reveal is
    /// accepted, but the room may still be joined to view the backlog.
    Completed,
}

/// A person connected to the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Display name, unique within the room for the session's lifetime.
    pub name: String,
    /// True for the participant who opened the room. Server-asserted; never
    /// derived from client-supplied data.
    pub is_facilitator: bool,
}

/// Per-room policy knobs, fixed at room creation.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Let the facilitator reveal before everyone has voted. Voteless
    /// participants are then shown with a `null` card and excluded from the
    /// unanimity computation.
    pub allow_force_reveal: bool,
    /// Redirect URL to attach to the `final_backlog` event. `None` means
    /// clients render the backlog inline.
    pub final_backlog_url: Option<String>,
}

/// The per-room voting protocol state machine.
///
/// # Invariants
///
/// - `Voting` implies the queue has a current feature; a session seeded with
///   an empty backlog starts `Completed`.
/// - The facilitator is the first participant ever to join and keeps the role
///   for the room's lifetime, including across their own disconnects.
#[derive(Debug, Clone)]
pub struct RoomSession {
    room: String,
    participants: Vec<Participant>,
    facilitator: Option<String>,
    votes: VoteSet,
    queue: FeatureQueue,
    phase: Phase,
    config: SessionConfig,
}

impl RoomSession {
    /// Create a session for `room` seeded with its pending feature list.
    #[must_use]
    pub fn new(
        room: impl Into<String>,
        features: impl IntoIterator<Item = Feature>,
        config: SessionConfig,
    ) -> Self {
        let queue = FeatureQueue::new(features);
        let phase = if queue.current().is_some() { Phase::Voting } else { Phase::Completed };
        Self {
            room: room.into(),
            participants: Vec::new(),
            facilitator: None,
            votes: VoteSet::new(),
            queue,
            phase,
            config,
        }
    }

    /// Room identifier this session belongs to.
    #[must_use]
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current membership in join order.
    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Name of the room's facilitator, once someone has joined.
    #[must_use]
    pub fn facilitator(&self) -> Option<&str> {
        self.facilitator.as_deref()
    }

    /// True when nobody is in the room. The registry evicts such sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Whether `name` is currently a member.
    #[must_use]
    pub fn is_member(&self, name: &str) -> bool {
        self.participants.iter().any(|p| p.name == name)
    }

    /// Members without a recorded vote, in join order.
    #[must_use]
    pub fn not_voted(&self) -> Vec<String> {
        self.votes.not_voted(self.member_names())
    }

    /// Add a participant (or handle their reconnect) and return the events
    /// to broadcast.
    ///
    /// The first joiner of a fresh room becomes the facilitator. Joining
    /// under a name that is already a member is treated as a reconnect: the
    /// prior vote is cleared so the participant re-votes. A facilitator
    /// connect re-broadcasts the current feature so their client can open
    /// the round.
    pub fn join(&mut self, name: &str) -> Vec<ServerEvent> {
        if self.is_member(name) {
            // Reconnect: the old card is stale
            self.votes.retract(name);
        } else {
            let is_facilitator = self.facilitator.is_none();
            if is_facilitator {
                self.facilitator = Some(name.to_owned());
            }
            self.participants.push(Participant { name: name.to_owned(), is_facilitator });
        }

        let mut events = Vec::new();
        if self.facilitator.as_deref() == Some(name) {
            events.extend(self.current_feature_events());
        }
        if self.phase == Phase::Voting {
            events.push(ServerEvent::NotVotedUpdate { not_voted: self.not_voted() });
        }
        events
    }

    /// Remove a participant and return the events to broadcast.
    ///
    /// Their recorded vote is discarded so it no longer blocks
    /// reveal-readiness. Idempotent for names that are not members, since
    /// disconnect notifications can race. The facilitator role survives the
    /// facilitator leaving.
    pub fn leave(&mut self, name: &str) -> Vec<ServerEvent> {
        let before = self.participants.len();
        self.participants.retain(|p| p.name != name);
        if self.participants.len() == before {
            return Vec::new();
        }

        self.votes.retract(name);
        if self.phase == Phase::Voting {
            vec![ServerEvent::NotVotedUpdate { not_voted: self.not_voted() }]
        } else {
            Vec::new()
        }
    }

    /// Record a vote for the current round and return the events to
    /// broadcast.
    pub fn vote(
        &mut self,
        name: &str,
        raw_vote: &serde_json::Value,
    ) -> Result<Vec<ServerEvent>, RoomError> {
        if self.phase != Phase::Voting {
            return Err(RoomError::NotVotingPhase);
        }
        if !self.is_member(name) {
            return Err(RoomError::UnknownParticipant(name.to_owned()));
        }
        let card = CardValue::from_json(raw_vote)
            .ok_or_else(|| RoomError::InvalidVoteValue(raw_vote.to_string()))?;

        self.votes.record(name, card);

        let not_voted = self.not_voted();
        Ok(vec![ServerEvent::Vote {
            player: name.to_owned(),
            vote: card,
            all_voted: not_voted.is_empty(),
            not_voted,
        }])
    }

    /// Reveal the current round and resolve it, returning the events to
    /// broadcast.
    ///
    /// Facilitator-only. Requires every member to have voted unless the room
    /// allows forced reveals. A unanimous round advances the queue; anything
    /// else resets the votes and restarts the same feature.
    pub fn reveal(&mut self, name: &str) -> Result<Vec<ServerEvent>, RoomError> {
        if self.phase != Phase::Voting {
            return Err(RoomError::NotVotingPhase);
        }
        if self.facilitator.as_deref() != Some(name) {
            return Err(RoomError::NotFacilitator(name.to_owned()));
        }
        if !self.votes.all_voted(self.member_names()) && !self.config.allow_force_reveal {
            return Err(RoomError::IncompleteVoting);
        }

        let (revealed, unanimity) = self.votes.reveal(self.member_names());
        self.phase = Phase::Revealed;
        let mut events =
            vec![ServerEvent::Reveal { votes: revealed.clone(), unanimity }];

        // Automatic post-reveal resolution. A unanimous verdict implies at
        // least one voter, so the agreed card is always present.
        match (unanimity, revealed.iter().find_map(|entry| entry.vote)) {
            (true, Some(agreed)) => {
                let next = self.queue.advance(agreed)?.cloned();
                self.votes.reset();
                match next {
                    Some(feature) => {
                        self.phase = Phase::Voting;
                        events.push(ServerEvent::FeatureUpdate { feature: Some(feature) });
                    },
                    None => {
                        self.phase = Phase::Completed;
                        events.push(self.final_backlog_event());
                    },
                }
            },
            _ => {
                // Restart the round on the same feature
                self.votes.reset();
                self.phase = Phase::Voting;
                events.push(ServerEvent::FeatureUpdate {
                    feature: self.queue.current().cloned(),
                });
            },
        }

        Ok(events)
    }

    /// Re-broadcast where the room stands: the current feature, or the final
    /// backlog once the queue is exhausted.
    #[must_use]
    pub fn start_feature(&self) -> Vec<ServerEvent> {
        self.current_feature_events()
    }

    fn current_feature_events(&self) -> Vec<ServerEvent> {
        match self.phase {
            Phase::Completed => vec![self.final_backlog_event()],
            Phase::Voting | Phase::Revealed => {
                vec![ServerEvent::FeatureUpdate { feature: self.queue.current().cloned() }]
            },
        }
    }

    fn final_backlog_event(&self) -> ServerEvent {
        ServerEvent::FinalBacklog {
            final_backlog: self.queue.final_backlog().to_vec(),
            url: self.config.final_backlog_url.clone(),
        }
    }

    fn member_names(&self) -> impl Iterator<Item = &str> {
        self.participants.iter().map(|p| p.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn session(features: &[&str]) -> RoomSession {
        RoomSession::new(
            "R1",
            features.iter().map(|name| Feature::new(*name)),
            SessionConfig::default(),
        )
    }

    fn vote_ok(session: &mut RoomSession, name: &str, value: serde_json::Value) {
        session.vote(name, &value).unwrap();
    }

    #[test]
    fn first_joiner_becomes_facilitator_and_stays_facilitator() {
        let mut s = session(&["F1"]);

        s.join("Alice");
        s.join("Bob");
        assert_eq!(s.facilitator(), Some("Alice"));
        assert!(s.participants()[0].is_facilitator);
        assert!(!s.participants()[1].is_facilitator);

        // Facilitator identity is sticky across a disconnect
        s.leave("Alice");
        assert_eq!(s.facilitator(), Some("Alice"));
        s.join("Alice");
        assert_eq!(s.facilitator(), Some("Alice"));
        assert!(s.reveal("Bob").is_err());
    }

    #[test]
    fn facilitator_join_broadcasts_the_current_feature() {
        let mut s = session(&["F1"]);

        let events = s.join("Alice");
        assert_eq!(
            events,
            vec![
                ServerEvent::FeatureUpdate { feature: Some(Feature::new("F1")) },
                ServerEvent::NotVotedUpdate { not_voted: vec!["Alice".into()] },
            ]
        );

        // A plain participant join only updates the pending-voter list
        let events = s.join("Bob");
        assert_eq!(
            events,
            vec![ServerEvent::NotVotedUpdate {
                not_voted: vec!["Alice".into(), "Bob".into()],
            }]
        );
    }

    // Scenario A: unanimous round advances the feature queue.
    #[test]
    fn unanimous_round_advances_and_finalizes() {
        let mut s = session(&["F1", "F2"]);
        s.join("Alice");
        s.join("Bob");

        vote_ok(&mut s, "Alice", json!(5));
        let events = s.vote("Bob", &json!(5)).unwrap();
        assert_eq!(
            events,
            vec![ServerEvent::Vote {
                player: "Bob".into(),
                vote: CardValue::Five,
                not_voted: vec![],
                all_voted: true,
            }]
        );

        let events = s.reveal("Alice").unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            ServerEvent::Reveal { unanimity: true, votes } if votes.len() == 2
        ));
        assert_eq!(
            events[1],
            ServerEvent::FeatureUpdate { feature: Some(Feature::new("F2")) }
        );

        assert_eq!(s.phase(), Phase::Voting);
        assert!(s.not_voted().contains(&"Alice".to_owned()), "votes reset for the next round");
    }

    // Scenario B: non-unanimous round restarts the same feature.
    #[test]
    fn split_round_restarts_the_same_feature() {
        let mut s = session(&["F1"]);
        s.join("Alice");
        s.join("Bob");

        vote_ok(&mut s, "Alice", json!(5));
        vote_ok(&mut s, "Bob", json!(8));

        let events = s.reveal("Alice").unwrap();
        assert!(matches!(&events[0], ServerEvent::Reveal { unanimity: false, .. }));
        assert_eq!(
            events[1],
            ServerEvent::FeatureUpdate { feature: Some(Feature::new("F1")) }
        );

        assert_eq!(s.phase(), Phase::Voting);
        assert_eq!(s.not_voted(), vec!["Alice".to_owned(), "Bob".to_owned()]);
    }

    // Scenario C: a mid-round joiner blocks reveal-readiness.
    #[test]
    fn mid_round_joiner_is_immediately_pending() {
        let mut s = session(&["F1"]);
        s.join("Alice");
        vote_ok(&mut s, "Alice", json!(3));

        let events = s.join("Bob");
        assert_eq!(
            events,
            vec![ServerEvent::NotVotedUpdate { not_voted: vec!["Bob".into()] }]
        );
        assert_eq!(s.reveal("Alice"), Err(RoomError::IncompleteVoting));
    }

    // Scenario D: non-facilitator reveal is rejected without side effects.
    #[test]
    fn non_facilitator_reveal_is_rejected() {
        let mut s = session(&["F1"]);
        s.join("Alice");
        s.join("Bob");
        vote_ok(&mut s, "Alice", json!(5));
        vote_ok(&mut s, "Bob", json!(5));

        assert_eq!(s.reveal("Bob"), Err(RoomError::NotFacilitator("Bob".into())));
        assert_eq!(s.phase(), Phase::Voting);
        assert!(s.not_voted().is_empty(), "recorded votes must be untouched");
    }

    // Scenario E: the last advancement completes the room.
    #[test]
    fn exhausting_the_queue_completes_the_room() {
        let mut s = session(&["F1"]);
        s.join("Alice");
        vote_ok(&mut s, "Alice", json!(13));

        let events = s.reveal("Alice").unwrap();
        assert!(matches!(&events[0], ServerEvent::Reveal { unanimity: true, .. }));
        let ServerEvent::FinalBacklog { final_backlog, url } = &events[1] else {
            unreachable!("expected a final_backlog event, got {:?}", events[1]);
        };
        assert!(url.is_none());
        assert_eq!(final_backlog.len(), 1);
        assert_eq!(final_backlog[0].name, "F1");
        assert_eq!(final_backlog[0].priority, Some(CardValue::Thirteen));

        assert_eq!(s.phase(), Phase::Completed);
        assert_eq!(s.vote("Alice", &json!(1)), Err(RoomError::NotVotingPhase));
        assert_eq!(s.reveal("Alice"), Err(RoomError::NotVotingPhase));
    }

    #[test]
    fn completed_room_redirects_when_a_url_is_configured() {
        let mut s = RoomSession::new(
            "sprint-12",
            [Feature::new("F1")],
            SessionConfig {
                final_backlog_url: Some("/final_backlog/sprint-12/".into()),
                ..SessionConfig::default()
            },
        );
        s.join("Alice");
        vote_ok(&mut s, "Alice", json!(1));

        let events = s.reveal("Alice").unwrap();
        assert!(matches!(
            &events[1],
            ServerEvent::FinalBacklog { url: Some(url), .. }
                if url == "/final_backlog/sprint-12/"
        ));
    }

    #[test]
    fn vote_validation_errors() {
        let mut s = session(&["F1"]);
        s.join("Alice");

        assert_eq!(
            s.vote("Mallory", &json!(5)),
            Err(RoomError::UnknownParticipant("Mallory".into()))
        );
        assert_eq!(
            s.vote("Alice", &json!(4)),
            Err(RoomError::InvalidVoteValue("4".into()))
        );
        // String-typed numerics are fine, the reference client sends them
        vote_ok(&mut s, "Alice", json!("5"));
    }

    #[test]
    fn all_pass_cards_still_count_as_unanimity() {
        // Deliberate simplification: value equality is the whole contract,
        // even for the non-numeric pass cards.
        let mut s = session(&["F1", "F2"]);
        s.join("Alice");
        s.join("Bob");
        vote_ok(&mut s, "Alice", json!("Café"));
        vote_ok(&mut s, "Bob", json!("Café"));

        let events = s.reveal("Alice").unwrap();
        assert!(matches!(&events[0], ServerEvent::Reveal { unanimity: true, .. }));
        assert_eq!(s.phase(), Phase::Voting);
    }

    #[test]
    fn incomplete_reveal_is_rejected_by_default() {
        let mut s = session(&["F1"]);
        s.join("Alice");
        s.join("Bob");
        vote_ok(&mut s, "Alice", json!(5));

        assert_eq!(s.reveal("Alice"), Err(RoomError::IncompleteVoting));
    }

    #[test]
    fn forced_reveal_excludes_voteless_members() {
        let mut s = RoomSession::new(
            "R1",
            [Feature::new("F1"), Feature::new("F2")],
            SessionConfig { allow_force_reveal: true, ..SessionConfig::default() },
        );
        s.join("Alice");
        s.join("Bob");
        vote_ok(&mut s, "Alice", json!(8));

        let events = s.reveal("Alice").unwrap();
        let ServerEvent::Reveal { votes, unanimity } = &events[0] else {
            unreachable!("expected a reveal event, got {:?}", events[0]);
        };
        assert!(*unanimity, "the only voter agrees with themselves");
        assert_eq!(votes[1].name, "Bob");
        assert_eq!(votes[1].vote, None);
        assert_eq!(s.phase(), Phase::Voting, "advanced to F2");
    }

    #[test]
    fn forced_reveal_with_no_votes_restarts_the_round() {
        let mut s = RoomSession::new(
            "R1",
            [Feature::new("F1")],
            SessionConfig { allow_force_reveal: true, ..SessionConfig::default() },
        );
        s.join("Alice");

        let events = s.reveal("Alice").unwrap();
        assert!(matches!(&events[0], ServerEvent::Reveal { unanimity: false, .. }));
        assert_eq!(s.phase(), Phase::Voting);
        assert_eq!(
            events[1],
            ServerEvent::FeatureUpdate { feature: Some(Feature::new("F1")) },
            "the queue must not advance on an empty reveal"
        );
    }

    #[test]
    fn leaver_vote_is_discarded_and_membership_updates() {
        let mut s = session(&["F1"]);
        s.join("Alice");
        s.join("Bob");
        vote_ok(&mut s, "Bob", json!(2));

        let events = s.leave("Bob");
        assert_eq!(
            events,
            vec![ServerEvent::NotVotedUpdate { not_voted: vec!["Alice".into()] }]
        );
        assert!(!s.is_member("Bob"));

        // Alice alone can now complete the round
        vote_ok(&mut s, "Alice", json!(2));
        assert!(s.reveal("Alice").is_ok());
    }

    #[test]
    fn leave_is_idempotent() {
        let mut s = session(&["F1"]);
        s.join("Alice");
        assert!(s.leave("Ghost").is_empty());
        assert!(!s.leave("Alice").is_empty());
        assert!(s.leave("Alice").is_empty());
        assert!(s.is_empty());
    }

    #[test]
    fn reconnect_clears_the_prior_vote() {
        let mut s = session(&["F1"]);
        s.join("Alice");
        s.join("Bob");
        vote_ok(&mut s, "Bob", json!(5));

        let events = s.join("Bob");
        assert_eq!(
            events,
            vec![ServerEvent::NotVotedUpdate {
                not_voted: vec!["Alice".into(), "Bob".into()],
            }]
        );
        assert_eq!(s.participants().len(), 2);
    }

    #[test]
    fn empty_backlog_starts_completed() {
        let mut s = session(&[]);
        assert_eq!(s.phase(), Phase::Completed);

        let events = s.join("Alice");
        assert_eq!(
            events,
            vec![ServerEvent::FinalBacklog { final_backlog: vec![], url: None }]
        );
    }

    #[test]
    fn start_feature_rebroadcasts_the_current_state() {
        let mut s = session(&["F1"]);
        s.join("Alice");

        assert_eq!(
            s.start_feature(),
            vec![ServerEvent::FeatureUpdate { feature: Some(Feature::new("F1")) }]
        );

        vote_ok(&mut s, "Alice", json!(1));
        s.reveal("Alice").unwrap();
        assert!(matches!(
            s.start_feature().as_slice(),
            [ServerEvent::FinalBacklog { .. }]
        ));
    }
}
