//! Request and event messages.
//!
//! Inbound requests come from exactly one client; outbound events are
//! broadcast to every connection in a room, except `error`, which goes to the
//! offending connection only. The `"type"` field on the wire is the serde
//! enum tag.

use serde::{Deserialize, Serialize};

use crate::card::CardValue;

/// A work item awaiting (or holding) an estimate.
///
/// `priority` is absent until the room agrees on a value, at which point the
/// feature moves to the final backlog carrying the agreed card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// Feature name as entered into the backlog.
    pub name: String,
    /// Agreed estimate. Only present on finalized features.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<CardValue>,
}

impl Feature {
    /// A pending feature with no estimate yet.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), priority: None }
    }
}

/// One participant's card as shown during a reveal.
///
/// `vote` is `null` when the facilitator forced the reveal before this
/// participant played a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedVote {
    /// Participant name.
    pub name: String,
    /// The card they played, if any.
    pub vote: Option<CardValue>,
}

/// Requests a client may send to the room server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Play (or replace) a card for the current round.
    ///
    /// The vote is carried as raw JSON so that a value outside the deck is
    /// rejected by the session with a request-scoped error rather than a
    /// parse failure.
    Vote {
        /// Name of the voting participant.
        player: String,
        /// The card value as sent by the client.
        vote: serde_json::Value,
    },
    /// Reveal the current round. Facilitator only.
    Reveal,
    /// Ask the server to re-broadcast the current feature.
    StartFeature,
}

/// Events the room server broadcasts to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A vote was recorded.
    Vote {
        /// Who voted.
        player: String,
        /// The card they played.
        vote: CardValue,
        /// Members who have not voted yet, in join order.
        not_voted: Vec<String>,
        /// Whether every current member has voted.
        all_voted: bool,
    },
    /// The round was revealed.
    Reveal {
        /// Every member's card, in join order.
        votes: Vec<RevealedVote>,
        /// Whether all recorded votes are equal.
        unanimity: bool,
    },
    /// The set of members still to vote changed outside a vote (join/leave).
    NotVotedUpdate {
        /// Members who have not voted yet, in join order.
        not_voted: Vec<String>,
    },
    /// A new feature is up for estimation, or `null` when none remains.
    FeatureUpdate {
        /// The feature now being estimated.
        feature: Option<Feature>,
    },
    /// Every feature is estimated; the room is done.
    FinalBacklog {
        /// Finalized features in advancement order, each with its estimate.
        final_backlog: Vec<Feature>,
        /// Where clients should navigate to view the backlog, if configured.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    /// A request was rejected. Sent to the requesting connection only.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl ServerEvent {
    /// Build an `error` event from anything displayable.
    #[must_use]
    pub fn error(message: impl ToString) -> Self {
        Self::Error { message: message.to_string() }
    }
}
