//! Domain errors for room operations.
//!
//! Every variant is request-scoped: it rejects exactly one client request,
//! leaves the session untouched, and is delivered as an `error` event to the
//! requesting connection only. Nothing here is fatal to a room.

use thiserror::Error;

/// Errors from room session operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// The vote value is not a card from the estimation deck.
    #[error("invalid vote value: {0}")]
    InvalidVoteValue(String),

    /// The sender never joined this room.
    #[error("unknown participant: {0}")]
    UnknownParticipant(String),

    /// The request only makes sense while a round is open for voting.
    #[error("voting is not open")]
    NotVotingPhase,

    /// Only the facilitator may reveal the round.
    #[error("{0} is not the facilitator")]
    NotFacilitator(String),

    /// Not every participant has voted yet.
    #[error("not every participant has voted")]
    IncompleteVoting,

    /// No feature is awaiting estimation.
    #[error("feature queue is empty")]
    EmptyQueue,

    /// No such room is known to the backlog source.
    #[error("room not found: {0}")]
    RoomNotFound(String),
}
