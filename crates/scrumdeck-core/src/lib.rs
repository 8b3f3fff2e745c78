//! Room session protocol for scrumdeck.
//!
//! This crate is the server's brain and does no I/O (Sans-IO): every
//! operation on a [`RoomSession`] takes plain data and returns the
//! [`ServerEvent`](scrumdeck_proto::ServerEvent)s to broadcast, or a
//! [`RoomError`] for the runtime to deliver to the offending connection.
//! Keeping the state machine pure makes the concurrency story trivial to
//! state — the runtime must serialize mutations per room — and makes every
//! scenario testable without a socket in sight.
//!
//! # Components
//!
//! - [`VoteSet`]: one round's participant → card mapping
//! - [`FeatureQueue`]: pending features plus the finalized backlog
//! - [`RoomSession`]: membership, the current round, and the
//!   voting/reveal/advance state machine composing the two

mod error;
mod feature_queue;
mod session;
mod vote_set;

pub use error::RoomError;
pub use feature_queue::FeatureQueue;
pub use session::{Participant, Phase, RoomSession, SessionConfig};
pub use vote_set::VoteSet;
