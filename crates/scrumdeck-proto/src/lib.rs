//! scrumdeck wire protocol.
//!
//! Every message exchanged between a client and the room server is a JSON
//! object with a `"type"` discriminator. This crate defines those messages as
//! internally-tagged serde enums plus the supporting value types (the
//! estimation deck, features, revealed votes). It is transport-agnostic and
//! does no I/O: the server crate moves the JSON text over WebSockets, clients
//! render it.
//!
//! # Message flow
//!
//! ```text
//! client ──{"type":"vote",...}──────────> server
//! client ──{"type":"reveal"}────────────> server
//! client ──{"type":"start_feature"}─────> server
//!
//! server ──{"type":"vote",...}──────────> every connection in the room
//! server ──{"type":"reveal",...}────────> every connection in the room
//! server ──{"type":"not_voted_update"}──> every connection in the room
//! server ──{"type":"feature_update"}────> every connection in the room
//! server ──{"type":"final_backlog"}─────> every connection in the room
//! server ──{"type":"error",...}─────────> the offending connection only
//! ```

mod card;
mod message;

pub use card::CardValue;
pub use message::{ClientRequest, Feature, RevealedVote, ServerEvent};
