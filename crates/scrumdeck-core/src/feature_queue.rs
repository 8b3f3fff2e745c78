//! Ordered feature backlog.
//!
//! Features move one way: from the pending queue's head into the finalized
//! backlog, carrying the agreed estimate. Popping the head is the only
//! mutation, so the finalized order is always the original backlog order.

use std::collections::VecDeque;

use scrumdeck_proto::{CardValue, Feature};

use crate::error::RoomError;

/// Pending features plus the finalized backlog.
///
/// # Invariants
///
/// - A feature is in exactly one of {pending, finalized}, never both.
/// - The head of `pending` is the feature currently up for estimation.
#[derive(Debug, Clone)]
pub struct FeatureQueue {
    pending: VecDeque<Feature>,
    finalized: Vec<Feature>,
}

impl FeatureQueue {
    /// Seed a queue from an ordered feature list.
    #[must_use]
    pub fn new(features: impl IntoIterator<Item = Feature>) -> Self {
        Self { pending: features.into_iter().collect(), finalized: Vec::new() }
    }

    /// The feature currently up for estimation, or `None` when every feature
    /// is estimated.
    #[must_use]
    pub fn current(&self) -> Option<&Feature> {
        self.pending.front()
    }

    /// Finalize the current feature with the agreed estimate and return the
    /// new head.
    ///
    /// The popped feature gets `agreed` attached as its priority and is
    /// appended to the finalized backlog.
    pub fn advance(&mut self, agreed: CardValue) -> Result<Option<&Feature>, RoomError> {
        let mut feature = self.pending.pop_front().ok_or(RoomError::EmptyQueue)?;
        feature.priority = Some(agreed);
        self.finalized.push(feature);
        Ok(self.pending.front())
    }

    /// Finalized features in advancement order, each carrying its estimate.
    #[must_use]
    pub fn final_backlog(&self) -> &[Feature] {
        &self.finalized
    }

    /// Number of features still awaiting estimation.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
