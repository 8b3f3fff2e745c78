//! Feature-list seeding.
//!
//! Room creation UI and backlog persistence are out of scope; the server
//! seeds a new room's queue from a [`FeatureSource`]. The production source
//! is a JSON file mapping room name to its pending feature list, loaded once
//! at startup:
//!
//! ```json
//! {
//!     "sprint-12": [{"name": "Login"}, {"name": "Search"}],
//!     "payments": [{"name": "Refunds"}]
//! }
//! ```

use std::{collections::HashMap, path::Path};

use scrumdeck_proto::Feature;

use crate::error::ServerError;

/// Where a new room's pending features come from.
///
/// A room absent from the source does not exist: joining it is rejected with
/// `RoomNotFound`.
pub trait FeatureSource: Send + Sync + 'static {
    /// Pending features for `room`, in estimation order. `None` if the room
    /// is unknown.
    fn features_for(&self, room: &str) -> Option<Vec<Feature>>;
}

/// JSON-file backed feature source.
#[derive(Debug, Clone)]
pub struct JsonBacklog {
    rooms: HashMap<String, Vec<Feature>>,
}

impl JsonBacklog {
    /// Load the backlog file.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("failed to read backlog '{}': {e}", path.display()))
        })?;
        let rooms: HashMap<String, Vec<Feature>> = serde_json::from_str(&raw).map_err(|e| {
            ServerError::Config(format!("failed to parse backlog '{}': {e}", path.display()))
        })?;
        Ok(Self { rooms })
    }

    /// Build a source from an in-memory map. Used by tests.
    #[must_use]
    pub fn from_rooms(rooms: HashMap<String, Vec<Feature>>) -> Self {
        Self { rooms }
    }

    /// Number of rooms the source knows about.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl FeatureSource for JsonBacklog {
    fn features_for(&self, room: &str) -> Option<Vec<Feature>> {
        self.rooms.get(room).map(|features| {
            features
                .iter()
                // Estimates are only ever attached by advancement
                .map(|feature| Feature::new(feature.name.clone()))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_rooms_from_a_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"sprint-12": [{{"name": "Login"}}, {{"name": "Search"}}], "empty": []}}"#
        )
        .unwrap();

        let backlog = JsonBacklog::load(file.path()).unwrap();
        assert_eq!(backlog.room_count(), 2);

        let features = backlog.features_for("sprint-12").unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].name, "Login");

        assert_eq!(backlog.features_for("empty"), Some(Vec::new()));
        assert_eq!(backlog.features_for("nope"), None);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = JsonBacklog::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = JsonBacklog::load(file.path()).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn seeded_features_never_carry_an_estimate() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"r": [{{"name": "Login", "priority": 8}}]}}"#).unwrap();

        let backlog = JsonBacklog::load(file.path()).unwrap();
        let features = backlog.features_for("r").unwrap();
        assert_eq!(features[0].priority, None);
    }
}
