// A conversation goal (spec §3). Static for the duration of one session;
// used only for prompt rendering and for scoring in the Relevance Filter.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub name: String,
    pub description: String,
    pub priority: u32,
}

impl Goal {
    pub fn new(name: impl Into<String>, description: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            priority,
        }
    }
}
