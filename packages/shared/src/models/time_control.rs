use serde::{Deserialize, Serialize};

pub const DEFAULT_TIME_CONTROL_KEY: &str = "rapid_15_10";

/// Clock settings for a match. Copied onto the match at creation and never
/// changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeControl {
    pub key: String,
    pub label: String,
    pub initial_time_ms: u64,
    pub increment_ms: u64,
}

impl TimeControl {
    pub fn rapid_15_10() -> Self {
        TimeControl {
            key: "rapid_15_10".to_string(),
            label: "Rapid 15|10".to_string(),
            initial_time_ms: 15 * 60 * 1000,
            increment_ms: 10 * 1000,
        }
    }

    pub fn rapid_10_5() -> Self {
        TimeControl {
            key: "rapid_10_5".to_string(),
            label: "Rapid 10|5".to_string(),
            initial_time_ms: 10 * 60 * 1000,
            increment_ms: 5 * 1000,
        }
    }

    pub fn presets() -> Vec<TimeControl> {
        vec![Self::rapid_15_10(), Self::rapid_10_5()]
    }

    pub fn by_key(key: &str) -> Option<TimeControl> {
        Self::presets().into_iter().find(|preset| preset.key == key)
    }
}

impl Default for TimeControl {
    fn default() -> Self {
        Self::rapid_15_10()
    }
}
