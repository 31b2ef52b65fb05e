//! Configuration for the random-chat coordinator.

use serde::{Deserialize, Serialize};

/// Configuration for [`RandomMatchCoordinator`](crate::RandomMatchCoordinator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    /// How many lost pairing races to tolerate in one scan before falling back to waiting.
    #[serde(default = "MatchConfig::default_max_pair_attempts")]
    pub max_pair_attempts: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_pair_attempts: Self::default_max_pair_attempts(),
        }
    }
}

impl MatchConfig {
    const fn default_max_pair_attempts() -> u32 {
        3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config: MatchConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_pair_attempts, 3);
    }
}
