use crate::round::RoundTimings;
use shared::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};

/// Game settings shared by the supervisor and the network layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    /// Questions fetched per round, clamped to `1..=MAX_BATCH_SIZE`
    pub batch_size: usize,
    pub timings: RoundTimings,
}

impl GameConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn with_question_duration(mut self, seconds: u32) -> Self {
        self.timings.question_duration_secs = seconds.max(1);
        self
    }

    pub fn with_timings(mut self, timings: RoundTimings) -> Self {
        self.timings = timings;
        self
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            timings: RoundTimings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GameConfig::default();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.timings.question_duration_secs, 15);
        assert_eq!(config.timings.timeout_grace.as_millis(), 2000);
        assert_eq!(config.timings.answered_grace.as_millis(), 1000);
        assert_eq!(config.timings.restart_cooldown.as_millis(), 2500);
    }

    #[test]
    fn test_batch_size_is_clamped() {
        assert_eq!(GameConfig::default().with_batch_size(0).batch_size, 1);
        assert_eq!(GameConfig::default().with_batch_size(50).batch_size, 20);
        assert_eq!(GameConfig::default().with_batch_size(8).batch_size, 8);
    }

    #[test]
    fn test_question_duration_has_floor() {
        let config = GameConfig::default().with_question_duration(0);
        assert_eq!(config.timings.question_duration_secs, 1);
    }
}
