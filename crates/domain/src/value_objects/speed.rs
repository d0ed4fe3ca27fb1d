//! Answer-latency classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bucketed classification of answer latency relative to a question's time
/// limit. Drives the damage multiplier: faster tiers hit harder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedTier {
    Fast,
    Medium,
    Slow,
}

impl SpeedTier {
    /// Classify a server-measured elapsed time against the question's time
    /// limit. `fast_band` and `medium_band` are fractions of the limit;
    /// anything past the medium band (including a missed deadline) is slow.
    pub fn classify(elapsed_ms: u64, time_limit_ms: u64, fast_band: f64, medium_band: f64) -> Self {
        let fast_cutoff = (time_limit_ms as f64 * fast_band) as u64;
        let medium_cutoff = (time_limit_ms as f64 * medium_band) as u64;
        if elapsed_ms <= fast_cutoff {
            Self::Fast
        } else if elapsed_ms <= medium_cutoff {
            Self::Medium
        } else {
            Self::Slow
        }
    }
}

impl fmt::Display for SpeedTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Medium => write!(f, "medium"),
            Self::Slow => write!(f, "slow"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: f64 = 1.0 / 3.0;
    const MEDIUM: f64 = 2.0 / 3.0;

    #[test]
    fn test_classifies_bands_of_time_limit() {
        assert_eq!(SpeedTier::classify(1_000, 15_000, FAST, MEDIUM), SpeedTier::Fast);
        assert_eq!(SpeedTier::classify(5_000, 15_000, FAST, MEDIUM), SpeedTier::Fast);
        assert_eq!(SpeedTier::classify(7_000, 15_000, FAST, MEDIUM), SpeedTier::Medium);
        assert_eq!(SpeedTier::classify(12_000, 15_000, FAST, MEDIUM), SpeedTier::Slow);
    }

    #[test]
    fn test_past_deadline_is_slow() {
        assert_eq!(SpeedTier::classify(20_000, 15_000, FAST, MEDIUM), SpeedTier::Slow);
    }
}
