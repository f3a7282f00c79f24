use serde::{Deserialize, Serialize};

/// Recovery policy: which missed days may be repaired, and what a repair
/// must contain to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryConfig {
  /// Minimum reps a recovery session must contain to repair a day
  pub min_reps_required: i64,
  /// How many days back a missed day remains recoverable
  pub max_days_back: i64,
  pub enabled: bool,
}

impl Default for RecoveryConfig {
  fn default() -> Self {
    Self {
      min_reps_required: 50,
      max_days_back: 7,
      enabled: true,
    }
  }
}

impl RecoveryConfig {
  /// Fallback when the persisted config is missing or unreadable: recovery
  /// is disabled rather than failing the aggregation pass.
  pub fn disabled() -> Self {
    Self {
      enabled: false,
      ..Self::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_matches_policy_defaults() {
    let config = RecoveryConfig::default();
    assert_eq!(config.min_reps_required, 50);
    assert_eq!(config.max_days_back, 7);
    assert!(config.enabled);
  }

  #[test]
  fn test_disabled_keeps_thresholds() {
    let config = RecoveryConfig::disabled();
    assert!(!config.enabled);
    assert_eq!(config.min_reps_required, 50);
  }
}
