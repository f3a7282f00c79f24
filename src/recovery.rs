//! Recovery Policy Evaluator
//!
//! Decides, for a single day, whether it is eligible to be recovered and
//! whether it has already been recovered. Reads persisted evidence only;
//! creating recovery records is the store's job.
//!
//! Eligibility (`can_recover_day`) and finality (`is_recovered`) are
//! deliberately separate questions: eligibility gates the UI flow that offers
//! a recovery, finality is the single check the resolver consults when
//! classifying a day.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::models::{RecoveryConfig, WorkoutRecord};

/// Whether `day` is still eligible for a recovery session.
///
/// Eligible only if recovery is enabled, the day is strictly in the past, and
/// it is at most `max_days_back` whole days behind today. Does not check
/// whether the day has already been recovered.
pub fn can_recover_day(day: NaiveDate, today: NaiveDate, config: &RecoveryConfig) -> bool {
  if !config.enabled {
    return false;
  }
  if day >= today {
    return false;
  }
  (today - day).num_days() <= config.max_days_back
}

/// Final authority on "is this day recovered": a recovery-typed record exists
/// whose `recovered_date` matches and whose reps meet the configured minimum.
///
/// Independent of `config.enabled`: evidence already persisted is not
/// invalidated by later policy changes.
pub fn is_recovered(day: NaiveDate, records: &[WorkoutRecord], config: &RecoveryConfig) -> bool {
  records.iter().any(|r| {
    r.is_recovery() && r.recovered_date == Some(day) && r.total_reps >= config.min_reps_required
  })
}

/// Every day the given records prove recovered. Set-valued form of
/// [`is_recovered`] used by the resolver's finalization pass.
pub fn recovered_days(records: &[WorkoutRecord], config: &RecoveryConfig) -> BTreeSet<NaiveDate> {
  records
    .iter()
    .filter(|r| r.is_recovery() && r.total_reps >= config.min_reps_required)
    .filter_map(|r| r.recovered_date)
    .collect()
}
