//! Day Status Resolver
//!
//! Pure reconciliation of three independently-evolving evidence sources into
//! one status per calendar day:
//! - completed workout records (camera-tracked, manual, recovery)
//! - per-day "today session" item summaries
//! - an externally-computed missed-day list
//!
//! The resolution runs as ordered passes over the requested range. `Recovered`
//! is a sink within a pass: once the finalization step confirms a day as
//! recovered, no other classification may replace it. No I/O happens here;
//! the aggregation pipeline feeds in a frozen snapshot of the inputs, so
//! resolving the same inputs twice yields identical output.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{day_key, DayData, DayStatus, DaySummary, RecoveryConfig, WorkoutRecord};
use crate::recovery;

/// Resolve every day in `[range_start, range_end]` that has any evidence or
/// an explicit missed flag. Days without either are absent from the map;
/// callers classify absence with [`status_for_absent_day`].
pub fn resolve_range(
  range_start: NaiveDate,
  range_end: NaiveDate,
  today: NaiveDate,
  records: &[WorkoutRecord],
  summaries: &[DaySummary],
  missed_days: &[NaiveDate],
  config: &RecoveryConfig,
) -> BTreeMap<NaiveDate, DayData> {
  let mut days = BTreeMap::new();

  fold_workout_records(&mut days, range_start, range_end, records);
  apply_day_summaries(&mut days, range_start, range_end, today, summaries);
  overlay_missed_days(&mut days, range_start, range_end, today, missed_days);
  finalize_recoveries(&mut days, range_start, range_end, records, config);
  apply_today_open_session(&mut days, today, summaries);

  days
}

/// Status of a day the resolver produced no entry for: anything before today
/// was missed, today and later are still ahead.
pub fn status_for_absent_day(day: NaiveDate, today: NaiveDate) -> DayStatus {
  if day < today {
    DayStatus::Missed
  } else {
    DayStatus::Future
  }
}

/// ---------------------------------------------------------------------------
/// Pass 1: Workout Records
/// ---------------------------------------------------------------------------

/// Fold records sharing a day key. Aggregates accumulate across every record
/// for the day; the status follows the strongest session type seen so far
/// (recovery > manual > real-time). Records flagged as not affecting the
/// streak still count toward the aggregates but never set the status.
fn fold_workout_records(
  days: &mut BTreeMap<NaiveDate, DayData>,
  range_start: NaiveDate,
  range_end: NaiveDate,
  records: &[WorkoutRecord],
) {
  for record in records {
    let day = day_key(record.started_at);
    if day < range_start || day > range_end {
      // Out-of-range records (e.g. a recovery session performed after the
      // viewed month) still feed the finalization pass via `recovered_date`.
      continue;
    }

    let entry = days
      .entry(day)
      .or_insert_with(|| DayData::empty(day, DayStatus::Missed));
    entry.session_count += 1;
    entry.total_reps += record.total_reps;
    entry.records.push(record.clone());

    if record.affects_streak {
      entry.status = record_status(entry.status, record);
    }
  }
}

fn record_status(current: DayStatus, record: &WorkoutRecord) -> DayStatus {
  use crate::models::SessionType;

  match record.session_type {
    SessionType::Recovery => DayStatus::Recovered,
    _ if current == DayStatus::Recovered => current,
    SessionType::Manual => DayStatus::CompletedManual,
    SessionType::RealTime if current == DayStatus::CompletedManual => current,
    SessionType::RealTime => DayStatus::Completed,
  }
}

/// ---------------------------------------------------------------------------
/// Pass 2: Daily Summaries
/// ---------------------------------------------------------------------------

/// Classify days from item summaries. Workout-record evidence takes
/// precedence: a day that already holds a non-missed status is skipped.
fn apply_day_summaries(
  days: &mut BTreeMap<NaiveDate, DayData>,
  range_start: NaiveDate,
  range_end: NaiveDate,
  today: NaiveDate,
  summaries: &[DaySummary],
) {
  for summary in summaries {
    if summary.day > today || summary.day < range_start || summary.day > range_end {
      continue;
    }
    if let Some(existing) = days.get(&summary.day) {
      if existing.status != DayStatus::Missed {
        continue;
      }
    }

    let status = if summary.day == today {
      if summary.item_count == 0 {
        DayStatus::Missed
      } else if summary.all_items_completed() {
        DayStatus::Completed
      } else {
        DayStatus::InProgress
      }
    } else if summary.item_count > 0 {
      DayStatus::CompletedDaily
    } else {
      DayStatus::Missed
    };

    let entry = days
      .entry(summary.day)
      .or_insert_with(|| DayData::empty(summary.day, DayStatus::Missed));
    entry.status = status;
    entry.total_reps += summary.total_reps;
  }
}

/// ---------------------------------------------------------------------------
/// Pass 3: Missed-Day Overlay
/// ---------------------------------------------------------------------------

/// Insert explicit missed days computed by the storage collaborator. This
/// pass never overwrites an existing entry.
fn overlay_missed_days(
  days: &mut BTreeMap<NaiveDate, DayData>,
  range_start: NaiveDate,
  range_end: NaiveDate,
  today: NaiveDate,
  missed_days: &[NaiveDate],
) {
  for &day in missed_days {
    if day < range_start || day > range_end || day >= today {
      continue;
    }
    days
      .entry(day)
      .or_insert_with(|| DayData::empty(day, DayStatus::Missed));
  }
}

/// ---------------------------------------------------------------------------
/// Pass 4: Recovery Finalization
/// ---------------------------------------------------------------------------

/// Single source of truth for "is this day recovered". Every day the
/// evaluator confirms is forced to `Recovered` regardless of what earlier
/// passes produced, creating the entry if absent. A day that pass 1 marked
/// `Recovered` from a session type alone, but whose evidence fails the reps
/// threshold, demotes to `Completed`: the session still represents real
/// activity even when it does not repair the targeted day.
fn finalize_recoveries(
  days: &mut BTreeMap<NaiveDate, DayData>,
  range_start: NaiveDate,
  range_end: NaiveDate,
  records: &[WorkoutRecord],
  config: &RecoveryConfig,
) {
  let recovered = recovery::recovered_days(records, config);

  for &day in recovered.range(range_start..=range_end) {
    let entry = days
      .entry(day)
      .or_insert_with(|| DayData::empty(day, DayStatus::Recovered));
    entry.status = DayStatus::Recovered;
  }

  for (day, data) in days.iter_mut() {
    if data.status == DayStatus::Recovered && !recovered.contains(day) {
      data.status = DayStatus::Completed;
    }
  }
}

/// ---------------------------------------------------------------------------
/// Pass 5: Today In-Progress Special Case
/// ---------------------------------------------------------------------------

/// A summary row for today means a session is open, even with zero items; a
/// `Missed` today flips to `InProgress` in that case.
fn apply_today_open_session(
  days: &mut BTreeMap<NaiveDate, DayData>,
  today: NaiveDate,
  summaries: &[DaySummary],
) {
  if !summaries.iter().any(|s| s.day == today) {
    return;
  }
  if let Some(entry) = days.get_mut(&today) {
    if entry.status == DayStatus::Missed {
      entry.status = DayStatus::InProgress;
    }
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
