//! Streak Calculator
//!
//! Walks the resolved day map backward from "today" to produce the current
//! consecutive-activity count. Recovered days count the same as completed
//! days. An in-progress today neither counts nor breaks: the anchor falls to
//! yesterday, so yesterday's streak provisionally continues until today
//! closes one way or the other.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use crate::models::{DayData, DayStatus};

/// Current consecutive-activity streak ending at today or yesterday.
///
/// The anchor is the most recent day at or before `today` whose status counts
/// (completed, completed-manual, completed-daily or recovered). A streak is
/// broken (0) when the anchor is older than yesterday; otherwise the count
/// walks backward one day at a time until the first gap.
pub fn current_streak(days: &BTreeMap<NaiveDate, DayData>, today: NaiveDate) -> u32 {
  let anchor = days
    .range(..=today)
    .rev()
    .find(|(_, data)| data.status.counts_for_streak())
    .map(|(day, _)| *day);

  let Some(anchor) = anchor else {
    return 0;
  };
  if anchor != today && anchor != today - Duration::days(1) {
    return 0;
  }

  let mut streak = 0;
  let mut cursor = anchor;
  loop {
    match days.get(&cursor) {
      Some(data) if data.status.counts_for_streak() => streak += 1,
      _ => break,
    }
    match cursor.pred_opt() {
      Some(prev) => cursor = prev,
      None => break,
    }
  }
  streak
}

/// Longest run of consecutive counted days anywhere in the map.
pub fn longest_streak(days: &BTreeMap<NaiveDate, DayData>) -> u32 {
  let mut longest = 0;
  let mut run = 0;
  let mut prev_counted: Option<NaiveDate> = None;

  for (day, data) in days {
    if !data.status.counts_for_streak() {
      continue;
    }
    run = if prev_counted.and_then(|p| p.succ_opt()) == Some(*day) {
      run + 1
    } else {
      1
    };
    prev_counted = Some(*day);
    longest = longest.max(run);
  }

  longest
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  fn d(s: &str) -> NaiveDate {
    s.parse().expect("valid date literal")
  }

  fn day_map(entries: &[(&str, DayStatus)]) -> BTreeMap<NaiveDate, DayData> {
    entries
      .iter()
      .map(|(day, status)| (d(day), DayData::empty(d(day), *status)))
      .collect()
  }

  #[test]
  fn test_streak_anchored_at_today() {
    let days = day_map(&[
      ("2025-03-13", DayStatus::Completed),
      ("2025-03-14", DayStatus::CompletedManual),
      ("2025-03-15", DayStatus::Completed),
    ]);

    assert_eq!(current_streak(&days, d("2025-03-15")), 3);
  }

  #[test]
  fn test_streak_anchored_at_yesterday() {
    // Today has no entry yet; yesterday's streak still stands.
    let days = day_map(&[
      ("2025-03-13", DayStatus::Completed),
      ("2025-03-14", DayStatus::Completed),
    ]);

    assert_eq!(current_streak(&days, d("2025-03-15")), 2);
  }

  #[test]
  fn test_streak_broken_when_anchor_too_old() {
    let days = day_map(&[
      ("2025-03-12", DayStatus::Completed),
      ("2025-03-13", DayStatus::Completed),
    ]);

    assert_eq!(current_streak(&days, d("2025-03-15")), 0);
  }

  #[test]
  fn test_streak_stops_at_first_gap() {
    let days = day_map(&[
      ("2025-03-10", DayStatus::Completed),
      // 2025-03-11 absent
      ("2025-03-12", DayStatus::Completed),
      ("2025-03-13", DayStatus::CompletedDaily),
      ("2025-03-14", DayStatus::Completed),
    ]);

    assert_eq!(current_streak(&days, d("2025-03-14")), 3);
  }

  #[test]
  fn test_missed_day_breaks_streak() {
    let days = day_map(&[
      ("2025-03-12", DayStatus::Completed),
      ("2025-03-13", DayStatus::Missed),
      ("2025-03-14", DayStatus::Completed),
    ]);

    assert_eq!(current_streak(&days, d("2025-03-14")), 1);
  }

  #[test]
  fn test_recovered_day_extends_streak() {
    let days = day_map(&[
      ("2025-03-12", DayStatus::Completed),
      ("2025-03-13", DayStatus::Recovered),
      ("2025-03-14", DayStatus::Completed),
    ]);

    assert_eq!(current_streak(&days, d("2025-03-14")), 3);
  }

  #[test]
  fn test_in_progress_today_provisionally_extends_yesterday() {
    // Open question branch 1: today is still open, so yesterday's streak
    // continues without today being counted yet.
    let days = day_map(&[
      ("2025-03-13", DayStatus::Completed),
      ("2025-03-14", DayStatus::Completed),
      ("2025-03-15", DayStatus::InProgress),
    ]);

    assert_eq!(current_streak(&days, d("2025-03-15")), 2);
  }

  #[test]
  fn test_in_progress_today_alone_is_no_streak() {
    // Open question branch 2: an open session with nothing behind it does
    // not count as a streak of one.
    let days = day_map(&[("2025-03-15", DayStatus::InProgress)]);

    assert_eq!(current_streak(&days, d("2025-03-15")), 0);
  }

  #[test]
  fn test_empty_map_has_no_streak() {
    assert_eq!(current_streak(&BTreeMap::new(), d("2025-03-15")), 0);
  }

  #[test]
  fn test_insert_before_start_grows_streak_by_one() {
    // Monotonicity property: a completed day immediately before the streak's
    // start extends it by exactly one; a gapped insert changes nothing.
    let mut days = day_map(&[
      ("2025-03-13", DayStatus::Completed),
      ("2025-03-14", DayStatus::Completed),
      ("2025-03-15", DayStatus::Completed),
    ]);
    let today = d("2025-03-15");
    let before = current_streak(&days, today);

    days.insert(
      d("2025-03-12"),
      DayData::empty(d("2025-03-12"), DayStatus::Completed),
    );
    assert_eq!(current_streak(&days, today), before + 1);

    days.insert(
      d("2025-03-09"),
      DayData::empty(d("2025-03-09"), DayStatus::Completed),
    );
    assert_eq!(current_streak(&days, today), before + 1);
  }

  #[test]
  fn test_longest_streak_spans_history() {
    let days = day_map(&[
      ("2025-03-01", DayStatus::Completed),
      ("2025-03-02", DayStatus::Completed),
      ("2025-03-03", DayStatus::Recovered),
      ("2025-03-04", DayStatus::Completed),
      // gap
      ("2025-03-10", DayStatus::Completed),
      ("2025-03-11", DayStatus::Completed),
    ]);

    assert_eq!(longest_streak(&days), 4);
    assert_eq!(longest_streak(&BTreeMap::new()), 0);
  }

  #[test]
  fn test_longest_streak_ignores_in_progress_entries() {
    let days = day_map(&[
      ("2025-03-10", DayStatus::Completed),
      ("2025-03-11", DayStatus::Completed),
      ("2025-03-12", DayStatus::InProgress),
    ]);

    assert_eq!(longest_streak(&days), 2);
  }
}
