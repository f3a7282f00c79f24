use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::workout::WorkoutRecord;

/// ---------------------------------------------------------------------------
/// Day Keys
/// ---------------------------------------------------------------------------

/// The local calendar day an instant falls on. All per-day aggregation keys
/// come from this one function so records and summaries can never disagree
/// about which day they belong to.
pub fn day_key(instant: DateTime<Utc>) -> NaiveDate {
  instant.with_timezone(&Local).date_naive()
}

/// Today as a local calendar day
pub fn local_today() -> NaiveDate {
  Local::now().date_naive()
}

/// ---------------------------------------------------------------------------
/// Day Summary
/// ---------------------------------------------------------------------------

/// Per-day rollup of lightweight "today" items added outside the
/// camera-tracked flow. Recomputed whenever the underlying items change;
/// reflects current state, not an append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DaySummary {
  pub id: i64,
  pub day: NaiveDate,
  pub item_count: i64,
  pub completed_count: i64,
  pub total_reps: i64,
  pub updated_at: Option<DateTime<Utc>>,
}

impl DaySummary {
  pub fn all_items_completed(&self) -> bool {
    self.item_count > 0 && self.completed_count >= self.item_count
  }
}

/// ---------------------------------------------------------------------------
/// Day Status
/// ---------------------------------------------------------------------------

/// Resolved status for one calendar day.
///
/// `Future` is assigned by callers for days later than "now" and never
/// produced by the resolver. `Recovered` is a sink: once assigned during an
/// aggregation pass it is never downgraded within that pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
  /// Camera-tracked workout completed
  Completed,
  /// Manually logged workout
  CompletedManual,
  /// Past day where daily items were worked on (no workout record)
  CompletedDaily,
  /// Missed day repaired by a qualifying recovery session
  Recovered,
  /// Today, with an open session or incomplete items
  InProgress,
  Missed,
  Future,
}

impl DayStatus {
  /// Statuses that count toward the consecutive-activity streak
  pub fn counts_for_streak(&self) -> bool {
    matches!(
      self,
      Self::Completed | Self::CompletedManual | Self::CompletedDaily | Self::Recovered
    )
  }
}

impl std::fmt::Display for DayStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Completed => write!(f, "completed"),
      Self::CompletedManual => write!(f, "completed_manual"),
      Self::CompletedDaily => write!(f, "completed_daily"),
      Self::Recovered => write!(f, "recovered"),
      Self::InProgress => write!(f, "in_progress"),
      Self::Missed => write!(f, "missed"),
      Self::Future => write!(f, "future"),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Day Data
/// ---------------------------------------------------------------------------

/// Resolver output for one day: status plus aggregates accumulated across
/// every workout record contributing to that day. Owned by the aggregation
/// pipeline for the lifetime of one pass; presentation code only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayData {
  pub day: NaiveDate,
  pub status: DayStatus,
  pub session_count: i64,
  pub total_reps: i64,
  /// Contributing records; empty for summary-only or missed days
  pub records: Vec<WorkoutRecord>,
}

impl DayData {
  pub fn empty(day: NaiveDate, status: DayStatus) -> Self {
    Self {
      day,
      status,
      session_count: 0,
      total_reps: 0,
      records: Vec::new(),
    }
  }
}
