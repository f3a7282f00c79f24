//! Storage collaborator for the calendar engine
//!
//! Owns every read and write the aggregation pipeline consumes: range queries
//! over workout records, day-summary upserts, the computed missed-day list,
//! recovery config and recovery-record creation. Mutations bump a push-based
//! change feed; subscribers re-derive everything from the latest emission, so
//! nothing here ever needs manual cache invalidation.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tokio::sync::watch;

use crate::db::{Database, DbPool};
use crate::models::{
  day_key, local_today, DaySummary, NewWorkoutRecord, RecoveryConfig, SessionType, WorkoutRecord,
};
use crate::recovery;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
  #[error("day {0} is outside the recovery window")]
  RecoveryNotAllowed(NaiveDate),
}

/// ---------------------------------------------------------------------------
/// Store
/// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Store {
  pool: DbPool,
  changes: Arc<watch::Sender<u64>>,
}

impl Store {
  pub fn new(db: &Database) -> Self {
    Self::from_pool(db.pool().clone())
  }

  pub fn from_pool(pool: DbPool) -> Self {
    let (tx, _rx) = watch::channel(0);
    Self {
      pool,
      changes: Arc::new(tx),
    }
  }

  /// Subscribe to the change feed. The value is a revision counter; every
  /// mutation bumps it, and subscribers re-derive from current state.
  pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
    self.changes.subscribe()
  }

  /// Force subscribers to re-derive without a data change (e.g. retrying
  /// after a failed aggregation pass).
  pub fn refresh(&self) {
    self.changes.send_modify(|rev| *rev += 1);
  }

  /// ---------------------------------------------------------------------------
  /// Workout Records
  /// ---------------------------------------------------------------------------

  pub async fn insert_workout(&self, new: &NewWorkoutRecord) -> Result<i64, StoreError> {
    let result = sqlx::query(
      r#"
      INSERT INTO workout_records (
        exercise_type, session_type, started_at, ended_at, duration_seconds,
        total_reps, avg_form_score, avg_confidence, affects_streak,
        recovered_date, notes, raw_json
      )
      VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
      "#,
    )
    .bind(&new.exercise_type)
    .bind(new.session_type.to_string())
    .bind(new.started_at)
    .bind(new.ended_at)
    .bind(new.duration_seconds)
    .bind(new.total_reps)
    .bind(new.avg_form_score)
    .bind(new.avg_confidence)
    .bind(new.affects_streak)
    .bind(new.recovered_date)
    .bind(&new.notes)
    .bind(&new.raw_json)
    .execute(&self.pool)
    .await?;

    self.refresh();
    Ok(result.last_insert_rowid())
  }

  /// Create the recovery record repairing `target_day`, after checking the
  /// day is still inside the configured look-back window.
  pub async fn record_recovery(
    &self,
    target_day: NaiveDate,
    exercise_type: &str,
    total_reps: i64,
    duration_seconds: Option<i64>,
  ) -> Result<i64, StoreError> {
    let config = self.recovery_config().await;
    if !recovery::can_recover_day(target_day, local_today(), &config) {
      return Err(StoreError::RecoveryNotAllowed(target_day));
    }

    let now = Utc::now();
    let new = NewWorkoutRecord {
      exercise_type: exercise_type.to_string(),
      session_type: SessionType::Recovery,
      started_at: now,
      ended_at: duration_seconds.map(|s| now + Duration::seconds(s)),
      duration_seconds,
      total_reps,
      avg_form_score: None,
      avg_confidence: None,
      affects_streak: true,
      recovered_date: Some(target_day),
      notes: None,
      raw_json: None,
    };

    tracing::info!(%target_day, total_reps, "recording recovery session");
    self.insert_workout(&new).await
  }

  pub async fn delete_workout(&self, id: i64) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM workout_records WHERE id = ?1")
      .bind(id)
      .execute(&self.pool)
      .await?;

    self.refresh();
    Ok(())
  }

  /// Notes are the one field a record stays mutable for.
  pub async fn update_workout_notes(&self, id: i64, notes: Option<&str>) -> Result<(), StoreError> {
    sqlx::query("UPDATE workout_records SET notes = ?1 WHERE id = ?2")
      .bind(notes)
      .bind(id)
      .execute(&self.pool)
      .await?;

    self.refresh();
    Ok(())
  }

  /// Records relevant to `[start, end]`: started on one of those local days,
  /// or repairing one of them via `recovered_date`. The SQL window is a
  /// coarse UTC over-approximation; the exact cut uses the local day key.
  pub async fn records_for_range(
    &self,
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<Vec<WorkoutRecord>, StoreError> {
    let (coarse_lo, coarse_hi) = coarse_bounds(start, end);

    let rows = sqlx::query(
      r#"
      SELECT * FROM workout_records
      WHERE (started_at >= ?1 AND started_at < ?2)
         OR (recovered_date >= ?3 AND recovered_date <= ?4)
      ORDER BY started_at
      "#,
    )
    .bind(coarse_lo)
    .bind(coarse_hi)
    .bind(start)
    .bind(end)
    .fetch_all(&self.pool)
    .await?;

    let records = rows
      .iter()
      .map(record_from_row)
      .filter(|r| {
        let day = day_key(r.started_at);
        let repairs_range = r
          .recovered_date
          .is_some_and(|d| d >= start && d <= end);
        (day >= start && day <= end) || repairs_range
      })
      .collect();

    Ok(records)
  }

  /// ---------------------------------------------------------------------------
  /// Day Summaries
  /// ---------------------------------------------------------------------------

  pub async fn day_summaries_in_range(
    &self,
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<Vec<DaySummary>, StoreError> {
    let summaries = sqlx::query_as::<_, DaySummary>(
      "SELECT * FROM day_summaries WHERE day >= ?1 AND day <= ?2 ORDER BY day",
    )
    .bind(start)
    .bind(end)
    .fetch_all(&self.pool)
    .await?;

    Ok(summaries)
  }

  /// Replace the rollup for one day. Summaries reflect current state, so
  /// this overwrites rather than accumulates.
  pub async fn upsert_day_summary(
    &self,
    day: NaiveDate,
    item_count: i64,
    completed_count: i64,
    total_reps: i64,
  ) -> Result<(), StoreError> {
    sqlx::query(
      r#"
      INSERT INTO day_summaries (day, item_count, completed_count, total_reps)
      VALUES (?1, ?2, ?3, ?4)
      ON CONFLICT(day) DO UPDATE SET
        item_count = excluded.item_count,
        completed_count = excluded.completed_count,
        total_reps = excluded.total_reps,
        updated_at = CURRENT_TIMESTAMP
      "#,
    )
    .bind(day)
    .bind(item_count)
    .bind(completed_count)
    .bind(total_reps)
    .execute(&self.pool)
    .await?;

    self.refresh();
    Ok(())
  }

  /// ---------------------------------------------------------------------------
  /// Missed Days
  /// ---------------------------------------------------------------------------

  /// Days in `[start, end]` strictly before `today` with neither a workout
  /// record nor a day summary.
  pub async fn missed_days_in_range(
    &self,
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
  ) -> Result<Vec<NaiveDate>, StoreError> {
    let records = self.records_for_range(start, end).await?;
    let summaries = self.day_summaries_in_range(start, end).await?;

    let mut covered: BTreeSet<NaiveDate> =
      records.iter().map(|r| day_key(r.started_at)).collect();
    covered.extend(summaries.iter().map(|s| s.day));

    let mut missed = Vec::new();
    let mut day = start;
    while day <= end && day < today {
      if !covered.contains(&day) {
        missed.push(day);
      }
      match day.succ_opt() {
        Some(next) => day = next,
        None => break,
      }
    }

    Ok(missed)
  }

  /// ---------------------------------------------------------------------------
  /// Recovery Config
  /// ---------------------------------------------------------------------------

  /// The persisted recovery policy. A missing or unreadable row degrades to
  /// "recovery disabled" rather than failing the aggregation pass.
  pub async fn recovery_config(&self) -> RecoveryConfig {
    let row = sqlx::query(
      "SELECT min_reps_required, max_days_back, enabled FROM recovery_config WHERE id = 1",
    )
    .fetch_optional(&self.pool)
    .await;

    match row {
      Ok(Some(row)) => RecoveryConfig {
        min_reps_required: row.get("min_reps_required"),
        max_days_back: row.get("max_days_back"),
        enabled: row.get("enabled"),
      },
      Ok(None) => RecoveryConfig::disabled(),
      Err(e) => {
        tracing::warn!(error = %e, "failed to read recovery config, treating as disabled");
        RecoveryConfig::disabled()
      }
    }
  }

  pub async fn update_recovery_config(
    &self,
    min_reps_required: Option<i64>,
    max_days_back: Option<i64>,
    enabled: Option<bool>,
  ) -> Result<(), StoreError> {
    sqlx::query(
      r#"
      UPDATE recovery_config SET
        min_reps_required = COALESCE(?1, min_reps_required),
        max_days_back = COALESCE(?2, max_days_back),
        enabled = COALESCE(?3, enabled),
        updated_at = CURRENT_TIMESTAMP
      WHERE id = 1
      "#,
    )
    .bind(min_reps_required)
    .bind(max_days_back)
    .bind(enabled)
    .execute(&self.pool)
    .await?;

    self.refresh();
    Ok(())
  }
}

/// Coarse UTC window guaranteed to contain every instant whose local day
/// falls in `[start, end]`, regardless of timezone offset.
fn coarse_bounds(start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
  let lo = (start - Duration::days(2)).and_time(NaiveTime::MIN).and_utc();
  let hi = (end + Duration::days(2)).and_time(NaiveTime::MIN).and_utc();
  (lo, hi)
}

fn record_from_row(row: &SqliteRow) -> WorkoutRecord {
  let session_type: String = row.get("session_type");
  WorkoutRecord {
    id: row.get("id"),
    exercise_type: row.get("exercise_type"),
    session_type: session_type.parse().unwrap_or_default(),
    started_at: row.get("started_at"),
    ended_at: row.get("ended_at"),
    duration_seconds: row.get("duration_seconds"),
    total_reps: row.get("total_reps"),
    avg_form_score: row.get("avg_form_score"),
    avg_confidence: row.get("avg_confidence"),
    affects_streak: row.get("affects_streak"),
    recovered_date: row.get("recovered_date"),
    notes: row.get("notes"),
    raw_json: row.get("raw_json"),
    created_at: row.get("created_at"),
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::{new_record_on, setup_test_store};

  fn d(s: &str) -> NaiveDate {
    s.parse().expect("valid date literal")
  }

  #[tokio::test]
  async fn test_insert_and_fetch_in_range() {
    let store = setup_test_store().await;

    store
      .insert_workout(&new_record_on(d("2025-03-10"), SessionType::RealTime, 40))
      .await
      .expect("insert in range");
    store
      .insert_workout(&new_record_on(d("2025-04-02"), SessionType::RealTime, 50))
      .await
      .expect("insert out of range");

    let records = store
      .records_for_range(d("2025-03-01"), d("2025-03-31"))
      .await
      .expect("fetch range");

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].total_reps, 40);
    assert_eq!(records[0].session_type, SessionType::RealTime);
  }

  #[tokio::test]
  async fn test_recovery_repairing_range_is_included() {
    let store = setup_test_store().await;

    // Performed in April, repairs a March day
    let mut new = new_record_on(d("2025-04-02"), SessionType::Recovery, 60);
    new.recovered_date = Some(d("2025-03-20"));
    store.insert_workout(&new).await.expect("insert recovery");

    let records = store
      .records_for_range(d("2025-03-01"), d("2025-03-31"))
      .await
      .expect("fetch range");

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].recovered_date, Some(d("2025-03-20")));
  }

  #[tokio::test]
  async fn test_record_recovery_respects_window() {
    let store = setup_test_store().await;
    let today = local_today();

    let id = store
      .record_recovery(today - Duration::days(2), "pushup", 60, Some(300))
      .await
      .expect("recovery inside window");
    assert!(id > 0);

    let err = store
      .record_recovery(today - Duration::days(10), "pushup", 60, None)
      .await
      .expect_err("recovery outside window");
    assert!(matches!(err, StoreError::RecoveryNotAllowed(_)));
  }

  #[tokio::test]
  async fn test_upsert_day_summary_overwrites() {
    let store = setup_test_store().await;
    let day = d("2025-03-12");

    store
      .upsert_day_summary(day, 3, 1, 20)
      .await
      .expect("first upsert");
    store
      .upsert_day_summary(day, 3, 3, 60)
      .await
      .expect("second upsert");

    let summaries = store
      .day_summaries_in_range(day, day)
      .await
      .expect("fetch summaries");

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].completed_count, 3);
    assert_eq!(summaries[0].total_reps, 60);
  }

  #[tokio::test]
  async fn test_missed_days_skip_covered_and_future() {
    let store = setup_test_store().await;
    let today = local_today();
    let start = today - Duration::days(5);

    store
      .insert_workout(&new_record_on(today - Duration::days(1), SessionType::RealTime, 40))
      .await
      .expect("insert workout");
    store
      .upsert_day_summary(today - Duration::days(2), 2, 2, 30)
      .await
      .expect("upsert summary");

    let missed = store
      .missed_days_in_range(start, today, today)
      .await
      .expect("missed days");

    assert_eq!(
      missed,
      vec![
        today - Duration::days(5),
        today - Duration::days(4),
        today - Duration::days(3),
      ]
    );
  }

  #[tokio::test]
  async fn test_recovery_config_roundtrip() {
    let store = setup_test_store().await;

    // Migration seeds the defaults
    let config = store.recovery_config().await;
    assert_eq!(config, RecoveryConfig::default());

    store
      .update_recovery_config(Some(30), None, Some(false))
      .await
      .expect("update config");

    let config = store.recovery_config().await;
    assert_eq!(config.min_reps_required, 30);
    assert_eq!(config.max_days_back, 7);
    assert!(!config.enabled);
  }

  #[tokio::test]
  async fn test_notes_update_and_delete() {
    let store = setup_test_store().await;
    let day = d("2025-03-10");

    let id = store
      .insert_workout(&new_record_on(day, SessionType::Manual, 25))
      .await
      .expect("insert");

    store
      .update_workout_notes(id, Some("felt strong"))
      .await
      .expect("update notes");

    let records = store.records_for_range(day, day).await.expect("fetch");
    assert_eq!(records[0].notes.as_deref(), Some("felt strong"));

    store.delete_workout(id).await.expect("delete");
    let records = store.records_for_range(day, day).await.expect("fetch");
    assert!(records.is_empty());
  }

  #[tokio::test]
  async fn test_mutations_bump_change_feed() {
    let store = setup_test_store().await;
    let mut rx = store.subscribe_changes();

    let before = *rx.borrow_and_update();
    store
      .upsert_day_summary(d("2025-03-12"), 1, 0, 0)
      .await
      .expect("upsert");

    assert!(rx.has_changed().expect("feed open"));
    assert!(*rx.borrow_and_update() > before);
  }
}
