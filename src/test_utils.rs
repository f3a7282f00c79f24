//! Test utilities and helpers for integration and unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Mock data factories
//! - Tracing initialization for test output

use chrono::{DateTime, Duration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use sqlx::SqlitePool;

use crate::models::{DaySummary, NewWorkoutRecord, SessionType, WorkoutRecord};
use crate::store::Store;

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  init_test_tracing();

  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// A store backed by a fresh in-memory database
pub async fn setup_test_store() -> Store {
  Store::from_pool(setup_test_db().await)
}

/// Install a test-writer tracing subscriber; safe to call repeatedly
pub fn init_test_tracing() {
  use tracing_subscriber::EnvFilter;

  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

/// Seed the store with one real-time workout per day, newest first
/// Returns the IDs of created records
pub async fn seed_workout_records(store: &Store, count: usize) -> Vec<i64> {
  let today = crate::models::local_today();
  let mut ids = Vec::new();

  for i in 0..count {
    let day = today - Duration::days(i as i64);
    let id = store
      .insert_workout(&new_record_on(day, SessionType::RealTime, 30 + i as i64))
      .await
      .expect("Failed to insert seed record");
    ids.push(id);
  }

  ids
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// Noon on `day` in local time, as the stored UTC instant. Noon keeps the
/// local day key stable across DST transitions.
pub fn instant_on(day: NaiveDate) -> DateTime<Utc> {
  let noon = day.and_hms_opt(12, 0, 0).expect("noon is a valid time");
  match Local.from_local_datetime(&noon) {
    LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
    LocalResult::None => day.and_time(NaiveTime::MIN).and_utc(),
  }
}

/// Create a workout record that falls on `day`
pub fn record_on(day: NaiveDate, session_type: SessionType, reps: i64) -> WorkoutRecord {
  WorkoutRecord {
    id: 0,
    exercise_type: "squat".to_string(),
    session_type,
    started_at: instant_on(day),
    ended_at: None,
    duration_seconds: Some(600),
    total_reps: reps,
    avg_form_score: Some(0.9),
    avg_confidence: Some(0.95),
    affects_streak: true,
    recovered_date: None,
    notes: None,
    raw_json: None,
    created_at: None,
  }
}

/// Create a recovery record performed on `performed` repairing `target`
pub fn recovery_record_for(performed: NaiveDate, target: NaiveDate, reps: i64) -> WorkoutRecord {
  let mut record = record_on(performed, SessionType::Recovery, reps);
  record.recovered_date = Some(target);
  record
}

/// Create an insertable record that falls on `day`
pub fn new_record_on(day: NaiveDate, session_type: SessionType, reps: i64) -> NewWorkoutRecord {
  let recovered_date = match session_type {
    SessionType::Recovery => Some(day),
    _ => None,
  };

  NewWorkoutRecord {
    exercise_type: "squat".to_string(),
    session_type,
    started_at: instant_on(day),
    ended_at: None,
    duration_seconds: Some(600),
    total_reps: reps,
    avg_form_score: Some(0.9),
    avg_confidence: Some(0.95),
    affects_streak: true,
    recovered_date,
    notes: None,
    raw_json: Some(serde_json::json!({ "source": "test", "reps": reps }).to_string()),
  }
}

/// Create a day summary rollup for `day`
pub fn summary_on(day: NaiveDate, item_count: i64, completed_count: i64, reps: i64) -> DaySummary {
  DaySummary {
    id: 0,
    day,
    item_count,
    completed_count,
    total_reps: reps,
    updated_at: None,
  }
}

/// Create a workout record N days ago from now
pub fn mock_workout_record(session_type: SessionType, days_ago: i64) -> WorkoutRecord {
  let mut record = record_on(
    crate::models::local_today() - Duration::days(days_ago),
    session_type,
    50,
  );
  record.started_at = Utc::now() - Duration::days(days_ago);
  record
}

/// Create a recovery record performed now, repairing `target`
pub fn mock_recovery_record(target: NaiveDate, reps: i64) -> WorkoutRecord {
  let mut record = mock_workout_record(SessionType::Recovery, 0);
  record.total_reps = reps;
  record.recovered_date = Some(target);
  record
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::day_key;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('workout_records', 'day_summaries', 'recovery_config')"
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 3, "Expected 3 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seed_records_returns_correct_count() {
    let store = setup_test_store().await;

    let ids = seed_workout_records(&store, 5).await;
    assert_eq!(ids.len(), 5);

    let today = crate::models::local_today();
    let records = store
      .records_for_range(today - Duration::days(4), today)
      .await
      .expect("Failed to fetch records");

    assert_eq!(records.len(), 5);
  }

  #[test]
  fn test_factories_land_on_requested_day() {
    let day: NaiveDate = "2025-03-10".parse().expect("valid date literal");

    let record = record_on(day, SessionType::Manual, 30);
    assert_eq!(day_key(record.started_at), day);
    assert_eq!(record.session_type, SessionType::Manual);

    let recovery = recovery_record_for(day, day.pred_opt().expect("valid date"), 60);
    assert!(recovery.is_recovery());
    assert_eq!(recovery.recovered_date, day.pred_opt());

    let summary = summary_on(day, 3, 1, 20);
    assert!(!summary.all_items_completed());
  }
}
