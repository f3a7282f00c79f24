use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// ---------------------------------------------------------------------------
/// Session Type
/// ---------------------------------------------------------------------------

/// How a workout record came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
  /// Camera-tracked session with automatic rep counting
  #[default]
  RealTime,
  /// Entered by hand after the fact
  Manual,
  /// Retroactive session repairing a previously missed day
  Recovery,
}

impl std::fmt::Display for SessionType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::RealTime => write!(f, "real_time"),
      Self::Manual => write!(f, "manual"),
      Self::Recovery => write!(f, "recovery"),
    }
  }
}

impl std::str::FromStr for SessionType {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "real_time" => Ok(Self::RealTime),
      "manual" => Ok(Self::Manual),
      "recovery" => Ok(Self::Recovery),
      _ => Err(format!("Unknown session type: {}", s)),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Workout Record
/// ---------------------------------------------------------------------------

/// One completed activity instance. Immutable once written except for notes;
/// deleted explicitly by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRecord {
  pub id: i64,
  pub exercise_type: String,
  pub session_type: SessionType,
  pub started_at: DateTime<Utc>,
  pub ended_at: Option<DateTime<Utc>>,
  pub duration_seconds: Option<i64>,
  pub total_reps: i64,
  pub avg_form_score: Option<f64>,
  pub avg_confidence: Option<f64>,
  pub affects_streak: bool,
  /// Only set for recovery sessions: the missed day this record repairs
  pub recovered_date: Option<NaiveDate>,
  pub notes: Option<String>,
  pub raw_json: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}

impl WorkoutRecord {
  pub fn is_recovery(&self) -> bool {
    self.session_type == SessionType::Recovery
  }
}

/// For inserting new workout records (without id, created_at)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkoutRecord {
  pub exercise_type: String,
  pub session_type: SessionType,
  pub started_at: DateTime<Utc>,
  pub ended_at: Option<DateTime<Utc>>,
  pub duration_seconds: Option<i64>,
  pub total_reps: i64,
  pub avg_form_score: Option<f64>,
  pub avg_confidence: Option<f64>,
  pub affects_streak: bool,
  pub recovered_date: Option<NaiveDate>,
  pub notes: Option<String>,
  pub raw_json: Option<String>,
}
