//! Calendar Aggregation Pipeline
//!
//! Long-lived reactive subscriber for one bounded date range at a time. On
//! every change-feed emission it re-fetches workout records, day summaries
//! and the missed-day list, re-runs the resolver and streak calculator, and
//! publishes one atomic snapshot. Switching ranges cancels the previous pass
//! deterministically: a superseded pass can never publish, even if it is
//! mid-flight when the switch happens.
//!
//! Failure handling follows the taxonomy of the engine: storage-read
//! failures surface as an explicit error state while the last good snapshot
//! stays available; cancellation discards silently; a missing recovery
//! config degrades to "recovery disabled" inside the store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::watch;

use crate::models::{local_today, DayData, DaySummary, RecoveryConfig, WorkoutRecord};
use crate::recovery;
use crate::resolver;
use crate::store::{Store, StoreError};
use crate::streak;

/// ---------------------------------------------------------------------------
/// Published State
/// ---------------------------------------------------------------------------

/// One atomic aggregation result. Owned by the pipeline; presentation code
/// only reads it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarSnapshot {
  pub range_start: NaiveDate,
  pub range_end: NaiveDate,
  pub days: BTreeMap<NaiveDate, DayData>,
  pub streak: u32,
}

/// What subscribers see: the latest good snapshot plus, when the most recent
/// pass failed, the error that kept it stale. Both `None` means the first
/// pass has not finished yet.
#[derive(Debug, Clone, Default)]
pub struct CalendarState {
  pub snapshot: Option<CalendarSnapshot>,
  pub error: Option<String>,
}

/// Inclusive day range of a calendar month; `None` for an invalid month.
pub fn month_range(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
  let start = NaiveDate::from_ymd_opt(year, month, 1)?;
  let end = match month {
    12 => NaiveDate::from_ymd_opt(year + 1, 1, 1),
    _ => NaiveDate::from_ymd_opt(year, month + 1, 1),
  }?
  .pred_opt()?;
  Some((start, end))
}

/// ---------------------------------------------------------------------------
/// Pipeline
/// ---------------------------------------------------------------------------

pub struct CalendarPipeline {
  store: Store,
  state: Arc<watch::Sender<CalendarState>>,
  generation: Arc<AtomicU64>,
  active: Option<ActivePass>,
}

struct ActivePass {
  cancel: watch::Sender<bool>,
}

impl CalendarPipeline {
  pub fn new(store: Store) -> Self {
    let (state, _rx) = watch::channel(CalendarState::default());
    Self {
      store,
      state: Arc::new(state),
      generation: Arc::new(AtomicU64::new(0)),
      active: None,
    }
  }

  /// The downstream view of the pipeline's output.
  pub fn subscribe(&self) -> watch::Receiver<CalendarState> {
    self.state.subscribe()
  }

  /// Start aggregating `[range_start, range_end]`, cancelling any pass that
  /// is still running for a previous range.
  pub fn watch_range(
    &mut self,
    range_start: NaiveDate,
    range_end: NaiveDate,
  ) -> watch::Receiver<CalendarState> {
    self.stop();

    let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let pass = AggregationPass {
      store: self.store.clone(),
      state: Arc::clone(&self.state),
      generation: Arc::clone(&self.generation),
      my_generation,
      range_start,
      range_end,
      cancel: cancel_rx,
    };

    tracing::info!(%range_start, %range_end, "starting calendar aggregation");
    tokio::spawn(pass.run());

    self.active = Some(ActivePass { cancel: cancel_tx });
    self.state.subscribe()
  }

  /// Convenience wrapper for the common month-view case.
  pub fn watch_month(&mut self, year: i32, month: u32) -> Option<watch::Receiver<CalendarState>> {
    let (start, end) = month_range(year, month)?;
    Some(self.watch_range(start, end))
  }

  /// Cancel the active pass, if any. Bumping the generation first makes the
  /// cancellation deterministic: a pass that already raced past its last
  /// cancel check still cannot publish.
  pub fn stop(&mut self) {
    if let Some(active) = self.active.take() {
      self.generation.fetch_add(1, Ordering::SeqCst);
      let _ = active.cancel.send(true);
    }
  }

  /// Standalone eligibility query for presentation code.
  pub async fn can_recover_day(&self, day: NaiveDate) -> bool {
    let config = self.store.recovery_config().await;
    recovery::can_recover_day(day, local_today(), &config)
  }
}

impl Drop for CalendarPipeline {
  fn drop(&mut self) {
    self.stop();
  }
}

/// ---------------------------------------------------------------------------
/// Aggregation Pass
/// ---------------------------------------------------------------------------

struct AggregationPass {
  store: Store,
  state: Arc<watch::Sender<CalendarState>>,
  generation: Arc<AtomicU64>,
  my_generation: u64,
  range_start: NaiveDate,
  range_end: NaiveDate,
  cancel: watch::Receiver<bool>,
}

struct PassInputs {
  records: Vec<WorkoutRecord>,
  summaries: Vec<DaySummary>,
  missed: Vec<NaiveDate>,
  config: RecoveryConfig,
}

impl AggregationPass {
  async fn run(mut self) {
    let mut changes = self.store.subscribe_changes();

    loop {
      if *self.cancel.borrow() {
        return;
      }

      let today = local_today();
      match self.fetch(today).await {
        Ok(inputs) => {
          // Cooperative cancellation point between the read and compute
          // steps: a superseded pass discards instead of publishing.
          if *self.cancel.borrow() {
            return;
          }
          let snapshot = self.compute(today, &inputs);
          tracing::debug!(
            days = snapshot.days.len(),
            streak = snapshot.streak,
            "publishing calendar snapshot"
          );
          self.publish(|state| {
            state.snapshot = Some(snapshot);
            state.error = None;
          });
        }
        Err(e) => {
          tracing::warn!(error = %e, "calendar aggregation pass failed");
          let message = e.to_string();
          self.publish(|state| state.error = Some(message));
        }
      }

      tokio::select! {
        changed = changes.changed() => {
          if changed.is_err() {
            return;
          }
        }
        cancelled = self.cancel.changed() => {
          if cancelled.is_err() || *self.cancel.borrow() {
            return;
          }
        }
      }
    }
  }

  /// Issue the reads concurrently; all must land before compute starts.
  async fn fetch(&self, today: NaiveDate) -> Result<PassInputs, StoreError> {
    let (records, summaries, missed) = tokio::join!(
      self.store.records_for_range(self.range_start, self.range_end),
      self.store.day_summaries_in_range(self.range_start, self.range_end),
      self.store.missed_days_in_range(self.range_start, self.range_end, today),
    );

    Ok(PassInputs {
      records: records?,
      summaries: summaries?,
      missed: missed?,
      config: self.store.recovery_config().await,
    })
  }

  fn compute(&self, today: NaiveDate, inputs: &PassInputs) -> CalendarSnapshot {
    let days = resolver::resolve_range(
      self.range_start,
      self.range_end,
      today,
      &inputs.records,
      &inputs.summaries,
      &inputs.missed,
      &inputs.config,
    );
    let streak = streak::current_streak(&days, today);

    CalendarSnapshot {
      range_start: self.range_start,
      range_end: self.range_end,
      days,
      streak,
    }
  }

  /// Publish through the shared state channel, gated on the generation
  /// counter so a superseded pass can never overwrite its successor.
  fn publish<F: FnOnce(&mut CalendarState)>(&self, update: F) {
    self.state.send_if_modified(|state| {
      if self.generation.load(Ordering::SeqCst) != self.my_generation {
        return false;
      }
      update(state);
      true
    });
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
