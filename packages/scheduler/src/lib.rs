#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Scheduler — §4.1.
//!
//! Holds the in-memory per-source cadence state (`SourceRunState`) and
//! drives one poll cycle: due, active, non-audio sources are dispatched
//! onto a bounded worker pool via [`futures::stream::buffer_unordered`];
//! each source's [`CycleHandler::process_source`] result feeds the
//! per-source backoff and, past [`MAX_CONSECUTIVE_FAILURES`],
//! deactivation. Audio sources are excluded from `run_cycle` entirely —
//! they run as dedicated long-lived tasks started by
//! [`spawn_audio_worker`] instead of being polled.

pub mod ratelimit;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use log::{error, info, warn};
use nightwatch_source_models::{Source, SourceType};
use switchy_database::Database;
use thiserror::Error;
use uuid::Uuid;

/// Default poll interval for a source with no `pollIntervalS` configured.
pub const DEFAULT_POLL_INTERVAL_S: i64 = 900;

/// Backoff floor and ceiling, in minutes, per §4.1.
pub const MIN_BACKOFF_MINUTES: i64 = 1;
pub const MAX_BACKOFF_MINUTES: i64 = 64;

/// Consecutive failures after which a source is deactivated.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// Default bounded-concurrency worker count for `run_cycle`.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Errors from the scheduler itself (as opposed to a handler's
/// per-source processing error, which `run_cycle` records but does not
/// propagate).
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("database error: {0}")]
    Database(#[from] nightwatch_database::DbError),
}

/// A handler that knows how to run one source through fetch, extract,
/// geocode, and link for a single cycle. Implemented by the binary that
/// wires together `nightwatch_source`, `nightwatch_extraction`,
/// `nightwatch_geocoding`, and `nightwatch_dedup`; this crate only
/// knows about cadence and backoff.
#[async_trait]
pub trait CycleHandler: Send + Sync {
    /// Processes one source's new observations and returns the count
    /// ingested. Any failure anywhere in the fetch/extract/geocode/link
    /// chain for this source should surface as `Err` — partial progress
    /// within a source is the handler's own business, not the
    /// scheduler's.
    async fn process_source(&self, source: &Source) -> Result<usize, Box<dyn std::error::Error + Send + Sync>>;
}

/// In-memory cadence state for one source.
#[derive(Debug, Clone, Copy)]
struct SourceRunState {
    next_fire_at: DateTime<Utc>,
    consecutive_failures: u32,
    backoff_minutes: i64,
}

impl SourceRunState {
    fn due_now() -> Self {
        Self { next_fire_at: Utc::now(), consecutive_failures: 0, backoff_minutes: MIN_BACKOFF_MINUTES }
    }
}

/// Outcome of a single `process_source` dispatch, carried back to the
/// cycle loop for bookkeeping.
struct Dispatched<'a> {
    source: &'a Source,
    result: Result<usize, Box<dyn std::error::Error + Send + Sync>>,
}

/// Tallies from one `run_cycle` call, for CLI/log reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub sources_polled: usize,
    pub sources_succeeded: usize,
    pub sources_failed: usize,
    pub observations_ingested: usize,
    pub sources_deactivated: usize,
}

/// Per-source cadence tracker driving `run_cycle`.
#[derive(Debug, Default)]
pub struct Scheduler {
    states: BTreeMap<Uuid, SourceRunState>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn is_due(&self, source_id: Uuid) -> bool {
        self.states.get(&source_id).is_none_or(|s| s.next_fire_at <= Utc::now())
    }

    fn record_success(&mut self, source_id: Uuid, poll_interval_s: i64) {
        let state = SourceRunState {
            next_fire_at: Utc::now() + chrono::Duration::seconds(poll_interval_s),
            consecutive_failures: 0,
            backoff_minutes: MIN_BACKOFF_MINUTES,
        };
        self.states.insert(source_id, state);
    }

    /// Records a failure, advances backoff, and returns the new
    /// consecutive-failure count.
    fn record_failure(&mut self, source_id: Uuid) -> u32 {
        let prev = self.states.get(&source_id).copied().unwrap_or_else(SourceRunState::due_now);
        let backoff_minutes = (prev.backoff_minutes * 2).min(MAX_BACKOFF_MINUTES).max(MIN_BACKOFF_MINUTES);
        let consecutive_failures = prev.consecutive_failures + 1;
        self.states.insert(
            source_id,
            SourceRunState {
                next_fire_at: Utc::now() + chrono::Duration::minutes(backoff_minutes),
                consecutive_failures,
                backoff_minutes,
            },
        );
        consecutive_failures
    }

    /// Runs one poll cycle: selects due, active, non-audio sources and
    /// dispatches each through `handler` on a worker pool bounded to
    /// `concurrency`. Failures update per-source backoff; a source that
    /// fails `MAX_CONSECUTIVE_FAILURES` times in a row is deactivated in
    /// the datastore so it drops out of future `list_active_sources`
    /// calls.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] only if a datastore bookkeeping call
    /// (touch-fetched, deactivate) fails — a handler's own per-source
    /// error is recorded in the returned [`CycleSummary`], not
    /// propagated.
    pub async fn run_cycle(
        &mut self,
        db: &dyn Database,
        sources: &[Source],
        handler: &dyn CycleHandler,
        concurrency: usize,
    ) -> Result<CycleSummary, SchedulerError> {
        let due: Vec<&Source> = sources
            .iter()
            .filter(|s| s.is_active && s.source_type != SourceType::Audio && self.is_due(s.id))
            .collect();

        let dispatched: Vec<Dispatched<'_>> = stream::iter(due)
            .map(|source| async move { Dispatched { source, result: handler.process_source(source).await } })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut summary = CycleSummary { sources_polled: dispatched.len(), ..CycleSummary::default() };

        for dispatched in dispatched {
            let source = dispatched.source;
            let poll_interval_s = source.config.poll_interval_s.map_or(DEFAULT_POLL_INTERVAL_S, |s| s as i64);

            match dispatched.result {
                Ok(count) => {
                    self.record_success(source.id, poll_interval_s);
                    nightwatch_database::queries::touch_source_fetched(db, source.id).await?;
                    summary.sources_succeeded += 1;
                    summary.observations_ingested += count;
                    info!("source={} fetched {count} observation(s)", source.name);
                }
                Err(err) => {
                    let failures = self.record_failure(source.id);
                    summary.sources_failed += 1;
                    warn!("source={} failed ({failures}/{MAX_CONSECUTIVE_FAILURES} consecutive): {err}", source.name);

                    if failures >= MAX_CONSECUTIVE_FAILURES {
                        nightwatch_database::queries::deactivate_source(db, source.id).await?;
                        summary.sources_deactivated += 1;
                        error!(
                            "source={} deactivated after {failures} consecutive failures",
                            source.name
                        );
                    }
                }
            }
        }

        Ok(summary)
    }
}

/// Spawns a dedicated long-lived task for one audio source, restarted
/// with a fixed delay on disconnect. Audio sources stream continuously
/// rather than being polled on an interval, so they never participate
/// in `run_cycle`.
///
/// `run_once` is expected to block for the lifetime of one connection
/// (e.g. one scanner-feed stream) and return when the connection drops,
/// whether cleanly or due to an error.
pub fn spawn_audio_worker<F, Fut>(source: Source, restart_delay: Duration, mut run_once: F) -> tokio::task::JoinHandle<()>
where
    F: FnMut(Source) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send,
{
    tokio::spawn(async move {
        loop {
            if let Err(err) = run_once(source.clone()).await {
                error!("audio source={} disconnected: {err}", source.name);
            }
            tokio::time::sleep(restart_delay).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{Scheduler, MAX_BACKOFF_MINUTES, MAX_CONSECUTIVE_FAILURES, MIN_BACKOFF_MINUTES};
    use uuid::Uuid;

    /// `run_cycle` touches the datastore for bookkeeping (touch-fetched,
    /// deactivate), so these tests exercise the pure cadence bookkeeping
    /// directly — the same split `nightwatch_workflow` and
    /// `nightwatch_dedup` use between a testable pure core and a thin
    /// datastore-calling wrapper.
    #[test]
    fn an_unseen_source_is_due_immediately() {
        let scheduler = Scheduler::new();
        assert!(scheduler.is_due(Uuid::new_v4()));
    }

    #[test]
    fn a_success_pushes_next_fire_at_out_by_the_poll_interval() {
        let mut scheduler = Scheduler::new();
        let id = Uuid::new_v4();
        scheduler.record_success(id, 900);
        assert!(!scheduler.is_due(id), "source polled moments ago with a 900s interval should not be due yet");
    }

    #[test]
    fn a_failure_resets_to_due_after_its_backoff_elapses_conceptually() {
        let mut scheduler = Scheduler::new();
        let id = Uuid::new_v4();
        let failures = scheduler.record_failure(id);
        assert_eq!(failures, 1);
        assert!(!scheduler.is_due(id), "immediately after a failure, next_fire_at is in the future");
    }

    #[test]
    fn backoff_doubles_and_caps_at_the_ceiling() {
        let mut scheduler = Scheduler::new();
        let id = Uuid::new_v4();
        let mut last_backoff = 0;
        for attempt in 1..=10 {
            scheduler.record_failure(id);
            let state = scheduler.states.get(&id).copied().unwrap();
            assert!(state.backoff_minutes >= MIN_BACKOFF_MINUTES);
            assert!(state.backoff_minutes <= MAX_BACKOFF_MINUTES);
            if attempt > 1 {
                assert!(state.backoff_minutes >= last_backoff, "backoff should never shrink between failures");
            }
            last_backoff = state.backoff_minutes;
        }
        assert_eq!(last_backoff, MAX_BACKOFF_MINUTES, "backoff should have saturated at the ceiling by 10 failures");
    }

    #[test]
    fn a_success_resets_the_failure_count_and_backoff() {
        let mut scheduler = Scheduler::new();
        let id = Uuid::new_v4();
        for _ in 0..5 {
            scheduler.record_failure(id);
        }
        scheduler.record_success(id, 900);
        let state = scheduler.states.get(&id).copied().unwrap();
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.backoff_minutes, MIN_BACKOFF_MINUTES);
    }

    #[test]
    fn reaching_max_consecutive_failures_is_detectable_by_the_caller() {
        let mut scheduler = Scheduler::new();
        let id = Uuid::new_v4();
        let mut last = 0;
        for _ in 0..MAX_CONSECUTIVE_FAILURES {
            last = scheduler.record_failure(id);
        }
        assert_eq!(last, MAX_CONSECUTIVE_FAILURES);
    }
}
