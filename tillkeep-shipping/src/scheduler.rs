//! Cron-driven reconciliation scheduler.

use crate::error::{ShippingError, ShippingResult};
use crate::reconcile::{PassKind, ReconciliationSummary, Reconciler};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tillkeep_config::CoreConfig;
use tillkeep_config::core_config::{DEFAULT_DAILY_SCHEDULE, DEFAULT_POLL_SCHEDULE};
use tillkeep_log::{debug, error, info, warn};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Parsed cron expression.
#[derive(Debug, Clone)]
pub struct CronExpression {
    schedule: Schedule,
    expression: String,
}

impl CronExpression {
    /// Parse a six-field (seconds first) cron expression.
    ///
    /// ```
    /// use tillkeep_shipping::CronExpression;
    ///
    /// let every_15_minutes = CronExpression::parse("0 */15 * * * *").unwrap();
    /// assert!(CronExpression::parse("whenever").is_err());
    /// ```
    pub fn parse(expression: &str) -> ShippingResult<Self> {
        let schedule = Schedule::from_str(expression)
            .map_err(|e| ShippingError::InvalidSchedule(format!("{}: {}", expression, e)))?;

        Ok(Self {
            schedule,
            expression: expression.to_string(),
        })
    }

    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_schedule: String,
    pub daily_schedule: String,
    /// How often the loop checks whether a pass is due
    pub tick_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_schedule: DEFAULT_POLL_SCHEDULE.to_string(),
            daily_schedule: DEFAULT_DAILY_SCHEDULE.to_string(),
            tick_interval: Duration::from_secs(1),
        }
    }
}

impl From<&CoreConfig> for SchedulerConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            poll_schedule: config.poll_schedule.clone(),
            daily_schedule: config.daily_schedule.clone(),
            ..Self::default()
        }
    }
}

/// One scheduled pass with its overlap guard.
struct Loop {
    kind: PassKind,
    expression: CronExpression,
    busy: Arc<AtomicBool>,
}

/// Shared between the scheduler handle and its tick loop.
struct Shared {
    reconciler: Arc<Reconciler>,
    loops: Vec<Loop>,
    last: RwLock<HashMap<PassKind, ReconciliationSummary>>,
}

impl Shared {
    fn find(&self, kind: PassKind) -> Option<&Loop> {
        self.loops.iter().find(|l| l.kind == kind)
    }

    /// Run `kind` unless a run of the same kind is in progress.
    async fn run(&self, kind: PassKind) -> ShippingResult<Option<ReconciliationSummary>> {
        let Some(entry) = self.find(kind) else {
            return Ok(None);
        };

        if entry
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("{:?} still running, skipping this trigger", kind);
            return Ok(None);
        }

        let result = match kind {
            PassKind::TrackingPoll => self.reconciler.run_tracking_poll().await,
            PassKind::DailyReconciliation => self.reconciler.run_daily_reconciliation().await,
        };
        entry.busy.store(false, Ordering::Release);

        let summary = result?;
        self.last.write().await.insert(kind, summary.clone());
        Ok(Some(summary))
    }
}

/// Triggers the tracking poll and the daily reconciliation on their cron
/// schedules.
///
/// Each pass kind runs at most once at a time: a trigger that fires while the
/// previous run of the same kind is still going is skipped.
pub struct ReconciliationScheduler {
    shared: Arc<Shared>,
    tick_interval: Duration,
    running: Arc<RwLock<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl ReconciliationScheduler {
    pub fn new(reconciler: Arc<Reconciler>, config: SchedulerConfig) -> ShippingResult<Self> {
        let loops = vec![
            Loop {
                kind: PassKind::TrackingPoll,
                expression: CronExpression::parse(&config.poll_schedule)?,
                busy: Arc::new(AtomicBool::new(false)),
            },
            Loop {
                kind: PassKind::DailyReconciliation,
                expression: CronExpression::parse(&config.daily_schedule)?,
                busy: Arc::new(AtomicBool::new(false)),
            },
        ];

        info!(
            fields: {
                "poll_schedule" => config.poll_schedule,
                "daily_schedule" => config.daily_schedule
            },
            "Initializing reconciliation scheduler"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                reconciler,
                loops,
                last: RwLock::new(HashMap::new()),
            }),
            tick_interval: config.tick_interval,
            running: Arc::new(RwLock::new(false)),
            handle: None,
        })
    }

    /// Start the tick loop.
    pub async fn start(&mut self) -> ShippingResult<()> {
        let mut running = self.running.write().await;
        if *running {
            warn!("Reconciliation scheduler already running");
            return Err(ShippingError::SchedulerAlreadyRunning);
        }
        *running = true;
        drop(running);

        info!("Reconciliation scheduler started");

        let shared = self.shared.clone();
        let running = self.running.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            // Wall time is read once; the loop then advances on the runtime clock.
            let origin = Utc::now();
            let started = Instant::now();
            let clock = || {
                origin + chrono::Duration::from_std(started.elapsed()).unwrap_or(chrono::Duration::zero())
            };

            let mut next_due: Vec<Option<DateTime<Utc>>> = shared
                .loops
                .iter()
                .map(|l| l.expression.next_after(origin))
                .collect();

            while *running.read().await {
                let now = clock();

                for (i, entry) in shared.loops.iter().enumerate() {
                    let Some(due) = next_due[i] else { continue };
                    if now < due {
                        continue;
                    }
                    next_due[i] = entry.expression.next_after(now);

                    let task = shared.clone();
                    let kind = entry.kind;
                    tokio::spawn(async move {
                        if let Err(e) = task.run(kind).await {
                            error!("{:?} failed: {}", kind, e);
                        }
                    });
                }

                tokio::time::sleep(tick_interval).await;
            }
        });

        self.handle = Some(handle);
        Ok(())
    }

    /// Stop triggering passes. A pass already in flight runs to completion.
    pub async fn stop(&mut self) -> ShippingResult<()> {
        let mut running = self.running.write().await;
        if !*running {
            return Err(ShippingError::SchedulerNotRunning);
        }
        *running = false;
        drop(running);

        if let Some(handle) = self.handle.take() {
            handle.abort();
        }

        info!("Reconciliation scheduler stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Run a pass immediately. `Ok(None)` if one of that kind is already in
    /// progress.
    pub async fn run_now(&self, kind: PassKind) -> ShippingResult<Option<ReconciliationSummary>> {
        self.shared.run(kind).await
    }

    /// Summary of the most recent completed pass of `kind`.
    pub async fn last_summary(&self, kind: PassKind) -> Option<ReconciliationSummary> {
        self.shared.last.read().await.get(&kind).cloned()
    }

    /// Next trigger time of `kind` after now.
    pub fn next_run(&self, kind: PassKind) -> Option<DateTime<Utc>> {
        self.shared
            .find(kind)
            .and_then(|l| l.expression.next_after(Utc::now()))
    }
}
