//! Daily sweep: eager expiry of lapsed subscriptions and renewal reminders.
//!
//! [`run_once`] is the unit of work. [`SweepScheduler`] runs it at the next
//! local midnight and every 24 hours after that on a tokio task.

use super::{
    errors::SubscriptionResult,
    manager::SubscriptionManager,
    models::{RENEWAL_WINDOW_DAYS, ReminderCandidate, days_until},
};
use crate::{
    clock::Clock,
    identity::PrincipalRef,
    mail::{Email, Mailer},
};
use chrono::{DateTime, Days, Duration, FixedOffset, Local, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

/// Days before expiry on which a reminder mail goes out
const REMINDER_DAYS: [i64; 2] = [RENEWAL_WINDOW_DAYS, 1];

const SWEEP_PERIOD: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: Vec<PrincipalRef>,
    /// Principals whose expiry failed, with the error text
    pub failures: Vec<(PrincipalRef, String)>,
    /// Active principals expiring inside the renewal window
    pub reminders: Vec<ReminderCandidate>,
    /// Reminder mails actually sent
    pub reminders_sent: usize,
}

/// Receives the report of every scheduled sweep
pub trait SweepObserver: Send + Sync {
    fn on_sweep(&self, report: &SweepReport);

    fn on_sweep_error(&self, error: &str) {
        log::error!("Sweep failed: {}", error);
    }
}

/// Observer that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl SweepObserver for LoggingObserver {
    fn on_sweep(&self, report: &SweepReport) {
        log::info!(
            "Sweep finished: {} expired, {} failed, {} reminders due, {} sent",
            report.expired.len(),
            report.failures.len(),
            report.reminders.len(),
            report.reminders_sent
        );
    }
}

/// Expire every lapsed principal and mail renewal reminders.
///
/// A failure on one principal is recorded in the report and does not stop
/// the sweep. Only failing to list candidates aborts it.
pub async fn run_once(
    subscriptions: &SubscriptionManager,
    mailer: &dyn Mailer,
) -> SubscriptionResult<SweepReport> {
    let mut report = SweepReport::default();

    for principal in subscriptions.lapsed().await? {
        match subscriptions.expire(&principal).await {
            Ok(_) => report.expired.push(principal),
            Err(e) => {
                log::error!("Failed to expire {}: {}", principal, e);
                report.failures.push((principal, e.to_string()));
            }
        }
    }

    let now = subscriptions.now();
    report.reminders = subscriptions
        .expiring_within(Duration::days(RENEWAL_WINDOW_DAYS))
        .await?;

    for candidate in &report.reminders {
        let days = days_until(candidate.expires_at, now);
        let Some(email) = candidate.email.as_deref() else {
            continue;
        };
        if !REMINDER_DAYS.contains(&days) {
            continue;
        }

        let message = Email::new(
            email,
            "Your QuizBanner Premium is about to expire",
            format!(
                "Your premium access ends on {}. Renew to keep your full question bank.",
                candidate.expires_at.format("%Y-%m-%d")
            ),
        );
        match mailer.send(message).await {
            Ok(()) => report.reminders_sent += 1,
            Err(e) => log::warn!("Failed to send renewal reminder to {}: {}", candidate.principal, e),
        }
    }

    Ok(report)
}

/// First midnight strictly after `now` in the given offset
pub fn next_midnight<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let local = now.with_timezone(tz).date_naive();
    let tomorrow = local.checked_add_days(Days::new(1)).unwrap_or(local);
    tz.from_local_datetime(&tomorrow.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| now + Duration::days(1))
}

/// Runs the sweep daily at local midnight
pub struct SweepScheduler {
    subscriptions: SubscriptionManager,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn SweepObserver>,
    offset: FixedOffset,
}

impl SweepScheduler {
    pub fn new(
        subscriptions: SubscriptionManager,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            subscriptions,
            mailer,
            clock,
            observer: Arc::new(LoggingObserver),
            offset: *Local::now().offset(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SweepObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Use a fixed UTC offset instead of the host's local one
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Time until the first run
    pub fn initial_delay(&self) -> std::time::Duration {
        let now = self.clock.now();
        (next_midnight(now, &self.offset) - now)
            .to_std()
            .unwrap_or_default()
    }

    /// Spawn the sweep loop on the current runtime
    pub fn spawn(self) -> SweepHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let delay = self.initial_delay();
        log::info!("Daily sweep scheduled in {}s", delay.as_secs());

        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + delay, SWEEP_PERIOD);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match run_once(&self.subscriptions, self.mailer.as_ref()).await {
                            Ok(report) => self.observer.on_sweep(&report),
                            Err(e) => self.observer.on_sweep_error(&e.to_string()),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            log::info!("Daily sweep stopped");
        });

        SweepHandle { shutdown_tx, join }
    }
}

/// Stops a spawned [`SweepScheduler`]
pub struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweepHandle {
    /// Signal the loop and wait for it to finish its current run
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            log::error!("Sweep task ended abnormally: {}", e);
        }
    }
}
