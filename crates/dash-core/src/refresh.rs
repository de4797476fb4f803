use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::config::RefreshConfig;
use crate::error::DashError;

/// A refresh fired by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTick {
    /// Sequence number, starting at 1.
    pub seq: u64,
    pub fired_at: DateTime<Utc>,
}

/// Cron-driven periodic refresh.
///
/// Sleeps until the next fire time, sends a [`RefreshTick`] through an
/// `mpsc` channel and repeats, until the shutdown signal flips to `true`
/// or the receiver is dropped.
pub struct RefreshScheduler {
    schedule: Schedule,
    next_run: DateTime<Utc>,
    run_count: u64,
}

impl RefreshScheduler {
    pub fn new(config: &RefreshConfig) -> Result<Self, DashError> {
        let schedule = parse_cron_expr(&config.cron)?;
        let next_run = schedule
            .upcoming(Utc)
            .next()
            .ok_or_else(|| DashError::Config(format!("Schedule '{}' never fires", config.cron)))?;
        Ok(Self {
            schedule,
            next_run,
            run_count: 0,
        })
    }

    /// Run until shutdown. Fires one tick immediately so consumers render
    /// without waiting a full period.
    pub async fn run(mut self, tx: mpsc::UnboundedSender<RefreshTick>, mut shutdown: watch::Receiver<bool>) {
        info!("Refresh scheduler started, next run at {}", self.next_run);

        if !self.fire(&tx, Utc::now()) {
            return;
        }

        loop {
            let sleep_duration = self.time_until_next_fire(Utc::now());
            debug!("Refresh scheduler sleeping for {:?}", sleep_duration);

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    if let Some(tick) = self.tick(Utc::now()) {
                        if tx.send(tick).is_err() {
                            debug!("Refresh channel closed, shutting down");
                            return;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Refresh scheduler stopped after {} run(s)", self.run_count);
                        return;
                    }
                }
            }
        }
    }

    fn fire(&mut self, tx: &mpsc::UnboundedSender<RefreshTick>, now: DateTime<Utc>) -> bool {
        self.run_count += 1;
        let tick = RefreshTick {
            seq: self.run_count,
            fired_at: now,
        };
        if tx.send(tick).is_err() {
            debug!("Refresh channel closed, shutting down");
            return false;
        }
        true
    }

    /// Fire if due at `now`, advancing the next run time.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<RefreshTick> {
        if now < self.next_run {
            return None;
        }
        self.run_count += 1;
        if let Some(next) = self.schedule.after(&now).next() {
            self.next_run = next;
        }
        Some(RefreshTick {
            seq: self.run_count,
            fired_at: now,
        })
    }

    /// Duration until the next refresh is due.
    pub fn time_until_next_fire(&self, now: DateTime<Utc>) -> std::time::Duration {
        if self.next_run > now {
            (self.next_run - now)
                .to_std()
                .unwrap_or(std::time::Duration::from_secs(30))
        } else {
            std::time::Duration::from_millis(0)
        }
    }

    pub fn next_run(&self) -> DateTime<Utc> {
        self.next_run
    }

    pub fn run_count(&self) -> u64 {
        self.run_count
    }
}

/// Parse a cron expression, normalizing 5-field standard cron to 7-field format.
///
/// The `cron` crate expects 7 fields: `sec min hour dom month dow year`.
/// Standard cron uses 5 fields: `min hour dom month dow`.
pub fn parse_cron_expr(expr: &str) -> Result<Schedule, DashError> {
    let normalized = normalize_cron_fields(expr);
    Schedule::from_str(&normalized)
        .map_err(|e| DashError::Config(format!("Invalid cron expression '{}': {}", expr, e)))
}

fn normalize_cron_fields(expr: &str) -> String {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    match fields.len() {
        5 => format!("0 {} *", expr),
        6 => format!("0 {}", expr),
        _ => expr.to_string(),
    }
}
