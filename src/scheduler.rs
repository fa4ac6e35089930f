//! Cron-driven synchronization scheduling
//!
//! The scheduler runs one pass as soon as it starts and then one per cron tick.
//! Passes run on their own tasks so a slow feed never delays tick bookkeeping; a tick
//! that fires while the previous pass is still running is skipped.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use torrent_mirror::scheduler::{SyncScheduler, parse_schedule};
//! use torrent_mirror::store::Store;
//! use torrent_mirror::synchronizer::Synchronizer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::open("/torrent_files").await?;
//! let synchronizer = Arc::new(Synchronizer::new(reqwest::Client::new(), store, 10 << 20));
//! let scheduler = SyncScheduler::new(
//!     parse_schedule("*/15 * * * *")?,
//!     synchronizer,
//!     "https://example.com/rss".to_string(),
//!     CancellationToken::new(),
//! );
//!
//! tokio::spawn(scheduler.run());
//! # Ok(())
//! # }
//! ```

use crate::config::ENV_CRONTAB;
use crate::error::{Error, Result};
use crate::synchronizer::Synchronizer;
use chrono::{DateTime, Local};
use cron::Schedule;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Parse a cron expression
///
/// Classic five-field expressions (`min hour dom month dow`) are accepted and run at
/// second zero. Their numeric day-of-week follows crontab (`0` and `7` are Sunday).
/// Six and seven field expressions start with a seconds field and use the `cron`
/// crate's own numbering (Sunday is `1`). Shorthands such as `@hourly` are passed
/// through.
pub fn parse_schedule(expression: &str) -> Result<Schedule> {
    let expression = expression.trim();
    let invalid = |reason: String| {
        Error::config(
            format!("invalid cron expression {:?}: {}", expression, reason),
            ENV_CRONTAB,
        )
    };

    let fields: Vec<&str> = expression.split_whitespace().collect();
    let normalized = if let &[minute, hour, day, month, weekday] = fields.as_slice() {
        let weekday = crontab_day_of_week(weekday).map_err(invalid)?;
        format!("0 {} {} {} {} {}", minute, hour, day, month, weekday)
    } else {
        expression.to_string()
    };

    Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))
}

/// Rewrite a crontab day-of-week field (Sunday = 0 or 7) into `cron` crate numbering
/// (Sunday = 1)
///
/// Numeric elements are expanded into an explicit day list. Named days, `*` and `?`
/// mean the same in both dialects and are kept as written.
fn crontab_day_of_week(field: &str) -> std::result::Result<String, String> {
    let mut elements = Vec::new();
    let mut days = BTreeSet::new();
    for element in field.split(',') {
        if element == "*"
            || element == "?"
            || element.chars().any(|c| c.is_ascii_alphabetic())
        {
            elements.push(element.to_string());
            continue;
        }

        let (range, step) = match element.split_once('/') {
            Some((range, step)) => (range, Some(parse_day_number(step, "step")?)),
            None => (element, None),
        };
        let (first, last) = match (range, range.split_once('-')) {
            ("*", _) => (0, 6),
            (_, Some((first, last))) => {
                (parse_day_number(first, "day")?, parse_day_number(last, "day")?)
            }
            // `N/step` runs from N to the end of the week
            (_, None) if step.is_some() => (parse_day_number(range, "day")?, 6),
            (_, None) => {
                let day = parse_day_number(range, "day")?;
                (day, day)
            }
        };

        let step = step.unwrap_or(1);
        if first > 7 || last > 7 || first > last || step == 0 {
            return Err(format!("day-of-week {:?} out of range", element));
        }

        days.extend((first..=last).step_by(step as usize).map(|day| day % 7 + 1));
    }
    elements.extend(days.into_iter().map(|day| day.to_string()));
    Ok(elements.join(","))
}

fn parse_day_number(value: &str, what: &str) -> std::result::Result<u32, String> {
    value
        .parse()
        .map_err(|_| format!("invalid day-of-week {} {:?}", what, value))
}

/// Next time `schedule` fires strictly after `after`
pub fn next_fire_after(schedule: &Schedule, after: &DateTime<Local>) -> Option<DateTime<Local>> {
    schedule.after(after).next()
}

/// Triggers synchronization passes on a cron cadence
pub struct SyncScheduler {
    schedule: Schedule,
    synchronizer: Arc<Synchronizer>,
    feed_url: String,
    shutdown: CancellationToken,
}

impl SyncScheduler {
    /// Creates a new scheduler
    ///
    /// # Parameters
    /// - `schedule`: cadence of passes after the initial one
    /// - `synchronizer`: runs the passes
    /// - `feed_url`: feed every pass mirrors
    /// - `shutdown`: cancelling it stops the scheduler loop
    pub fn new(
        schedule: Schedule,
        synchronizer: Arc<Synchronizer>,
        feed_url: String,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            schedule,
            synchronizer,
            feed_url,
            shutdown,
        }
    }

    /// Run until the shutdown token is cancelled
    ///
    /// Passes already in flight are not interrupted.
    pub async fn run(self) {
        info!(url = %self.feed_url, "Sync scheduler started");
        self.trigger();

        let mut cursor = Local::now();
        loop {
            let Some(next) = next_fire_after(&self.schedule, &cursor) else {
                warn!("Cron expression has no upcoming run, scheduler idle");
                self.shutdown.cancelled().await;
                break;
            };

            let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);
            debug!(next = %next, "Waiting for next sync tick");

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = sleep(wait) => {}
            }

            self.trigger();
            // A late wake-up must not replay the ticks it slept through
            cursor = next.max(Local::now());
        }

        info!("Sync scheduler stopped");
    }

    fn trigger(&self) {
        let synchronizer = self.synchronizer.clone();
        let feed_url = self.feed_url.clone();

        tokio::spawn(async move {
            match synchronizer.try_run(&feed_url).await {
                Ok(Some(_)) => {}
                Ok(None) => info!("Previous synchronization pass still running, skipping tick"),
                Err(e) => error!(url = %feed_url, error = %e, "Synchronization pass failed"),
            }
        });
    }
}
