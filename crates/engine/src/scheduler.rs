use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local};
use cron::Schedule;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use common::{Error, OverlapPolicy, Result};

/// Work performed on every tick of a job.
pub type JobFn = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Parse a cron expression.
///
/// Six fields (with seconds) are used as-is. The classic five-field form gets
/// a `0` seconds field, and its numeric day-of-week values (0 or 7 = Sunday)
/// are rewritten as day names.
pub fn parse_cron(expr: &str) -> Result<Schedule> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    let normalized = match fields.len() {
        5 => {
            let dow = unix_day_of_week(fields[4])?;
            format!("0 {} {} {} {} {}", fields[0], fields[1], fields[2], fields[3], dow)
        }
        6 | 7 => fields.join(" "),
        n => {
            return Err(Error::Config(format!(
                "cron expression '{expr}' has {n} fields, expected 5 or 6"
            )))
        }
    };
    Schedule::from_str(&normalized)
        .map_err(|e| Error::Config(format!("invalid cron expression '{expr}': {e}")))
}

const DAY_NAMES: [&str; 8] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

fn unix_day_of_week(field: &str) -> Result<String> {
    let day = |token: &str| -> Result<String> {
        match token.parse::<usize>() {
            Ok(n) if n < DAY_NAMES.len() => Ok(DAY_NAMES[n].to_string()),
            Ok(n) => Err(Error::Config(format!("day of week {n} out of range"))),
            Err(_) => Ok(token.to_string()),
        }
    };

    field
        .split(',')
        .map(|part| {
            let (range, step) = match part.split_once('/') {
                Some((r, s)) => (r, Some(s)),
                None => (part, None),
            };
            let range = match range.split_once('-') {
                Some((a, b)) => format!("{}-{}", day(a)?, day(b)?),
                None => day(range)?,
            };
            Ok(match step {
                Some(s) => format!("{range}/{s}"),
                None => range,
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(|parts| parts.join(","))
}

struct Job {
    cron: String,
    task: JoinHandle<()>,
}

/// Cron-driven job runner. Each job has its own timer task; one job firing
/// never delays another. Handler errors and panics are logged and the job
/// keeps its schedule.
pub struct Scheduler {
    jobs: Mutex<HashMap<String, Job>>,
    overlap: OverlapPolicy,
}

impl Scheduler {
    pub fn new(overlap: OverlapPolicy) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            overlap,
        }
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, Job>> {
        match self.jobs.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register `handler` under `key`. An existing job with the same key is replaced.
    /// Must be called from within a Tokio runtime. Jobs are stopped through
    /// [`Scheduler::cancel`] so the registry never holds a dead timer.
    pub fn schedule(&self, key: &str, cron_expr: &str, handler: JobFn) -> Result<()> {
        let schedule = parse_cron(cron_expr)?;
        let task = tokio::spawn(run_job(
            key.to_string(),
            schedule,
            handler,
            self.overlap,
        ));
        let previous = self.jobs().insert(
            key.to_string(),
            Job {
                cron: cron_expr.to_string(),
                task,
            },
        );
        if let Some(old) = previous {
            warn!(job = %key, "Job re-registered; previous timer cancelled");
            old.task.abort();
        }
        info!(job = %key, cron = %cron_expr, "Job scheduled");
        Ok(())
    }

    /// Returns whether a job was registered under `key`.
    pub fn cancel(&self, key: &str) -> bool {
        match self.jobs().remove(key) {
            Some(job) => {
                job.task.abort();
                info!(job = %key, "Job cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel every job and return how many there were.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<(String, Job)> = self.jobs().drain().collect();
        for (_, job) in &drained {
            job.task.abort();
        }
        info!(count = drained.len(), "All jobs cancelled");
        drained.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.jobs().contains_key(key)
    }

    pub fn job_count(&self) -> usize {
        self.jobs().len()
    }

    /// `(key, cron)` pairs, sorted by key.
    pub fn jobs_snapshot(&self) -> Vec<(String, String)> {
        let mut out: Vec<_> = self
            .jobs()
            .iter()
            .map(|(k, j)| (k.clone(), j.cron.clone()))
            .collect();
        out.sort();
        out
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for job in self.jobs().values() {
            job.task.abort();
        }
    }
}

async fn run_job(key: String, schedule: Schedule, handler: JobFn, overlap: OverlapPolicy) {
    let running = Arc::new(AtomicBool::new(false));
    let mut last_fire: Option<DateTime<Local>> = None;

    loop {
        let now = Local::now();
        let from = match last_fire {
            Some(last) if last > now => last,
            _ => now,
        };
        let Some(next) = schedule.after(&from).next() else {
            warn!(job = %key, "Cron schedule has no further occurrences; job ends");
            return;
        };
        let wait = (next - Local::now()).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;
        last_fire = Some(next);

        if overlap == OverlapPolicy::Skip && running.swap(true, Ordering::SeqCst) {
            warn!(job = %key, "Previous run still active, skipping tick");
            continue;
        }
        if overlap == OverlapPolicy::Allow {
            running.store(true, Ordering::SeqCst);
        }

        debug!(job = %key, "Tick");
        // a handler may panic while building its future, before the spawned guard
        let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| handler())) {
            Ok(fut) => fut,
            Err(_) => {
                error!(job = %key, "Job handler panicked before starting");
                running.store(false, Ordering::SeqCst);
                continue;
            }
        };
        let running = running.clone();
        let job = key.clone();
        tokio::spawn(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(job = %job, error = %e, "Job run failed"),
                Err(_) => error!(job = %job, "Job run panicked"),
            }
            running.store(false, Ordering::SeqCst);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting(counter: Arc<AtomicUsize>, result: fn() -> Result<()>) -> JobFn {
        Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                result()
            }
            .boxed()
        })
    }

    #[test]
    fn five_field_cron_gets_seconds_and_day_names() {
        assert!(parse_cron("30 15 * * 1-5").is_ok());
        assert_eq!(unix_day_of_week("1-5").unwrap(), "Mon-Fri");
        assert_eq!(unix_day_of_week("2-6").unwrap(), "Tue-Sat");
        assert_eq!(unix_day_of_week("0,6").unwrap(), "Sun,Sat");
        assert_eq!(unix_day_of_week("*").unwrap(), "*");
        assert_eq!(unix_day_of_week("*/2").unwrap(), "*/2");
    }

    #[test]
    fn malformed_cron_is_config_error() {
        assert!(matches!(parse_cron("every minute"), Err(Error::Config(_))));
        assert!(matches!(parse_cron("* * *"), Err(Error::Config(_))));
        assert!(matches!(parse_cron("0 0 5 * * Funday"), Err(Error::Config(_))));
    }

    #[test]
    fn market_close_schedule_fires_on_weekdays_only() {
        use chrono::{Datelike, Weekday};
        let schedule = parse_cron("30 15 * * 1-5").unwrap();
        for at in schedule.upcoming(Local).take(10) {
            assert!(!matches!(at.weekday(), Weekday::Sat | Weekday::Sun));
        }
    }

    #[tokio::test]
    async fn failing_handler_keeps_firing() {
        let scheduler = Scheduler::new(OverlapPolicy::Skip);
        let count = Arc::new(AtomicUsize::new(0));
        scheduler
            .schedule(
                "flaky",
                "* * * * * *",
                counting(count.clone(), || Err(Error::Other("boom".into()))),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2_600)).await;
        assert!(count.load(Ordering::SeqCst) >= 2, "job stopped after an error");
        assert_eq!(scheduler.job_count(), 1);
    }

    #[tokio::test]
    async fn skip_policy_drops_overlapping_ticks() {
        let scheduler = Scheduler::new(OverlapPolicy::Skip);
        let starts = Arc::new(AtomicUsize::new(0));
        let s = starts.clone();
        let slow: JobFn = Arc::new(move || {
            let s = s.clone();
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            }
            .boxed()
        });
        scheduler.schedule("slow", "* * * * * *", slow).unwrap();

        tokio::time::sleep(Duration::from_millis(2_600)).await;
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn allow_policy_runs_overlapping_ticks() {
        let scheduler = Scheduler::new(OverlapPolicy::Allow);
        let starts = Arc::new(AtomicUsize::new(0));
        let s = starts.clone();
        let slow: JobFn = Arc::new(move || {
            let s = s.clone();
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            }
            .boxed()
        });
        scheduler.schedule("slow", "* * * * * *", slow).unwrap();

        tokio::time::sleep(Duration::from_millis(2_600)).await;
        assert!(starts.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn cancel_all_stops_future_ticks() {
        let scheduler = Scheduler::new(OverlapPolicy::Skip);
        let count = Arc::new(AtomicUsize::new(0));
        scheduler
            .schedule("a", "* * * * * *", counting(count.clone(), || Ok(())))
            .unwrap();
        scheduler
            .schedule("b", "* * * * * *", counting(count.clone(), || Ok(())))
            .unwrap();
        assert_eq!(scheduler.cancel_all(), 2);
        assert_eq!(scheduler.job_count(), 0);

        let before = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(count.load(Ordering::SeqCst), before);
        assert!(!scheduler.cancel("a"));
    }

    #[tokio::test]
    async fn handler_panicking_before_its_future_keeps_firing() {
        let scheduler = Scheduler::new(OverlapPolicy::Skip);
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let exploding: JobFn = Arc::new(move || -> BoxFuture<'static, Result<()>> {
            c.fetch_add(1, Ordering::SeqCst);
            panic!("handler blew up");
        });
        scheduler.schedule("exploding", "* * * * * *", exploding).unwrap();

        tokio::time::sleep(Duration::from_millis(2_600)).await;
        assert!(count.load(Ordering::SeqCst) >= 2, "job stopped after a panic");
        assert_eq!(scheduler.job_count(), 1);
    }

    #[tokio::test]
    async fn cancel_removes_job_and_key_can_be_reused() {
        let scheduler = Scheduler::new(OverlapPolicy::Skip);
        let count = Arc::new(AtomicUsize::new(0));
        scheduler
            .schedule("BTC/USDT", "0 0 * * * *", counting(count.clone(), || Ok(())))
            .unwrap();
        assert!(scheduler.contains("BTC/USDT"));

        assert!(scheduler.cancel("BTC/USDT"));
        assert!(!scheduler.contains("BTC/USDT"));
        assert_eq!(scheduler.job_count(), 0);

        scheduler
            .schedule("BTC/USDT", "30 15 * * 1-5", counting(count, || Ok(())))
            .unwrap();
        assert_eq!(
            scheduler.jobs_snapshot(),
            vec![("BTC/USDT".to_string(), "30 15 * * 1-5".to_string())]
        );
    }
}
