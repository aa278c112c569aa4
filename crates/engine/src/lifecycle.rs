use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::FutureExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use common::{
    BotState, BotStatus, Error, Instrument, Market, OverlapPolicy, Result, ScheduledJob,
};

use crate::pipeline::{WorkflowOutcome, WorkflowPipeline};
use crate::scheduler::{parse_cron, JobFn, Scheduler};
use crate::watchlist::{market_job_key, JobGrouping, ScheduleConfig};

type Registry = Arc<RwLock<Vec<Instrument>>>;

/// Cloneable handle passed to the operator surfaces (Telegram, API).
///
/// Owns the instrument registry and the scheduler. Lifecycle transitions and
/// registry changes are serialized; status reads never wait on a transition.
#[derive(Clone)]
pub struct BotController {
    inner: Arc<Inner>,
}

struct Inner {
    pipeline: Arc<WorkflowPipeline>,
    scheduler: Scheduler,
    schedule: ScheduleConfig,
    instruments: Registry,
    state: RwLock<BotState>,
    transition: Mutex<()>,
}

impl BotController {
    pub fn new(
        pipeline: Arc<WorkflowPipeline>,
        schedule: ScheduleConfig,
        overlap: OverlapPolicy,
        instruments: Vec<Instrument>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                pipeline,
                scheduler: Scheduler::new(overlap),
                schedule,
                instruments: Arc::new(RwLock::new(instruments)),
                state: RwLock::new(BotState::Stopped),
                transition: Mutex::new(()),
            }),
        }
    }

    pub async fn state(&self) -> BotState {
        *self.inner.state.read().await
    }

    async fn set_state(&self, state: BotState) {
        *self.inner.state.write().await = state;
        info!(state = %state, "Bot state changed");
    }

    /// Warm up every instrument once, then register the recurring jobs.
    ///
    /// A bad schedule aborts the start and leaves the bot stopped.
    pub async fn start(&self) -> Result<()> {
        let _guard = self.inner.transition.lock().await;
        if self.state().await == BotState::Running {
            warn!("Start requested but bot is already running");
            return Ok(());
        }
        self.set_state(BotState::Starting).await;

        let instruments = self.inner.instruments.read().await.clone();
        let plan = match self.plan_jobs(&instruments) {
            Ok(plan) => plan,
            Err(e) => {
                error!(error = %e, "Invalid job schedule, start aborted");
                self.set_state(BotState::Stopped).await;
                return Err(e);
            }
        };

        info!(count = instruments.len(), "Running warm-up pass");
        let outcomes = join_all(instruments.iter().map(|i| self.inner.pipeline.run(i))).await;
        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        if failed > 0 {
            warn!(failed, total = outcomes.len(), "Warm-up finished with failed runs");
        }

        for (key, cron, handler) in plan {
            if let Err(e) = self.inner.scheduler.schedule(&key, &cron, handler) {
                error!(job = %key, error = %e, "Failed to register job, start aborted");
                self.inner.scheduler.cancel_all();
                self.set_state(BotState::Stopped).await;
                return Err(e);
            }
        }

        self.set_state(BotState::Running).await;
        let jobs = self.inner.scheduler.job_count();
        info!(instruments = instruments.len(), jobs, "Bot started");
        self.inner
            .pipeline
            .fanout()
            .notify_system(
                "Bot started",
                &format!(
                    "Monitoring {} instrument(s) with {} scheduled job(s).",
                    instruments.len(),
                    jobs
                ),
            )
            .await;
        Ok(())
    }

    /// Cancel every job. Runs already in flight finish on their own.
    pub async fn stop(&self) {
        let _guard = self.inner.transition.lock().await;
        if self.state().await == BotState::Stopped {
            warn!("Stop requested but bot is already stopped");
            return;
        }
        self.set_state(BotState::Stopping).await;
        let cancelled = self.inner.scheduler.cancel_all();
        self.set_state(BotState::Stopped).await;

        info!(cancelled, "Bot stopped");
        self.inner
            .pipeline
            .fanout()
            .notify_system(
                "Bot stopped",
                &format!("{cancelled} scheduled job(s) cancelled."),
            )
            .await;
    }

    pub async fn status(&self) -> BotStatus {
        let state = self.state().await;
        BotStatus {
            is_running: state == BotState::Running,
            state,
            monitored_instruments: self.inner.instruments.read().await.clone(),
            active_job_count: self.inner.scheduler.job_count(),
            scheduled_jobs: self
                .inner
                .scheduler
                .jobs_snapshot()
                .into_iter()
                .map(|(key, cron)| ScheduledJob { key, cron })
                .collect(),
        }
    }

    /// `Ok(false)` when the symbol is already monitored.
    pub async fn add_instrument(&self, instrument: Instrument) -> Result<bool> {
        instrument.validate()?;
        let _guard = self.inner.transition.lock().await;

        {
            let mut list = self.inner.instruments.write().await;
            if list.iter().any(|i| i.symbol == instrument.symbol) {
                warn!(symbol = %instrument.symbol, "Instrument already monitored");
                return Ok(false);
            }
            list.push(instrument.clone());
        }

        if self.state().await == BotState::Running {
            if let Err(e) = self.schedule_for(&instrument) {
                self.inner
                    .instruments
                    .write()
                    .await
                    .retain(|i| i.symbol != instrument.symbol);
                return Err(e);
            }
        }

        info!(symbol = %instrument.symbol, market = %instrument.market, "Instrument added");
        Ok(true)
    }

    /// `false` when the symbol was not monitored.
    pub async fn remove_instrument(&self, symbol: &str) -> bool {
        let _guard = self.inner.transition.lock().await;

        let (removed, market_now_empty) = {
            let mut list = self.inner.instruments.write().await;
            let Some(pos) = list.iter().position(|i| i.symbol == symbol) else {
                warn!(symbol, "Instrument not monitored, nothing to remove");
                return false;
            };
            let removed = list.remove(pos);
            let empty = !list.iter().any(|i| i.market == removed.market);
            (removed, empty)
        };

        let job_now_idle = match self.inner.schedule.grouping {
            JobGrouping::PerInstrument => true,
            JobGrouping::PerMarket => market_now_empty,
        };
        if job_now_idle && self.state().await == BotState::Running {
            self.inner
                .scheduler
                .cancel(&self.inner.schedule.job_key(&removed));
        }

        info!(symbol, "Instrument removed");
        true
    }

    /// Register the job that will cover a newly added instrument.
    fn schedule_for(&self, instrument: &Instrument) -> Result<()> {
        let cron = self.inner.schedule.cron_for(instrument.market);
        let key = self.inner.schedule.job_key(instrument);
        match self.inner.schedule.grouping {
            JobGrouping::PerInstrument => {
                let handler = instrument_job(self.inner.pipeline.clone(), instrument.clone());
                self.inner.scheduler.schedule(&key, cron, handler)?;
            }
            JobGrouping::PerMarket => {
                if !self.inner.scheduler.contains(&key) {
                    let handler = market_job(
                        self.inner.pipeline.clone(),
                        self.inner.instruments.clone(),
                        instrument.market,
                    );
                    self.inner.scheduler.schedule(&key, cron, handler)?;
                }
            }
        }
        Ok(())
    }

    /// `(key, cron, handler)` for every job the current registry needs.
    /// Every cron expression is validated before anything runs.
    fn plan_jobs(&self, instruments: &[Instrument]) -> Result<Vec<(String, String, JobFn)>> {
        let schedule = &self.inner.schedule;
        let plan: Vec<(String, String, JobFn)> = match schedule.grouping {
            JobGrouping::PerInstrument => instruments
                .iter()
                .map(|i| {
                    (
                        schedule.job_key(i),
                        schedule.cron_for(i.market).to_string(),
                        instrument_job(self.inner.pipeline.clone(), i.clone()),
                    )
                })
                .collect(),
            JobGrouping::PerMarket => instruments
                .iter()
                .map(|i| i.market)
                .collect::<BTreeSet<Market>>()
                .into_iter()
                .map(|market| {
                    (
                        market_job_key(market),
                        schedule.cron_for(market).to_string(),
                        market_job(
                            self.inner.pipeline.clone(),
                            self.inner.instruments.clone(),
                            market,
                        ),
                    )
                })
                .collect(),
        };

        for (_, cron, _) in &plan {
            parse_cron(cron)?;
        }
        Ok(plan)
    }
}

fn instrument_job(pipeline: Arc<WorkflowPipeline>, instrument: Instrument) -> JobFn {
    Arc::new(move || {
        let pipeline = pipeline.clone();
        let instrument = instrument.clone();
        async move {
            match pipeline.run(&instrument).await {
                WorkflowOutcome::Failed(e) => Err(e),
                _ => Ok(()),
            }
        }
        .boxed()
    })
}

/// Runs every instrument of `market` in registry order. The registry is read
/// at tick time so additions and removals take effect on the next tick.
fn market_job(pipeline: Arc<WorkflowPipeline>, registry: Registry, market: Market) -> JobFn {
    Arc::new(move || {
        let pipeline = pipeline.clone();
        let registry = registry.clone();
        async move {
            let members: Vec<Instrument> = registry
                .read()
                .await
                .iter()
                .filter(|i| i.market == market)
                .cloned()
                .collect();

            let mut failed = 0;
            for instrument in &members {
                if pipeline.run(instrument).await.is_failed() {
                    failed += 1;
                }
            }
            if failed > 0 {
                return Err(Error::Other(format!(
                    "{failed} of {} {market} runs failed",
                    members.len()
                )));
            }
            Ok(())
        }
        .boxed()
    })
}
