//! Periodic driver running the watch pipeline for every stale project.
use chrono::{DateTime, TimeDelta, Utc};
use log::*;
use std::{
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::task::JoinSet;

use crate::{
    adapter::CheckOptions,
    entity::Project,
    error::{Result, WatchError},
    store::Store,
    watcher::{UpgradeOutcome, Watcher},
};

/// Whether a project is due: `now - (last_run ?? now) >= interval`.
///
/// Projects that were never checked only become due once a first check
/// stamped their last run.
pub fn is_stale(
    last_run: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    interval: TimeDelta,
) -> bool {
    now - last_run.unwrap_or(now) >= interval
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerState {
    Idle,
    Running,
}

/// Resets the scheduler to idle when a tick ends, panics included.
struct TickGuard<'a> {
    state: &'a Mutex<SchedulerState>,
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            *state = SchedulerState::Idle;
        }
    }
}

/// Result of one project's watch round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectOutcome {
    pub project: String,
    pub result: std::result::Result<UpgradeOutcome, String>,
}

pub struct WatchScheduler {
    store: Arc<dyn Store>,
    watcher: Arc<Watcher>,
    run_interval: TimeDelta,
    tick_delay: Duration,
    state: Mutex<SchedulerState>,
}

impl WatchScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        watcher: Arc<Watcher>,
        run_interval: Duration,
        tick_delay: Duration,
    ) -> Self {
        Self {
            store,
            watcher,
            run_interval: TimeDelta::from_std(run_interval)
                .unwrap_or(TimeDelta::MAX),
            tick_delay,
            state: Mutex::new(SchedulerState::Idle),
        }
    }

    fn begin_tick(&self) -> Result<TickGuard<'_>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| WatchError::AlreadyRunning)?;

        if *state == SchedulerState::Running {
            return Err(WatchError::AlreadyRunning);
        }
        *state = SchedulerState::Running;

        Ok(TickGuard { state: &self.state })
    }

    /// Check every project that was never checked so the staleness rule
    /// applies to it. Failures are logged and leave the project unchecked.
    pub async fn register_new_projects(&self) -> Result<usize> {
        let mut registered = 0;

        for project in self.store.load_projects().await? {
            if project.last_run().is_some() {
                continue;
            }

            let name = project.name.clone();
            match self.watcher.check(project, CheckOptions::default()).await {
                Ok(_) => {
                    info!("{name}: registered");
                    registered += 1;
                }
                Err(err) => error!("{name}: registration check failed: {err}"),
            }
        }

        Ok(registered)
    }

    /// Run the watch pipeline concurrently for every stale project and wait
    /// for all of them. A failing or panicking project never affects the
    /// others.
    pub async fn tick(&self) -> Result<Vec<ProjectOutcome>> {
        let _guard = self.begin_tick()?;

        let mut tasks = JoinSet::new();
        for project in self.stale_projects(Utc::now()).await? {
            let watcher = self.watcher.clone();
            let name = project.name.clone();
            tasks.spawn(async move {
                (name, watcher.watch_project(project).await)
            });
        }

        debug!("watching {} stale projects", tasks.len());

        let mut outcomes = vec![];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((project, result)) => {
                    let result = match result {
                        Ok(outcome) => {
                            info!("{project}: {outcome:?}");
                            Ok(outcome)
                        }
                        Err(err) => {
                            error!("{project}: {err}");
                            Err(err.to_string())
                        }
                    };
                    outcomes.push(ProjectOutcome { project, result });
                }
                Err(err) => error!("watch task aborted: {err}"),
            }
        }

        outcomes.sort_by(|a, b| a.project.cmp(&b.project));
        Ok(outcomes)
    }

    /// Tick, wait the tick delay, repeat until `shutdown` resolves. The delay
    /// starts when a tick completes, ticks never overlap.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            match self.tick().await {
                Ok(outcomes) => debug!("tick finished for {} projects", outcomes.len()),
                Err(WatchError::AlreadyRunning) => warn!("previous tick still running"),
                Err(err) => error!("tick failed: {err}"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.tick_delay) => {}
                _ = &mut shutdown => {
                    info!("shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Projects due at `now`.
    pub async fn stale_projects(&self, now: DateTime<Utc>) -> Result<Vec<Project>> {
        Ok(self
            .store
            .load_projects()
            .await?
            .into_iter()
            .filter(|p| is_stale(p.last_run(), now, self.run_interval))
            .collect())
    }
}
