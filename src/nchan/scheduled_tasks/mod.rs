use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::NchanError;

mod tasks;

pub(crate) use tasks::ChannelResync;

/// Trait for implementing scheduled background tasks.
///
/// Tasks first run one interval after startup and periodically thereafter.
/// Implementations should be idempotent and handle transient failures gracefully.
#[async_trait]
pub trait Task: Send + Sync {
    /// Returns the unique name of this task for logging and identification.
    fn name(&self) -> &'static str;

    /// Returns the interval between task executions.
    fn interval(&self) -> Duration;

    /// Executes the task.
    async fn execute(&self) -> Result<(), NchanError>;
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Spawns one ticker per task. Every ticker stops once `shutdown` flips to `true`
/// or its sender is dropped.
pub(crate) fn start_scheduled_tasks(
    tasks: Vec<Arc<dyn Task>>,
    config: &SchedulerConfig,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    if !config.enabled {
        tracing::info!(
            target: "nchan::scheduler",
            "Scheduler disabled, not starting {} tasks",
            tasks.len()
        );
        return Vec::new();
    }

    tasks
        .into_iter()
        .map(|task| spawn_task(task, shutdown.clone()))
        .collect()
}

fn spawn_task(task: Arc<dyn Task>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = task.interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            target: "nchan::scheduler",
            "Scheduled task {} every {:?}",
            task.name(),
            period
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let started = Instant::now();
                    match task.execute().await {
                        Ok(()) => tracing::debug!(
                            target: "nchan::scheduler",
                            "Task {} completed in {:?}",
                            task.name(),
                            started.elapsed()
                        ),
                        Err(e) => tracing::warn!(
                            target: "nchan::scheduler",
                            "Task {} failed: {}",
                            task.name(),
                            e
                        ),
                    }
                }
            }
        }

        tracing::debug!(
            target: "nchan::scheduler",
            "Task {} stopped",
            task.name()
        );
    })
}
