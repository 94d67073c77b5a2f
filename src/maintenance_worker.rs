// Background store maintenance: prune summaries/logs past retention every prune_interval_secs,
// VACUUM on a configurable schedule (cron expression or fixed interval).

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::telemetry_repo::TelemetryRepo;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    pub prune_interval_secs: u64,
    /// Optional cron expression for VACUUM (e.g. "0 0 3 * * *" = 03:00 daily). Uses local time.
    pub vacuum_schedule: Option<String>,
    /// Run VACUUM every N seconds when vacuum_schedule is not set.
    pub vacuum_interval_secs: u64,
}

pub fn spawn(repo: Arc<TelemetryRepo>, config: MaintenanceConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run(repo, config).await;
    })
}

#[instrument(skip(repo), fields(prune_interval_secs = config.prune_interval_secs))]
async fn run(repo: Arc<TelemetryRepo>, config: MaintenanceConfig) {
    let mut prune_interval =
        tokio::time::interval(Duration::from_secs(config.prune_interval_secs));
    prune_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let (vacuum_tx, mut vacuum_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(vacuum_scheduler(config.clone(), vacuum_tx));

    loop {
        tokio::select! {
            _ = prune_interval.tick() => {
                match repo.prune_old_data().await {
                    Ok(0) => debug!("nothing to prune"),
                    Ok(n) => info!(rows_pruned = n, "pruned data past retention"),
                    Err(e) => warn!(error = %e, "prune failed"),
                }
            }
            _ = vacuum_rx.recv() => {
                if let Err(e) = repo.vacuum().await {
                    warn!(error = %e, "vacuum failed");
                } else {
                    info!("vacuum complete");
                }
            }
        }
    }
}

enum VacuumSchedule {
    Cron(cron::Schedule),
    Every(Duration),
}

impl VacuumSchedule {
    fn from_config(config: &MaintenanceConfig) -> Option<Self> {
        match config.vacuum_schedule.as_deref() {
            Some(expr) => match cron::Schedule::from_str(expr) {
                Ok(schedule) => Some(VacuumSchedule::Cron(schedule)),
                Err(e) => {
                    warn!(cron = %expr, error = %e, "invalid vacuum_schedule; VACUUM will not run");
                    None
                }
            },
            None => Some(VacuumSchedule::Every(Duration::from_secs(
                config.vacuum_interval_secs,
            ))),
        }
    }

    /// Time until the next run; None when a cron schedule has no upcoming time.
    fn next_delay(&self) -> Option<Duration> {
        match self {
            VacuumSchedule::Every(d) => Some(*d),
            VacuumSchedule::Cron(schedule) => {
                let now = chrono::Local::now();
                let next = schedule.after(&now).next()?;
                Some((next - now).to_std().unwrap_or(Duration::from_secs(1)))
            }
        }
    }
}

/// Sends a message on `tx` at each VACUUM time.
async fn vacuum_scheduler(config: MaintenanceConfig, tx: tokio::sync::mpsc::Sender<()>) {
    let Some(schedule) = VacuumSchedule::from_config(&config) else {
        return;
    };
    loop {
        let Some(delay) = schedule.next_delay() else {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            continue;
        };
        tokio::time::sleep(delay).await;
        if tx.send(()).await.is_err() {
            break;
        }
    }
}
