use anyhow::Result;
use chassiswatch::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(
        name = version::NAME,
        version = version::VERSION,
        base_url = %app_config.redfish.base_url,
        "starting"
    );

    let telemetry_repo = Arc::new(
        telemetry_repo::TelemetryRepo::connect(
            &app_config.storage.database_path,
            app_config.storage.retention_days,
        )
        .await?,
    );
    telemetry_repo.init().await?;
    for user in &app_config.auth.users {
        telemetry_repo
            .upsert_user(&user.user_id, &user.password_sha256)
            .await?;
    }
    tracing::info!(users = app_config.auth.users.len(), "operator accounts seeded");
    let archive: Arc<dyn sinks::ArchiveSink> =
        Arc::new(sinks::FsArchive::new(&app_config.storage.archive_dir));

    let audit = Arc::new(audit::AuditSink::new(
        app_config.audit.buffer_capacity,
        telemetry_repo.clone(),
    ));

    let transport: Arc<dyn redfish::Transport> = Arc::new(redfish::RedfishClient::new()?);
    let endpoints = redfish::Endpoints::new(&app_config.redfish.base_url);
    let request_timeout = Duration::from_millis(app_config.redfish.request_timeout_ms);
    let aggregator = Arc::new(aggregator::Aggregator::new(
        transport.clone(),
        endpoints.clone(),
        aggregator::AggregatorConfig {
            max_concurrent_chassis: app_config.redfish.max_concurrent_chassis,
            max_concurrent_subsystems: app_config.redfish.max_concurrent_subsystems,
            list_timeout: Duration::from_millis(app_config.redfish.list_timeout_ms),
            request_timeout,
        },
    ));
    let dispatcher = Arc::new(dispatcher::Dispatcher::new(
        transport,
        endpoints,
        audit.clone(),
        app_config.redfish.actor.clone(),
        request_timeout,
    ));
    let metrics = Arc::new(metrics::MetricsRegistry::new()?);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let worker_handle = worker::spawn(
        worker::WorkerDeps {
            aggregator: aggregator.clone(),
            accumulator: accumulator::BatchAccumulator::new(
                app_config.monitoring.batch_size,
                archive.clone(),
                telemetry_repo.clone(),
            ),
            audit: audit.clone(),
            metrics: Some(metrics.clone()),
            shutdown_rx,
        },
        worker::WorkerConfig {
            probe_interval_ms: app_config.monitoring.probe_interval_ms,
            stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
            thresholds: app_config.thresholds,
        },
    );
    let _maintenance_handle = maintenance_worker::spawn(
        telemetry_repo.clone(),
        maintenance_worker::MaintenanceConfig {
            prune_interval_secs: app_config.storage.prune_interval_secs,
            vacuum_schedule: app_config.storage.vacuum_schedule.clone(),
            vacuum_interval_secs: app_config.storage.vacuum_interval_secs,
        },
    );

    let app = routes::app(routes::AppState {
        dispatcher,
        audit,
        summaries: telemetry_repo.clone(),
        credentials: telemetry_repo,
        archive,
        aggregator,
        metrics,
        feed_poll_interval: Duration::from_millis(app_config.audit.feed_poll_interval_ms),
    });
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            match worker_handle.await {
                Ok(stats) => tracing::info!(
                    ticks = stats.ticks,
                    batches_flushed = stats.batches_flushed,
                    sink_failures = stats.sink_failures,
                    "worker stopped"
                ),
                Err(e) => tracing::warn!(error = %e, "worker task ended abnormally"),
            }
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
