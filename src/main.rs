use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use screening_backend::{
    config::{get_config, init_config, LogFormat},
    database::{
        pool::{create_pool, run_migrations},
        PgStore,
    },
    routes, AppState,
};
use tokio::net::TcpListener;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn start_stale_sweep(state: &AppState, cron: &str) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create scheduler: {:?}", e))?;
    let attempts = state.attempt_service.clone();
    let job = Job::new_async(cron, move |_id, _lock| {
        let attempts = attempts.clone();
        Box::pin(async move {
            if let Err(e) = attempts.sweep_stale().await {
                tracing::error!(error = ?e, "Stale attempt sweep failed");
            }
        })
    })
    .map_err(|e| anyhow::anyhow!("Invalid STALE_SWEEP_CRON '{}': {:?}", cron, e))?;
    scheduler
        .add(job)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to schedule sweep: {:?}", e))?;
    scheduler
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start scheduler: {:?}", e))?;
    Ok(scheduler)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_config()?;
    let config = get_config();
    init_tracing(config.log_format);

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let app_state = AppState::new(Arc::new(PgStore::new(pool)), config);

    {
        let notifications = app_state.notification_service.clone();
        tokio::spawn(async move {
            loop {
                match notifications.run_once().await {
                    Ok(true) => {}
                    Ok(false) => {
                        tokio::time::sleep(Duration::from_millis(1000)).await;
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, "Webhook worker error");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });
    }

    let _scheduler = match &config.stale_sweep_cron {
        Some(cron) => {
            info!("Sweeping stale attempts on schedule '{}'", cron);
            Some(start_stale_sweep(&app_state, cron).await?)
        }
        None => None,
    };

    info!("Storing uploads under: {}", config.uploads_dir);

    let app = routes::api_router(app_state, config.public_rps, config.admin_rps)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
