mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use brandkit_extract::{
    ExtractionContext, ExtractionSettings, JobTracker, LlmClient, ScrapeClient,
};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(brandkit_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = brandkit_db::PoolConfig::from_app_config(&config);
    let pool = brandkit_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = brandkit_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let extraction = ExtractionContext {
        pool: pool.clone(),
        scraper: ScrapeClient::from_app_config(&config)?,
        llm: LlmClient::from_app_config(&config)?,
        runs: brandkit_runs::RunsClient::from_app_config(&config)?,
        settings: ExtractionSettings::from_app_config(&config),
    };
    let jobs = JobTracker::new();

    let _scheduler = scheduler::build_scheduler(jobs.clone(), Arc::clone(&config)).await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        brandkit_core::Environment::Development
    ))?;
    let app = build_app(
        AppState {
            pool,
            extraction,
            jobs,
            app_id: config.app_id.clone(),
        },
        auth,
    );

    tracing::info!(bind_addr = %config.bind_addr, env = %config.env, "brandkit-server listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
