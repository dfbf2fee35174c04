use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use entitlement_ledger::adapters::LoggingAlertSink;
use entitlement_ledger::bootstrap::{
    build_notifier, build_router, build_services, StartupError, Storage,
};
use entitlement_ledger::config::{AppConfig, LogFormat, StorageMode, ValidationError};

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let storage = match config.storage {
        StorageMode::Postgres => {
            let database = config
                .database
                .as_ref()
                .ok_or(ValidationError::MissingRequired("DATABASE__URL"))?;
            tracing::info!(url = %database.redacted_url(), "connecting to database");
            let pool = database.connect().await?;
            if database.run_migrations {
                sqlx::migrate!("./migrations").run(&pool).await?;
                tracing::info!("migrations applied");
            }
            Storage::postgres(pool)
        }
        StorageMode::Memory => {
            tracing::warn!("using in-memory storage; state is lost on restart");
            Storage::memory()
        }
    };

    let services = build_services(
        &config,
        storage,
        build_notifier(&config.notification),
        Arc::new(LoggingAlertSink),
    )?;
    let app = build_router(&config, &services);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler = if config.reconciler.enabled {
        let reconciler = services.reconciler.clone();
        Some(tokio::spawn(async move { reconciler.run(shutdown_rx).await }))
    } else {
        tracing::info!("reconciler disabled");
        None
    };

    let addr = config.server.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = ?config.server.environment,
        stripe = config.stripe.is_some(),
        paypay = config.paypay.is_some(),
        admin = config.admin.enabled(),
        "entitlement ledger listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = reconciler {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "reconciler task failed");
        }
    }
    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.server.log_format() {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
