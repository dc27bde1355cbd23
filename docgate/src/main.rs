use std::{process::ExitCode, sync::Arc};

use tokio::net::TcpListener;

use docgate::{
    app::{AppState, router},
    config::{BackendConfig, Config},
    error::StartupError,
    logging::init_logging,
    memory::InMemoryStore,
    store::ConnectionManager,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::load();

    if let Err(e) = init_logging(&config.log_config()) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "docgate stopped");
            ExitCode::FAILURE
        }
    }
}

async fn connect(manager: &ConnectionManager, backend: BackendConfig) -> Result<&'static str, StartupError> {
    match backend {
        BackendConfig::Memory => {
            manager.connect(InMemoryStore::builder()).await?;
            tracing::info!("using in-memory store");
            Ok("In-Memory Store")
        }
        #[cfg(feature = "mongodb")]
        BackendConfig::MongoDb { uri, database } => {
            let mut builder = docgate::mongodb::MongoDbStore::builder(&uri);
            if let Some(database) = database {
                builder = builder.database(database);
            }

            let store = manager.connect(builder).await?;
            let database = store
                .backend_as::<docgate::mongodb::MongoDbStore>()
                .map(|s| s.database_name().to_string())
                .unwrap_or_default();
            tracing::info!(%database, "successfully connected to MongoDB");
            Ok("Native MongoDB Driver")
        }
        #[cfg(not(feature = "mongodb"))]
        BackendConfig::MongoDb { uri, .. } => Err(StartupError::BackendUnavailable(uri)),
    }
}

async fn run(config: Config) -> Result<(), StartupError> {
    let backend = config.backend()?;
    let addr = config.socket_addr()?;

    let manager = Arc::new(ConnectionManager::new());
    let driver = connect(&manager, backend).await?;

    let app = router(
        AppState::new(manager.clone())
            .with_db_timeout(config.db_timeout())
            .with_body_limit(config.body_limit)
            .with_driver(driver),
    );

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down, closing database connection");
    manager.close().await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
