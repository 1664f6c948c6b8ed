use log::{error, info};
use poll_kiosk::config::{Config, Settings, SharedConfig};
use poll_kiosk::db::Database;
use poll_kiosk::{router, AppState};
use std::net::SocketAddr;

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::from_env();

    // Missing or broken config is fatal
    let config = match Config::load(&settings.config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Loaded {} (current poll: {:?})",
        settings.config_path.display(),
        config.current_poll_id
    );

    // Initialize database
    let database = match Database::connect(&settings.database_url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to initialize database {}: {}", settings.database_url, e);
            std::process::exit(1);
        }
    };

    let state = AppState::new(database, SharedConfig::new(&settings.config_path, config));
    let app = router(state);

    let addr = settings.listen_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Poll kiosk listening on http://{}", addr);

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        error!("Server error: {}", e);
    }
    info!("Shut down");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutdown signal received");
}
