use log::{error, info};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use trusty_polls::config::{Config, ConfigError};
use trusty_polls::{RegistryError, api, registry_from_config};

/// Failures that stop the server from starting or keep it from running.
#[derive(Debug, Error)]
enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to open poll store: {0}")]
    Store(#[from] RegistryError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

async fn run() -> Result<(), Error> {
    let config = Config::from_env()?;
    info!("Using {:?} poll store", config.store);

    let registry = registry_from_config(&config).await?;

    let address = SocketAddr::new(config.bind_address, config.port);
    info!("Binding to {address}");
    let listener = TcpListener::bind(address).await?;

    api::serve(listener, registry, shutdown_signal()).await?;
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}
