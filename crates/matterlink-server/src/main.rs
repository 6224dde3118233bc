use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use matterlink_core::Controller;
use matterlink_server::{AppState, Mirror, ServerConfig, routes};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::var_os("MATTERLINK_CONFIG").map(PathBuf::from);
    let config = ServerConfig::load(config_path.as_deref())?;

    let mirror = Mirror::connect(&config.database.url).await?;
    let controller = Controller::new(config.controller_config()?);

    // The bridge may come up after us; until it does, routes answer 503
    // and a later connect can be driven externally via process restart.
    match controller.connect().await {
        Ok(()) => restore_names(&controller, &mirror).await,
        Err(e) => tracing::warn!(error = %e, "starting without a bridge session"),
    }

    let state = AppState::new(controller.clone(), mirror);
    state.mirror_registry().await;

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "listening");

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    controller.disconnect().await;
    Ok(())
}

/// Re-apply operator-assigned names persisted in the mirror to the
/// freshly loaded registry.
async fn restore_names(controller: &Controller, mirror: &Mirror) {
    let records = match mirror.all().await {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(error = %e, "could not read mirrored names");
            return;
        }
    };

    for record in records {
        let Ok(node_id) = u64::try_from(record.node_id) else {
            continue;
        };
        let Ok(device) = controller.get_device(node_id) else {
            continue;
        };
        if device.name != record.name {
            if let Ok(renamed) = controller.rename_device(node_id, &record.name) {
                tracing::debug!(node_id, name = %renamed.name, "restored mirrored name");
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown handler");
        return;
    }
    tracing::info!("shutdown signal received");
}
