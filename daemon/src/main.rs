use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

use vidd_lib::DaemonState;
use vidd_lib::config::Config;
use vidd_lib::ipc_server;
use vidd_lib::player::PlayerFacade;
use vidd_lib::service::{self, PlayerHandle};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = Config::default_config_path()?;
    let loaded = Config::load();
    let log_level = loaded
        .as_ref()
        .map(|cfg| cfg.general.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    log::info!("Starting video player daemon v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Looking for config at: {}", config_path.display());

    let config = match loaded {
        Ok(cfg) => {
            log::info!("✓ Configuration loaded successfully");
            log::info!("  General settings:");
            log::info!("    - Log level: {}", cfg.general.log_level);
            log::info!("  Playback settings:");
            log::info!("    - Volume: {:.2}", cfg.playback.volume);
            log::info!(
                "    - Repeat: {}",
                if cfg.playback.repeat { "yes" } else { "no" }
            );
            log::info!(
                "    - Stretch: {}",
                if cfg.playback.stretch { "yes" } else { "no" }
            );
            log::info!("    - Fade duration: {}ms", cfg.playback.fade_duration_ms);
            log::info!("    - Tick interval: {}ms", cfg.playback.tick_interval_ms);
            log::info!("  Display settings:");
            log::info!(
                "    - Origin: {} (screen height {})",
                cfg.display.origin,
                cfg.display.screen_height
            );
            log::info!(
                "    - Surface: {}x{} at ({}, {})",
                cfg.display.width,
                cfg.display.height,
                cfg.display.x,
                cfg.display.y
            );
            log::info!("  Backend: {}", cfg.backend.kind);
            cfg
        }
        Err(e) => {
            log::warn!("Failed to load config: {:#}. Using defaults.", e);
            if let Some(dir) = config_path.parent() {
                log::info!("To create a config file:");
                log::info!("  mkdir -p {}", dir.display());
                log::info!("  cp config.toml.example {}", config_path.display());
            }
            Config::default()
        }
    };

    #[cfg(not(feature = "video"))]
    {
        log::info!("GStreamer backend not compiled (build with --features video to enable)");
    }

    let player = PlayerFacade::from_config(&config);
    if !player.is_init() {
        log::warn!("No media backend available, every load will fail");
    }

    // Create channel between IPC and the player service
    let (player_handle, player_rx) = PlayerHandle::channel();

    let state = Arc::new(Mutex::new(DaemonState::new()));

    // Start IPC server
    let ipc_state = state.clone();
    let ipc_handle = tokio::spawn(async move {
        if let Err(e) = ipc_server::start(ipc_state, player_handle).await {
            log::error!("IPC server error: {:#}", e);
        }
    });

    // Start player service
    let service_state = state.clone();
    let tick_interval = config.tick_interval();
    let service_handle = tokio::spawn(async move {
        if let Err(e) = service::run(player, player_rx, service_state, tick_interval).await {
            log::error!("Player service error: {:#}", e);
        }
    });

    // Set up signal handlers
    let signal_state = state.clone();
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                log::error!("Failed to set up signal handlers: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                log::info!("Received SIGTERM, shutting down...");
            }
            _ = sigint.recv() => {
                log::info!("Received SIGINT, shutting down...");
            }
        }

        signal_state.lock().await.should_exit = true;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = ipc_handle => {
            log::info!("IPC server stopped");
        }
        _ = service_handle => {
            log::info!("Player service stopped");
        }
    }

    // Let the other task see the exit flag and release the socket / backend
    state.lock().await.should_exit = true;
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;

    log::info!("Daemon shutting down");
    Ok(())
}
