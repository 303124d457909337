use anyhow::{Context, Result};
use common::{Command, PlayerError, Response};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;

use crate::DaemonState;
use crate::service::PlayerHandle;

/// Serve the host protocol on the default socket
pub async fn start(state: Arc<Mutex<DaemonState>>, player: PlayerHandle) -> Result<()> {
    let socket_path = common::get_socket_path();
    start_at(&socket_path, state, player).await
}

/// Serve the host protocol on `socket_path` until the daemon should exit
pub async fn start_at(
    socket_path: &Path,
    state: Arc<Mutex<DaemonState>>,
    player: PlayerHandle,
) -> Result<()> {
    // Remove old socket if it exists
    if socket_path.exists() {
        std::fs::remove_file(socket_path).with_context(|| {
            format!("Failed to remove stale socket: {}", socket_path.display())
        })?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind socket: {}", socket_path.display()))?;
    log::info!("IPC server listening on: {}", socket_path.display());

    loop {
        // Check if we should exit
        if state.lock().await.should_exit {
            break;
        }

        // Accept connections with timeout
        let accept_result =
            tokio::time::timeout(std::time::Duration::from_millis(100), listener.accept()).await;

        match accept_result {
            Ok(Ok((stream, _addr))) => {
                let player = player.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, player).await {
                        log::error!("Error handling client: {}", e);
                    }
                });
            }
            Ok(Err(e)) => {
                log::error!("Error accepting connection: {}", e);
            }
            Err(_) => {
                // Timeout, continue loop to check exit condition
                continue;
            }
        }
    }

    // Clean up socket
    let _ = std::fs::remove_file(socket_path);
    log::info!("IPC server stopped");
    Ok(())
}

async fn handle_client(stream: UnixStream, player: PlayerHandle) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        if line.trim().is_empty() {
            line.clear();
            continue;
        }

        let response = match serde_json::from_str::<Command>(&line) {
            Ok(command) => handle_command(command, &player).await,
            Err(e) => {
                log::warn!("Invalid command: {}", e);
                Response::Error(PlayerError::Ipc(format!("Invalid command: {}", e)))
            }
        };

        // Send response
        let response_json = serde_json::to_string(&response)?;
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        line.clear();
    }

    Ok(())
}

async fn handle_command(command: Command, player: &PlayerHandle) -> Response {
    match command {
        Command::Ping => Response::Pong,

        command => match player.request(command).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Failed to reach player service: {}", e);
                Response::Error(e.into())
            }
        },
    }
}
