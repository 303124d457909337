//! Single-writer player service.
//!
//! One task owns the [`PlayerFacade`]. Everything else talks to it through a
//! [`PlayerHandle`], which sends a [`Command`] with a oneshot reply channel.
//! Between requests the task ticks the facade so backend events, fades and
//! repeats are handled while no host is asking.

use anyhow::Result;
use common::{Command, DaemonStatus, PlayerError, Response};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::DaemonState;
use crate::log_and_continue;
use crate::player::PlayerFacade;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Player service is not running")]
    Closed,
    #[error("Player service dropped the request")]
    NoReply,
}

impl From<ServiceError> for PlayerError {
    fn from(e: ServiceError) -> Self {
        PlayerError::Ipc(e.to_string())
    }
}

/// A command waiting for the player service
#[derive(Debug)]
pub struct PlayerRequest {
    pub command: Command,
    pub reply: oneshot::Sender<Response>,
}

/// Cloneable sender side of the player service
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<PlayerRequest>,
}

impl PlayerHandle {
    pub fn new(tx: mpsc::UnboundedSender<PlayerRequest>) -> Self {
        Self { tx }
    }

    /// Create a handle and the receiver the service task consumes
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PlayerRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Send a command and wait for its response
    pub async fn request(&self, command: Command) -> Result<Response, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(PlayerRequest { command, reply })
            .map_err(|_| ServiceError::Closed)?;
        response.await.map_err(|_| ServiceError::NoReply)
    }
}

/// Run the player service until every handle is dropped, a `Kill` arrives or
/// the daemon is asked to exit
pub async fn run(
    mut player: PlayerFacade,
    mut rx: mpsc::UnboundedReceiver<PlayerRequest>,
    state: Arc<Mutex<DaemonState>>,
    tick_interval: Duration,
) -> Result<()> {
    log::info!(
        "Player service started (backend: {}, tick: {}ms)",
        player.backend_name(),
        tick_interval.as_millis()
    );

    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            request = rx.recv() => {
                let Some(PlayerRequest { command, reply }) = request else {
                    log::info!("All player handles dropped");
                    break;
                };

                let kill = matches!(command, Command::Kill);
                let response = match command {
                    Command::Query => {
                        let uptime_secs = state.lock().await.uptime_secs();
                        Response::Status(status(&mut player, uptime_secs))
                    }
                    Command::Kill => {
                        log::info!("Received kill command");
                        state.lock().await.should_exit = true;
                        Response::Ok
                    }
                    command => dispatch(&mut player, command),
                };

                if reply.send(response).is_err() {
                    log::debug!("Requester went away before the response was sent");
                }

                if kill {
                    break;
                }
            }
            _ = ticker.tick() => {
                if state.lock().await.should_exit {
                    break;
                }
                player.tick();
            }
        }
    }

    log_and_continue!(player.stop(), "stop playback on shutdown");
    log::info!("Player service stopped");
    Ok(())
}

/// Status snapshot for `Query`
pub fn status(player: &mut PlayerFacade, uptime_secs: u64) -> DaemonStatus {
    DaemonStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs,
        backend: player.backend_name().to_string(),
        session: player.snapshot(),
    }
}

/// Apply one player command
pub fn dispatch(player: &mut PlayerFacade, command: Command) -> Response {
    log::debug!("Handling command: {:?}", command);

    match command {
        Command::IsInit => Response::Bool(player.is_init()),

        Command::FadeUp => {
            player.fade_up();
            Response::Ok
        }

        Command::FadeDown => {
            player.fade_down();
            Response::Ok
        }

        Command::SetRepeat { repeat } => {
            player.set_repeat(repeat);
            Response::Ok
        }

        Command::LoadVideo {
            path,
            options,
            stretch,
        } => {
            log::info!("Loading video: {} (stretch: {})", path, stretch);
            player.load_vid(&path, &options, stretch).into()
        }

        Command::Play => player.play().into(),

        Command::PlayPath {
            path,
            options,
            stretch,
        } => {
            log::info!("Playing video: {} (stretch: {})", path, stretch);
            player.play_path(&path, &options, stretch).into()
        }

        Command::GetLastLocation => Response::Text(player.last_location()),

        Command::Pause => player.pause_video().into(),

        Command::Stop => player.stop().into(),

        Command::IsMute => Response::Bool(player.is_mute()),

        Command::SetMute { mute } => player.set_mute(mute).into(),

        Command::GetProgress => Response::Number(player.progress_percent()),

        Command::SetProgress { percent } => player.set_progress_percent(percent).into(),

        Command::IsPlaying => Response::Bool(player.is_playing()),

        Command::IsPaused => Response::Bool(player.is_paused()),

        Command::IsFinished => Response::Bool(player.is_finished()),

        Command::SetVisible { visible } => player.set_visible(visible).into(),

        Command::SetVolume { volume } => player.set_volume(volume).into(),

        Command::GetVolume => Response::Number(player.volume()),

        Command::SetLocation { x, y } => player.set_location(x, y).into(),

        Command::SetSize { width, height } => player.set_size(width, height).into(),

        Command::SetHue { hue } => player.set_hue(hue).into(),

        Command::GetHue => Response::Number(player.hue()),

        Command::SetFadeSpeed { seconds } => player.set_fade_speed(seconds).into(),

        Command::SetStretch { stretch } => player.set_stretch(stretch).into(),

        Command::SetOptions { options } => {
            player.set_options(&options);
            Response::Ok
        }

        Command::GetCurrentTime => Response::Number(player.current_time()),

        Command::GetTotalTime => Response::Number(player.total_time()),

        Command::Query => Response::Status(status(player, 0)),

        Command::Ping => Response::Pong,

        Command::Kill => player.stop().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::config::Config;

    fn player() -> PlayerFacade {
        let backend = HeadlessBackend::new(Duration::from_secs(10));
        PlayerFacade::new(Some(Box::new(backend)), &Config::default())
    }

    #[test]
    fn test_dispatch_queries() {
        let mut player = player();
        assert_eq!(dispatch(&mut player, Command::IsInit), Response::Bool(true));
        assert_eq!(
            dispatch(&mut player, Command::GetVolume),
            Response::Number(1.0)
        );
        assert_eq!(
            dispatch(&mut player, Command::GetLastLocation),
            Response::Text(String::new())
        );
        assert_eq!(dispatch(&mut player, Command::Ping), Response::Pong);
    }

    #[test]
    fn test_dispatch_errors_become_responses() {
        let mut player = player();
        assert!(matches!(
            dispatch(&mut player, Command::Play),
            Response::Error(PlayerError::InvalidState(_))
        ));
        assert!(matches!(
            dispatch(&mut player, Command::SetSize { width: 0, height: 10 }),
            Response::Error(PlayerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_dispatch_load_and_play() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"fake media").unwrap();

        let mut player = player();
        let response = dispatch(
            &mut player,
            Command::PlayPath {
                path: path.to_string_lossy().to_string(),
                options: String::new(),
                stretch: false,
            },
        );
        assert_eq!(response, Response::Ok);
        assert_eq!(
            dispatch(&mut player, Command::IsPlaying),
            Response::Bool(true)
        );
        assert_eq!(
            dispatch(&mut player, Command::GetTotalTime),
            Response::Number(10.0)
        );
    }

    #[tokio::test]
    async fn test_service_round_trip() {
        let state = Arc::new(Mutex::new(DaemonState::new()));
        let (handle, rx) = PlayerHandle::channel();
        let service = tokio::spawn(run(
            player(),
            rx,
            state.clone(),
            Duration::from_millis(10),
        ));

        let response = handle
            .request(Command::SetVolume { volume: 0.25 })
            .await
            .unwrap();
        assert_eq!(response, Response::Ok);
        assert_eq!(
            handle.request(Command::GetVolume).await.unwrap(),
            Response::Number(0.25)
        );

        match handle.request(Command::Query).await.unwrap() {
            Response::Status(status) => {
                assert_eq!(status.backend, "headless");
                assert_eq!(status.session.volume, 0.25);
            }
            other => panic!("Unexpected response: {:?}", other),
        }

        assert_eq!(handle.request(Command::Kill).await.unwrap(), Response::Ok);
        service.await.unwrap().unwrap();
        assert!(state.lock().await.should_exit);

        // The service is gone
        assert!(handle.request(Command::Ping).await.is_err());
    }

    #[tokio::test]
    async fn test_service_survives_out_of_range_arguments() {
        let state = Arc::new(Mutex::new(DaemonState::new()));
        let (handle, rx) = PlayerHandle::channel();
        let service = tokio::spawn(run(
            player(),
            rx,
            state.clone(),
            Duration::from_millis(10),
        ));

        let response = handle
            .request(Command::SetFadeSpeed { seconds: 1e20 })
            .await
            .unwrap();
        assert!(matches!(
            response,
            Response::Error(PlayerError::InvalidArgument(_))
        ));

        let response = handle
            .request(Command::SetLocation { x: 0, y: i32::MIN })
            .await
            .unwrap();
        assert_eq!(response, Response::Ok);

        assert_eq!(handle.request(Command::Ping).await.unwrap(), Response::Pong);
        assert_eq!(handle.request(Command::Kill).await.unwrap(), Response::Ok);
        service.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_service_stops_when_handles_dropped() {
        let state = Arc::new(Mutex::new(DaemonState::new()));
        let (handle, rx) = PlayerHandle::channel();
        let service = tokio::spawn(run(player(), rx, state, Duration::from_millis(10)));

        drop(handle);
        service.await.unwrap().unwrap();
    }
}
