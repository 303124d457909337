use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use common::{Command, Response};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(name = "vidctl")]
#[command(about = "Video Player Daemon Control", long_about = None)]
#[command(version)]
struct Cli {
    /// Daemon socket (defaults to $XDG_RUNTIME_DIR/vidd.sock)
    #[arg(long, env = "VIDD_SOCKET", global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a video without starting playback
    Load {
        /// File path or URL
        path: String,

        /// Start playing right away
        #[arg(short, long)]
        play: bool,

        /// Fill the surface, ignoring the aspect ratio
        #[arg(short, long)]
        stretch: bool,

        /// Load options (accepted, currently without effect)
        #[arg(short, long, default_value = "")]
        options: String,
    },

    /// Start or resume playback
    Play,

    /// Pause playback
    Pause,

    /// Stop playback
    Stop,

    /// Loop the video at its end
    Repeat {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },

    /// Mute or unmute audio
    Mute {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },

    /// Set the volume (0.0-1.0)
    Volume { volume: f64 },

    /// Seek to a fraction of the video (0.0-1.0)
    Progress { percent: f64 },

    /// Set the hue rotation
    Hue {
        /// Radians, or a 0.0-1.0 slider value with --unit
        #[arg(allow_hyphen_values = true)]
        hue: f64,

        /// Interpret the value as a slider position
        #[arg(short, long)]
        unit: bool,
    },

    /// Move the video surface (top-left origin)
    Location {
        #[arg(allow_hyphen_values = true)]
        x: i32,
        #[arg(allow_hyphen_values = true)]
        y: i32,
    },

    /// Resize the video surface
    Size { width: i32, height: i32 },

    /// Show or hide the video surface
    Visible {
        #[arg(action = clap::ArgAction::Set)]
        visible: bool,
    },

    /// Fade the video in
    FadeUp,

    /// Fade the video out and stop
    FadeDown,

    /// Set the fade duration in seconds
    FadeSpeed { seconds: f64 },

    /// Set the stretch mode
    Stretch {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },

    /// Set the options of the next load
    Options {
        #[arg(allow_hyphen_values = true)]
        options: String,
    },

    /// Read a single player property
    Get {
        #[arg(value_enum)]
        property: Property,
    },

    /// Query daemon status
    Status,

    /// Ping the daemon
    Ping,

    /// Stop playback and shut the daemon down
    Kill,
}

#[derive(Clone, Copy, ValueEnum)]
enum Property {
    Init,
    Playing,
    Paused,
    Finished,
    Mute,
    Volume,
    Progress,
    Hue,
    Location,
    CurrentTime,
    TotalTime,
}

impl Property {
    fn command(self) -> Command {
        match self {
            Self::Init => Command::IsInit,
            Self::Playing => Command::IsPlaying,
            Self::Paused => Command::IsPaused,
            Self::Finished => Command::IsFinished,
            Self::Mute => Command::IsMute,
            Self::Volume => Command::GetVolume,
            Self::Progress => Command::GetProgress,
            Self::Hue => Command::GetHue,
            Self::Location => Command::GetLastLocation,
            Self::CurrentTime => Command::GetCurrentTime,
            Self::TotalTime => Command::GetTotalTime,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ClientError {
    #[error("Daemon closed the connection without responding")]
    ConnectionClosed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Load {
            path,
            play,
            stretch,
            options,
        } => {
            if play {
                Command::PlayPath {
                    path,
                    options,
                    stretch,
                }
            } else {
                Command::LoadVideo {
                    path,
                    options,
                    stretch,
                }
            }
        }
        Commands::Play => Command::Play,
        Commands::Pause => Command::Pause,
        Commands::Stop => Command::Stop,
        Commands::Repeat { enabled } => Command::SetRepeat { repeat: enabled },
        Commands::Mute { enabled } => Command::SetMute { mute: enabled },
        Commands::Volume { volume } => Command::SetVolume { volume },
        Commands::Progress { percent } => Command::SetProgress { percent },
        Commands::Hue { hue, unit } => {
            let hue = if unit { common::hue_from_unit(hue) } else { hue };
            Command::SetHue { hue }
        }
        Commands::Location { x, y } => Command::SetLocation { x, y },
        Commands::Size { width, height } => Command::SetSize { width, height },
        Commands::Visible { visible } => Command::SetVisible { visible },
        Commands::FadeUp => Command::FadeUp,
        Commands::FadeDown => Command::FadeDown,
        Commands::FadeSpeed { seconds } => Command::SetFadeSpeed { seconds },
        Commands::Stretch { enabled } => Command::SetStretch { stretch: enabled },
        Commands::Options { options } => Command::SetOptions { options },
        Commands::Get { property } => property.command(),
        Commands::Status => Command::Query,
        Commands::Ping => Command::Ping,
        Commands::Kill => Command::Kill,
    };

    let socket_path = cli.socket.unwrap_or_else(common::get_socket_path);

    match send_command(&socket_path, command).await {
        Ok(response) => {
            handle_response(response);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("\nIs the daemon running? Try starting it with: vidd");
            std::process::exit(1);
        }
    }
}

async fn send_command(socket_path: &Path, command: Command) -> Result<Response> {
    let stream = UnixStream::connect(socket_path).await?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    // Send command
    let command_json = serde_json::to_string(&command)?;
    writer.write_all(command_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    // Read response
    let mut response_line = String::new();
    if reader.read_line(&mut response_line).await? == 0 {
        return Err(ClientError::ConnectionClosed.into());
    }

    let response: Response = serde_json::from_str(&response_line)?;
    Ok(response)
}

fn handle_response(response: Response) {
    match response {
        Response::Ok => {
            println!("✓ Success");
        }
        Response::Error(e) => {
            eprintln!("✗ Error: {}", e);
            std::process::exit(1);
        }
        Response::Bool(value) => {
            println!("{}", value);
        }
        Response::Number(value) => {
            println!("{:.3}", value);
        }
        Response::Text(text) => {
            if text.is_empty() {
                println!("(none)");
            } else {
                println!("{}", text);
            }
        }
        Response::Status(status) => {
            let session = status.session;
            println!("Daemon Status:");
            println!("  Version: {}", status.version);
            println!("  Uptime: {}s", status.uptime_secs);
            println!("  Backend: {}", status.backend);
            println!("Session:");
            println!("  Initialized: {}", session.initialized);
            println!("  State: {}", session.state.name());
            if !session.last_played_file.is_empty() {
                println!("  Media: {}", session.last_played_file);
            }
            if let Some(loaded_at) = session.loaded_at {
                println!("  Loaded at: {}", loaded_at);
            }
            println!(
                "  Position: {:.1}s / {:.1}s",
                session.current_time, session.duration
            );
            println!(
                "  Volume: {:.2}{}",
                session.volume,
                if session.muted { " (muted)" } else { "" }
            );
            println!("  Hue: {:.3} rad", session.hue);
            println!(
                "  Surface: {}x{} at ({}, {}){}",
                session.width,
                session.height,
                session.x,
                session.y,
                if session.visible { "" } else { " (hidden)" }
            );
            println!("  Opacity: {:.2}", session.opacity);
            println!(
                "  Repeat: {}, Stretch: {}",
                if session.repeat { "yes" } else { "no" },
                if session.stretch { "yes" } else { "no" }
            );
        }
        Response::Pong => {
            println!("✓ Daemon is running");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_hue_unit_conversion() {
        let cli = Cli::try_parse_from(["vidctl", "hue", "--unit", "0.75"]).unwrap();
        match cli.command {
            Commands::Hue { hue, unit } => {
                assert!(unit);
                assert!((common::hue_from_unit(hue) - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
            }
            _ => panic!("Wrong command"),
        }
    }

    #[test]
    fn test_negative_location() {
        let cli = Cli::try_parse_from(["vidctl", "location", "-1920", "40"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Location { x: -1920, y: 40 }
        ));
    }

    #[test]
    fn test_get_property() {
        let cli = Cli::try_parse_from(["vidctl", "get", "current-time"]).unwrap();
        match cli.command {
            Commands::Get { property } => {
                assert_eq!(property.command(), Command::GetCurrentTime);
            }
            _ => panic!("Wrong command"),
        }
    }
}
