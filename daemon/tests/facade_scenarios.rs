/// End-to-end player scenarios driven through the facade with the headless
/// backend, the way a host drives a real session
use common::{PlayerError, TransportState};
use std::path::PathBuf;
use std::time::Duration;

use vidd_lib::backend::{HeadlessBackend, HeadlessHandle};
use vidd_lib::config::Config;
use vidd_lib::geometry::Origin;
use vidd_lib::player::PlayerFacade;

struct Fixture {
    player: PlayerFacade,
    clock: HeadlessHandle,
    media: PathBuf,
    _dir: tempfile::TempDir,
}

fn fixture(duration: Duration) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let media = dir.path().join("sample.mp4");
    std::fs::write(&media, b"fake media").unwrap();

    let backend = HeadlessBackend::new(duration);
    let clock = backend.handle();
    let player = PlayerFacade::new(Some(Box::new(backend)), &Config::default());

    Fixture {
        player,
        clock,
        media,
        _dir: dir,
    }
}

fn assert_exclusive(player: &mut PlayerFacade) {
    assert!(
        !(player.is_playing() && player.is_paused()),
        "playing and paused at the same time"
    );
}

#[test]
fn test_load_play_seek_pause_stop() {
    let Fixture {
        mut player,
        clock,
        media,
        _dir,
    } = fixture(Duration::from_secs(120));
    let path = media.to_str().unwrap();

    player.load_vid(path, "", false).unwrap();
    assert!(player.is_init());
    assert_exclusive(&mut player);

    player.play().unwrap();
    assert!(player.is_playing());
    assert_exclusive(&mut player);

    clock.advance(Duration::from_secs(5));
    player.set_progress_percent(0.5).unwrap();
    assert!((player.progress_percent() - 0.5).abs() < 1e-6);
    assert!((player.current_time() - 60.0).abs() < 1e-6);

    player.pause_video().unwrap();
    assert!(player.is_paused());
    assert!(!player.is_playing());
    assert_exclusive(&mut player);

    // Paused time does not move
    clock.advance(Duration::from_secs(10));
    assert!((player.current_time() - 60.0).abs() < 1e-6);

    player.stop().unwrap();
    assert!(!player.is_playing());
    assert!(!player.is_paused());
    assert!(player.did_stop());
    assert_exclusive(&mut player);

    assert_eq!(player.last_location(), path);
}

#[test]
fn test_repeat_loops_after_finish() {
    let Fixture {
        mut player,
        clock,
        media,
        _dir,
    } = fixture(Duration::from_secs(30));

    player.set_repeat(true);
    player
        .play_path(media.to_str().unwrap(), "", false)
        .unwrap();

    clock.advance(Duration::from_secs(30));
    assert!(player.is_finished());
    assert!(!player.is_playing());
    assert_exclusive(&mut player);

    player.tick();
    assert!(player.is_playing());
    assert!(!player.is_finished());
    assert_eq!(player.current_time(), 0.0);

    // And again on the next pass
    clock.advance(Duration::from_secs(31));
    player.tick();
    assert!(player.is_finished());
    player.tick();
    assert!(player.is_playing());
}

#[test]
fn test_unreadable_path() {
    let Fixture {
        mut player, _dir, ..
    } = fixture(Duration::from_secs(30));

    let missing = _dir.path().join("does-not-exist.mp4");
    let result = player.load_vid(missing.to_str().unwrap(), "", false);

    assert!(matches!(result, Err(PlayerError::NotInitialized(_))));
    assert!(!player.is_init());
    assert!(!player.is_playing());
    assert_eq!(player.snapshot().state, TransportState::Uninitialized);
}

#[test]
fn test_unsupported_format() {
    let Fixture {
        mut player, _dir, ..
    } = fixture(Duration::from_secs(30));

    let notes = _dir.path().join("notes.txt");
    std::fs::write(&notes, b"hello").unwrap();

    assert!(player.play_path(notes.to_str().unwrap(), "", false).is_err());
    assert!(!player.is_init());
}

#[test]
fn test_volume_always_clamped() {
    let Fixture { mut player, .. } = fixture(Duration::from_secs(30));

    for (input, expected) in [(0.5, 0.5), (1.5, 1.0), (-0.1, 0.0), (0.0, 0.0), (1.0, 1.0)] {
        player.set_volume(input).unwrap();
        assert_eq!(player.volume(), expected, "input {}", input);
    }

    assert!(player.set_volume(f64::NAN).is_err());
    assert_eq!(player.volume(), 1.0);
}

#[test]
fn test_extreme_arguments_are_handled() {
    let backend = HeadlessBackend::new(Duration::from_secs(30)).with_origin(Origin::BottomLeft);
    let clock = backend.handle();
    let mut player = PlayerFacade::new(Some(Box::new(backend)), &Config::default());

    assert!(matches!(
        player.set_fade_speed(1e20),
        Err(PlayerError::InvalidArgument(_))
    ));
    assert!(matches!(
        player.set_fade_speed(f64::MAX),
        Err(PlayerError::InvalidArgument(_))
    ));

    for (x, y) in [(0, i32::MIN), (i32::MIN, i32::MAX), (i32::MAX, 0)] {
        player.set_location(x, y).unwrap();
        assert!(clock.geometry().is_some());
    }
    player.set_location(0, i32::MIN).unwrap();
    assert_eq!(clock.geometry().map(|rect| rect.y), Some(i32::MAX));

    // 1080 - i32::MIN - i32::MAX fits again
    player.set_size(i32::MAX, i32::MAX).unwrap();
    assert_eq!(clock.geometry().map(|rect| rect.y), Some(1081));
}

#[test]
fn test_reload_replaces_active_playback() {
    let Fixture {
        mut player,
        clock,
        media,
        _dir,
    } = fixture(Duration::from_secs(30));

    let second = _dir.path().join("second.mkv");
    std::fs::write(&second, b"fake media").unwrap();

    player
        .play_path(media.to_str().unwrap(), "", false)
        .unwrap();
    clock.advance(Duration::from_secs(12));

    player
        .load_vid(second.to_str().unwrap(), "", true)
        .unwrap();
    assert!(!player.is_playing());
    assert_eq!(player.current_time(), 0.0);
    assert_eq!(player.last_location(), second.to_str().unwrap());
    assert!(player.snapshot().stretch);
    assert_eq!(clock.surfaces_created(), 1);
}
