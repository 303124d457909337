//! C ABI for in-process hosts.
//!
//! A host that links `libvidd_lib` directly (a JNI shim, for instance) calls
//! `vidd_init` once and then the `vidd_*` functions, one per player
//! operation. The facade lives in a process-global mutex and a background
//! thread ticks it, so backend events and fades progress between calls.
//!
//! Fallible calls return a status code:
//!
//! | code | meaning |
//! |---|---|
//! | 0 | ok |
//! | 1 | not initialized |
//! | 2 | invalid argument |
//! | 3 | invalid state |
//! | 4 | backend failure |
//! | 5 | internal error (panic, poisoned state) |
//!
//! Queries return plain values and fall back to `false` / `0.0` before
//! `vidd_init`. No panic unwinds into the host. Strings handed to the host
//! must be released with [`vidd_string_free`].

use common::PlayerError;
use std::ffi::{CStr, CString, c_char};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::Config;
use crate::player::PlayerFacade;

pub const VIDD_OK: i32 = 0;
pub const VIDD_NOT_INITIALIZED: i32 = 1;
pub const VIDD_INVALID_ARGUMENT: i32 = 2;
pub const VIDD_INVALID_STATE: i32 = 3;
pub const VIDD_BACKEND: i32 = 4;
pub const VIDD_INTERNAL: i32 = 5;

static PLAYER: OnceLock<Mutex<PlayerFacade>> = OnceLock::new();
static TICKER: Mutex<Option<Ticker>> = Mutex::new(None);
static LIVE_TICKERS: AtomicUsize = AtomicUsize::new(0);

/// Background thread ticking the global player
struct Ticker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

fn status_code(error: &PlayerError) -> i32 {
    match error {
        PlayerError::NotInitialized(_) => VIDD_NOT_INITIALIZED,
        PlayerError::InvalidArgument(_) => VIDD_INVALID_ARGUMENT,
        PlayerError::InvalidState(_) => VIDD_INVALID_STATE,
        PlayerError::Backend(_) => VIDD_BACKEND,
        PlayerError::Io(_) | PlayerError::Ipc(_) => VIDD_INTERNAL,
    }
}

fn lock(player: &Mutex<PlayerFacade>) -> MutexGuard<'_, PlayerFacade> {
    player.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `f` on the global player, `fallback` before init or on panic
fn with_player<T>(fallback: T, f: impl FnOnce(&mut PlayerFacade) -> T) -> T {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        PLAYER.get().map(|player| f(&mut lock(player)))
    }));

    match result {
        Ok(Some(value)) => value,
        Ok(None) => fallback,
        Err(_) => {
            log::error!("Player call panicked");
            fallback
        }
    }
}

/// Run a fallible operation and turn its outcome into a status code
fn call(f: impl FnOnce(&mut PlayerFacade) -> Result<(), PlayerError>) -> i32 {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        PLAYER.get().map(|player| f(&mut lock(player)))
    }));

    match result {
        Ok(Some(Ok(()))) => VIDD_OK,
        Ok(Some(Err(e))) => {
            log::debug!("Player call failed: {}", e);
            status_code(&e)
        }
        Ok(None) => VIDD_NOT_INITIALIZED,
        Err(_) => {
            log::error!("Player call panicked");
            VIDD_INTERNAL
        }
    }
}

/// Borrow a host string; `None` for NULL or invalid UTF-8
///
/// # Safety
///
/// `ptr` must be NULL or point to a NUL-terminated string.
unsafe fn string_arg(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .ok()
        .map(str::to_owned)
}

fn into_host_string(s: String) -> *mut c_char {
    CString::new(s.replace('\0', ""))
        .unwrap_or_default()
        .into_raw()
}

fn start_ticker(interval: Duration) {
    let mut ticker = TICKER.lock().unwrap_or_else(PoisonError::into_inner);
    if ticker.as_ref().is_some_and(|t| !t.handle.is_finished()) {
        return;
    }

    // Each thread watches its own flag, a restart never revives an old one
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    let spawned = std::thread::Builder::new()
        .name("vidd-ticker".to_string())
        .spawn(move || {
            let live = LIVE_TICKERS.fetch_add(1, Ordering::SeqCst) + 1;
            log::debug!("Ticker started ({}ms, {} live)", interval.as_millis(), live);
            while flag.load(Ordering::SeqCst) {
                std::thread::sleep(interval);
                with_player((), |player| player.tick());
            }
            LIVE_TICKERS.fetch_sub(1, Ordering::SeqCst);
            log::debug!("Ticker stopped");
        });

    match spawned {
        Ok(handle) => *ticker = Some(Ticker { running, handle }),
        Err(e) => log::error!("Failed to start ticker thread: {}", e),
    }
}

/// Signal the ticker thread and wait for it to exit
fn stop_ticker() {
    let ticker = TICKER
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();

    if let Some(Ticker { running, handle }) = ticker {
        running.store(false, Ordering::SeqCst);
        if handle.join().is_err() {
            log::error!("Ticker thread panicked");
        }
    }
}

/// Create the player. Safe to call more than once.
///
/// `config_path` may be NULL for the default config location. A missing or
/// invalid config falls back to defaults.
///
/// # Safety
///
/// `config_path` must be NULL or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vidd_init(config_path: *const c_char) -> i32 {
    let path = unsafe { string_arg(config_path) };

    let result = panic::catch_unwind(|| {
        let loaded = match &path {
            Some(path) => Config::load_from_path(Path::new(path)),
            None => Config::load(),
        };

        let level = loaded
            .as_ref()
            .map(|cfg| cfg.general.log_level.clone())
            .unwrap_or_else(|_| "info".to_string());
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
            .try_init();

        let config = loaded.unwrap_or_else(|e| {
            log::warn!("Failed to load config: {:#}. Using defaults.", e);
            Config::default()
        });

        if PLAYER.get().is_none() {
            let _ = PLAYER.set(Mutex::new(PlayerFacade::from_config(&config)));
            log::info!("Player created for in-process host");
        }
        start_ticker(config.tick_interval());
    });

    match result {
        Ok(()) => VIDD_OK,
        Err(_) => VIDD_INTERNAL,
    }
}

/// Stop playback and the ticker thread
#[unsafe(no_mangle)]
pub extern "C" fn vidd_shutdown() {
    stop_ticker();
    let code = call(|player| player.stop());
    if code != VIDD_OK && code != VIDD_NOT_INITIALIZED {
        log::warn!("Stop on shutdown returned {}", code);
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_is_init() -> bool {
    with_player(false, |player| player.is_init())
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_fade_up() -> i32 {
    call(|player| {
        player.fade_up();
        Ok(())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_fade_down() -> i32 {
    call(|player| {
        player.fade_down();
        Ok(())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_set_repeat(repeat: bool) -> i32 {
    call(|player| {
        player.set_repeat(repeat);
        Ok(())
    })
}

/// Load media without playing it
///
/// # Safety
///
/// `path` must point to a NUL-terminated string, `options` must be NULL or
/// point to one.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vidd_load_vid(
    path: *const c_char,
    options: *const c_char,
    stretch: bool,
) -> i32 {
    let Some(path) = (unsafe { string_arg(path) }) else {
        return VIDD_INVALID_ARGUMENT;
    };
    let options = unsafe { string_arg(options) }.unwrap_or_default();
    call(|player| player.load_vid(&path, &options, stretch))
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_play() -> i32 {
    call(|player| player.play())
}

/// Load media and play it
///
/// # Safety
///
/// Same as [`vidd_load_vid`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vidd_play_path(
    path: *const c_char,
    options: *const c_char,
    stretch: bool,
) -> i32 {
    let Some(path) = (unsafe { string_arg(path) }) else {
        return VIDD_INVALID_ARGUMENT;
    };
    let options = unsafe { string_arg(options) }.unwrap_or_default();
    call(|player| player.play_path(&path, &options, stretch))
}

/// Location of the last loaded media, free with [`vidd_string_free`]
#[unsafe(no_mangle)]
pub extern "C" fn vidd_last_location() -> *mut c_char {
    into_host_string(with_player(String::new(), |player| player.last_location()))
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_pause() -> i32 {
    call(|player| player.pause_video())
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_stop() -> i32 {
    call(|player| player.stop())
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_is_mute() -> bool {
    with_player(false, |player| player.is_mute())
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_set_mute(mute: bool) -> i32 {
    call(|player| player.set_mute(mute))
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_progress_percent() -> f64 {
    with_player(0.0, |player| player.progress_percent())
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_set_progress_percent(percent: f64) -> i32 {
    call(|player| player.set_progress_percent(percent))
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_is_playing() -> bool {
    with_player(false, |player| player.is_playing())
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_is_paused() -> bool {
    with_player(false, |player| player.is_paused())
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_is_finished() -> bool {
    with_player(false, |player| player.is_finished())
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_set_visible(visible: bool) -> i32 {
    call(|player| player.set_visible(visible))
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_set_volume(volume: f64) -> i32 {
    call(|player| player.set_volume(volume))
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_volume() -> f64 {
    with_player(0.0, |player| player.volume())
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_set_location(x: i32, y: i32) -> i32 {
    call(|player| player.set_location(x, y))
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_set_size(width: i32, height: i32) -> i32 {
    call(|player| player.set_size(width, height))
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_set_hue(hue: f64) -> i32 {
    call(|player| player.set_hue(hue))
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_hue() -> f64 {
    with_player(0.0, |player| player.hue())
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_set_fade_speed(seconds: f64) -> i32 {
    call(|player| player.set_fade_speed(seconds))
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_set_stretch(stretch: bool) -> i32 {
    call(|player| player.set_stretch(stretch))
}

/// Replace the options of the next load
///
/// # Safety
///
/// `options` must be NULL or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vidd_set_options(options: *const c_char) -> i32 {
    let options = unsafe { string_arg(options) }.unwrap_or_default();
    call(|player| {
        player.set_options(&options);
        Ok(())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_current_time() -> f64 {
    with_player(0.0, |player| player.current_time())
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_total_time() -> f64 {
    with_player(0.0, |player| player.total_time())
}

#[unsafe(no_mangle)]
pub extern "C" fn vidd_did_stop() -> bool {
    with_player(false, |player| player.did_stop())
}

/// Session snapshot as JSON, free with [`vidd_string_free`]. NULL before init.
#[unsafe(no_mangle)]
pub extern "C" fn vidd_status_json() -> *mut c_char {
    let json = with_player(None, |player| serde_json::to_string(&player.snapshot()).ok());
    match json {
        Some(json) => into_host_string(json),
        None => std::ptr::null_mut(),
    }
}

/// Release a string returned by this library
///
/// # Safety
///
/// `ptr` must be NULL or a pointer returned by a `vidd_*` function that has
/// not been freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vidd_string_free(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(ptr) });
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{SessionStatus, TransportState};

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().to_string();
        unsafe { vidd_string_free(ptr) };
        s
    }

    // One test drives the process-global player end to end
    #[test]
    fn test_c_abi_session() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            "[backend]\nkind = \"headless\"\nheadless_duration_secs = 120.0\n",
        )
        .unwrap();
        let media = dir.path().join("sample.mp4");
        std::fs::write(&media, b"fake media").unwrap();

        // Nothing works before init
        assert!(!vidd_is_init());
        assert_eq!(vidd_play(), VIDD_NOT_INITIALIZED);
        assert!(vidd_status_json().is_null());

        let config = CString::new(config_path.to_str().unwrap()).unwrap();
        assert_eq!(unsafe { vidd_init(config.as_ptr()) }, VIDD_OK);
        assert_eq!(unsafe { vidd_init(config.as_ptr()) }, VIDD_OK);
        assert!(vidd_is_init());

        assert_eq!(vidd_play(), VIDD_INVALID_STATE);
        assert_eq!(
            unsafe { vidd_load_vid(std::ptr::null(), std::ptr::null(), false) },
            VIDD_INVALID_ARGUMENT
        );

        let path = CString::new(media.to_str().unwrap()).unwrap();
        assert_eq!(
            unsafe { vidd_play_path(path.as_ptr(), std::ptr::null(), false) },
            VIDD_OK
        );
        assert!(vidd_is_playing());
        assert!(!vidd_is_paused());
        assert_eq!(vidd_total_time(), 120.0);

        assert_eq!(vidd_set_volume(f64::NAN), VIDD_INVALID_ARGUMENT);
        assert_eq!(vidd_set_volume(2.0), VIDD_OK);
        assert_eq!(vidd_volume(), 1.0);
        assert_eq!(vidd_set_size(0, 10), VIDD_INVALID_ARGUMENT);

        assert_eq!(vidd_set_progress_percent(0.5), VIDD_OK);
        assert_eq!(vidd_pause(), VIDD_OK);
        assert!(vidd_is_paused());
        assert!((vidd_progress_percent() - 0.5).abs() < 0.01);

        let status: SessionStatus =
            serde_json::from_str(&unsafe { take_string(vidd_status_json()) }).unwrap();
        assert_eq!(status.state, TransportState::Paused);

        assert_eq!(vidd_stop(), VIDD_OK);
        assert!(vidd_did_stop());
        assert!(!vidd_is_playing());
        assert_eq!(
            unsafe { take_string(vidd_last_location()) },
            media.to_str().unwrap()
        );

        let missing = CString::new(dir.path().join("gone.mp4").to_str().unwrap()).unwrap();
        assert_eq!(
            unsafe { vidd_load_vid(missing.as_ptr(), std::ptr::null(), false) },
            VIDD_NOT_INITIALIZED
        );
        assert!(!vidd_is_init());

        vidd_shutdown();
        assert_eq!(LIVE_TICKERS.load(Ordering::SeqCst), 0);

        // Init after shutdown runs exactly one fresh ticker
        assert_eq!(unsafe { vidd_init(config.as_ptr()) }, VIDD_OK);
        assert_eq!(unsafe { vidd_init(config.as_ptr()) }, VIDD_OK);
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(LIVE_TICKERS.load(Ordering::SeqCst), 1);

        vidd_shutdown();
        assert_eq!(LIVE_TICKERS.load(Ordering::SeqCst), 0);
        unsafe { vidd_string_free(std::ptr::null_mut()) };
    }
}
