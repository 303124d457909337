//! vidd: a host-controlled video player.
//!
//! The [`player::PlayerFacade`] owns the one media session and drives a
//! native [`backend::MediaBackend`]. Hosts reach it either out of process,
//! through the JSON-lines socket served by [`ipc_server`] and the
//! single-writer [`service`], or in process through the C ABI in [`ffi`].

pub mod backend;
pub mod config;
pub mod ffi;
pub mod geometry;
pub mod ipc_server;
pub mod macros;
pub mod options;
pub mod player;
pub mod service;

/// Shared daemon state
pub struct DaemonState {
    pub should_exit: bool,
    pub start_time: std::time::Instant,
}

impl DaemonState {
    pub fn new() -> Self {
        Self {
            should_exit: false,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for DaemonState {
    fn default() -> Self {
        Self::new()
    }
}
