//! OS signal handling.
//!
//! # Responsibilities
//! - Translate SIGTERM/SIGINT into a shutdown request
//! - Translate SIGHUP into a schema reload request
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Non-unix targets only see Ctrl-C

use std::io;

/// What the host process was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Reload,
}

/// Listens for process signals for the lifetime of the daemon.
#[cfg(unix)]
pub struct SignalListener {
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalListener {
    pub fn new() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    /// Wait for the next signal of interest.
    pub async fn recv(&mut self) -> Signal {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => Signal::Shutdown,
            _ = self.terminate.recv() => Signal::Shutdown,
            _ = self.hangup.recv() => {
                tracing::info!("SIGHUP received, reloading schemas");
                Signal::Reload
            }
        }
    }
}

#[cfg(not(unix))]
pub struct SignalListener;

#[cfg(not(unix))]
impl SignalListener {
    pub fn new() -> io::Result<Self> {
        Ok(Self)
    }

    pub async fn recv(&mut self) -> Signal {
        let _ = tokio::signal::ctrl_c().await;
        Signal::Shutdown
    }
}
