// Signal handling module
//
// SIGTERM and SIGINT both trigger graceful shutdown; on non-Unix targets
// Ctrl+C does the same.

use std::sync::Arc;
use tokio::sync::Notify;

/// Shutdown signal shared between the signal listener and the accept loop
///
/// Built on `Notify` with `notify_one` semantics, so a signal arriving while
/// the accept loop is busy with a connection is not lost.
#[derive(Clone)]
pub struct ShutdownSignal {
    notify: Arc<Notify>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            notify: Arc::new(Notify::new()),
        }
    }

    /// Request shutdown
    pub fn trigger(&self) {
        self.notify.notify_one();
    }

    /// Wait until shutdown is requested
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the background task that maps process signals onto the shutdown
/// signal (Unix)
#[cfg(unix)]
pub fn spawn_signal_listener(shutdown: &ShutdownSignal) {
    use tokio::signal::unix::{signal, SignalKind};

    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => println!("\n[SIGNAL] SIGTERM received, shutting down"),
            _ = sigint.recv() => println!("\n[SIGNAL] SIGINT received (Ctrl+C), shutting down"),
        }

        shutdown.trigger();
    });
}

/// Start the background task that maps Ctrl+C onto the shutdown signal
#[cfg(not(unix))]
pub fn spawn_signal_listener(shutdown: &ShutdownSignal) {
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n[SIGNAL] Ctrl+C received, shutting down");
            shutdown.trigger();
        }
    });
}
