// Accept loop module
// Accepts connections until shutdown is signaled, then drains in-flight work

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use super::signal::ShutdownSignal;
use crate::config::AppState;
use crate::logger;

/// How long in-flight connections get to finish after shutdown is requested
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Run the accept loop until the shutdown signal fires.
///
/// Each accepted connection is handed off to its own task; the loop itself
/// never blocks on request processing. On shutdown the listener is dropped
/// first so no new connections arrive while the drain runs.
pub async fn run_accept_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    active_connections: Arc<AtomicUsize>,
    shutdown: &ShutdownSignal,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            () = shutdown.notified() => {
                logger::log_shutdown_started();
                break;
            }
        }
    }

    drop(listener);
    drain_connections(&active_connections, SHUTDOWN_GRACE).await;
    logger::log_shutdown_complete();

    Ok(())
}

/// Wait for active connections to finish, up to the grace period
async fn drain_connections(active_connections: &AtomicUsize, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;

    loop {
        let remaining = active_connections.load(Ordering::SeqCst);
        if remaining == 0 {
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "Shutdown grace period elapsed with {remaining} connections still active"
            ));
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handler::Router;
    use crate::server::create_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn serves_requests_end_to_end() {
        let root = std::env::temp_dir().join(format!("distserv-e2e-{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("index.html"), b"bundle").unwrap();

        let mut cfg = Config::load_from("no-such-config-file").unwrap();
        cfg.resources.root_dir = root.to_str().unwrap().to_string();
        cfg.logging.access_log = false;
        let router = Router::from_config(&cfg);
        let state = Arc::new(AppState::new(cfg, router));

        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();

        let shutdown = ShutdownSignal::new();
        let loop_shutdown = shutdown.clone();
        let loop_state = Arc::clone(&state);
        let server = tokio::spawn(async move {
            let _ = run_accept_loop(
                listener,
                loop_state,
                Arc::new(AtomicUsize::new(0)),
                &loop_shutdown,
            )
            .await;
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();

        let text = String::from_utf8_lossy(&response);
        assert!(text.starts_with("HTTP/1.1 200 OK"), "got: {text}");
        assert!(text.ends_with("bundle"), "got: {text}");

        shutdown.trigger();
        server.await.unwrap();
        std::fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn drain_returns_once_counter_reaches_zero() {
        let active = Arc::new(AtomicUsize::new(1));
        let counter = Arc::clone(&active);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            counter.fetch_sub(1, Ordering::SeqCst);
        });

        drain_connections(&active, Duration::from_secs(2)).await;
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn drain_gives_up_after_grace_period() {
        let active = Arc::new(AtomicUsize::new(3));
        drain_connections(&active, Duration::from_millis(120)).await;
        // Still active: the drain must not wait forever
        assert_eq!(active.load(Ordering::SeqCst), 3);
    }
}
