use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

mod config;
mod handler;
mod http;
mod logger;
mod server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::Config::load()?;
    logger::init(&cfg)?;

    // Build the Tokio runtime, sizing the thread pool from the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.socket_addr()?;
    let listener = server::create_listener(addr)?;

    // The router is built once here and handed to the accept loop; nothing
    // registers handlers behind the startup path's back.
    let router = handler::Router::from_config(&cfg);
    let state = Arc::new(config::AppState::new(cfg, router));
    let active_connections = Arc::new(AtomicUsize::new(0));

    let shutdown = server::signal::ShutdownSignal::new();
    server::signal::spawn_signal_listener(&shutdown);

    logger::log_server_start(&addr, &state.config);

    server::run_accept_loop(listener, state, active_connections, &shutdown).await
}
