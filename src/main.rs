//! Wordchain Game Server
//!
//! Serves a single word-chain room to browser clients over WebSocket, with an
//! optional read-only HTTP status API.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use wordchain_server::api;
use wordchain_server::config::{LogFormat, ServerConfig};
use wordchain_server::net::handler::ConnectionHandler;
use wordchain_server::state::AppState;
use wordchain_server::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load configuration; logging depends on it, so it is set up after
    let config = ServerConfig::load().await?;

    init_logging(config.log_format);

    info!(version = VERSION, "Wordchain server starting");
    if config.from_file {
        info!("Configuration loaded from: {}", config.config_path.display());
    } else {
        warn!("Config file not found at {}, using defaults", config.config_path.display());
    }

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let dictionary = AppState::load_dictionary(&config).await?;
    let (state, dispatcher) = AppState::new(config.clone(), dictionary, shutdown_tx.clone());
    let state = Arc::new(state);
    info!("Application state initialized");

    // Start the game dispatcher
    let mut dispatcher_shutdown_rx = shutdown_tx.subscribe();
    let dispatcher_handle = tokio::spawn(async move {
        dispatcher.run(&mut dispatcher_shutdown_rx).await;
    });

    // Start WebSocket listener
    let ws_listener = TcpListener::bind(config.websocket_addr()).await?;
    info!("WebSocket server listening on: ws://{}", ws_listener.local_addr()?);

    let ws_state = state.clone();
    let mut ws_shutdown_rx = shutdown_tx.subscribe();
    let ws_handle = tokio::spawn(async move {
        accept_websocket_connections(ws_listener, ws_state, &mut ws_shutdown_rx).await;
    });

    // Start HTTP API server if enabled
    let api_handle = if config.api_enabled {
        let api_listener = TcpListener::bind(config.api_addr()).await?;
        info!("Status API listening on: http://{}", api_listener.local_addr()?);

        let api_state = state.clone();
        let api_shutdown_rx = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            run_api_server(api_listener, api_state, api_shutdown_rx).await;
        }))
    } else {
        warn!("Status API disabled");
        None
    };

    info!("Server startup complete, waiting for players");

    wait_for_shutdown(shutdown_tx.clone()).await;

    info!("Shutting down server...");

    let _ = ws_handle.await;
    if let Some(handle) = api_handle {
        let _ = handle.await;
    }
    let _ = dispatcher_handle.await;

    state.session_manager.disconnect_all();
    info!("All sessions disconnected");

    info!("Server shutdown complete. Goodbye!");
    Ok(())
}

/// Initialize the logging/tracing system
fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wordchain_server=debug"));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Accept incoming WebSocket connections
async fn accept_websocket_connections(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        info!("New WebSocket connection from: {}", addr);
                        let handler = ConnectionHandler::new(state.clone());
                        tokio::spawn(async move {
                            if let Err(e) = handler.handle_websocket(stream, addr).await {
                                warn!("WebSocket connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept WebSocket connection: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("WebSocket connection acceptor shutting down");
                break;
            }
        }
    }
}

/// Run the HTTP API server
async fn run_api_server(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let router = api::create_router(state);

    let shutdown_signal = async move {
        let _ = shutdown_rx.recv().await;
        info!("Status API shutting down");
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .unwrap_or_else(|e| error!("API server error: {}", e));
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Signal all tasks to shut down
    let _ = shutdown_tx.send(());
}
