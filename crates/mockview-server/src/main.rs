// Mock interview server entry point.
//
// Startup sequence:
// 1. Initialize tracing (stdout)
// 2. Load config
// 3. Open the session store
// 4. Build the controller and spawn its expiry loop
// 5. Spawn the WebSocket server task
// 6. Serve HTTP until Ctrl+C / SIGTERM
// 7. Stop timers and background tasks

use std::sync::Arc;

use anyhow::Context;
use mockview_app::controller::run_expiry_loop;
use mockview_core::config;
use mockview_server::auth::{JwtVerifier, TokenVerifier};
use mockview_server::{build_state, http, open_store, ws_server};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("mockview starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: http port {}, ws port {}, routes under {}, {:?} store",
        config.server.http_port, config.server.ws_port, config.server.api_prefix, config.store.backend
    );

    let secret = config
        .credentials
        .jwt_secret
        .as_deref()
        .context("jwt_secret is not configured")?;
    let verifier: Arc<dyn TokenVerifier> = Arc::new(JwtVerifier::new(secret));

    // 3. Open the session store
    let store = open_store(&config.store)?;

    // 4. Controller and expiry loop
    let (state, expired_rx) = build_state(config.interview.clone(), store, verifier);
    let expiry_handle = tokio::spawn(run_expiry_loop(state.controller.clone(), expired_rx));

    // 5. WebSocket server
    let ws_port = config.server.ws_port;
    let ws_listener = ws_server::bind(ws_port)
        .await
        .with_context(|| format!("failed to bind WebSocket server on port {ws_port}"))?;
    let ws_state = state.clone();
    let ws_handle = tokio::spawn(async move {
        if let Err(e) = ws_server::run(ws_listener, ws_state).await {
            error!("WebSocket server error: {e}");
        }
    });

    // 6. HTTP server
    let http_port = config.server.http_port;
    let listener = TcpListener::bind(("0.0.0.0", http_port))
        .await
        .with_context(|| format!("failed to bind HTTP server on port {http_port}"))?;
    info!("HTTP server listening on {}", listener.local_addr()?);

    let app = http::router(state.clone(), &config.server);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    // 7. Cleanup
    state.controller.shutdown();
    ws_handle.abort();
    expiry_handle.abort();

    info!("mockview shut down cleanly");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mockview=info,tower_http=info,warn")),
        )
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
