//! Arithmetic Trainer Backend
//!
//! - Axum HTTP + WebSocket API, one training session per socket
//! - Task bank from built-in seeds plus an optional TOML file
//!
//! Important env variables:
//!   PORT            : u16 (default 3000)
//!   APP_CONFIG_PATH : path to TOML config (session defaults + task bank)
//!   LOG_LEVEL       : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT      : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use mathtrainer_backend::routes::build_router;
use mathtrainer_backend::state::AppState;
use mathtrainer_backend::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: task bank, session defaults, progress store.
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "mathtrainer_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!(target: "mathtrainer_backend", "shutdown signal received");
    })
    .await?;
  Ok(())
}
