//! Liveness endpoint for the hosting platform.
//!
//! Render-style hosts ping an HTTP port to decide whether the service is
//! alive; the bot itself runs over long polling, so this server carries no
//! business semantics.

use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Start the health check server on the given port. Runs until the
/// process exits.
pub async fn start_health_server(port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let app = Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler));

    log::info!("Starting health server on http://{}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// GET / and GET /health both answer 200 OK.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "EdirPay bot is online")
}
