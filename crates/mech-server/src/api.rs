//! Status endpoint

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Create the router serving the latest published status document
pub fn router(status: watch::Receiver<String>) -> Router {
    Router::new()
        .route("/mech/status", get(get_status))
        .layer(TraceLayer::new_for_http())
        .with_state(status)
}

/// Serve the status endpoint on `addr`
pub async fn serve(addr: &str, status: watch::Receiver<String>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Status endpoint listening on {}", addr);
    axum::serve(listener, router(status)).await
}

/// GET /mech/status
///
/// An empty document means the last render did not fit its size limit.
async fn get_status(State(status): State<watch::Receiver<String>>) -> Response {
    let document = status.borrow().clone();
    if document.is_empty() {
        error!("No status document available");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    ([(header::CONTENT_TYPE, "application/json")], document).into_response()
}
