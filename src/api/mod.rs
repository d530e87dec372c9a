//! HTTP surface over the registry.
//!
//! Both the resource-style routes (`/polls`, `/polls/{id}`, ...) and the
//! flat routes older clients use (`/createPoll`, `/getPolls`, `/vote`,
//! `/deletePoll`) are served.

pub mod error;
pub mod handlers;

use crate::registry::Registry;
use axum::Router;
use axum::http::Method;
use axum::http::header::CONTENT_TYPE;
use axum::routing::{delete, get, post};
use handlers::{
    create_poll, delete_poll, delete_poll_by_body, get_poll, list_polls, vote, vote_by_body,
};
use log::info;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub fn router(registry: Registry) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/polls", post(create_poll).get(list_polls))
        .route("/polls/{id}", get(get_poll).delete(delete_poll))
        .route("/polls/{id}/vote", post(vote))
        .route("/createPoll", post(create_poll))
        .route("/getPolls", get(list_polls))
        .route("/vote", post(vote_by_body))
        .route("/deletePoll", delete(delete_poll_by_body))
        .layer(cors)
        .with_state(registry)
}

/// Serves the API on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    registry: Registry,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(address) = listener.local_addr() {
        info!("Server running on {address}");
    }

    axum::serve(listener, router(registry))
        .with_graceful_shutdown(shutdown)
        .await
}
