use axum::{
    routing::{get, post},
    Router,
};

use crate::a2p;

pub fn api_routes() -> Router {
    Router::new()
        .route("/api/a2p/profiles", post(a2p::api::create_profile))
        .route("/api/a2p/profiles/:id", get(a2p::api::get_profile))
        .route("/api/a2p/profiles/:id/sync", post(a2p::api::sync_profile))
        .route("/api/a2p/status-callback", post(a2p::api::status_callback))
        .route("/api/cron/check-a2p-status", get(a2p::api::check_pending))
}
