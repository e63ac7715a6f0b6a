mod controls;
mod health;
mod index;
mod metrics;
mod prediction;
mod video_feed;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(index::index))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/video_feed", get(video_feed::video_feed))
        .route("/prediction", get(prediction::current_prediction))
        .route("/start", post(controls::start_capture))
        .route("/stop", post(controls::stop_capture))
}
