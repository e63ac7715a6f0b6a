use crate::{server::SharedState, stream::VideoStream};
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum VideoFeedError {
    #[error("Http builder error: {0}")]
    HttpBuilderError(String),
}

#[instrument(skip(state))]
pub async fn video_feed(State(state): State<SharedState>) -> Result<Response, VideoFeedError> {
    let stream = VideoStream::new(
        state.session.subscribe_overlay(),
        state.overlay_config.get_stream_delay_ms(),
        state.shutdown.subscribe(),
    )
    .generate_stream();

    let body = Body::from_stream(stream);

    let response = Response::builder()
        .header(header::CONTENT_TYPE, VideoStream::content_type())
        .body(body)
        .map_err(|e| VideoFeedError::HttpBuilderError(e.to_string()))?;

    Ok(response)
}

impl IntoResponse for VideoFeedError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
