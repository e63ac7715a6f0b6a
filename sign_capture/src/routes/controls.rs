use crate::{server::SharedState, session::SessionError};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::instrument;

#[derive(Serialize)]
pub struct ControlStatus {
    running: bool,
    text: String,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match self {
            SessionError::Camera(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SessionError::DevicesUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            SessionError::Closed => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, format!("Something went wrong: {}", self)).into_response()
    }
}

fn status(state: &SharedState) -> Json<ControlStatus> {
    let display = state.session.display();
    Json(ControlStatus {
        running: display.running,
        text: display.text,
    })
}

#[instrument(skip(state))]
pub async fn start_capture(
    State(state): State<SharedState>,
) -> Result<Json<ControlStatus>, SessionError> {
    state.session.start().await?;
    Ok(status(&state))
}

#[instrument(skip(state))]
pub async fn stop_capture(
    State(state): State<SharedState>,
) -> Result<Json<ControlStatus>, SessionError> {
    state.session.stop().await?;
    Ok(status(&state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraError, FrameSource};
    use crate::config::OverlayConfig;
    use crate::detection::{DetectionError, HandDetector};
    use crate::frame::{Frame, RawImage};
    use crate::landmarks::Detection;
    use crate::prediction::{PredictionClient, PredictionError};
    use crate::routes::api_routes;
    use crate::session::{Session, SessionSettings};
    use crate::telemetry::Metrics;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::{sync::Arc, time::Duration};
    use tokio::{net::TcpListener, sync::broadcast};

    struct UnpluggedCamera;

    #[async_trait]
    impl FrameSource for UnpluggedCamera {
        async fn open(&mut self) -> Result<(), CameraError> {
            Err(CameraError::NotAvailable(3))
        }

        async fn read_frame(&mut self) -> Result<Option<Frame>, CameraError> {
            Err(CameraError::NotOpen)
        }

        fn release(&mut self) -> Result<(), CameraError> {
            Ok(())
        }
    }

    struct NoHands;

    #[async_trait]
    impl HandDetector for NoHands {
        async fn detect(&mut self, _image: RawImage) -> Result<Detection, DetectionError> {
            Ok(Detection::empty())
        }
    }

    struct Silent;

    #[async_trait]
    impl PredictionClient for Silent {
        async fn predict(&self, _image_data_url: String) -> Result<String, PredictionError> {
            Ok(String::new())
        }
    }

    async fn serve_with_unplugged_camera() -> String {
        let metrics = Arc::new(Metrics::new().unwrap());
        let settings = SessionSettings {
            cooldown: Duration::from_millis(300),
            jpeg_quality: 92,
            surface_width: 64,
            surface_height: 48,
        };
        let (session, _task) = Session::spawn(
            settings,
            Box::new(UnpluggedCamera),
            Box::new(NoHands),
            Arc::new(Silent),
            metrics.clone(),
        )
        .unwrap();
        let (shutdown, _) = broadcast::channel(1);

        let router = api_routes().with_state(SharedState {
            session,
            overlay_config: OverlayConfig::default(),
            metrics,
            shutdown,
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_start_with_unavailable_camera_answers_500() {
        let base = serve_with_unplugged_camera().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/start", base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 500);
        assert!(response
            .text()
            .await
            .unwrap()
            .contains("Camera 3 is not available"));

        let display: Value = client
            .get(format!("{}/prediction", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(display["running"], false);
        assert_eq!(display["text"], "Prediction: ...");
    }

    #[tokio::test]
    async fn test_stop_answers_status() {
        let base = serve_with_unplugged_camera().await;

        let status: Value = reqwest::Client::new()
            .post(format!("{}/stop", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(status["running"], false);
        assert_eq!(status["text"], "Prediction: ...");
    }

    #[test]
    fn test_session_errors_map_to_status() {
        let camera = SessionError::Camera(CameraError::NotAvailable(0)).into_response();
        assert_eq!(camera.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let busy = SessionError::DevicesUnavailable.into_response();
        assert_eq!(busy.status(), StatusCode::SERVICE_UNAVAILABLE);

        let closed = SessionError::Closed.into_response();
        assert_eq!(closed.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
