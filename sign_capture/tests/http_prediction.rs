use axum::{
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use sign_capture::config::PredictionServiceConfig;
use sign_capture::frame::Frame;
use sign_capture::prediction::{HttpPredictionClient, PredictionClient, PredictionError};
use tokio::net::TcpListener;

async fn classify(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let image = body["image"].as_str().unwrap_or_default();

    if content_type != "application/json" || !image.starts_with("data:image/jpeg;base64,") {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "bad request"})));
    }
    (StatusCode::OK, Json(json!({"prediction": "A"})))
}

async fn no_hand() -> Json<Value> {
    Json(json!({"status": "no hand"}))
}

async fn failing() -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "model crashed"})),
    )
}

async fn html() -> impl IntoResponse {
    (StatusCode::BAD_GATEWAY, "<html>bad gateway</html>")
}

async fn spawn_backend() -> String {
    let router = Router::new()
        .route("/predict", post(classify))
        .route("/no_hand", post(no_hand))
        .route("/failing", post(failing))
        .route("/html", post(html));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(url: String) -> HttpPredictionClient {
    HttpPredictionClient::new(&PredictionServiceConfig {
        url,
        cooldown_ms: 300,
        jpeg_quality: 92,
    })
    .unwrap()
}

fn snapshot() -> String {
    Frame::filled(320, 240, (0, 128, 255))
        .unwrap()
        .to_data_url(92)
        .unwrap()
}

#[tokio::test]
async fn test_label_is_returned() {
    let base = spawn_backend().await;
    let label = client(format!("{}/predict", base))
        .predict(snapshot())
        .await
        .unwrap();

    assert_eq!(label, "A");
}

#[tokio::test]
async fn test_missing_prediction_is_empty_label() {
    let base = spawn_backend().await;
    let label = client(format!("{}/no_hand", base))
        .predict(snapshot())
        .await
        .unwrap();

    assert_eq!(label, "");
}

#[tokio::test]
async fn test_json_error_body_is_empty_label() {
    let base = spawn_backend().await;
    let label = client(format!("{}/failing", base))
        .predict(snapshot())
        .await
        .unwrap();

    assert_eq!(label, "");
}

#[tokio::test]
async fn test_non_json_body_is_an_error() {
    let base = spawn_backend().await;
    let result = client(format!("{}/html", base)).predict(snapshot()).await;

    assert!(matches!(result, Err(PredictionError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = client(format!("http://{}/predict", addr))
        .predict(snapshot())
        .await;

    assert!(matches!(result, Err(PredictionError::RequestFailed(_))));
}
