use crate::camera::Camera;
use crate::config::Config;
use crate::detection::ProcessHandDetector;
use crate::prediction::HttpPredictionClient;
use crate::server::HttpServer;
use crate::session::{Session, SessionSettings};
use crate::telemetry::Metrics;

use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let metrics = match Metrics::new() {
        Ok(metrics) => Arc::new(metrics),
        Err(e) => {
            tracing::error!("Failed to initialize metrics: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let detector = match ProcessHandDetector::spawn(&config.detector).await {
        Ok(detector) => detector,
        Err(e) => {
            tracing::error!("Failed to initialize hand detector: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let prediction_client = match HttpPredictionClient::new(&config.prediction_service) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("Failed to initialize prediction client: {:?}", e);
            return Err(Box::new(e));
        }
    };
    tracing::info!("Predictions go to {}", prediction_client.url());

    let camera = Camera::new(&config.camera);

    let (session, session_task) = Session::spawn(
        SessionSettings::from_config(&config),
        Box::new(camera),
        Box::new(detector),
        prediction_client,
        metrics.clone(),
    )?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();

    let server = HttpServer::new(session.clone(), metrics, shutdown_tx.clone(), &config).await?;

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    if let Err(e) = session.stop().await {
        tracing::error!("Failed to stop capture: {}", e);
    }

    let _ = shutdown_tx.send(());
    match server_handle.await {
        Ok(Err(e)) => tracing::error!("Server error: {:?}", e),
        Err(e) => tracing::error!("Server task failed: {:?}", e),
        Ok(Ok(())) => {}
    }

    // Last handle gone, so the session task releases the devices and exits.
    drop(session);
    let _ = session_task.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
