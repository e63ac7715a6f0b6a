use crate::{
    config::{Config, OverlayConfig},
    routes::api_routes,
    session::SessionHandle,
    telemetry::Metrics,
};
use axum::Router;
use std::sync::Arc;
use tokio::{
    net::TcpListener,
    sync::broadcast::{Receiver, Sender},
    task::JoinHandle,
};

#[derive(Clone)]
pub struct SharedState {
    pub session: SessionHandle,
    pub overlay_config: OverlayConfig,
    pub metrics: Arc<Metrics>,
    /// Ends long-lived responses such as the video feed on shutdown.
    pub shutdown: Sender<()>,
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(
        session: SessionHandle,
        metrics: Arc<Metrics>,
        shutdown: Sender<()>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let addr = config.server.get_address();

        let app_state = SharedState {
            session,
            overlay_config: config.overlay.clone(),
            metrics,
            shutdown,
        };

        let router = Router::new().merge(api_routes()).with_state(app_state);

        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(
        self,
        shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn({
            let mut shutdown_rx = shutdown_rx.resubscribe();
            async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown_rx.recv().await.ok();
                    })
                    .await?;
                Ok(())
            }
        });

        Ok(server_handle)
    }
}
