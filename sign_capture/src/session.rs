//! The capture session: one task that owns every piece of mutable display
//! state. Controls arrive as commands, frames and classifier answers arrive as
//! events, and readers only ever see `watch` snapshots.

use crate::camera::{CameraError, FrameSource};
use crate::capture::{CaptureEvent, Devices, FramePump};
use crate::config::Config;
use crate::detection::HandDetector;
use crate::display::DisplayState;
use crate::frame::{Frame, FrameError};
use crate::landmarks::{Detection, LandmarkSet};
use crate::overlay::OverlaySurface;
use crate::prediction::{PredictionClient, PredictionError};
use crate::telemetry::Metrics;
use crate::throttle::Cooldown;
use bytes::Bytes;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::Instant,
};

const COMMAND_CAPACITY: usize = 8;
const EVENT_CAPACITY: usize = 4;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("Capture devices are unavailable")]
    DevicesUnavailable,
    #[error("Session has shut down")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub cooldown: Duration,
    pub jpeg_quality: i32,
    pub surface_width: u32,
    pub surface_height: u32,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cooldown: config.prediction_service.get_cooldown(),
            jpeg_quality: config.prediction_service.jpeg_quality,
            surface_width: config.overlay.width,
            surface_height: config.overlay.height,
        }
    }
}

#[derive(Debug)]
enum Command {
    Start(oneshot::Sender<Result<(), SessionError>>),
    Stop(oneshot::Sender<()>),
}

#[derive(Debug)]
enum SessionEvent {
    Capture(CaptureEvent),
    Prediction {
        generation: u64,
        request_id: u64,
        elapsed: Duration,
        result: Result<String, PredictionError>,
    },
}

impl From<CaptureEvent> for SessionEvent {
    fn from(event: CaptureEvent) -> Self {
        SessionEvent::Capture(event)
    }
}

/// Cheap handle used by the controls and the display routes.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    display: watch::Receiver<DisplayState>,
    overlay: watch::Receiver<Option<Bytes>>,
}

impl SessionHandle {
    pub async fn start(&self) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Start(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn stop(&self) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Stop(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }

    pub fn display(&self) -> DisplayState {
        self.display.borrow().clone()
    }

    pub fn subscribe_display(&self) -> watch::Receiver<DisplayState> {
        self.display.clone()
    }

    /// Latest overlay surface as JPEG, `None` while the surface is cleared.
    pub fn subscribe_overlay(&self) -> watch::Receiver<Option<Bytes>> {
        self.overlay.clone()
    }
}

pub struct Session {
    settings: SessionSettings,
    devices: Option<Devices>,
    pump: Option<FramePump>,
    generation: u64,
    next_request_id: u64,
    last_applied_request: u64,
    cooldown: Cooldown,
    overlay: OverlaySurface,
    display: DisplayState,
    client: Arc<dyn PredictionClient>,
    metrics: Arc<Metrics>,
    display_tx: watch::Sender<DisplayState>,
    overlay_tx: watch::Sender<Option<Bytes>>,
    events_tx: mpsc::Sender<SessionEvent>,
}

impl Session {
    /// Starts the session task in the stopped state. The task ends, releasing
    /// the camera, once every handle is dropped.
    pub fn spawn(
        settings: SessionSettings,
        source: Box<dyn FrameSource>,
        detector: Box<dyn HandDetector>,
        client: Arc<dyn PredictionClient>,
        metrics: Arc<Metrics>,
    ) -> Result<(SessionHandle, JoinHandle<()>), FrameError> {
        let overlay = OverlaySurface::new(settings.surface_width, settings.surface_height)?;
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        let (display_tx, display_rx) = watch::channel(DisplayState::default());
        let (overlay_tx, overlay_rx) = watch::channel(None);

        let session = Self {
            cooldown: Cooldown::new(settings.cooldown),
            settings,
            devices: Some((source, detector)),
            pump: None,
            generation: 0,
            next_request_id: 0,
            last_applied_request: 0,
            overlay,
            display: DisplayState::default(),
            client,
            metrics,
            display_tx,
            overlay_tx,
            events_tx,
        };

        let handle = SessionHandle {
            commands: commands_tx,
            display: display_rx,
            overlay: overlay_rx,
        };

        let task = tokio::spawn(session.run(commands_rx, events_rx));
        Ok((handle, task))
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::Receiver<SessionEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Start(reply)) => {
                        let result = self.start().await;
                        let _ = reply.send(result);
                    }
                    Some(Command::Stop(reply)) => {
                        self.stop().await;
                        let _ = reply.send(());
                    }
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event).await,
            }
        }

        self.stop().await;
        tracing::info!("Session closed");
    }

    fn is_running(&self) -> bool {
        self.pump.is_some()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.is_running() && generation == self.generation
    }

    async fn start(&mut self) -> Result<(), SessionError> {
        if self.is_running() {
            tracing::debug!("Capture already running");
            return Ok(());
        }

        let (mut source, detector) = self
            .devices
            .take()
            .ok_or(SessionError::DevicesUnavailable)?;

        if let Err(e) = source.open().await {
            tracing::error!("Failed to start capture: {}", e);
            self.devices = Some((source, detector));
            return Err(e.into());
        }

        self.generation += 1;
        self.pump = Some(FramePump::spawn(
            source,
            detector,
            self.generation,
            self.events_tx.clone(),
        ));
        self.display.running = true;
        self.publish_display();

        tracing::info!("Capture {} started", self.generation);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(pump) = self.pump.take() {
            if let Some((mut source, detector)) = pump.stop().await {
                if let Err(e) = source.release() {
                    tracing::error!("Failed to release camera: {}", e);
                }
                self.devices = Some((source, detector));
            }
            tracing::info!("Capture {} stopped", self.generation);
        }

        if let Err(e) = self.overlay.clear() {
            tracing::error!("Failed to clear overlay: {}", e);
        }
        self.overlay_tx.send_replace(None);

        self.display.running = false;
        self.display.reset();
        self.publish_display();
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Capture(CaptureEvent::Detected {
                generation,
                frame,
                detection,
            }) => {
                if !self.is_current(generation) {
                    tracing::debug!("Dropping frame from capture {}", generation);
                    return;
                }
                self.handle_detection(frame, detection, Instant::now());
            }
            SessionEvent::Capture(CaptureEvent::Failed { generation, error }) => {
                if self.is_current(generation) {
                    tracing::error!("Capture {} failed, stopping: {}", generation, error);
                    self.stop().await;
                }
            }
            SessionEvent::Prediction {
                generation,
                request_id,
                elapsed,
                result,
            } => self.apply_prediction(generation, request_id, elapsed, result),
        }
    }

    fn handle_detection(&mut self, frame: Frame, detection: Detection, now: Instant) {
        let hand = detection.first_hand();
        self.metrics.record_frame(hand.is_some());

        if let Err(e) = self.redraw(&frame, hand) {
            tracing::warn!("Failed to draw overlay: {}", e);
        }

        if hand.is_some() && self.cooldown.try_acquire(now) {
            self.request_prediction(&frame);
        }

        match self.overlay.to_jpg() {
            Ok(jpg) => {
                self.overlay_tx.send_replace(Some(Bytes::from(jpg)));
            }
            Err(e) => tracing::warn!("Failed to encode overlay: {}", e),
        }
    }

    fn redraw(&mut self, frame: &Frame, hand: Option<&LandmarkSet>) -> Result<(), FrameError> {
        self.overlay.clear()?;
        self.overlay.draw_frame(frame)?;

        if let Some(hand) = hand {
            self.overlay.draw_connectors(hand)?;
            self.overlay.draw_landmarks(hand)?;
            self.overlay.draw_label(hand, &self.display.label)?;
        }
        Ok(())
    }

    fn request_prediction(&mut self, frame: &Frame) {
        let image = match frame.to_data_url(self.settings.jpeg_quality) {
            Ok(image) => image,
            Err(e) => {
                tracing::error!("Prediction error: {}", e);
                return;
            }
        };

        self.next_request_id += 1;
        let request_id = self.next_request_id;
        let generation = self.generation;
        let client = self.client.clone();
        let events = self.events_tx.clone();

        tracing::debug!("Sending prediction request {}", request_id);
        tokio::spawn(async move {
            let started = Instant::now();
            let result = client.predict(image).await;
            let event = SessionEvent::Prediction {
                generation,
                request_id,
                elapsed: started.elapsed(),
                result,
            };
            let _ = events.send(event).await;
        });
    }

    fn apply_prediction(
        &mut self,
        generation: u64,
        request_id: u64,
        elapsed: Duration,
        result: Result<String, PredictionError>,
    ) {
        let outcome = if result.is_ok() { "ok" } else { "error" };
        self.metrics
            .record_prediction(outcome, elapsed.as_millis() as u64);

        if !self.is_current(generation) {
            tracing::debug!("Dropping prediction {} from a stopped capture", request_id);
            return;
        }
        if request_id <= self.last_applied_request {
            tracing::debug!(
                "Dropping prediction {} older than applied {}",
                request_id,
                self.last_applied_request
            );
            return;
        }

        match result {
            Ok(label) => {
                tracing::debug!("Prediction {}: {:?}", request_id, label);
                self.last_applied_request = request_id;
                self.display.with_label(label);
                self.publish_display();
            }
            Err(e) => tracing::error!("Prediction error: {}", e),
        }
    }

    fn publish_display(&self) {
        self.display_tx.send_replace(self.display.clone());
    }
}
