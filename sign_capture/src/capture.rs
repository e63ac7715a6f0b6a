use crate::camera::{CameraError, FrameSource};
use crate::detection::HandDetector;
use crate::frame::Frame;
use crate::landmarks::Detection;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Consecutive empty reads after which the device counts as gone.
const MAX_EMPTY_READS: u32 = 30;
const EMPTY_READ_BACKOFF: Duration = Duration::from_millis(10);

/// What the frame pump reports back to the session.
#[derive(Debug)]
pub enum CaptureEvent {
    Detected {
        generation: u64,
        frame: Frame,
        detection: Detection,
    },
    Failed {
        generation: u64,
        error: CameraError,
    },
}

pub type Devices = (Box<dyn FrameSource>, Box<dyn HandDetector>);

/// A running frame pump. Dropping it without [`FramePump::stop`] leaves the
/// devices with the detached task until it notices the session is gone.
pub struct FramePump {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<Devices>,
}

impl FramePump {
    /// Reads frames until told to stop, running detection on each one before
    /// reading the next.
    pub fn spawn<E>(
        source: Box<dyn FrameSource>,
        detector: Box<dyn HandDetector>,
        generation: u64,
        events: mpsc::Sender<E>,
    ) -> Self
    where
        E: From<CaptureEvent> + Send + 'static,
    {
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run(source, detector, generation, events, shutdown_rx));
        Self { shutdown, handle }
    }

    /// Stops the pump and hands the devices back once its last frame is done.
    pub async fn stop(self) -> Option<Devices> {
        let _ = self.shutdown.send(());
        match self.handle.await {
            Ok(devices) => Some(devices),
            Err(e) => {
                tracing::error!("Frame pump task failed: {:?}", e);
                None
            }
        }
    }
}

async fn run<E>(
    mut source: Box<dyn FrameSource>,
    mut detector: Box<dyn HandDetector>,
    generation: u64,
    events: mpsc::Sender<E>,
    mut shutdown: oneshot::Receiver<()>,
) -> Devices
where
    E: From<CaptureEvent> + Send + 'static,
{
    tracing::info!("Frame pump {} started", generation);
    let mut empty_reads = 0;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("Frame pump {} received shutdown signal", generation);
                break;
            }
            result = source.read_frame() => {
                let frame = match result {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        empty_reads += 1;
                        if empty_reads < MAX_EMPTY_READS {
                            tokio::time::sleep(EMPTY_READ_BACKOFF).await;
                            continue;
                        }
                        report_failure(&events, generation, CameraError::NoFrame, &mut shutdown)
                            .await;
                        break;
                    }
                    Err(error) => {
                        report_failure(&events, generation, error, &mut shutdown).await;
                        break;
                    }
                };
                empty_reads = 0;

                let image = match frame.to_raw() {
                    Ok(image) => image,
                    Err(e) => {
                        tracing::warn!("Skipping unreadable frame: {}", e);
                        continue;
                    }
                };

                let detection = match detector.detect(image).await {
                    Ok(detection) => detection,
                    Err(e) => {
                        tracing::warn!("Hand detection failed: {}", e);
                        continue;
                    }
                };

                let event = CaptureEvent::Detected { generation, frame, detection };
                if !deliver(&events, event, &mut shutdown).await {
                    break;
                }
            }
        }
    }
    tracing::info!("Frame pump {} stopped", generation);
    (source, detector)
}

async fn report_failure<E>(
    events: &mpsc::Sender<E>,
    generation: u64,
    error: CameraError,
    shutdown: &mut oneshot::Receiver<()>,
) where
    E: From<CaptureEvent> + Send + 'static,
{
    tracing::error!("Error reading frame: {:?}", error);
    deliver(events, CaptureEvent::Failed { generation, error }, shutdown).await;
}

/// Sends one event unless shutdown arrives first, so a session busy stopping
/// the pump never waits on a full channel. Returns `false` when the pump should exit.
async fn deliver<E>(
    events: &mpsc::Sender<E>,
    event: CaptureEvent,
    shutdown: &mut oneshot::Receiver<()>,
) -> bool
where
    E: From<CaptureEvent> + Send + 'static,
{
    tokio::select! {
        biased;
        _ = shutdown => false,
        sent = events.send(event.into()) => {
            if sent.is_err() {
                tracing::debug!("Session gone, frame pump exiting");
            }
            sent.is_ok()
        }
    }
}
