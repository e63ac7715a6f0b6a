use crate::config::CameraConfig;
use crate::frame::Frame;
use async_trait::async_trait;
use opencv::{core::Mat, prelude::*, videoio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    OpenCameraFailed(opencv::Error),
    #[error("Camera {0} is not available")]
    NotAvailable(i32),
    #[error("Failed to read frame: {0}")]
    ReadFrameFailed(opencv::Error),
    #[error("Camera is not open")]
    NotOpen,
    #[error("Camera stopped delivering frames")]
    NoFrame,
    #[error("OpenCV error: {0}")]
    OpenCvError(opencv::Error),
}

impl From<opencv::Error> for CameraError {
    fn from(err: opencv::Error) -> Self {
        CameraError::OpenCvError(err)
    }
}

/// Anything that can hand out frames between an `open` and a `release`.
#[async_trait]
pub trait FrameSource: Send + 'static {
    async fn open(&mut self) -> Result<(), CameraError>;

    /// `Ok(None)` means the device produced no image this time around; a
    /// device that is gone reports an error instead.
    async fn read_frame(&mut self) -> Result<Option<Frame>, CameraError>;

    fn release(&mut self) -> Result<(), CameraError>;
}

pub struct Camera {
    config: CameraConfig,
    capture: Option<videoio::VideoCapture>,
}

impl Camera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            config: config.clone(),
            capture: None,
        }
    }
}

#[async_trait]
impl FrameSource for Camera {
    async fn open(&mut self) -> Result<(), CameraError> {
        let index = self.config.device_index;
        let mut capture = videoio::VideoCapture::new(index, videoio::CAP_ANY)
            .map_err(CameraError::OpenCameraFailed)?;

        if !capture.is_opened()? {
            return Err(CameraError::NotAvailable(index));
        }

        capture.set(videoio::CAP_PROP_FRAME_WIDTH, self.config.width as f64)?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, self.config.height as f64)?;

        tracing::info!(
            "Camera {} opened at {}x{}",
            index,
            capture.get(videoio::CAP_PROP_FRAME_WIDTH)?,
            capture.get(videoio::CAP_PROP_FRAME_HEIGHT)?
        );

        self.capture = Some(capture);
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Option<Frame>, CameraError> {
        let cam = self.capture.as_mut().ok_or(CameraError::NotOpen)?;
        let mut frame = Mat::default();
        if !cam.read(&mut frame).map_err(CameraError::ReadFrameFailed)? {
            return Err(CameraError::NoFrame);
        }
        if frame.empty() {
            return Ok(None);
        }
        Ok(Some(Frame::from_mat(frame)))
    }

    fn release(&mut self) -> Result<(), CameraError> {
        if let Some(mut capture) = self.capture.take() {
            capture.release()?;
            tracing::info!("Camera {} released", self.config.device_index);
        }
        Ok(())
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::error!("Failed to release camera: {:?}", e);
        }
    }
}
