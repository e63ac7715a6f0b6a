use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use opencv::{
    core::{self, Mat, Scalar, Vector},
    imgcodecs,
    prelude::*,
};
use thiserror::Error;

const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Failed to encode frame: {0}")]
    EncodeFrameFailed(opencv::Error),
    #[error("Frame is empty")]
    EmptyFrame,
    #[error("OpenCV error: {0}")]
    OpenCvError(opencv::Error),
}

impl From<opencv::Error> for FrameError {
    fn from(err: opencv::Error) -> Self {
        FrameError::OpenCvError(err)
    }
}

/// Tightly packed pixels handed to the landmark detector.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub data: Vec<u8>,
}

/// One BGR bitmap from the capture device.
#[derive(Debug)]
pub struct Frame {
    mat: Mat,
}

impl Frame {
    pub fn from_mat(mat: Mat) -> Self {
        Self { mat }
    }

    /// Uniform BGR frame, mostly useful for synthetic input.
    pub fn filled(width: u32, height: u32, bgr: (u8, u8, u8)) -> Result<Self, FrameError> {
        let mat = Mat::new_rows_cols_with_default(
            height as i32,
            width as i32,
            core::CV_8UC3,
            Scalar::new(bgr.0 as f64, bgr.1 as f64, bgr.2 as f64, 0.0),
        )?;
        Ok(Self { mat })
    }

    pub fn mat(&self) -> &Mat {
        &self.mat
    }

    pub fn width(&self) -> u32 {
        self.mat.cols().max(0) as u32
    }

    pub fn height(&self) -> u32 {
        self.mat.rows().max(0) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.mat.empty()
    }

    pub fn to_raw(&self) -> Result<RawImage, FrameError> {
        if self.mat.empty() {
            return Err(FrameError::EmptyFrame);
        }
        let data = if self.mat.is_continuous() {
            self.mat.data_bytes()?.to_vec()
        } else {
            self.mat.try_clone()?.data_bytes()?.to_vec()
        };
        Ok(RawImage {
            width: self.width(),
            height: self.height(),
            channels: self.mat.channels() as u32,
            data,
        })
    }

    /// JPEG at the frame's own resolution.
    pub fn to_jpg(&self, quality: i32) -> Result<Vec<u8>, FrameError> {
        encode_jpg(&self.mat, quality)
    }

    /// `data:image/jpeg;base64,...` form of the frame, as the classifier expects it.
    pub fn to_data_url(&self, quality: i32) -> Result<String, FrameError> {
        let jpg = self.to_jpg(quality)?;
        Ok(format!(
            "{}{}",
            JPEG_DATA_URL_PREFIX,
            BASE64_STANDARD.encode(jpg)
        ))
    }
}

pub(crate) fn encode_jpg(mat: &Mat, quality: i32) -> Result<Vec<u8>, FrameError> {
    if mat.empty() {
        return Err(FrameError::EmptyFrame);
    }
    let params = Vector::<i32>::from_slice(&[imgcodecs::IMWRITE_JPEG_QUALITY, quality]);
    let mut buf = Vector::<u8>::new();
    imgcodecs::imencode(".jpg", mat, &mut buf, &params).map_err(FrameError::EncodeFrameFailed)?;
    Ok(buf.into())
}
