use crate::frame::{encode_jpg, Frame, FrameError};
use crate::landmarks::{label_anchor, LandmarkSet};
use opencv::{
    core::{self, Mat, Point, Scalar, Size},
    imgproc,
};

const SURFACE_JPEG_QUALITY: i32 = 80;

// BGR
fn connector_color() -> Scalar {
    Scalar::new(0.0, 255.0, 0.0, 0.0)
}

fn landmark_color() -> Scalar {
    Scalar::new(0.0, 0.0, 255.0, 0.0)
}

fn label_color() -> Scalar {
    Scalar::new(255.0, 0.0, 0.0, 0.0)
}

const CONNECTOR_THICKNESS: i32 = 3;
const LANDMARK_RADIUS: i32 = 4;
const LANDMARK_THICKNESS: i32 = 2;
const LABEL_SCALE: f64 = 0.9;
const LABEL_THICKNESS: i32 = 2;

/// Fixed-size drawing surface that mirrors the video with the hand skeleton on top.
pub struct OverlaySurface {
    canvas: Mat,
    width: u32,
    height: u32,
}

impl OverlaySurface {
    pub fn new(width: u32, height: u32) -> Result<Self, FrameError> {
        Ok(Self {
            canvas: blank(width, height)?,
            width,
            height,
        })
    }

    pub fn canvas(&self) -> &Mat {
        &self.canvas
    }

    pub fn clear(&mut self) -> Result<(), FrameError> {
        self.canvas = blank(self.width, self.height)?;
        Ok(())
    }

    #[cfg(test)]
    pub fn is_blank(&self) -> Result<bool, FrameError> {
        let sum = core::sum_elems(&self.canvas)?;
        Ok(sum.0.iter().all(|channel| *channel == 0.0))
    }

    /// Scales the frame onto the whole surface.
    pub fn draw_frame(&mut self, frame: &Frame) -> Result<(), FrameError> {
        if frame.is_empty() {
            return Err(FrameError::EmptyFrame);
        }
        let mut scaled = Mat::default();
        imgproc::resize(
            frame.mat(),
            &mut scaled,
            Size::new(self.width as i32, self.height as i32),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;
        self.canvas = scaled;
        Ok(())
    }

    pub fn draw_connectors(&mut self, hand: &LandmarkSet) -> Result<(), FrameError> {
        for (from, to) in hand.edges(self.width, self.height) {
            imgproc::line(
                &mut self.canvas,
                to_point(from),
                to_point(to),
                connector_color(),
                CONNECTOR_THICKNESS,
                imgproc::LINE_AA,
                0,
            )?;
        }
        Ok(())
    }

    pub fn draw_landmarks(&mut self, hand: &LandmarkSet) -> Result<(), FrameError> {
        for landmark in hand.points() {
            imgproc::circle(
                &mut self.canvas,
                to_point(landmark.to_pixel(self.width, self.height)),
                LANDMARK_RADIUS,
                landmark_color(),
                LANDMARK_THICKNESS,
                imgproc::LINE_AA,
                0,
            )?;
        }
        Ok(())
    }

    /// Writes `label` just above and to the right of the wrist.
    pub fn draw_label(&mut self, hand: &LandmarkSet, label: &str) -> Result<(), FrameError> {
        if label.is_empty() {
            return Ok(());
        }
        let anchor = label_anchor(hand.wrist(), self.width, self.height);
        imgproc::put_text(
            &mut self.canvas,
            label,
            to_point(anchor),
            imgproc::FONT_HERSHEY_SIMPLEX,
            LABEL_SCALE,
            label_color(),
            LABEL_THICKNESS,
            imgproc::LINE_AA,
            false,
        )?;
        Ok(())
    }

    pub fn to_jpg(&self) -> Result<Vec<u8>, FrameError> {
        encode_jpg(self.canvas(), SURFACE_JPEG_QUALITY)
    }
}

fn blank(width: u32, height: u32) -> Result<Mat, FrameError> {
    Ok(Mat::new_rows_cols_with_default(
        height as i32,
        width as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )?)
}

fn to_point((x, y): (f32, f32)) -> Point {
    Point::new(x.round() as i32, y.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Landmark, HAND_LANDMARK_COUNT};
    use opencv::{core::Vec3b, prelude::*};

    fn hand_at(x: f32, y: f32) -> LandmarkSet {
        LandmarkSet::new([Landmark::new(x, y); HAND_LANDMARK_COUNT])
    }

    fn pixel(surface: &OverlaySurface, x: i32, y: i32) -> [u8; 3] {
        let px = surface.canvas().at_2d::<Vec3b>(y, x).unwrap();
        [px[0], px[1], px[2]]
    }

    #[test]
    fn test_frame_is_scaled_to_surface() {
        let mut surface = OverlaySurface::new(640, 480).unwrap();
        let frame = Frame::filled(1280, 720, (10, 20, 30)).unwrap();

        surface.draw_frame(&frame).unwrap();

        assert_eq!(surface.canvas().cols(), 640);
        assert_eq!(surface.canvas().rows(), 480);
        assert_eq!(pixel(&surface, 320, 240), [10, 20, 30]);
    }

    #[test]
    fn test_clear_blanks_surface() {
        let mut surface = OverlaySurface::new(64, 48).unwrap();
        surface
            .draw_frame(&Frame::filled(64, 48, (255, 255, 255)).unwrap())
            .unwrap();
        assert!(!surface.is_blank().unwrap());

        surface.clear().unwrap();

        assert!(surface.is_blank().unwrap());
        assert_eq!(surface.canvas().cols(), 64);
    }

    #[test]
    fn test_landmarks_are_drawn_in_red() {
        let mut surface = OverlaySurface::new(640, 480).unwrap();
        surface.draw_landmarks(&hand_at(0.5, 0.5)).unwrap();

        // Ring outline passes four pixels right of the centre.
        let [blue, green, red] = pixel(&surface, 324, 240);
        assert!(red > 200);
        assert!(blue < 50 && green < 50);
    }

    #[test]
    fn test_empty_label_draws_nothing() {
        let mut surface = OverlaySurface::new(64, 48).unwrap();
        surface.draw_label(&hand_at(0.5, 0.5), "").unwrap();
        assert!(surface.is_blank().unwrap());

        surface.draw_label(&hand_at(0.1, 0.9), "A").unwrap();
        assert!(!surface.is_blank().unwrap());
    }

    #[test]
    fn test_empty_frame_is_rejected() {
        let mut surface = OverlaySurface::new(64, 48).unwrap();
        let result = surface.draw_frame(&Frame::from_mat(Mat::default()));
        assert!(matches!(result, Err(FrameError::EmptyFrame)));
    }
}
