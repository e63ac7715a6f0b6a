use serde::Deserialize;
use thiserror::Error;

pub const HAND_LANDMARK_COUNT: usize = 21;
pub const WRIST: usize = 0;

/// Pixel offset between the wrist and the label baseline.
pub const LABEL_OFFSET: f32 = 10.0;

/// Hand skeleton edges as pairs of landmark indices.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    // thumb
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    // index
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    // middle
    (5, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    // ring
    (9, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    // pinky and palm
    (13, 17),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
];

/// A single hand landmark, normalized to the frame dimensions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Scales the normalized point onto a surface of the given size.
    pub fn to_pixel(&self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum LandmarkError {
    #[error("Expected 21 landmarks, got {0}")]
    WrongCount(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkSet {
    points: [Landmark; HAND_LANDMARK_COUNT],
}

impl LandmarkSet {
    pub fn new(points: [Landmark; HAND_LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Landmark; HAND_LANDMARK_COUNT] {
        &self.points
    }

    pub fn wrist(&self) -> Landmark {
        self.points[WRIST]
    }

    /// Segments to draw, one per connectivity edge, in pixel space.
    pub fn edges(
        &self,
        width: u32,
        height: u32,
    ) -> impl Iterator<Item = ((f32, f32), (f32, f32))> + '_ {
        HAND_CONNECTIONS.iter().map(move |&(from, to)| {
            (
                self.points[from].to_pixel(width, height),
                self.points[to].to_pixel(width, height),
            )
        })
    }
}

impl TryFrom<Vec<Landmark>> for LandmarkSet {
    type Error = LandmarkError;

    fn try_from(points: Vec<Landmark>) -> Result<Self, Self::Error> {
        let count = points.len();
        let points: [Landmark; HAND_LANDMARK_COUNT] =
            points.try_into().map_err(|_| LandmarkError::WrongCount(count))?;
        Ok(Self { points })
    }
}

/// Zero or more hands found in one frame. Only the first one is ever used.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Detection {
    hands: Vec<LandmarkSet>,
}

impl Detection {
    pub fn new(hands: Vec<LandmarkSet>) -> Self {
        Self { hands }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn first_hand(&self) -> Option<&LandmarkSet> {
        self.hands.first()
    }
}

/// Where the label text starts for a given wrist on a surface of the given size.
pub fn label_anchor(wrist: Landmark, width: u32, height: u32) -> (f32, f32) {
    let (x, y) = wrist.to_pixel(width, height);
    (x + LABEL_OFFSET, y - LABEL_OFFSET)
}
