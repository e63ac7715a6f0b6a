//! Hand landmark detection.
//!
//! The model itself lives outside this crate. [`ProcessHandDetector`] drives a
//! helper process that wraps it: the helper prints `READY` once, then for every
//! frame reads a 12-byte header (width, height, channels as little-endian `u32`)
//! followed by the raw BGR bytes and answers with one JSON line.

use crate::config::DetectorConfig;
use crate::frame::RawImage;
use crate::landmarks::{Detection, Landmark, LandmarkError, LandmarkSet};
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
};

const READY_SIGNAL: &str = "READY";

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Failed to start detector process: {0}")]
    SpawnFailed(std::io::Error),
    #[error("Detector process did not signal ready, got: {0:?}")]
    NotReady(String),
    #[error("Detector process closed its output")]
    Closed,
    #[error("Detector I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse detector output: {0}")]
    InvalidOutput(#[from] serde_json::Error),
    #[error("Detector reported an error: {0}")]
    Reported(String),
    #[error("Detector returned a malformed hand: {0}")]
    MalformedHand(#[from] LandmarkError),
}

#[async_trait]
pub trait HandDetector: Send + 'static {
    async fn detect(&mut self, image: RawImage) -> Result<Detection, DetectionError>;
}

#[derive(Deserialize, Debug)]
struct HandJson {
    landmarks: Vec<Landmark>,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    handedness: Option<String>,
}

#[derive(Deserialize, Debug)]
struct DetectionJson {
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

/// Turns one line of helper output into a detection. The first hand is the one
/// that gets drawn and classified, so a malformed first hand fails the frame;
/// malformed hands after it are dropped.
pub fn parse_detection_line(line: &str) -> Result<Detection, DetectionError> {
    let parsed: DetectionJson = serde_json::from_str(line.trim())?;
    if let Some(error) = parsed.error {
        return Err(DetectionError::Reported(error));
    }

    let mut hands = Vec::with_capacity(parsed.hands.len());
    for (index, hand) in parsed.hands.into_iter().enumerate() {
        let handedness = hand.handedness.unwrap_or_default();
        let score = hand.score.unwrap_or_default();
        match LandmarkSet::try_from(hand.landmarks) {
            Ok(set) => {
                tracing::debug!(
                    "Hand detected: {} (score={:.2}), wrist=({:.3},{:.3})",
                    handedness,
                    score,
                    set.wrist().x,
                    set.wrist().y
                );
                hands.push(set);
            }
            Err(e) if index == 0 => return Err(e.into()),
            Err(e) => tracing::warn!("Ignoring hand {}: {}", index, e),
        }
    }

    Ok(Detection::new(hands))
}

pub struct ProcessHandDetector {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ProcessHandDetector {
    pub async fn spawn(config: &DetectorConfig) -> Result<Self, DetectionError> {
        tracing::info!("Starting hand detector: {} {:?}", config.program, config.args);

        let mut child = Command::new(&config.program)
            .args(config.command_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(DetectionError::SpawnFailed)?;

        let stdin = child.stdin.take().ok_or(DetectionError::Closed)?;
        let stdout = child.stdout.take().ok_or(DetectionError::Closed)?;
        let mut stdout = BufReader::new(stdout);

        let mut ready = String::new();
        stdout.read_line(&mut ready).await?;
        if ready.trim() != READY_SIGNAL {
            return Err(DetectionError::NotReady(ready.trim().to_string()));
        }

        tracing::info!("Hand detector ready");

        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }
}

#[async_trait]
impl HandDetector for ProcessHandDetector {
    async fn detect(&mut self, image: RawImage) -> Result<Detection, DetectionError> {
        let mut header = Vec::with_capacity(12);
        header.extend_from_slice(&image.width.to_le_bytes());
        header.extend_from_slice(&image.height.to_le_bytes());
        header.extend_from_slice(&image.channels.to_le_bytes());

        self.stdin.write_all(&header).await?;
        self.stdin.write_all(&image.data).await?;
        self.stdin.flush().await?;

        let mut line = String::new();
        if self.stdout.read_line(&mut line).await? == 0 {
            return Err(DetectionError::Closed);
        }

        parse_detection_line(&line)
    }
}

impl Drop for ProcessHandDetector {
    fn drop(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!("Detector process already gone: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand_json(count: usize, x: f32) -> String {
        let points = vec![format!(r#"{{"x":{x},"y":0.5,"z":0.0}}"#); count].join(",");
        format!(r#"{{"handedness":"Right","score":0.93,"landmarks":[{points}]}}"#)
    }

    #[test]
    fn test_parse_no_hands() {
        let detection = parse_detection_line(r#"{"hands": [], "error": null}"#).unwrap();
        assert!(detection.first_hand().is_none());

        let detection = parse_detection_line("{}\n").unwrap();
        assert!(detection.first_hand().is_none());
    }

    #[test]
    fn test_parse_drops_malformed_extra_hands() {
        let line = format!(
            r#"{{"hands": [{}, {}, {}]}}"#,
            hand_json(21, 0.25),
            hand_json(5, 0.9),
            hand_json(21, 0.75)
        );

        let detection = parse_detection_line(&line).unwrap();
        let hand = detection.first_hand().unwrap();
        assert_eq!(hand.wrist(), Landmark::new(0.25, 0.5));
    }

    #[test]
    fn test_parse_rejects_malformed_first_hand() {
        let line = format!(
            r#"{{"hands": [{}, {}]}}"#,
            hand_json(5, 0.9),
            hand_json(21, 0.25)
        );

        let result = parse_detection_line(&line);
        assert!(matches!(
            result,
            Err(DetectionError::MalformedHand(LandmarkError::WrongCount(5)))
        ));
    }

    #[test]
    fn test_parse_reported_error() {
        let result = parse_detection_line(r#"{"hands": [], "error": "bad frame"}"#);
        assert!(matches!(result, Err(DetectionError::Reported(msg)) if msg == "bad frame"));
    }

    #[test]
    fn test_parse_garbage() {
        let result = parse_detection_line("not json");
        assert!(matches!(result, Err(DetectionError::InvalidOutput(_))));
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let config = DetectorConfig {
            program: "/nonexistent/hand-landmarks-helper".to_string(),
            args: vec![],
            max_num_hands: 1,
            model_complexity: 1,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.7,
        };

        let result = ProcessHandDetector::spawn(&config).await;
        assert!(matches!(result, Err(DetectionError::SpawnFailed(_))));
    }
}
