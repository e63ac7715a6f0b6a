use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::collections::HashSet;

pub struct Metrics {
    frames_processed: IntCounter,
    hands_detected: IntCounter,
    prediction_requests: IntCounterVec,
    prediction_duration: Histogram,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let frames_processed = IntCounter::new(
            "frames_processed_total",
            "Total number of frames handled by the session",
        )?;
        let hands_detected = IntCounter::new(
            "hands_detected_total",
            "Total number of frames with a detected hand",
        )?;
        let prediction_requests = IntCounterVec::new(
            Opts::new(
                "prediction_requests_total",
                "Total number of prediction requests by outcome",
            ),
            &["outcome"],
        )?;

        let boundaries = generate_boundaries((15, 30, 60, 500, 1000));
        let prediction_duration = Histogram::with_opts(
            HistogramOpts::new(
                "prediction_duration_ms",
                "Duration of prediction requests in milliseconds",
            )
            .buckets(boundaries),
        )?;

        registry.register(Box::new(frames_processed.clone()))?;
        registry.register(Box::new(hands_detected.clone()))?;
        registry.register(Box::new(prediction_requests.clone()))?;
        registry.register(Box::new(prediction_duration.clone()))?;

        Ok(Metrics {
            frames_processed,
            hands_detected,
            prediction_requests,
            prediction_duration,
            registry,
        })
    }

    pub fn record_frame(&self, hand_detected: bool) {
        self.frames_processed.inc();
        if hand_detected {
            self.hands_detected.inc();
        }
    }

    pub fn record_prediction(&self, outcome: &str, duration_ms: u64) {
        self.prediction_requests.with_label_values(&[outcome]).inc();
        self.prediction_duration.observe(duration_ms as f64);
    }

    pub fn prediction_count(&self, outcome: &str) -> u64 {
        self.prediction_requests.with_label_values(&[outcome]).get()
    }
}

fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_step: usize = 10;
    let middle_step: usize = 2;
    let end_step: usize = 20;
    let tail_step: usize = 100;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}
