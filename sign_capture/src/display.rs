use serde::Serialize;

pub const PLACEHOLDER_TEXT: &str = "Prediction: ...";

/// What the user sees next to the video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayState {
    pub label: String,
    pub text: String,
    pub running: bool,
}

impl DisplayState {
    pub fn with_label(&mut self, label: String) {
        self.text = prediction_text(&label);
        self.label = label;
    }

    pub fn reset(&mut self) {
        self.label.clear();
        self.text = PLACEHOLDER_TEXT.to_string();
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            label: String::new(),
            text: PLACEHOLDER_TEXT.to_string(),
            running: false,
        }
    }
}

pub fn prediction_text(label: &str) -> String {
    format!("Prediction: {}", label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_and_reset() {
        let mut state = DisplayState::default();
        assert_eq!(state.text, "Prediction: ...");

        state.with_label("A".to_string());
        assert_eq!(state.text, "Prediction: A");
        assert_eq!(state.label, "A");

        state.with_label(String::new());
        assert_eq!(state.text, "Prediction: ");

        state.reset();
        assert_eq!(state.text, "Prediction: ...");
        assert!(state.label.is_empty());
    }
}
