use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub prediction_service: PredictionServiceConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    pub detector: DetectorConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Remote classification endpoint and the snapshot cadence.
#[derive(Debug, Deserialize, Clone)]
pub struct PredictionServiceConfig {
    pub url: String,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: i32,
}

fn default_cooldown_ms() -> u64 {
    300
}

fn default_jpeg_quality() -> i32 {
    92
}

impl PredictionServiceConfig {
    pub fn get_cooldown(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct CameraConfig {
    #[serde(default)]
    pub device_index: i32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: default_width(),
            height: default_height(),
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct OverlayConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_stream_fps")]
    pub stream_fps: u64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            stream_fps: default_stream_fps(),
        }
    }
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_stream_fps() -> u64 {
    30
}

fn fps_to_delay_ms(fps: u64) -> u64 {
    (1000.0 / fps.max(1) as f64).round() as u64
}

impl OverlayConfig {
    pub fn get_stream_delay_ms(&self) -> u64 {
        fps_to_delay_ms(self.stream_fps)
    }
}

/// Landmark helper process and the options handed to the hand model.
#[derive(Clone, Deserialize, Debug)]
pub struct DetectorConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_max_num_hands")]
    pub max_num_hands: u32,
    #[serde(default = "default_model_complexity")]
    pub model_complexity: u32,
    #[serde(default = "default_confidence")]
    pub min_detection_confidence: f32,
    #[serde(default = "default_confidence")]
    pub min_tracking_confidence: f32,
}

fn default_max_num_hands() -> u32 {
    1
}

fn default_model_complexity() -> u32 {
    1
}

fn default_confidence() -> f32 {
    0.7
}

impl DetectorConfig {
    /// Full argument list for the helper: configured args followed by model options.
    pub fn command_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend([
            "--max-num-hands".to_string(),
            self.max_num_hands.to_string(),
            "--model-complexity".to_string(),
            self.model_complexity.to_string(),
            "--min-detection-confidence".to_string(),
            self.min_detection_confidence.to_string(),
            "--min-tracking-confidence".to_string(),
            self.min_tracking_confidence.to_string(),
        ]);
        args
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let config = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(format!("{}.yaml", environment.as_str())),
        ))
        .add_source(
            config::Environment::with_prefix("SC")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    Ok(config)
}
