mod capture;
mod overlay;
mod routes;
mod server;
mod stream;
mod telemetry;
mod throttle;

pub mod app;
pub mod camera;
pub mod config;
pub mod detection;
pub mod display;
pub mod frame;
pub mod landmarks;
pub mod prediction;
pub mod session;

pub use app::start_app;
pub use telemetry::Metrics;
