pub mod chart;
pub mod config;
pub mod counters;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod png;
pub mod prompt;
pub mod rate;
pub mod sampler;
pub mod series;
pub mod service;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use service::Service;
