pub mod client;
pub mod config;
pub mod http;
pub mod poller;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::TaskClient;
pub use config::{ConfigError, DashboardConfig, PollSettings};
pub use http::HttpBackend;
pub use poller::TaskPoller;
