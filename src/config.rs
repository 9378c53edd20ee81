//! Command-line / environment configuration.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::metrics::WindowConfig;

/// Real-time HTTP traffic monitor
#[derive(Parser, Debug, Clone)]
#[command(name = "traffic-monitor", version, about)]
pub struct Config {
    /// Host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Rolling window retained for derived metrics (seconds)
    #[arg(
        long,
        env = "WINDOW_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub window_secs: u64,

    /// Window maintainer tick period (milliseconds)
    #[arg(
        long,
        env = "TICK_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(10..)
    )]
    pub tick_ms: u64,

    /// Snapshot broadcast period (milliseconds)
    #[arg(
        long,
        env = "PUBLISH_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(10..)
    )]
    pub publish_ms: u64,

    /// Number of history points kept (one per maintainer tick)
    #[arg(long, env = "HISTORY_SIZE", default_value_t = 300)]
    pub history_size: usize,

    /// Directory served for anything that is not an API route
    #[arg(long, env = "STATIC_DIR", default_value = "public")]
    pub static_dir: PathBuf,
}

impl Config {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn window(&self) -> WindowConfig {
        WindowConfig {
            window: Duration::from_secs(self.window_secs),
            history_size: self.history_size,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_ms)
    }
}
