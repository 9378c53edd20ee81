use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Install the stdout subscriber.
///
/// Level comes from `RUST_LOG` and defaults to `info`. Per-request lines
/// are emitted at `debug` (`RUST_LOG=traffic_monitor=debug`).
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(false)
                .with_filter(env_filter),
        )
        .init();
}
