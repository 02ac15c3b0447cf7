use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise default non-JSON `rotator` logging.
pub fn init_logging() {
    init_logging_with_default(tracing_subscriber::filter::LevelFilter::INFO)
}

/// Initialise non-JSON logging with an explicit default level (`RUST_LOG`
/// still overrides).
pub fn init_logging_with_default(level: tracing_subscriber::filter::LevelFilter) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer())
        .init()
}

/// Initialise default JSON `rotator` logging.
pub fn init_json_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
        .init()
}

/// Per-day artifact directory `<root>/<YYYY-MM-DD>`, created on demand.
/// Balance snapshots, candidate lists, trade logs and the convert history of
/// one UTC day land together.
pub fn rolling_log_dir(root: &Path) -> std::io::Result<PathBuf> {
    let dir = root.join(Utc::now().format("%Y-%m-%d").to_string());
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
