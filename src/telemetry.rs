use std::str::FromStr;

use tracing::Level;

use crate::settings::TelemetrySettings;

/// Installs the global `tracing` subscriber. Calling it again is a no-op.
pub fn init(settings: &TelemetrySettings) {
    let level = parse_level(&settings.log_level);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .ok();
}

fn parse_level(value: &str) -> Level {
    Level::from_str(value.trim()).unwrap_or(Level::INFO)
}
