//! Structured logging.
//!
//! Two output modes on stderr:
//! - human-readable console lines for interactive use
//! - JSON lines for scripted runs
//!
//! stdout is reserved for reports. Library code logs through `tracing`
//! and never initializes a subscriber itself; the `bnet` binary calls
//! [`init_logging`] once at startup.

pub mod config;

pub use config::{LogConfig, LogFormat, LogLevel};

use std::io::IsTerminal;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn filter_for(config: &LogConfig) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from(config.level).into())
        .parse_lossy(format!("bn_core={}", config.level))
}

/// Install the global subscriber.
///
/// Repeated calls are ignored, so tests and embedding programs may call it
/// freely.
pub fn init_logging(config: &LogConfig) {
    let filter = filter_for(config);
    let result = match config.format {
        LogFormat::Human => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal());
            if config.timestamps {
                tracing_subscriber::registry().with(filter).with(layer).try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => {
            let layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false)
                .flatten_event(true);
            tracing_subscriber::registry().with(filter).with(layer).try_init()
        }
    };
    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}

/// Initialize logging from the environment only.
pub fn init_default_logging() {
    init_logging(&LogConfig::from_env(None, None));
}

/// Unique ID for one invocation, attached to reports.
pub fn generate_run_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    format!("run-{}", &uuid.simple().to_string()[..12])
}
