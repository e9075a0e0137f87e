// src/logging.rs
// =============================================================================
// Logger setup.
//
// RUST_LOG is honoured as-is; without it everything logs at info. An
// explicit --log-level replaces the global level and our own crate's level,
// so it wins over RUST_LOG. HTTP internals are clamped to warn either way so
// a run over a few thousand links doesn't drown the useful lines.
//
// Examples:
//   RUST_LOG=link_warden=debug link-warden check eforms
//   link-warden --log-level debug check eforms
//   link-warden serve --log-format json
// =============================================================================

use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

use crate::cli::LogFormat;

pub fn init(level: Option<LevelFilter>, format: LogFormat) -> Result<(), log::SetLoggerError> {
    let rust_log = std::env::var("RUST_LOG").ok();
    builder(level, format, rust_log.as_deref()).try_init()
}

fn builder(level: Option<LevelFilter>, format: LogFormat, rust_log: Option<&str>) -> Builder {
    let mut builder = Builder::new();

    match rust_log {
        Some(filters) => {
            builder.parse_filters(filters);
        }
        None => {
            builder.filter_level(LevelFilter::Info);
        }
    }

    builder.filter_module("hyper", LevelFilter::Warn);
    builder.filter_module("reqwest", LevelFilter::Warn);
    builder.filter_module("rustls", LevelFilter::Warn);

    if let Some(level) = level {
        builder.filter_level(level);
        builder.filter_module("link_warden", level);
    }

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{}",
                    serde_json::json!({
                        "ts": chrono::Local::now().to_rfc3339(),
                        "level": record.level().to_string(),
                        "target": record.target(),
                        "msg": record.args().to_string(),
                    })
                )
            });
        }
        LogFormat::Plain => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{} [{:<5}] {}: {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.target(),
                    record.args()
                )
            });
        }
    }

    builder
}
