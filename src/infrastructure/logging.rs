//! Tracing initialization: console layer plus optional rolling file layer.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::domain::settings::LogSettings;

pub struct LoggingGuard {
    // Keeps the non-blocking writer alive so file logs are flushed.
    _guards: Vec<WorkerGuard>,
}

pub fn init_logger(settings: &LogSettings) -> anyhow::Result<LoggingGuard> {
    let mut guards = Vec::new();

    let level_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = if settings.console_logging_enabled {
        Some(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(settings.ansi_colors),
        )
    } else {
        None
    };

    let file_layer = if settings.file_logging_enabled {
        let appender = match settings.rotation.as_str() {
            "minutely" => {
                tracing_appender::rolling::minutely(&settings.log_dir, &settings.file_name_prefix)
            }
            "hourly" => {
                tracing_appender::rolling::hourly(&settings.log_dir, &settings.file_name_prefix)
            }
            "never" => tracing_appender::rolling::never(
                &settings.log_dir,
                format!("{}.log", settings.file_name_prefix),
            ),
            _ => tracing_appender::rolling::daily(&settings.log_dir, &settings.file_name_prefix),
        };
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(level_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(LoggingGuard { _guards: guards })
}
