use std::fmt::{self, Display, Formatter};

use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::config::LogConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        write!(f, "{}", s)
    }
}

/// Initializes the global logger. Console output is colored unless
/// disabled, the log file rotates daily unless date based naming is
/// turned off. Noisy HTTP internals are capped at warn.
pub fn setup_logger(config: &LogConfig) -> Result<(), fern::InitError> {
    let console_level: LevelFilter = config.log_level.into();
    let file_level: LevelFilter = config.file_log_level.unwrap_or(config.log_level).into();
    let base_level = if config.disable_file_logging {
        console_level
    } else {
        console_level.max(file_level)
    };

    let mut base = fern::Dispatch::new()
        .level(base_level)
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("hyper", LevelFilter::Warn);

    let colors = ColoredLevelConfig::new()
        .trace(Color::Magenta)
        .debug(Color::Blue)
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red);
    let disable_color = config.disable_log_color;
    let stdout_log = fern::Dispatch::new()
        .level(console_level)
        .format(move |out, message, record| {
            let level = if disable_color {
                record.level().to_string()
            } else {
                colors.color(record.level()).to_string()
            };
            out.finish(format_args!(
                "[{}] [{:<5}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                level,
                record.target(),
                message
            ))
        })
        .chain(std::io::stdout());
    base = base.chain(stdout_log);

    if !config.disable_file_logging {
        std::fs::create_dir_all(&config.logs_path)?;
        let file_log = fern::Dispatch::new().level(file_level).format(|out, message, record| {
            out.finish(format_args!(
                "[{}] [{:<5}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        });
        let file_log = if config.disable_file_log_date_based {
            file_log.chain(fern::log_file(format!("{}{}", config.logs_path, config.filename_log))?)
        } else {
            file_log.chain(fern::DateBased::new(
                config.logs_path.clone(),
                format!("%Y-%m-%d.{}", config.filename_log),
            ))
        };
        base = base.chain(file_log);
    }

    base.apply()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter_mapping() {
        assert_eq!(LevelFilter::from(LogLevel::Off), LevelFilter::Off);
        assert_eq!(LevelFilter::from(LogLevel::Info), LevelFilter::Info);
        assert_eq!(LevelFilter::from(LogLevel::Trace), LevelFilter::Trace);
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }
}
