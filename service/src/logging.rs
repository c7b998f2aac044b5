use crate::config::Config;
use log::{LevelFilter, SetLoggerError};
use simplelog::{self, ColorChoice, ConfigBuilder, TerminalMode};

/// Dependencies whose logs are hidden unless running at Trace level.
/// Streaming connections make hyper and h2 especially chatty.
const FILTERED_MODULES: &[&str] = &[
    "sqlx",
    "sea_orm",
    "tower",
    "tower_http",
    "tracing",
    "hyper",
    "hyper_util",
    "h2",
    "axum",
];

pub struct Logger {}

impl Logger {
    /// Installs the global terminal logger for the level in `config`.
    ///
    /// Colors are disabled in production, where output goes to a log collector.
    pub fn init_logger(config: &Config) -> Result<(), SetLoggerError> {
        let log_config = Self::build_log_config(config.log_level_filter);
        let color_choice = if config.is_production() {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        };

        simplelog::TermLogger::init(
            Self::convert_level_filter(config.log_level_filter),
            log_config,
            TerminalMode::Mixed,
            color_choice,
        )
    }

    fn convert_level_filter(level: LevelFilter) -> simplelog::LevelFilter {
        match level {
            LevelFilter::Off => simplelog::LevelFilter::Off,
            LevelFilter::Error => simplelog::LevelFilter::Error,
            LevelFilter::Warn => simplelog::LevelFilter::Warn,
            LevelFilter::Info => simplelog::LevelFilter::Info,
            LevelFilter::Debug => simplelog::LevelFilter::Debug,
            LevelFilter::Trace => simplelog::LevelFilter::Trace,
        }
    }

    fn filtered_modules(level: LevelFilter) -> &'static [&'static str] {
        if level == LevelFilter::Trace {
            &[]
        } else {
            FILTERED_MODULES
        }
    }

    fn build_log_config(level: LevelFilter) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();

        for module in Self::filtered_modules(level) {
            builder.add_filter_ignore_str(module);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_stack_is_filtered_below_trace() {
        for level in [LevelFilter::Info, LevelFilter::Debug] {
            let modules = Logger::filtered_modules(level);
            assert!(modules.contains(&"hyper"));
            assert!(modules.contains(&"h2"));
            assert!(modules.contains(&"sqlx"));
        }
    }

    #[test]
    fn test_trace_level_shows_everything() {
        assert!(Logger::filtered_modules(LevelFilter::Trace).is_empty());
    }

    #[test]
    fn test_own_crates_are_never_filtered() {
        for crate_name in ["sse", "events", "service", "web", "read_service"] {
            assert!(
                !FILTERED_MODULES.contains(&crate_name),
                "{crate_name} should not be filtered"
            );
        }
    }

    #[test]
    fn test_convert_level_filter_preserves_ordering() {
        assert_eq!(
            Logger::convert_level_filter(LevelFilter::Warn) as u8,
            simplelog::LevelFilter::Warn as u8
        );
        assert_eq!(
            Logger::convert_level_filter(LevelFilter::Trace) as u8,
            simplelog::LevelFilter::Trace as u8
        );
    }
}
