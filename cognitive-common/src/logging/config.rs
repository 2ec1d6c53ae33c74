use std::env;
use std::fmt as std_fmt;
use std::io;

use tracing::Subscriber;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{ChronoLocal, ChronoUtc, FormatTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use super::json_layer::JsonLayer;

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f %z";
const UTC_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-field human output, colored on a terminal
    #[default]
    Pretty,
    Compact,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Unknown names fall back to `Pretty`
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else if name.eq_ignore_ascii_case("compact") {
            LogFormat::Compact
        } else {
            LogFormat::Pretty
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timestamps {
    #[default]
    Local,
    Utc,
    Off,
}

impl Timestamps {
    /// Unknown names fall back to `Local`
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "utc" => Timestamps::Utc,
            "none" | "off" => Timestamps::Off,
            _ => Timestamps::Local,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub timestamps: Timestamps,
    /// Filter used when `RUST_LOG` is unset
    pub default_level: String,
    /// Emit `file:line` for each event
    pub include_location: bool,
    /// Stamped on JSON events as `app`
    pub app_name: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            timestamps: Timestamps::default(),
            default_level: "info".to_string(),
            include_location: false,
            app_name: None,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        let var = |name: &str| env::var(name).ok();
        Self {
            format: var("LOG_FORMAT")
                .map(|s| LogFormat::from_name(&s))
                .unwrap_or_default(),
            timestamps: var("LOG_TIMESTAMPS")
                .map(|s| Timestamps::from_name(&s))
                .unwrap_or_default(),
            default_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            include_location: var("LOG_LOCATION").is_some_and(|s| s == "1" || s == "true"),
            app_name: var("LOG_APP_NAME"),
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn with_default_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }
}

/// Either chrono timer, so both share one layer type
enum Timer {
    Local(ChronoLocal),
    Utc(ChronoUtc),
}

impl Timer {
    fn for_setting(timestamps: Timestamps) -> Option<Self> {
        match timestamps {
            Timestamps::Local => Some(Timer::Local(ChronoLocal::new(LOCAL_TIME_FORMAT.into()))),
            Timestamps::Utc => Some(Timer::Utc(ChronoUtc::new(UTC_TIME_FORMAT.into()))),
            Timestamps::Off => None,
        }
    }
}

impl FormatTime for Timer {
    fn format_time(&self, w: &mut Writer<'_>) -> std_fmt::Result {
        match self {
            Timer::Local(t) => t.format_time(w),
            Timer::Utc(t) => t.format_time(w),
        }
    }
}

fn text_layer<S>(config: &LogConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let base = fmt::layer()
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_ansi(atty::is(atty::Stream::Stdout));
    let compact = config.format == LogFormat::Compact;

    match (compact, Timer::for_setting(config.timestamps)) {
        (true, Some(timer)) => base.compact().with_timer(timer).boxed(),
        (true, None) => base.compact().without_time().boxed(),
        (false, Some(timer)) => base.with_timer(timer).boxed(),
        (false, None) => base.without_time().boxed(),
    }
}

/// Install the global subscriber.
///
/// Fails when a global subscriber is already set.
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == LogFormat::Json {
        let layer = JsonLayer::new(io::stdout)
            .with_app(config.app_name.clone())
            .with_location(config.include_location)
            .with_utc(config.timestamps != Timestamps::Local);
        registry.with(layer).try_init()?;
    } else {
        registry.with(text_layer(&config)).try_init()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        assert_eq!(LogFormat::from_name("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_name("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::from_name("fancy"), LogFormat::Pretty);

        assert_eq!(Timestamps::from_name("UTC"), Timestamps::Utc);
        assert_eq!(Timestamps::from_name("off"), Timestamps::Off);
        assert_eq!(Timestamps::from_name("none"), Timestamps::Off);
        assert_eq!(Timestamps::from_name(""), Timestamps::Local);
    }

    #[test]
    fn test_builder_overrides_defaults() {
        let config = LogConfig::default()
            .with_format(LogFormat::Json)
            .with_app_name("cognitive-monitor")
            .with_default_level("cognitive_core=debug");

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.timestamps, Timestamps::Local);
        assert_eq!(config.app_name.as_deref(), Some("cognitive-monitor"));
        assert_eq!(config.default_level, "cognitive_core=debug");
        assert!(!config.include_location);
    }
}
