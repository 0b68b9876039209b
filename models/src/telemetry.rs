//! Project-wide utility for initializing tracing.
use serde::Deserialize;
use snafu::ResultExt;
use std::env;
use std::fmt;
use std::str::FromStr;
use tracing::Subscriber;
use tracing_subscriber::{filter::LevelFilter, fmt as tracing_fmt, layer::SubscriberExt, EnvFilter, Registry};

const TRACING_FILTER_DIRECTIVE_ENV_VAR: &str = "SLOWDRAIN_LOG";
const LOGGING_FORMATTER_ENV_VAR: &str = "LOGGING_FORMATTER";
const LOGGING_ANSI_ENABLED_ENV_VAR: &str = "LOGGING_ANSI_ENABLED";

/// Minimum severity of emitted log events.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = TelemetryConfigError;

    fn from_str(level: &str) -> Result<Self> {
        serde_plain::from_str(&level.to_lowercase()).context(error::LogLevelSnafu { level })
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(level)
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// The formatter for logging tracing events.
///
/// Controls the format of the message as well as whether or not to enable ANSI colors.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LogFormatter {
    message_format: MessageFormat,
    ansi_enabled: bool,
}

impl Default for LogFormatter {
    fn default() -> Self {
        LogFormatter {
            message_format: MessageFormat::default(),
            ansi_enabled: true,
        }
    }
}

impl LogFormatter {
    pub fn try_from_env() -> Result<Self> {
        let message_format = MessageFormat::try_from_env()?;
        let ansi_enabled = Self::ansi_enabled_from_env()?;

        Ok(Self {
            message_format,
            ansi_enabled,
        })
    }

    fn ansi_enabled_from_env() -> Result<bool> {
        env::var(LOGGING_ANSI_ENABLED_ENV_VAR)
            .ok()
            .map(|ansi_enabled_str| parse_ansi_enabled(&ansi_enabled_str))
            .unwrap_or(Ok(true))
    }

    /// Adds a formatting layer to a tracing event subscriber.
    fn add_format_layer<S>(&self, event_subscriber: S) -> Box<dyn Subscriber + Send + Sync>
    where
        S: SubscriberExt + Send + Sync + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        // The layers are all different types, so each arm boxes its own subscriber.
        match self.message_format {
            MessageFormat::Full => Box::new(
                event_subscriber.with(tracing_fmt::layer().with_ansi(self.ansi_enabled)),
            ),
            MessageFormat::Compact => Box::new(
                event_subscriber.with(
                    tracing_fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_ansi(self.ansi_enabled),
                ),
            ),
            MessageFormat::Pretty => Box::new(
                event_subscriber.with(tracing_fmt::layer().pretty().with_ansi(self.ansi_enabled)),
            ),
            MessageFormat::Json => Box::new(
                event_subscriber.with(tracing_fmt::layer().json().with_ansi(self.ansi_enabled)),
            ),
        }
    }
}

fn parse_ansi_enabled(ansi_enabled_str: &str) -> Result<bool> {
    ansi_enabled_str
        .to_lowercase()
        .parse()
        .context(error::LogAnsiEnvSnafu {
            env_value: ansi_enabled_str,
        })
}

/// The message format for logging tracing events.
///
/// See https://docs.rs/tracing-subscriber/latest/tracing_subscriber/fmt/format/index.html
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    /// Human-readable, single-line logs for each event.
    Full,
    /// A variant of the default formatter optimized for short line lengths.
    #[default]
    Compact,
    /// Pretty-formatted multi-line logs optimized for human readability.
    Pretty,
    /// Newline-delimited JSON logs.
    Json,
}

impl MessageFormat {
    pub fn try_from_env() -> Result<Self> {
        env::var(LOGGING_FORMATTER_ENV_VAR)
            .ok()
            .map(|formatter| {
                serde_plain::from_str(&formatter).context(error::LogFormatterEnvSnafu {
                    env_value: formatter,
                })
            })
            .unwrap_or(Ok(Default::default()))
    }
}

/// Installs the global tracing subscriber. Events below `level` are dropped, unless the `SLOWDRAIN_LOG`
/// environment variable provides its own filter directives.
pub fn init_telemetry(level: LogLevel) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(level).into())
        .with_env_var(TRACING_FILTER_DIRECTIVE_ENV_VAR)
        .from_env_lossy();

    let subscriber = Registry::default().with(env_filter);
    let subscriber = LogFormatter::try_from_env()?.add_format_layer(subscriber);

    tracing::subscriber::set_global_default(subscriber)
        .context(error::TracingConfigurationSnafu)?;

    Ok(())
}

pub mod error {
    use std::str::ParseBoolError;

    use super::*;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum TelemetryConfigError {
        #[snafu(display("Error configuring tracing: '{}'", source))]
        TracingConfiguration {
            source: tracing::subscriber::SetGlobalDefaultError,
        },

        #[snafu(display(
            "Invalid log level '{}', expected one of debug, info, warn, error: '{}'",
            level,
            source
        ))]
        LogLevel {
            source: serde_plain::Error,
            level: String,
        },

        #[snafu(display(
            "Could not parse formatter from environment variable '{}={}': '{}'",
            LOGGING_FORMATTER_ENV_VAR,
            env_value,
            source
        ))]
        LogFormatterEnv {
            source: serde_plain::Error,
            env_value: String,
        },

        #[snafu(display(
            "Could not parse ANSI enablement from environment variable '{}={}': '{}'",
            LOGGING_ANSI_ENABLED_ENV_VAR,
            env_value,
            source
        ))]
        LogAnsiEnv {
            source: ParseBoolError,
            env_value: String,
        },
    }
}

type Result<T> = std::result::Result<T, TelemetryConfigError>;
pub use error::TelemetryConfigError;
