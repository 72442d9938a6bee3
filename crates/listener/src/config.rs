use std::time::Duration;

/// Output format of the fmt tracing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Listener configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerConfig {
    /// Postgres URL for the dedicated listening session.
    pub database_url: String,
    /// Channels to listen on. `None` means the session's `current_user`.
    pub channels: Option<Vec<String>>,
    pub log_format: LogFormat,
    /// Upper bound on waiting for the poll loop to exit at shutdown.
    pub shutdown_timeout: Duration,
}

impl ListenerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                 | Default                     |
    /// |-------------------------|-----------------------------|
    /// | `DATABASE_URL`          | required                    |
    /// | `NOTIFY_CHANNELS`       | session `current_user`      |
    /// | `LOG_FORMAT`            | `text`                      |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `5`                         |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let channels = lookup("NOTIFY_CHANNELS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty());

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") => LogFormat::default(),
            Some(v) if v.eq_ignore_ascii_case("text") => LogFormat::Text,
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    value: other.to_string(),
                    reason: "expected 'text' or 'json'".into(),
                })
            }
        };

        let shutdown_timeout_secs: u64 = match lookup("SHUTDOWN_TIMEOUT_SECS") {
            None => 5,
            Some(raw) => raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    var: "SHUTDOWN_TIMEOUT_SECS",
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?,
        };

        Ok(Self {
            database_url,
            channels,
            log_format,
            shutdown_timeout: Duration::from_secs(shutdown_timeout_secs),
        })
    }
}
