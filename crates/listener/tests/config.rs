//! Integration tests for `ListenerConfig`.
//!
//! Configuration is read through `from_lookup` with a fixed map, so the
//! tests never touch the process environment.

use std::collections::HashMap;
use std::time::Duration;

use assert_matches::assert_matches;
use gw_listener::config::{ConfigError, ListenerConfig, LogFormat};

fn load(vars: &[(&str, &str)]) -> Result<ListenerConfig, ConfigError> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ListenerConfig::from_lookup(|key| map.get(key).cloned())
}

// ---------------------------------------------------------------------------
// Test: defaults apply when only DATABASE_URL is set
// ---------------------------------------------------------------------------

#[test]
fn defaults_with_only_database_url() {
    let config = load(&[("DATABASE_URL", "postgres://gw@localhost/ws")]).unwrap();

    assert_eq!(config.database_url, "postgres://gw@localhost/ws");
    assert_eq!(config.channels, None);
    assert_eq!(config.log_format, LogFormat::Text);
    assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
}

// ---------------------------------------------------------------------------
// Test: DATABASE_URL is required
// ---------------------------------------------------------------------------

#[test]
fn missing_database_url_is_an_error() {
    assert_matches!(load(&[]), Err(ConfigError::Missing("DATABASE_URL")));
    assert_matches!(
        load(&[("DATABASE_URL", "  ")]),
        Err(ConfigError::Missing("DATABASE_URL"))
    );
}

// ---------------------------------------------------------------------------
// Test: channel list is split, trimmed, and stripped of empties
// ---------------------------------------------------------------------------

#[test]
fn channels_are_split_and_trimmed() {
    let config = load(&[
        ("DATABASE_URL", "postgres://localhost/ws"),
        ("NOTIFY_CHANNELS", " operator , ws_sample,, "),
    ])
    .unwrap();

    assert_eq!(
        config.channels,
        Some(vec!["operator".to_string(), "ws_sample".to_string()])
    );
}

#[test]
fn blank_channel_list_falls_back_to_default() {
    let config = load(&[
        ("DATABASE_URL", "postgres://localhost/ws"),
        ("NOTIFY_CHANNELS", " , "),
    ])
    .unwrap();

    assert_eq!(config.channels, None);
}

// ---------------------------------------------------------------------------
// Test: log format parsing
// ---------------------------------------------------------------------------

#[test]
fn log_format_is_case_insensitive() {
    let config = load(&[
        ("DATABASE_URL", "postgres://localhost/ws"),
        ("LOG_FORMAT", "JSON"),
    ])
    .unwrap();

    assert_eq!(config.log_format, LogFormat::Json);
}

#[test]
fn unknown_log_format_is_rejected() {
    assert_matches!(
        load(&[
            ("DATABASE_URL", "postgres://localhost/ws"),
            ("LOG_FORMAT", "xml"),
        ]),
        Err(ConfigError::Invalid { var: "LOG_FORMAT", .. })
    );
}

// ---------------------------------------------------------------------------
// Test: shutdown timeout parsing
// ---------------------------------------------------------------------------

#[test]
fn shutdown_timeout_is_parsed() {
    let config = load(&[
        ("DATABASE_URL", "postgres://localhost/ws"),
        ("SHUTDOWN_TIMEOUT_SECS", "12"),
    ])
    .unwrap();

    assert_eq!(config.shutdown_timeout, Duration::from_secs(12));
}

#[test]
fn non_numeric_shutdown_timeout_is_rejected() {
    assert_matches!(
        load(&[
            ("DATABASE_URL", "postgres://localhost/ws"),
            ("SHUTDOWN_TIMEOUT_SECS", "soon"),
        ]),
        Err(ConfigError::Invalid { var: "SHUTDOWN_TIMEOUT_SECS", value, .. }) if value == "soon"
    );
}
