//! Configuration loader
//!
//! Loads the portal SSO configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the required ones are missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports TOML and JSON formats
//!
//! ## Environment Variables
//! Required:
//! - `PORTAL_SSO_URL`: identity provider base URL
//! - `PORTAL_SSO_CLIENT_ID`: OAuth client id
//! - `PORTAL_SSO_PORTAL_ORIGIN`: origin of the host page
//!
//! Optional:
//! - `PORTAL_SSO_REDIRECT_URL`, `PORTAL_SSO_AUDIENCE`,
//!   `PORTAL_SSO_SILENT_LOGIN_PARAM`, `PORTAL_SSO_PORTAL_NAME`,
//!   `PORTAL_SSO_REFRESH_REDIRECT_PAGE`, `PORTAL_SSO_AUTHORITY_NAMESPACE`
//! - `PORTAL_SSO_SCOPES`: space or comma separated
//! - `PORTAL_SSO_VALIDATE`: `nonce` or `state`
//! - `PORTAL_SSO_LOGOUT_MODE`: `cors`, `no-cors` or `same-origin`
//! - `PORTAL_SSO_LOAD_TIMEOUT_MS`, `PORTAL_SSO_MESSAGE_TIMEOUT_MS`,
//!   `PORTAL_SSO_REFRESH_OFFSET_SECS`
//! - `PORTAL_SSO_LOG_LEVEL`, `PORTAL_SSO_LOG_JSON`
//! - `PORTAL_SSO_IDLE_ENABLED`, `PORTAL_SSO_IDLE_INACTIVITY_MINS`,
//!   `PORTAL_SSO_IDLE_CONFIRMATION_MINS`
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./portal-sso.toml` or `./portal-sso.json`
//! 2. `./config.toml` or `./config.json`
//! 3. `../portal-sso.toml`

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::DeserializeOwned;

use portal_sso_domain::{
    IdleConfig, LoggingConfig, OAuthConfig, OAuthTimeouts, Result, SsoConfig, SsoError,
};

const ENV_PREFIX: &str = "PORTAL_SSO_";

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variable is missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `SsoError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing or empty
pub fn load() -> Result<SsoConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from `PORTAL_SSO_*` environment variables
///
/// # Errors
/// Returns `SsoError::Config` if a required variable is missing or any
/// variable has an invalid value.
pub fn load_from_env() -> Result<SsoConfig> {
    let mut oauth =
        OAuthConfig::new(env_var("URL")?, env_var("CLIENT_ID")?, env_var("PORTAL_ORIGIN")?);

    oauth.redirect_url = env_opt("REDIRECT_URL");
    oauth.audience = env_opt("AUDIENCE");
    oauth.silent_login_param = env_opt("SILENT_LOGIN_PARAM");
    oauth.refresh_redirect_page = env_opt("REFRESH_REDIRECT_PAGE");
    if let Some(name) = env_opt("PORTAL_NAME") {
        oauth.portal_name = name;
    }
    if let Some(namespace) = env_opt("AUTHORITY_NAMESPACE") {
        oauth.authority_namespace = namespace;
    }
    if let Some(scopes) = env_opt("SCOPES") {
        oauth.scopes = split_scopes(&scopes);
    }
    if let Some(validate) = env_enum("VALIDATE")? {
        oauth.validate = validate;
    }
    if let Some(mode) = env_enum("LOGOUT_MODE")? {
        oauth.logout_mode = mode;
    }

    let defaults = OAuthTimeouts::default();
    oauth.timeouts = OAuthTimeouts {
        load_timeout_ms: env_parse("LOAD_TIMEOUT_MS")?.unwrap_or(defaults.load_timeout_ms),
        message_timeout_ms: env_parse("MESSAGE_TIMEOUT_MS")?.unwrap_or(defaults.message_timeout_ms),
        refresh_offset_secs: env_parse("REFRESH_OFFSET_SECS")?
            .unwrap_or(defaults.refresh_offset_secs),
    };
    oauth.validate()?;

    let default_logging = LoggingConfig::default();
    let logging = LoggingConfig {
        level: env_opt("LOG_LEVEL").unwrap_or(default_logging.level),
        json: env_bool("LOG_JSON", default_logging.json),
    };

    let default_idle = IdleConfig::default();
    let idle = IdleConfig {
        enabled: env_bool("IDLE_ENABLED", default_idle.enabled),
        inactivity_interval_mins: env_parse("IDLE_INACTIVITY_MINS")?
            .unwrap_or(default_idle.inactivity_interval_mins),
        logout_confirmation_interval_mins: env_parse("IDLE_CONFIRMATION_MINS")?
            .unwrap_or(default_idle.logout_confirmation_interval_mins),
    };

    Ok(SsoConfig { oauth, logging, idle })
}

/// Load configuration from a file
///
/// If `path` is `None`, searches the standard locations. Format is detected by
/// file extension (`.toml` or `.json`).
///
/// # Errors
/// Returns `SsoError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing or empty
pub fn load_from_file(path: Option<PathBuf>) -> Result<SsoConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SsoError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => find_config_paths().ok_or_else(|| {
            SsoError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SsoError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.oauth.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension; files without one are read as TOML.
fn parse_config(contents: &str, path: &Path) -> Result<SsoConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SsoError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SsoError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(SsoError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard paths for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn find_config_paths() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    [
        "portal-sso.toml",
        "portal-sso.json",
        "config.toml",
        "config.json",
        "../portal-sso.toml",
    ]
    .into_iter()
    .map(|candidate| cwd.join(candidate))
    .find(|path| path.exists())
}

fn split_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|scope| !scope.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_key(name: &str) -> String {
    format!("{ENV_PREFIX}{name}")
}

/// Get a required environment variable
fn env_var(name: &str) -> Result<String> {
    let key = env_key(name);
    std::env::var(&key)
        .map_err(|_| SsoError::Config(format!("Missing required environment variable: {key}")))
}

/// Get an optional, non-empty environment variable
fn env_opt(name: &str) -> Option<String> {
    std::env::var(env_key(name)).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(name)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| {
                SsoError::Config(format!("Invalid value for {}: {e}", env_key(name)))
            })
        })
        .transpose()
}

/// Parse an enum through its serde names (e.g. `no-cors`)
fn env_enum<T: DeserializeOwned>(name: &str) -> Result<Option<T>> {
    env_opt(name)
        .map(|value| {
            serde_json::from_value(serde_json::Value::String(value.trim().to_ascii_lowercase()))
                .map_err(|e| SsoError::Config(format!("Invalid value for {}: {e}", env_key(name))))
        })
        .transpose()
}

/// Parse a boolean environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(name: &str, default: bool) -> bool {
    env_opt(name)
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
