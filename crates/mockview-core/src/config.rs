// Configuration loading and parsing (mockview.toml, credentials.toml).

use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides `jwt_secret` from credentials.toml.
pub const JWT_SECRET_ENV: &str = "MOCKVIEW_JWT_SECRET";

/// Upper bound for `interview.max_duration_min` (one day).
pub const MAX_DURATION_LIMIT_MIN: u64 = 24 * 60;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub interview: InterviewConfig,
    pub store: StoreConfig,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// mockview.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire mockview.toml file.
#[derive(Debug, Clone, Deserialize)]
struct MockviewFile {
    server: ServerConfig,
    interview: InterviewConfig,
    store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub http_port: u16,
    pub ws_port: u16,
    /// Path the interview routes are nested under, e.g. `/api/interview`.
    pub api_prefix: String,
    /// CORS origins; empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterviewConfig {
    pub default_duration_min: u64,
    pub max_duration_min: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub db_path: String,
    /// Route failed SQLite writes to an in-process map instead of failing
    /// the request. Only meaningful with the sqlite backend.
    #[serde(default)]
    pub fallback_to_memory: bool,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub jwt_secret: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/mockview.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// `jwt_secret_env` takes precedence over the credentials file when set.
/// This does not auto-copy defaults; prefer `load_config()`.
pub fn load_config_from(
    base_dir: &Path,
    jwt_secret_env: Option<String>,
) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- mockview.toml (required) ---
    let main_path = config_dir.join("mockview.toml");
    let main_text = read_file(&main_path)?;
    let file: MockviewFile = toml::from_str(&main_text).map_err(|e| ConfigError::ParseError {
        path: main_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let mut credentials: CredentialsConfig = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    if let Some(secret) = jwt_secret_env.filter(|s| !s.trim().is_empty()) {
        credentials.jwt_secret = Some(secret);
    }

    let config = Config {
        server: file.server,
        interview: file.interview,
        store: file.store,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Files seeded into `config/` from `defaults/` when absent. Credentials are
/// never seeded; `credentials.toml.example` only documents the format.
const SEEDED_FILES: &[&str] = &["mockview.toml"];

/// Copy any missing [`SEEDED_FILES`] from `defaults/` into `config/`.
/// Returns the paths that were created. Existing files are never touched.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    match (defaults_dir.is_dir(), config_dir.is_dir()) {
        (false, false) => {
            return Err(copy_error(format!(
                "neither defaults/ nor config/ directory found in {}; \
                 run from the project root",
                base_dir.display()
            )))
        }
        (false, true) => return Ok(vec![]),
        _ => {}
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("failed to create {}: {e}", config_dir.display())))?;

    let mut copied = Vec::new();
    for name in SEEDED_FILES {
        let source = defaults_dir.join(name);
        let target = config_dir.join(name);
        if source.is_file() && copy_if_missing(&source, &target)? {
            copied.push(target);
        }
    }
    Ok(copied)
}

/// Copy `source` to `target` unless `target` already exists. Returns
/// whether a copy was made.
fn copy_if_missing(source: &Path, target: &Path) -> Result<bool, ConfigError> {
    let mut dest = match OpenOptions::new().write(true).create_new(true).open(target) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(copy_error(format!("failed to create {}: {e}", target.display()))),
    };
    let mut src = File::open(source)
        .map_err(|e| copy_error(format!("failed to open {}: {e}", source.display())))?;
    io::copy(&mut src, &mut dest).map_err(|e| {
        copy_error(format!(
            "failed to copy {} to {}: {e}",
            source.display(),
            target.display()
        ))
    })?;
    Ok(true)
}

/// Convenience wrapper: loads config relative to the current working
/// directory, copying defaults first and honouring `MOCKVIEW_JWT_SECRET`.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd, std::env::var(JWT_SECRET_ENV).ok())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn copy_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.http_port != 0 && server.http_port == server.ws_port {
        return Err(invalid(
            "server.ws_port",
            format!("must differ from server.http_port ({})", server.http_port),
        ));
    }
    if !server.api_prefix.starts_with('/') || server.api_prefix.len() < 2 {
        return Err(invalid(
            "server.api_prefix",
            format!("must start with '/' and name a path, got {:?}", server.api_prefix),
        ));
    }
    if server.api_prefix.ends_with('/') {
        return Err(invalid("server.api_prefix", "must not end with '/'"));
    }

    let interview = &config.interview;
    if interview.max_duration_min == 0 || interview.max_duration_min > MAX_DURATION_LIMIT_MIN {
        return Err(invalid(
            "interview.max_duration_min",
            format!(
                "must be between 1 and {MAX_DURATION_LIMIT_MIN}, got {}",
                interview.max_duration_min
            ),
        ));
    }
    if interview.default_duration_min == 0
        || interview.default_duration_min > interview.max_duration_min
    {
        return Err(invalid(
            "interview.default_duration_min",
            format!(
                "must be between 1 and max_duration_min ({}), got {}",
                interview.max_duration_min, interview.default_duration_min
            ),
        ));
    }

    if config.store.backend == StoreBackend::Sqlite && config.store.db_path.trim().is_empty() {
        return Err(invalid("store.db_path", "must not be empty for the sqlite backend"));
    }

    match config.credentials.jwt_secret.as_deref() {
        None => {
            return Err(invalid(
                "credentials.jwt_secret",
                format!("must be set in config/credentials.toml or {JWT_SECRET_ENV}"),
            ))
        }
        Some(secret) if secret.len() < 16 => {
            return Err(invalid(
                "credentials.jwt_secret",
                "must be at least 16 characters",
            ))
        }
        Some(_) => {}
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
