use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub session_duration_hours: i64,
    #[serde(default)]
    pub secure_cookies: bool,
    /// Consecutive failed logins before the account is locked.
    pub max_failed_attempts: i64,
    /// Length of a timed lockout. Ignored in `manual` mode.
    pub lockout_minutes: i64,
    #[serde(default)]
    pub lockout_mode: LockoutMode,
    pub temp_password_length: usize,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LockoutMode {
    /// Lock expires after `lockout_minutes`.
    #[default]
    Timed,
    /// Lock stays until an administrator unlocks the account.
    Manual,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ListingConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default)]
    pub malformed_rows: MalformedRowPolicy,
    pub max_rows: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            malformed_rows: MalformedRowPolicy::default(),
            max_rows: 5000,
        }
    }
}

/// What to do with a CSV row whose cell count differs from the header.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MalformedRowPolicy {
    /// Report the row as an error; the import is blocked.
    #[default]
    Reject,
    /// Fill missing trailing cells with empty strings. Extra cells are still an error.
    Pad,
    /// Fill missing cells and drop extra ones.
    Truncate,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://flock.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("auth.session_duration_hours", 24)?
            .set_default("auth.max_failed_attempts", 5)?
            .set_default("auth.lockout_minutes", 30)?
            .set_default("auth.temp_password_length", 12)?
            .set_default("listing.default_page_size", 20)?
            .set_default("listing.max_page_size", 500)?
            .set_default("import.max_rows", 5000)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with FLOCK__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("FLOCK").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://flock.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                session_duration_hours: 24,
                secure_cookies: false,
                max_failed_attempts: 5,
                lockout_minutes: 30,
                lockout_mode: LockoutMode::Timed,
                temp_password_length: 12,
            },
            listing: ListingConfig::default(),
            import: ImportConfig::default(),
        }
    }
}
