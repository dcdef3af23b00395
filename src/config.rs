use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    // Populated from the .env file
    pub database_path: String,
    pub media_path: String,
    pub public_base_url: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub session_secret_key: String,
    pub use_secure_cookies: bool,
}

fn required_var(name: &str) -> Result<String, config::ConfigError> {
    env::var(name).map_err(|_| {
        config::ConfigError::Message(format!(
            "FATAL: Environment variable '{}' is not set in your .env file.",
            name
        ))
    })
}

fn absolute_path_var(name: &str) -> Result<String, config::ConfigError> {
    let value = required_var(name)?;
    if Path::new(&value).is_relative() {
        return Err(config::ConfigError::Message(format!(
            "FATAL: The '{}' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
            name, value
        )));
    }
    Ok(value)
}

/// Checks that the key is 128 hex characters (64 bytes).
pub fn validate_session_key(key: &str) -> Result<(), config::ConfigError> {
    if key.len() != 128 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(config::ConfigError::Message(
            "FATAL: 'SESSION_SECRET_KEY' must be 128 hexadecimal characters long (64 bytes).".to_string(),
        ));
    }
    Ok(())
}

impl Config {
    /// Loads `config/default.toml` plus the variables of the given .env file.
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path).map_err(|e| {
            config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}",
                env_path.display(),
                e
            ))
        })?;
        Self::from_process_env(Path::new("config/default.toml"))
    }

    /// Builds the configuration from variables already in the process
    /// environment, with web settings taken from `defaults`.
    pub fn from_process_env(defaults: &Path) -> Result<Self, config::ConfigError> {
        let database_path = absolute_path_var("DATABASE_PATH")?;
        let media_path = absolute_path_var("MEDIA_PATH")?;

        let session_secret_key = required_var("SESSION_SECRET_KEY")?;
        validate_session_key(&session_secret_key)?;

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_default();
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let use_secure_cookies = env::var("USE_SECURE_COOKIES")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let mut builder = config::Config::builder()
            .add_source(config::File::from(defaults).format(config::FileFormat::Toml))
            .set_override("database_path", database_path)?
            .set_override("media_path", media_path)?
            .set_override("session_secret_key", session_secret_key)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("use_secure_cookies", use_secure_cookies)?
            .set_default("public_base_url", "")?;

        if let Ok(public_base_url) = env::var("PUBLIC_BASE_URL") {
            if url::Url::parse(&public_base_url).is_err() {
                return Err(config::ConfigError::Message(format!(
                    "FATAL: 'PUBLIC_BASE_URL' is not a valid URL ('{}').",
                    public_base_url
                )));
            }
            builder = builder.set_override("public_base_url", public_base_url)?;
        }

        let mut config: Config = builder.build()?.try_deserialize()?;
        if config.public_base_url.is_empty() {
            config.public_base_url = format!("http://{}:{}", config.web.host, config.web.port);
        }
        Ok(config)
    }

    /// SQLite accounts database inside its own folder.
    pub fn users_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path).join("users").join("users.db")
    }

    /// redb document database inside its own folder.
    pub fn documents_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path)
            .join("documents")
            .join("documents.redb")
    }

    /// Base URL stored images are served under.
    pub fn media_base_url(&self) -> String {
        format!("{}/media", self.public_base_url.trim_end_matches('/'))
    }
}
