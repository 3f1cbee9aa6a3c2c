//! Configuration management for the chat store bootstrap
//!
//! Settings are read from a TOML file (by default
//! `$HOME/.chatstore/chatstore.toml`, created with a commented template on
//! first run) and can be overridden through `CHATSTORE_`-prefixed
//! environment variables, e.g. `CHATSTORE_SERVER_HOST=db.example.org`.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::Config;
use serde::Serialize;

use crate::error::{Result, StoreError};

/// Default database name used when no explicit name is requested
pub const DEFAULT_DB_NAME: &str = "chat";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 27017;
const DEFAULT_MAX_POOL_SIZE: u32 = 200;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_CONNECTING: u32 = 10;

const EMPTY_CONFIG: &str = r#"### chatstore configuration file

### server mode: "external" connects to a managed instance,
### "embed" starts a throwaway local mongod (development only)
# server_type = "external"
# server_host = "127.0.0.1"
# server_port = 27017

### database settings
# db_name = "chat"
# db_authentication = false
# db_user = ""
# db_password = ""

### connection pool tuning
# max_pool_size = 200
# connect_timeout_secs = 60
# max_connecting = 10
"#;

/// Which kind of server instance the process connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    /// A configured, externally managed instance
    External,
    /// A throwaway in-process server started on demand
    Embed,
}

impl ServerType {
    fn parse(s: &str) -> Result<ServerType> {
        match s.to_lowercase().as_str() {
            "external" => Ok(ServerType::External),
            "embed" => Ok(ServerType::Embed),
            other => Err(StoreError::config(format!(
                "invalid server_type '{other}', expected 'external' or 'embed'"
            ))),
        }
    }
}

impl std::fmt::Display for ServerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerType::External => write!(f, "external"),
            ServerType::Embed => write!(f, "embed"),
        }
    }
}

/// Resolved configuration for the chat store connection
#[derive(Debug, Clone, Serialize)]
pub struct ChatStoreConfig {
    /// Server mode (external instance or embedded dev server)
    pub server_type: ServerType,

    /// Store host name or address
    pub server_host: String,

    /// Store port
    pub server_port: u16,

    /// Default database name
    pub db_name: String,

    /// Whether credentials are attached to the connection
    pub db_authentication: bool,

    /// Username, required when authentication is enabled
    pub db_user: Option<String>,

    /// Password, required when authentication is enabled
    #[serde(skip_serializing)]
    pub db_password: Option<String>,

    /// Maximum pooled connections to the store
    pub max_pool_size: u32,

    /// Connect and server-selection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Cap on connections being established concurrently
    pub max_connecting: u32,
}

impl Default for ChatStoreConfig {
    fn default() -> Self {
        Self {
            server_type: ServerType::External,
            server_host: DEFAULT_HOST.to_string(),
            server_port: DEFAULT_PORT,
            db_name: DEFAULT_DB_NAME.to_string(),
            db_authentication: false,
            db_user: None,
            db_password: None,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_connecting: DEFAULT_MAX_CONNECTING,
        }
    }
}

impl ChatStoreConfig {
    /// Load configuration from a file and the environment
    ///
    /// When `path` is `None` the default `$HOME/.chatstore/chatstore.toml`
    /// is used; a commented template is written if the file does not exist
    /// yet. Environment variables prefixed with `CHATSTORE_` override file
    /// values.
    pub fn new(path: &Option<String>) -> Result<ChatStoreConfig> {
        let mut builder = Config::builder();

        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        StoreError::config(format!("unable to create config file {p}: {e}"))
                    })?;
                }
            }
            None => {
                let home_dir = dirs::home_dir()
                    .ok_or_else(|| StoreError::config("could not find home directory"))?;
                let chatstore_dir = home_dir.join(".chatstore");
                std::fs::create_dir_all(&chatstore_dir).map_err(|e| {
                    StoreError::config(format!(
                        "unable to create directory {}: {e}",
                        chatstore_dir.display()
                    ))
                })?;
                let p = chatstore_dir.join("chatstore.toml");
                if p.exists() {
                    let path_str = p
                        .to_str()
                        .ok_or_else(|| StoreError::config("non-UTF8 config path"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(&p, EMPTY_CONFIG).map_err(|e| {
                        StoreError::config(format!(
                            "unable to create config file {}: {e}",
                            p.display()
                        ))
                    })?;
                }
            }
        }

        // Environment overrides, e.g. CHATSTORE_SERVER_PORT=27018
        builder = builder.add_source(config::Environment::with_prefix("CHATSTORE"));

        let settings = builder
            .build()
            .map_err(|e| StoreError::config(format!("failed to build configuration: {e}")))?;

        let values = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| StoreError::config(format!("failed to read configuration: {e}")))?;

        Self::from_values(&values)
    }

    /// Build a configuration out of raw key/value pairs
    ///
    /// Missing keys fall back to defaults; a present but malformed
    /// `server_type` or `server_port` is an error rather than a silent
    /// fallback.
    pub fn from_values(values: &HashMap<String, String>) -> Result<ChatStoreConfig> {
        let server_type = match values.get("server_type") {
            Some(s) => ServerType::parse(s)?,
            None => ServerType::External,
        };

        let server_host = values
            .get("server_host")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let server_port = match values.get("server_port") {
            Some(s) => s.parse::<u16>().map_err(|_| {
                StoreError::config(format!("invalid server_port '{s}', expected a port number"))
            })?,
            None => DEFAULT_PORT,
        };

        let db_name = values
            .get("db_name")
            .cloned()
            .unwrap_or_else(|| DEFAULT_DB_NAME.to_string());

        let db_authentication = values
            .get("db_authentication")
            .map(|s| s == "true")
            .unwrap_or(false);

        let db_user = values.get("db_user").filter(|s| !s.is_empty()).cloned();
        let db_password = values.get("db_password").filter(|s| !s.is_empty()).cloned();

        let max_pool_size = values
            .get("max_pool_size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE);

        let connect_timeout_secs = values
            .get("connect_timeout_secs")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);

        let max_connecting = values
            .get("max_connecting")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_CONNECTING);

        let config = ChatStoreConfig {
            server_type,
            server_host,
            server_port,
            db_name,
            db_authentication,
            db_user,
            db_password,
            max_pool_size,
            connect_timeout_secs,
            max_connecting,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency (credentials must accompany auth)
    pub fn validate(&self) -> Result<()> {
        if self.db_authentication {
            if self.db_user.is_none() {
                return Err(StoreError::config(
                    "db_user is required when db_authentication is enabled",
                ));
            }
            if self.db_password.is_none() {
                return Err(StoreError::config(
                    "db_password is required when db_authentication is enabled",
                ));
            }
        }
        Ok(())
    }

    /// Server address as `host:port`
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Connection string for the configured server (without credentials;
    /// those are attached as driver options)
    pub fn connection_uri(&self) -> String {
        format!("mongodb://{}:{}/", self.server_host, self.server_port)
    }

    /// Connect timeout as a `Duration`
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let lines = vec![
            format!("Server Type:      {}", self.server_type),
            format!("Server Address:   {}", self.server_address()),
            format!("Database:         {}", self.db_name),
            format!("Authentication:   {}", self.db_authentication),
            format!("Max Pool Size:    {}", self.max_pool_size),
            format!("Connect Timeout:  {} seconds", self.connect_timeout_secs),
            format!("Max Connecting:   {}", self.max_connecting),
        ];
        lines.join("\n")
    }

    /// Get the default config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{home_dir}/.chatstore/chatstore.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = ChatStoreConfig::default();
        assert_eq!(config.server_type, ServerType::External);
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.server_port, 27017);
        assert_eq!(config.db_name, "chat");
        assert!(!config.db_authentication);
        assert_eq!(config.max_pool_size, 200);
        assert_eq!(config.connect_timeout_secs, 60);
    }

    #[test]
    fn test_from_values() {
        let config = ChatStoreConfig::from_values(&values(&[
            ("server_type", "embed"),
            ("server_host", "db.internal"),
            ("server_port", "27117"),
            ("db_name", "chat_test"),
        ]))
        .unwrap();

        assert_eq!(config.server_type, ServerType::Embed);
        assert_eq!(config.server_host, "db.internal");
        assert_eq!(config.server_port, 27117);
        assert_eq!(config.db_name, "chat_test");
        assert_eq!(config.server_address(), "db.internal:27117");
        assert_eq!(config.connection_uri(), "mongodb://db.internal:27117/");
    }

    #[test]
    fn test_invalid_server_type() {
        let result = ChatStoreConfig::from_values(&values(&[("server_type", "embedded")]));
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[test]
    fn test_invalid_port() {
        let result = ChatStoreConfig::from_values(&values(&[("server_port", "not-a-port")]));
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[test]
    fn test_auth_requires_credentials() {
        let result = ChatStoreConfig::from_values(&values(&[("db_authentication", "true")]));
        assert!(matches!(result, Err(StoreError::Config(_))));

        let config = ChatStoreConfig::from_values(&values(&[
            ("db_authentication", "true"),
            ("db_user", "chat"),
            ("db_password", "secret"),
        ]))
        .unwrap();
        assert!(config.db_authentication);
        assert_eq!(config.db_user.as_deref(), Some("chat"));
    }

    #[test]
    fn test_connect_timeout_duration() {
        let config =
            ChatStoreConfig::from_values(&values(&[("connect_timeout_secs", "5")])).unwrap();
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_server_type_display() {
        assert_eq!(format!("{}", ServerType::External), "external");
        assert_eq!(format!("{}", ServerType::Embed), "embed");
    }
}
