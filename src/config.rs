//! The config module defines the application configuration.
//!
//! The configuration is a single JSON object on disk. If the file is missing, it is created
//! with the built-in defaults so operators have something to edit. If it exists but cannot be
//! parsed, or any field is missing or of the wrong primitive kind, the built-in defaults are
//! used for the current run and the file is left untouched.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

/// The default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "slp_config.json";

/// [`Config`] holds all configuration for the application. One immutable instance is created
/// on startup and then shared among the application components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The network address that should be used to bind the TCP listener.
    pub ip: String,

    /// The port that should be used to bind the TCP listener.
    pub port: u16,

    /// The numeric protocol version advertised in the status document.
    pub protocol: i32,

    /// The description (MOTD) text, may contain `§` formatting codes and newlines.
    pub motd: String,

    /// The textual version label shown in place of a real server version.
    pub version_text: String,

    /// The text component body sent to refuse login attempts.
    pub kick_message: String,

    /// The path of the server icon PNG. The favicon is omitted if the file does not exist.
    pub server_icon: String,

    /// The fake player names listed in the status hover sample.
    pub samples: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ip: "0.0.0.0".to_string(),
            port: 25565,
            protocol: 2,
            motd: "§c服务器正在维护！\n§e请等待服主通知".to_string(),
            version_text: "§4服务器维护中...".to_string(),
            kick_message: "§4§l很抱歉，服务器正在维护中，暂时无法进入！\n\n§e请不要心急，耐心等待服主通知"
                .to_string(),
            server_icon: "server-icon.png".to_string(),
            samples: vec![
                "§f服务器正在维护".to_string(),
                "§f请等待服主通知".to_string(),
            ],
        }
    }
}

impl Config {
    /// Loads the configuration from the given path, falling back to the defaults.
    ///
    /// A missing file is created with the defaults; any other failure keeps the file untouched
    /// and only affects the running process.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            warn!(path = %path.display(), "configuration file not found");
            return Self::create_default_file(path);
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                error!(cause = %err, "failed to read the configuration file, using built-in defaults for this run");
                return Self::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(config) => {
                info!(path = %path.display(), "configuration loaded");
                config
            }
            Err(err) => {
                error!(cause = %err, "configuration file invalid, using built-in defaults for this run (file left unchanged)");
                Self::default()
            }
        }
    }

    fn create_default_file(path: &Path) -> Self {
        let config = Self::default();
        let contents = match serde_json::to_string_pretty(&config) {
            Ok(contents) => contents,
            Err(err) => {
                error!(cause = %err, "failed to encode the default configuration");
                return config;
            }
        };

        match fs::write(path, contents) {
            Ok(()) => info!(path = %path.display(), "created a new configuration file with defaults"),
            Err(err) => {
                error!(cause = %err, "failed to create the configuration file, using built-in defaults for this run");
            }
        }

        config
    }

    /// Returns the `ip:port` address the listener should bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}
