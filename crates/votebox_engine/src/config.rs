use serde::Deserialize;
use tracing::info;

use votebox_base::{FilePath, Pal, ResultExt, VoteboxResult};

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_true() -> bool {
    true
}

/// Server configuration, read from `votebox.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on. 0 lets the OS pick one.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Whether `/register/` creates accounts.
    #[serde(default = "default_true")]
    pub allow_registration: bool,
    /// Indent JSON responses by this many spaces. Compact when unset.
    #[serde(default)]
    pub json_indent: Option<usize>,
    /// JSON file with questions to load at start.
    #[serde(default)]
    pub data_file: Option<String>,
    /// Accounts created at start.
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allow_registration: true,
            json_indent: None,
            data_file: None,
            users: vec![],
        }
    }
}

/// An account to create at start.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    pub username: String,
    pub password: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Parse a configuration file.
pub fn parse_config(text: &str) -> VoteboxResult<Config> {
    toml::from_str(text).map_err(|e| votebox_base::err!("Invalid configuration: {}", e))
}

/// Read and parse the configuration file at `path`.
pub fn load_config(pal: &dyn Pal, path: &FilePath) -> VoteboxResult<Config> {
    let text = pal
        .read_file_to_string(path)
        .with_context(|| format!("Failed to read configuration {}", path))?;
    let config = parse_config(&text).with_context(|| format!("In {}", path))?;
    info!(path = %path, "loaded configuration");
    Ok(config)
}
