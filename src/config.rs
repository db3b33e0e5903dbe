use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// pazar real-time notification and chat delivery server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(
    name = "pazar-realtime",
    version,
    about = "pazar real-time notification and chat delivery server"
)]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PAZAR_PORT", default_value = "8090")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "PAZAR_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./pazar.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "PAZAR_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, JWT verification key)
    #[arg(long, env = "PAZAR_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Seconds an unauthenticated WebSocket may wait for its auth frame
    #[arg(long, env = "PAZAR_AUTH_GRACE_SECS", default_value = "10")]
    pub auth_grace_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8090,
            bind_address: "0.0.0.0".to_string(),
            config: "./pazar.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            auth_grace_secs: 10,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (PAZAR_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("PAZAR_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# pazar real-time server configuration
# Place this file at ./pazar.toml or specify with --config <path>
# All settings can be overridden via environment variables (PAZAR_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8090)
# port = 8090

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for SQLite database and JWT verification key
# data_dir = "./data"

# Seconds an unauthenticated WebSocket may wait for its auth frame
# before being closed (default: 10)
# auth_grace_secs = 10
"#
    .to_string()
}
