use std::path::PathBuf;

use once_cell::sync::Lazy;
use serde::Deserialize;

/// Process-wide configuration, loaded once on first access and never
/// replaced — mirrors the teacher's own `config::CONFIG` static.
pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::from_env().expect("failed to load configuration"));

fn default_listen_addr() -> String {
    "0.0.0.0:9443".to_string()
}

fn default_external_rules_enabled() -> bool {
    true
}

/// Process configuration, loaded once from environment variables prefixed
/// `CONF_` via `envy::prefixed("CONF_").from_env()`.
#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    /// Installed Kubernetes Service namespace of the webhook.
    pub service_namespace: String,
    /// Installed Kubernetes Service name of the webhook.
    pub service_name: String,
    /// Installed Kubernetes Service port of the webhook.
    pub service_port: i32,

    /// Certificate path for HTTPS.
    pub cert_path: PathBuf,
    /// Certificate key path for HTTPS.
    pub key_path: PathBuf,

    /// Base64-encoded PEM CA bundle used when registering webhook
    /// configurations at startup.
    pub ca_bundle: String,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Gates the `external-rules` feature: when true, an external
    /// RoleTemplate's `externalRules` field is preferred over its backing
    /// cluster role.
    #[serde(default = "default_external_rules_enabled")]
    pub external_rules_enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("CONF_").from_env()
    }
}
