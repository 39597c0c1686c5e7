use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::persistence::PersistenceConfig;
use crate::providers::ProviderConfig;

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0: identity provider, persistence, HTTP shell and logging.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub bind_address: String,
    /// Public hostname the UI is served from; drives `Environment` detection.
    pub public_host: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ConfigV1 {
    pub fn environment(&self) -> Environment {
        Environment::from_host(self.public_host.as_deref())
    }
}

/// Behaviour of the HTTP shell around the auth stores.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct AuthConfig {
    /// How long a request waits for the store to settle after an operation.
    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,
    /// A client's store is dropped after this long without a request.
    #[serde(default = "default_session_idle_timeout_secs")]
    pub session_idle_timeout_secs: u64,
}

fn default_settle_timeout_ms() -> u64 {
    5000
}

fn default_session_idle_timeout_secs() -> u64 {
    1800
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            settle_timeout_ms: default_settle_timeout_ms(),
            session_idle_timeout_secs: default_session_idle_timeout_secs(),
        }
    }
}

/// Deployment environment, as guessed from the public hostname.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn from_host(host: Option<&str>) -> Self {
        let Some(host) = host else {
            return Environment::Development;
        };
        if host.contains("localhost") || host.contains("127.0.0.1") {
            Environment::Development
        } else if host.contains("staging") || host.contains("preview") {
            Environment::Staging
        } else {
            Environment::Production
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Builds the figment used for loading: the YAML file, overridden by
/// `FINPAL_`-prefixed environment variables (`__` separates nested keys).
pub fn figment(path: &str) -> Figment {
    Figment::new()
        .merge(Yaml::file(path))
        .merge(Env::prefixed("FINPAL_").split("__"))
}

/// Extracts a `ConfigV1` from any figment, migrating older versions when they exist.
pub fn extract_config(figment: &Figment) -> Result<ConfigV1, figment::Error> {
    match figment.extract::<Config>()? {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Load config from a YAML file (default "./config.yaml") plus the environment.
pub fn load_config(path: &str) -> ConfigV1 {
    match extract_config(&figment(path)) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
