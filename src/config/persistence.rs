use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the signed-in user is kept between restarts.
/// - enabled: if false, nothing is persisted (NoStorage).
/// - path: the JSON file holding the key-value entries.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct PersistenceConfig {
    pub enabled: bool,
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_path() -> String {
    "./finpal-storage.json".to_string()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        PersistenceConfig {
            enabled: false,
            path: default_path(),
        }
    }
}
