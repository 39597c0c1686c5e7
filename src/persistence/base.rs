use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{file_storage::FileStorage, no_storage::NoStorage};
use crate::config::PersistenceConfig;
use crate::errors::StorageError;
use crate::models::User;

/// The key the auth state is stored under.
pub const AUTH_STORAGE_KEY: &str = "auth-storage";

/// Version of the persisted envelope; bump when its shape changes.
const PERSIST_VERSION: u32 = 0;

/// The UserStorage trait abstracts a synchronous key-value store of strings,
/// the way browser local storage behaves.
pub trait UserStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
    fn is_enabled(&self) -> bool {
        // Real backends persist; NoStorage overrides this for clearer logs.
        true
    }
}

/// Creates a concrete storage based on the PersistenceConfig.
/// If `persistence.enabled = false`, returns NoStorage.
pub fn create_storage(config: &PersistenceConfig) -> Arc<dyn UserStorage> {
    if !config.enabled {
        info!("User persistence is disabled. Using NoStorage.");
        return Arc::new(NoStorage::new());
    }
    info!("Persisting signed-in user to '{}'", config.path);
    Arc::new(FileStorage::new(&config.path))
}

#[derive(Serialize, Deserialize)]
struct PersistedEnvelope {
    state: PersistedState,
    version: u32,
}

#[derive(Serialize, Deserialize)]
struct PersistedState {
    user: Option<User>,
}

/// Reads the persisted user. Unreadable or outdated entries count as absent.
pub fn read_persisted_user(storage: &dyn UserStorage) -> Option<User> {
    let raw = match storage.get_item(AUTH_STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to read persisted auth state: {}", e);
            return None;
        }
    };

    match serde_json::from_str::<PersistedEnvelope>(&raw) {
        Ok(envelope) if envelope.version == PERSIST_VERSION => envelope.state.user,
        Ok(envelope) => {
            debug!(
                "Ignoring persisted auth state with version {}",
                envelope.version
            );
            None
        }
        Err(e) => {
            warn!("Discarding malformed persisted auth state: {}", e);
            None
        }
    }
}

/// Writes the user (or its absence) under `AUTH_STORAGE_KEY`.
pub fn write_persisted_user(
    storage: &dyn UserStorage,
    user: Option<&User>,
) -> Result<(), StorageError> {
    let envelope = PersistedEnvelope {
        state: PersistedState {
            user: user.cloned(),
        },
        version: PERSIST_VERSION,
    };
    let raw = serde_json::to_string(&envelope)?;
    storage.set_item(AUTH_STORAGE_KEY, &raw)
}
