use super::UserStorage;
use crate::errors::StorageError;

/// A no-op storage used when persistence is disabled: writes are dropped and
/// nothing is ever found.
pub struct NoStorage;

impl NoStorage {
    pub fn new() -> Self {
        NoStorage
    }
}

impl Default for NoStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStorage for NoStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
