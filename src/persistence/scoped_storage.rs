use std::sync::Arc;

use super::UserStorage;
use crate::errors::StorageError;

/// A view of another storage where every key is prefixed with a scope, so
/// several clients can keep their entries side by side.
pub struct ScopedStorage {
    inner: Arc<dyn UserStorage>,
    scope: String,
}

impl ScopedStorage {
    pub fn new(inner: Arc<dyn UserStorage>, scope: impl Into<String>) -> Self {
        ScopedStorage {
            inner,
            scope: scope.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.scope, key)
    }
}

impl UserStorage for ScopedStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get_item(&self.key(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.set_item(&self.key(key), value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove_item(&self.key(key))
    }

    fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }
}
