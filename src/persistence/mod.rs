pub mod base;
pub mod file_storage;
pub mod memory_storage;
pub mod no_storage;
pub mod scoped_storage;

// Re-export the primary storage items so code outside can do
// "use crate::persistence::{UserStorage, create_storage};"
pub use base::{create_storage, read_persisted_user, write_persisted_user, UserStorage, AUTH_STORAGE_KEY};
pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;
pub use no_storage::NoStorage;
pub use scoped_storage::ScopedStorage;
