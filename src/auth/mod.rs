pub mod forms;
pub mod guard;
pub mod hook;
pub mod sessions;
pub mod state;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// Re-export the pieces handlers need so they can "use crate::auth::*;"
pub use hook::AuthHook;
pub use sessions::{ClientSession, SessionRegistry};
pub use state::{AuthState, AuthView};
pub use store::AuthStore;
