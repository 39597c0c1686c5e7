pub mod base;
pub mod firebase_provider;
pub mod observers;
pub mod plain_provider;

// Re-export the primary provider items so code outside can do
// "use crate::providers::{IdentityProvider, create_identity_provider};"
pub use base::{
    create_identity_provider, provider_factory, Credentials, FederatedProvider, IdentityProvider,
    ProviderConfig, ProviderFactory,
};
pub use observers::{AuthEvent, ObserverRegistry, Subscription};
