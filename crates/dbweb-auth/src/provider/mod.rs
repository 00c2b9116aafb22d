//! Pluggable authentication providers
//!
//! Every provider implements [`AuthProvider`]. Providers backed by an outside
//! identity system additionally carry an [`ExternalAuthAdapter`] on their
//! [`ProviderDescriptor`], which the login flow checks for instead of
//! downcasting the provider.

mod contract;
mod error;
mod local;
mod registry;
mod schema;

pub use contract::{AuthProvider, BasicSession, ExternalAuthAdapter, ProviderSession};
pub use error::{ProviderError, ProviderResult};
pub use local::LocalAuthProvider;
pub use registry::{
    ProviderDescriptor, ProviderDescriptorBuilder, ProviderInfo, ProviderRegistry,
    ProviderRegistryBuilder, ServiceDescriptor,
};
pub use schema::{ConfigSchema, PropertyDescriptor, PropertyKind, ProviderConfig};
