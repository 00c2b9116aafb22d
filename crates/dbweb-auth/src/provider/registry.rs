//! Provider and service registry
//!
//! Built once at startup and read-only afterwards. Provider configuration is
//! validated against its declared schema when the descriptor is built, so a
//! registry never holds an unusable provider.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::contract::{AuthProvider, ExternalAuthAdapter};
use super::schema::{ConfigSchema, PropertyDescriptor, ProviderConfig};
use crate::constants::{CORE_SERVICE_ID, PERMISSION_ADMIN, PERMISSION_PUBLIC};
use crate::error::{Error, Result};
use crate::types::{Credentials, PermissionInfo};

/// Registered authentication provider
#[derive(Clone)]
pub struct ProviderDescriptor {
    id: String,
    label: String,
    description: Option<String>,
    credential_schema: ConfigSchema,
    config: ProviderConfig,
    provider: Arc<dyn AuthProvider>,
    external: Option<Arc<dyn ExternalAuthAdapter>>,
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("external", &self.external.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProviderDescriptor {
    pub fn builder(
        id: impl Into<String>,
        label: impl Into<String>,
        provider: Arc<dyn AuthProvider>,
    ) -> ProviderDescriptorBuilder {
        ProviderDescriptorBuilder {
            id: id.into(),
            label: label.into(),
            description: None,
            config_schema: ConfigSchema::new(),
            credential_schema: ConfigSchema::new().allow_extra(),
            raw_config: BTreeMap::new(),
            provider,
            external: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub const fn is_external(&self) -> bool {
        self.external.is_some()
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn AuthProvider> {
        &self.provider
    }

    #[must_use]
    pub fn external(&self) -> Option<&Arc<dyn ExternalAuthAdapter>> {
        self.external.as_ref()
    }

    #[must_use]
    pub const fn config(&self) -> &ProviderConfig {
        &self.config
    }

    #[must_use]
    pub const fn credential_schema(&self) -> &ConfigSchema {
        &self.credential_schema
    }

    /// Subset of `credentials` used for user lookup.
    ///
    /// Falls back to the full set when the schema marks nothing identifying.
    #[must_use]
    pub fn identifying_credentials(&self, credentials: &Credentials) -> Credentials {
        let mut keys = self.credential_schema.identifying_keys().peekable();
        if keys.peek().is_none() {
            return credentials.clone();
        }
        credentials.project(keys)
    }

    #[must_use]
    pub fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: self.id.clone(),
            label: self.label.clone(),
            description: self.description.clone(),
            external: self.is_external(),
            credential_parameters: self.credential_schema.properties().to_vec(),
        }
    }
}

#[must_use = "call build() to validate the provider configuration"]
pub struct ProviderDescriptorBuilder {
    id: String,
    label: String,
    description: Option<String>,
    config_schema: ConfigSchema,
    credential_schema: ConfigSchema,
    raw_config: BTreeMap<String, Value>,
    provider: Arc<dyn AuthProvider>,
    external: Option<Arc<dyn ExternalAuthAdapter>>,
}

impl fmt::Debug for ProviderDescriptorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptorBuilder")
            .field("id", &self.id)
            .field("external", &self.external.is_some())
            .finish_non_exhaustive()
    }
}

impl ProviderDescriptorBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn config_schema(mut self, schema: ConfigSchema) -> Self {
        self.config_schema = schema;
        self
    }

    pub fn credential_schema(mut self, schema: ConfigSchema) -> Self {
        self.credential_schema = schema;
        self
    }

    pub fn config(mut self, raw: BTreeMap<String, Value>) -> Self {
        self.raw_config = raw;
        self
    }

    pub fn config_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.raw_config.insert(key.into(), value.into());
        self
    }

    pub fn external(mut self, adapter: Arc<dyn ExternalAuthAdapter>) -> Self {
        self.external = Some(adapter);
        self
    }

    pub fn build(self) -> Result<ProviderDescriptor> {
        if self.id.is_empty() {
            return Err(Error::Config("provider id must not be empty".into()));
        }
        let config = self
            .config_schema
            .validate(self.raw_config)
            .map_err(|e| Error::Config(format!("provider '{}': {e}", self.id)))?;

        Ok(ProviderDescriptor {
            id: self.id,
            label: self.label,
            description: self.description,
            credential_schema: self.credential_schema,
            config,
            provider: self.provider,
            external: self.external,
        })
    }
}

/// Public view of a provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderInfo {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub external: bool,
    pub credential_parameters: Vec<PropertyDescriptor>,
}

/// Service module declaring permissions
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    id: String,
    permissions: Vec<PermissionInfo>,
}

impl ServiceDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            permissions: Vec::new(),
        }
    }

    /// Built-in service declaring `admin` and `public`
    #[must_use]
    pub fn core() -> Self {
        Self::new(CORE_SERVICE_ID)
            .with_permission(
                PermissionInfo::new(PERMISSION_ADMIN, "Administrator")
                    .with_description("Full administrative access"),
            )
            .with_permission(
                PermissionInfo::new(PERMISSION_PUBLIC, "Public")
                    .with_description("Access to the public API"),
            )
    }

    #[must_use]
    pub fn with_permission(mut self, mut permission: PermissionInfo) -> Self {
        permission.provided_by.clone_from(&self.id);
        self.permissions.push(permission);
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn permissions(&self) -> &[PermissionInfo] {
        &self.permissions
    }
}

/// Immutable lookup of providers (registration order) and service permissions
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
    index: HashMap<String, usize>,
    services: Vec<ServiceDescriptor>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field(
                "providers",
                &self.providers.iter().map(ProviderDescriptor::id).collect::<Vec<_>>(),
            )
            .field(
                "services",
                &self.services.iter().map(ServiceDescriptor::id).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    #[must_use]
    pub fn get_provider(&self, id: &str) -> Option<&ProviderDescriptor> {
        self.index.get(id).map(|&i| &self.providers[i])
    }

    #[must_use]
    pub fn list_providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    /// Permissions of every registered service, duplicates by id dropped
    #[must_use]
    pub fn list_permissions_of_all_services(&self) -> Vec<PermissionInfo> {
        let mut seen = std::collections::HashSet::new();
        self.services
            .iter()
            .flat_map(ServiceDescriptor::permissions)
            .filter(|p| seen.insert(p.id.clone()))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn has_permission(&self, permission_id: &str) -> bool {
        self.services
            .iter()
            .flat_map(ServiceDescriptor::permissions)
            .any(|p| p.id == permission_id)
    }
}

#[derive(Default)]
#[must_use = "call build() to create the registry"]
pub struct ProviderRegistryBuilder {
    providers: Vec<ProviderDescriptor>,
    services: Vec<ServiceDescriptor>,
}

impl fmt::Debug for ProviderRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistryBuilder")
            .field("providers", &self.providers.len())
            .field("services", &self.services.len())
            .finish()
    }
}

impl ProviderRegistryBuilder {
    pub fn provider(mut self, descriptor: ProviderDescriptor) -> Self {
        self.providers.push(descriptor);
        self
    }

    pub fn service(mut self, service: ServiceDescriptor) -> Self {
        self.services.push(service);
        self
    }

    pub fn build(self) -> Result<ProviderRegistry> {
        let mut index = HashMap::with_capacity(self.providers.len());
        for (i, descriptor) in self.providers.iter().enumerate() {
            if index.insert(descriptor.id.clone(), i).is_some() {
                return Err(Error::Config(format!(
                    "duplicate auth provider '{}'",
                    descriptor.id
                )));
            }
        }

        tracing::debug!(
            providers = self.providers.len(),
            services = self.services.len(),
            "Provider registry initialized"
        );

        Ok(ProviderRegistry {
            providers: self.providers,
            index,
            services: self.services,
        })
    }
}
