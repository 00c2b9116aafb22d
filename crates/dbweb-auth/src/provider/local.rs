//! Built-in local credentials provider

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::contract::{AuthProvider, BasicSession, ProviderSession};
use super::error::{ProviderError, ProviderResult};
use super::registry::ProviderDescriptor;
use super::schema::{ConfigSchema, PropertyDescriptor, ProviderConfig};
use crate::constants::{CRED_PASSWORD, CRED_USER, PROVIDER_LOCAL};
use crate::error::Result;
use crate::types::Credentials;

/// User name / password pairs kept in the security store
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalAuthProvider;

impl LocalAuthProvider {
    pub fn credential_schema() -> ConfigSchema {
        ConfigSchema::new()
            .with_property(
                PropertyDescriptor::string(CRED_USER, "User name")
                    .required()
                    .identifying(),
            )
            .with_property(PropertyDescriptor::secret(CRED_PASSWORD, "Password").required())
    }

    /// Descriptor registered under the `local` id
    pub fn descriptor() -> Result<ProviderDescriptor> {
        Self::descriptor_with(BTreeMap::new())
    }

    /// Descriptor carrying operator-supplied configuration. The local
    /// provider takes no options, so any key is rejected.
    pub fn descriptor_with(config: BTreeMap<String, Value>) -> Result<ProviderDescriptor> {
        ProviderDescriptor::builder(PROVIDER_LOCAL, "Local", Arc::new(Self))
            .description("Local name/password based authentication")
            .config_schema(ConfigSchema::new())
            .credential_schema(Self::credential_schema())
            .config(config)
            .build()
    }
}

fn passwords_match(stored: &str, presented: &str) -> bool {
    // length leak only; content compared without early exit
    stored.len() == presented.len()
        && stored
            .bytes()
            .zip(presented.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn open_session(
        &self,
        session_id: &str,
        _config: &ProviderConfig,
        stored: &Credentials,
        presented: &Credentials,
    ) -> ProviderResult<Arc<dyn ProviderSession>> {
        let presented_password = presented
            .get_str(CRED_PASSWORD)
            .ok_or_else(|| ProviderError::MissingCredential(CRED_PASSWORD.into()))?;
        let Some(stored_password) = stored.get_str(CRED_PASSWORD) else {
            return Err(ProviderError::InvalidCredentials(
                "user has no local password".into(),
            ));
        };
        if !passwords_match(stored_password, presented_password) {
            return Err(ProviderError::InvalidCredentials(
                "password does not match".into(),
            ));
        }

        Ok(Arc::new(BasicSession::new(PROVIDER_LOCAL, session_id)))
    }
}
