//! Identity, role, permission and grant records

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{META_AUTH_PROVIDER, META_AUTH_SPACE_ID, PROVIDER_LOCAL};

/// Durable principal record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub meta_parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub configuration_parameters: BTreeMap<String, Value>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
            meta_parameters: BTreeMap::new(),
            configuration_parameters: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn set_meta_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.meta_parameters.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn meta_parameter(&self, key: &str) -> Option<&str> {
        self.meta_parameters.get(key).map(String::as_str)
    }

    /// Tag the user with the provider that created it.
    ///
    /// An empty `subtype` leaves any previous space id untouched.
    pub fn set_origin(&mut self, provider_id: &str, subtype: Option<&str>) {
        self.set_meta_parameter(META_AUTH_PROVIDER, provider_id);
        if let Some(space) = subtype.filter(|s| !s.is_empty()) {
            self.set_meta_parameter(META_AUTH_SPACE_ID, space);
        }
    }

    /// Origin provider id, `local` when the user was created by an admin
    #[must_use]
    pub fn origin_provider(&self) -> &str {
        self.meta_parameter(META_AUTH_PROVIDER)
            .filter(|p| !p.is_empty())
            .unwrap_or(PROVIDER_LOCAL)
    }

    #[must_use]
    pub fn origin_space(&self) -> Option<&str> {
        self.meta_parameter(META_AUTH_SPACE_ID)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub role_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl Role {
    pub fn new(role_id: impl Into<String>) -> Self {
        Self {
            role_id: role_id.into(),
            name: None,
            description: None,
            permissions: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }
}

/// Permission declared by a service module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionInfo {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub provided_by: String,
}

impl PermissionInfo {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            provided_by: String::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Opaque provider credentials.
///
/// Values are never printed by `Debug`, only the keys are.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, Value>);

impl Credentials {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keep only the given keys
    #[must_use]
    pub fn project<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut out = Self::new();
        for key in keys {
            if let Some(value) = self.0.get(key) {
                out.0.insert(key.to_string(), value.clone());
            }
        }
        out
    }

    /// True when every entry of `other` is present here with the same value
    #[must_use]
    pub fn contains_all(&self, other: &Self) -> bool {
        other
            .0
            .iter()
            .all(|(k, v)| self.0.get(k).is_some_and(|mine| mine == v))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.0.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Credentials {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    User,
    Role,
}

/// Association between a subject (user or role) and a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionGrant {
    pub connection_id: String,
    pub subject_id: String,
    pub subject_type: SubjectType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_by: Option<String>,
}
