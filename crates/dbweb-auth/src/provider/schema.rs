//! Declared property schemas for provider configuration and credentials

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    String,
    Secret,
    Boolean,
    Integer,
}

impl PropertyKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String | Self::Secret => value.is_string(),
            Self::Boolean => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Secret => "secret",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
        }
    }
}

/// One declared property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: PropertyKind,
    #[serde(default)]
    pub required: bool,
    /// Credential property used to look the user up
    #[serde(default)]
    pub identifying: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl PropertyDescriptor {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            kind,
            required: false,
            identifying: false,
            default_value: None,
        }
    }

    pub fn string(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, PropertyKind::String)
    }

    pub fn secret(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, PropertyKind::Secret)
    }

    pub fn boolean(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, PropertyKind::Boolean)
    }

    pub fn integer(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, PropertyKind::Integer)
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub const fn identifying(mut self) -> Self {
        self.identifying = true;
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Ordered property list; keys outside it are rejected unless `allow_extra` is set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSchema {
    properties: Vec<PropertyDescriptor>,
    #[serde(default)]
    allow_extra: bool,
}

impl ConfigSchema {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            properties: Vec::new(),
            allow_extra: false,
        }
    }

    #[must_use]
    pub fn with_property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    /// Accept free-form keys that the schema does not declare
    #[must_use]
    pub const fn allow_extra(mut self) -> Self {
        self.allow_extra = true;
        self
    }

    #[must_use]
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    #[must_use]
    pub fn property(&self, id: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.id == id)
    }

    pub fn identifying_keys(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .filter(|p| p.identifying)
            .map(|p| p.id.as_str())
    }

    /// Check `raw` against the schema and fill declared defaults
    pub fn validate(&self, raw: BTreeMap<String, Value>) -> Result<ProviderConfig, String> {
        let mut values = raw;

        if !self.allow_extra
            && let Some(unknown) = values.keys().find(|k| self.property(k).is_none())
        {
            return Err(format!("unknown property '{unknown}'"));
        }

        for property in &self.properties {
            match values.get(&property.id) {
                Some(value) if !property.kind.accepts(value) => {
                    return Err(format!(
                        "property '{}' must be a {}",
                        property.id,
                        property.kind.as_str()
                    ));
                }
                Some(_) => {}
                None => {
                    if let Some(default) = &property.default_value {
                        values.insert(property.id.clone(), default.clone());
                    } else if property.required {
                        return Err(format!("missing required property '{}'", property.id));
                    }
                }
            }
        }

        Ok(ProviderConfig(values))
    }
}

/// Validated provider configuration.
///
/// May contain secrets (client keys, bind passwords), so `Debug` lists keys only.
#[derive(Clone, Default, PartialEq)]
pub struct ProviderConfig(BTreeMap<String, Value>);

impl ProviderConfig {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("keys", &self.0.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
