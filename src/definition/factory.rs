//! # Work Definition Factory
//!
//! Parses persisted configuration blobs into typed [`WorkDefinition`] values.
//! Suppliers are dual-addressed: a structured [`TypeTag`] is the primary key,
//! and an optional legacy string identifier keeps older persisted
//! configurations parseable. Resolution tries the tag first and falls back to
//! the legacy identifier.
//!
//! One factory instance is constructed per process (usually owned by the
//! [`ActivityHandlerRegistry`](crate::registry::ActivityHandlerRegistry)) and
//! passed by reference; there are no global statics.

use crate::definition::work_definition::{
    AsyncUpdateWork, AutoScalingWork, CoordinateWork, PropagationWork, ScriptingWork, SearchWork,
    TriggerScanWork, WorkDefinition, WorkKind,
};
use crate::error::{CoreError, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Structured identity of a work definition type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeTag {
    pub namespace: String,
    pub name: String,
    pub version: String,
}

impl TypeTag {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Canonical tag of a built-in work kind
    pub fn builtin(kind: WorkKind) -> Self {
        Self::new("core", kind.to_string(), "1")
    }

    /// Convert to string key for storage
    pub fn key_string(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.name, self.version)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.name, self.version)
    }
}

/// Legacy string identifier of a built-in work kind, kept for configurations
/// persisted before structured tags existed
pub fn builtin_legacy_uri(kind: WorkKind) -> String {
    format!("urn:work:{kind}")
}

/// A persisted work configuration blob: addressing plus an opaque payload
/// the resolved supplier knows how to interpret
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<TypeTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_uri: Option<String>,
    pub payload: Value,
}

impl WorkConfig {
    pub fn typed(tag: TypeTag, payload: Value) -> Self {
        Self {
            type_tag: Some(tag),
            legacy_uri: None,
            payload,
        }
    }

    pub fn legacy(uri: impl Into<String>, payload: Value) -> Self {
        Self {
            type_tag: None,
            legacy_uri: Some(uri.into()),
            payload,
        }
    }

    /// Human-readable addressing for error messages
    fn describe_addressing(&self) -> String {
        match (&self.type_tag, &self.legacy_uri) {
            (Some(tag), Some(uri)) => format!("tag '{tag}' / legacy uri '{uri}'"),
            (Some(tag), None) => format!("tag '{tag}'"),
            (None, Some(uri)) => format!("legacy uri '{uri}'"),
            (None, None) => "no addressing".to_string(),
        }
    }
}

/// Constructor turning a raw payload into a typed definition
pub type Supplier = Arc<dyn Fn(&Value) -> Result<WorkDefinition> + Send + Sync>;

#[derive(Clone)]
struct RegisteredSupplier {
    tag: TypeTag,
    legacy_uri: Option<String>,
    supplier: Supplier,
}

/// Registry of work definition suppliers with dual addressing
#[derive(Default)]
pub struct WorkDefinitionFactory {
    by_tag: DashMap<String, RegisteredSupplier>,
    by_uri: DashMap<String, RegisteredSupplier>,
}

impl WorkDefinitionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with suppliers for all built-in work kinds already wired
    pub fn with_builtins() -> Self {
        let factory = Self::new();
        factory.register_builtins();
        factory
    }

    /// Register serde-based suppliers for every built-in work kind under its
    /// canonical tag and legacy identifier
    pub fn register_builtins(&self) {
        for kind in WorkKind::ALL {
            let supplier: Supplier = Arc::new(move |payload: &Value| {
                parse_builtin(kind, payload)
            });
            // Built-in tags are well-formed, so registration cannot fail
            let _ = self.register_supplier(
                TypeTag::builtin(kind),
                Some(builtin_legacy_uri(kind)),
                supplier,
            );
        }
    }

    /// Register a supplier under a tag and an optional legacy identifier.
    ///
    /// Re-registration with the same key overwrites the previous supplier,
    /// making startup wiring idempotent.
    pub fn register_supplier(
        &self,
        tag: TypeTag,
        legacy_uri: Option<String>,
        supplier: Supplier,
    ) -> Result<()> {
        if tag.namespace.is_empty() || tag.name.is_empty() || tag.version.is_empty() {
            return Err(CoreError::ConfigurationError(format!(
                "Type tag '{tag}' has an empty component"
            )));
        }
        if let Some(uri) = &legacy_uri {
            if uri.is_empty() {
                return Err(CoreError::ConfigurationError(format!(
                    "Legacy uri for tag '{tag}' is empty"
                )));
            }
        }

        let registered = RegisteredSupplier {
            tag: tag.clone(),
            legacy_uri: legacy_uri.clone(),
            supplier,
        };

        // Replacing an existing registration must also replace its legacy
        // alias, so a re-register with a changed uri leaves no stale entry
        if let Some(previous) = self.by_tag.insert(tag.key_string(), registered.clone()) {
            if let Some(old_uri) = previous.legacy_uri {
                if legacy_uri.as_deref() != Some(old_uri.as_str()) {
                    self.by_uri.remove(&old_uri);
                }
            }
        }
        if let Some(uri) = legacy_uri {
            self.by_uri.insert(uri, registered);
        }

        info!(
            tag = %tag,
            "📚 FACTORY: Registered work definition supplier"
        );
        Ok(())
    }

    /// Remove a supplier and its legacy alias
    pub fn unregister(&self, tag: &TypeTag) -> bool {
        match self.by_tag.remove(&tag.key_string()) {
            Some((_, registered)) => {
                if let Some(uri) = registered.legacy_uri {
                    self.by_uri.remove(&uri);
                }
                info!(tag = %tag, "📚 FACTORY: Unregistered work definition supplier");
                true
            }
            None => false,
        }
    }

    /// Parse a persisted blob into a typed definition.
    ///
    /// Resolution order: structured tag first, then the legacy identifier.
    /// Fails with a configuration error when neither resolves and a schema
    /// error when the payload is structurally invalid for the resolved
    /// variant.
    pub fn parse(&self, config: &WorkConfig) -> Result<WorkDefinition> {
        debug!(
            addressing = %config.describe_addressing(),
            "🎯 FACTORY: Resolving work definition supplier"
        );

        let registered = self.resolve(config).ok_or_else(|| {
            CoreError::ConfigurationError(format!(
                "No work definition supplier registered for {}",
                config.describe_addressing()
            ))
        })?;

        let definition = (registered.supplier)(&config.payload)?;
        debug!(
            tag = %registered.tag,
            kind = %definition.kind(),
            "✅ FACTORY: Parsed work definition"
        );
        Ok(definition)
    }

    fn resolve(&self, config: &WorkConfig) -> Option<RegisteredSupplier> {
        if let Some(tag) = &config.type_tag {
            if let Some(entry) = self.by_tag.get(&tag.key_string()) {
                return Some(entry.clone());
            }
        }
        if let Some(uri) = &config.legacy_uri {
            if let Some(entry) = self.by_uri.get(uri) {
                return Some(entry.clone());
            }
        }
        None
    }

    pub fn has_tag(&self, tag: &TypeTag) -> bool {
        self.by_tag.contains_key(&tag.key_string())
    }

    pub fn has_legacy_uri(&self, uri: &str) -> bool {
        self.by_uri.contains_key(uri)
    }

    pub fn supplier_count(&self) -> usize {
        self.by_tag.len()
    }
}

impl fmt::Debug for WorkDefinitionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkDefinitionFactory")
            .field("suppliers", &self.by_tag.len())
            .field("legacy_aliases", &self.by_uri.len())
            .finish()
    }
}

fn parse_builtin(kind: WorkKind, payload: &Value) -> Result<WorkDefinition> {
    let definition = match kind {
        WorkKind::Search => {
            WorkDefinition::Search(serde_json::from_value::<SearchWork>(payload.clone())?)
        }
        WorkKind::Coordinate => {
            WorkDefinition::Coordinate(serde_json::from_value::<CoordinateWork>(payload.clone())?)
        }
        WorkKind::Propagation => {
            WorkDefinition::Propagation(serde_json::from_value::<PropagationWork>(payload.clone())?)
        }
        WorkKind::TriggerScan => {
            WorkDefinition::TriggerScan(serde_json::from_value::<TriggerScanWork>(payload.clone())?)
        }
        WorkKind::AsyncUpdate => {
            WorkDefinition::AsyncUpdate(serde_json::from_value::<AsyncUpdateWork>(payload.clone())?)
        }
        WorkKind::Scripting => {
            WorkDefinition::Scripting(serde_json::from_value::<ScriptingWork>(payload.clone())?)
        }
        WorkKind::AutoScaling => {
            WorkDefinition::AutoScaling(serde_json::from_value::<AutoScalingWork>(payload.clone())?)
        }
    };
    Ok(definition)
}
