//! # Activity Handler Registry
//!
//! ## Architecture: Explicit Dispatch Table
//!
//! The registry owns the two lookup layers execution depends on: the work definition
//! factory that parses configuration blobs, and the kind-to-handler table that supplies
//! domain logic for each leaf work kind. Both are registered explicitly at process
//! startup; nothing is discovered at run time, so a tree that validates here dispatches
//! without surprises later.
//!
//! Thread-safe and lock-free for readers, like the underlying maps.

use crate::activity::definition::ActivityDefinition;
use crate::activity::handler::ActivityHandler;
use crate::activity::tree::ActivityTree;
use crate::definition::{Supplier, TypeTag, WorkDefinitionFactory, WorkKind};
use crate::error::{CoreError, Result};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Registry binding work kinds to their handlers, plus the definition factory
pub struct ActivityHandlerRegistry {
    factory: WorkDefinitionFactory,
    handlers: DashMap<WorkKind, Arc<dyn ActivityHandler>>,
}

impl ActivityHandlerRegistry {
    /// Registry over a factory with all built-in suppliers wired
    pub fn new() -> Self {
        Self::with_factory(WorkDefinitionFactory::with_builtins())
    }

    /// Registry over a caller-assembled factory
    pub fn with_factory(factory: WorkDefinitionFactory) -> Self {
        Self {
            factory,
            handlers: DashMap::new(),
        }
    }

    /// The definition factory used to compile trees for this registry
    pub fn factory(&self) -> &WorkDefinitionFactory {
        &self.factory
    }

    /// Bind a handler to a work kind, replacing any previous binding
    pub fn register_handler(&self, kind: WorkKind, handler: Arc<dyn ActivityHandler>) {
        let replaced = self.handlers.insert(kind, handler).is_some();
        info!(kind = %kind, replaced, "📚 Registered activity handler");
    }

    /// Remove a handler binding; `false` when none existed
    pub fn unregister_handler(&self, kind: WorkKind) -> bool {
        self.handlers.remove(&kind).is_some()
    }

    /// Register a custom work definition supplier on the owned factory
    pub fn register_supplier(
        &self,
        tag: TypeTag,
        legacy_uri: Option<String>,
        supplier: Supplier,
    ) -> Result<()> {
        self.factory.register_supplier(tag, legacy_uri, supplier)
    }

    /// Wire a custom work type in one call: supplier and handler together.
    ///
    /// The supplier must produce definitions whose kind matches `kind`, or
    /// dispatch will fail at run time. Re-registration overwrites both sides,
    /// so startup wiring stays idempotent.
    pub fn register(
        &self,
        tag: TypeTag,
        legacy_uri: Option<String>,
        kind: WorkKind,
        supplier: Supplier,
        handler: Arc<dyn ActivityHandler>,
    ) -> Result<()> {
        self.factory.register_supplier(tag, legacy_uri, supplier)?;
        self.register_handler(kind, handler);
        Ok(())
    }

    /// Remove a work type wired through [`register`](Self::register): the
    /// supplier, its legacy alias, and the handler binding. `false` when
    /// nothing was registered under either address.
    pub fn unregister(&self, tag: &TypeTag, kind: WorkKind) -> bool {
        let supplier_removed = self.factory.unregister(tag);
        let handler_removed = self.unregister_handler(kind);
        supplier_removed || handler_removed
    }

    pub fn has_handler(&self, kind: WorkKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Resolve the handler for a leaf activity.
    ///
    /// Coordinator activities have no handler; asking for one is a caller bug surfaced
    /// as a configuration error rather than a panic.
    pub fn handler_for(&self, activity: &ActivityDefinition) -> Result<Arc<dyn ActivityHandler>> {
        if activity.is_composite() {
            return Err(CoreError::ConfigurationError(format!(
                "Activity '{}' is a coordinator and dispatches no handler",
                activity.path
            )));
        }

        self.handlers
            .get(&activity.kind())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                CoreError::ConfigurationError(format!(
                    "No handler registered for {} work (activity '{}')",
                    activity.kind(),
                    activity.path
                ))
            })
    }

    /// Check that every leaf in a compiled tree has a handler, before running anything
    pub fn validate_tree(&self, tree: &ActivityTree) -> Result<()> {
        for leaf in tree.leaves() {
            if !self.has_handler(leaf.definition.kind()) {
                return Err(CoreError::ConfigurationError(format!(
                    "No handler registered for {} work (activity '{}')",
                    leaf.definition.kind(),
                    leaf.path()
                )));
            }
        }
        Ok(())
    }
}

impl Default for ActivityHandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ActivityHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityHandlerRegistry")
            .field("handler_count", &self.handlers.len())
            .field("supplier_count", &self.factory.supplier_count())
            .finish()
    }
}
