//! Tool factory registry.
//!
//! Maps type references to zero-argument constructors. The host and the
//! guest build the same registry from the same code, so a type reference
//! resolved on either side always yields the same tool type.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use codebox_core::{traits::Tool, Error, Result};

use crate::builtin::{CalculatorTool, EchoTool};
use crate::descriptor::type_reference;

/// Zero-argument tool constructor.
pub type ToolFactory = Arc<dyn Fn() -> Arc<dyn Tool> + Send + Sync>;

/// Registry of tool constructors keyed by type reference.
pub struct ToolFactoryRegistry {
    factories: DashMap<String, ToolFactory>,
}

impl ToolFactoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }

    /// Register a default-constructible tool under its type reference.
    pub fn register<T>(&self) -> Result<()>
    where
        T: Tool + Default + 'static,
    {
        let type_ref = type_reference(&T::default());
        self.register_factory(type_ref, Arc::new(|| Arc::new(T::default()) as Arc<dyn Tool>))
    }

    /// Register a constructor under an explicit type reference.
    ///
    /// Fails if the reference is taken: two tools sharing a display name
    /// would otherwise resolve ambiguously.
    pub fn register_factory(&self, type_ref: impl Into<String>, factory: ToolFactory) -> Result<()> {
        let type_ref = type_ref.into();
        tracing::debug!(type_ref = %type_ref, "Registering tool factory");

        match self.factories.entry(type_ref) {
            Entry::Occupied(entry) => Err(Error::Internal(format!(
                "Tool type '{}' is already registered",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                entry.insert(factory);
                Ok(())
            }
        }
    }

    /// Construct a fresh tool for the given type reference.
    pub fn create(&self, type_ref: &str) -> Result<Arc<dyn Tool>> {
        let factory = self
            .factories
            .get(type_ref)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                Error::tool_resolution(format!(
                    "no tool registered for type reference '{}'",
                    type_ref
                ))
            })?;
        Ok(factory())
    }

    pub fn contains(&self, type_ref: &str) -> bool {
        self.factories.contains_key(type_ref)
    }

    /// Registered type references, sorted.
    pub fn type_refs(&self) -> Vec<String> {
        let mut refs: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        refs.sort();
        refs
    }

    /// Get the number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for ToolFactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a registry with the built-in tools.
pub fn builtin_registry() -> Result<ToolFactoryRegistry> {
    let registry = ToolFactoryRegistry::new();
    registry.register::<EchoTool>()?;
    registry.register::<CalculatorTool>()?;
    Ok(registry)
}
