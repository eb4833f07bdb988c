//! Tool registry
//!
//! Owns the tool definitions and their handler capabilities. Constructed
//! once and injected wherever tools are needed — deliberately not a
//! process-wide singleton, so tests build fresh registries at will.
//!
//! The registry is read-mostly: lookups vastly outnumber registrations,
//! and registrations after startup (supported, e.g. for late-loaded
//! plugins) synchronize against concurrent lookups through the RwLock.

use super::handler::ToolHandler;
use relay_domain::tool::entities::{SchemaError, ToolCatalog, ToolDefinition};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

#[derive(Default)]
struct Inner {
    catalog: ToolCatalog,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

/// Registry of invocable tools.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<Inner>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool definition together with its handler.
    ///
    /// Fails on duplicate names or malformed schemas; on failure nothing
    /// is registered.
    pub fn register(
        &self,
        definition: ToolDefinition,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), SchemaError> {
        let mut inner = self.inner.write().expect("tool registry lock poisoned");
        let name = definition.name.clone();
        inner.catalog.insert(definition)?;
        inner.handlers.insert(name.clone(), handler);
        debug!(tool = %name, "registered tool");
        Ok(())
    }

    /// Snapshot of the catalog for validation and prompt rendering.
    pub fn catalog(&self) -> ToolCatalog {
        self.inner
            .read()
            .expect("tool registry lock poisoned")
            .catalog
            .clone()
    }

    /// Look up a tool's definition and handler in one synchronized read.
    pub fn lookup(&self, name: &str) -> Option<(ToolDefinition, Arc<dyn ToolHandler>)> {
        let inner = self.inner.read().expect("tool registry lock poisoned");
        let definition = inner.catalog.get(name)?.clone();
        let handler = inner.handlers.get(name)?.clone();
        Some((definition, handler))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner
            .read()
            .expect("tool registry lock poisoned")
            .catalog
            .contains(name)
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .expect("tool registry lock poisoned")
            .catalog
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
