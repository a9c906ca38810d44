//! Tool descriptor codec.
//!
//! Tools cross the boundary as type identity only. The host turns each live
//! tool into a type reference and sends the whole `name -> type_ref` mapping
//! as one dict literal; the guest parses it and constructs fresh instances
//! from its [`ToolFactoryRegistry`]. No instance state is transmitted.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use codebox_core::{literal, traits::Tool, types::ToolDescriptor, Error, Result};

use crate::registry::ToolFactoryRegistry;

/// Type reference of a tool: its display name if it has one, otherwise the
/// stable path it declares through [`Tool::type_path`].
pub fn type_reference(tool: &dyn Tool) -> String {
    match tool.display_name() {
        Some(name) => name.to_string(),
        None => tool.type_path().to_string(),
    }
}

pub struct ToolDescriptorCodec;

impl ToolDescriptorCodec {
    /// Descriptors for a set of named tools.
    pub fn describe(tools: &BTreeMap<String, Arc<dyn Tool>>) -> Vec<ToolDescriptor> {
        tools
            .iter()
            .map(|(name, tool)| ToolDescriptor::new(name.clone(), type_reference(tool.as_ref())))
            .collect()
    }

    /// Encode named tools as a `{'name': 'type_ref'}` literal.
    pub fn encode(tools: &BTreeMap<String, Arc<dyn Tool>>) -> String {
        let mapping: Map<String, Value> = Self::describe(tools)
            .into_iter()
            .map(|d| (d.name, Value::String(d.type_ref)))
            .collect();
        literal::render(&Value::Object(mapping))
    }

    /// Parse an encoded mapping into descriptors.
    pub fn parse(encoded: &str) -> Result<Vec<ToolDescriptor>> {
        let value = literal::parse(encoded)
            .map_err(|e| Error::tool_resolution(format!("invalid tool mapping: {}", e)))?;

        let mapping = match value {
            Value::Object(mapping) => mapping,
            other => {
                return Err(Error::tool_resolution(format!(
                    "tool mapping must be a dict, got {}",
                    literal::render(&other)
                )))
            }
        };

        mapping
            .into_iter()
            .map(|(name, type_ref)| match type_ref {
                Value::String(type_ref) => Ok(ToolDescriptor::new(name, type_ref)),
                other => Err(Error::tool_resolution(format!(
                    "type reference for '{}' must be a string, got {}",
                    name,
                    literal::render(&other)
                ))),
            })
            .collect()
    }

    /// Decode an encoded mapping into fresh tool instances.
    pub fn decode(
        encoded: &str,
        registry: &ToolFactoryRegistry,
    ) -> Result<BTreeMap<String, Arc<dyn Tool>>> {
        Self::parse(encoded)?
            .into_iter()
            .map(|descriptor| {
                let tool = registry.create(&descriptor.type_ref).map_err(|_| {
                    Error::tool_resolution(format!(
                        "tool '{}' references unknown type '{}'",
                        descriptor.name, descriptor.type_ref
                    ))
                })?;
                tracing::debug!(
                    tool = %descriptor.name,
                    type_ref = %descriptor.type_ref,
                    "Resolved tool"
                );
                Ok((descriptor.name, tool))
            })
            .collect()
    }
}
