use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::traits::Tool;

/// Everything one sandboxed execution needs.
///
/// Immutable once built; build a fresh one per request with
/// [`Invocation::builder`].
#[derive(Clone)]
pub struct Invocation {
    request_id: Uuid,
    authorized_imports: Vec<String>,
    tools: BTreeMap<String, Arc<dyn Tool>>,
    code_action: String,
    additional_variables: Map<String, Value>,
}

impl Invocation {
    /// Start building an invocation for the given code.
    pub fn builder(code_action: impl Into<String>) -> InvocationBuilder {
        InvocationBuilder {
            authorized_imports: Vec::new(),
            tools: BTreeMap::new(),
            code_action: code_action.into(),
            additional_variables: Map::new(),
        }
    }

    pub fn request_id(&self) -> &Uuid {
        &self.request_id
    }

    /// Modules the code may import, in insertion order.
    pub fn authorized_imports(&self) -> &[String] {
        &self.authorized_imports
    }

    pub fn tools(&self) -> &BTreeMap<String, Arc<dyn Tool>> {
        &self.tools
    }

    pub fn code_action(&self) -> &str {
        &self.code_action
    }

    pub fn additional_variables(&self) -> &Map<String, Value> {
        &self.additional_variables
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("request_id", &self.request_id)
            .field("authorized_imports", &self.authorized_imports)
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("code_action", &self.code_action)
            .field("additional_variables", &self.additional_variables)
            .finish()
    }
}

/// Builder for [`Invocation`].
pub struct InvocationBuilder {
    authorized_imports: Vec<String>,
    tools: BTreeMap<String, Arc<dyn Tool>>,
    code_action: String,
    additional_variables: Map<String, Value>,
}

impl InvocationBuilder {
    /// Allow a module. Duplicates are ignored.
    pub fn authorized_import(mut self, module: impl Into<String>) -> Self {
        let module = module.into();
        if !self.authorized_imports.contains(&module) {
            self.authorized_imports.push(module);
        }
        self
    }

    pub fn authorized_imports<I, S>(self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        modules
            .into_iter()
            .fold(self, |builder, module| builder.authorized_import(module))
    }

    /// Expose a tool under `name`. A later tool with the same name replaces
    /// the earlier one.
    pub fn tool(mut self, name: impl Into<String>, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(name.into(), tool);
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.additional_variables.insert(name.into(), value);
        self
    }

    pub fn variables(mut self, variables: Map<String, Value>) -> Self {
        self.additional_variables.extend(variables);
        self
    }

    pub fn build(self) -> Invocation {
        Invocation {
            request_id: Uuid::new_v4(),
            authorized_imports: self.authorized_imports,
            tools: self.tools,
            code_action: self.code_action,
            additional_variables: self.additional_variables,
        }
    }
}
