use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Semantic type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterType {
    String,
    Integer,
    Real,
    Boolean,
    Datetime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub parameter_type: ParameterType,
    pub description: String,
}

/// The function that powers a tool. It receives the parsed call arguments.
pub type ToolHandler = Arc<dyn Fn(&Map<String, Value>) -> anyhow::Result<Value> + Send + Sync>;

/// A tool that can be used by a model.
#[derive(Clone)]
pub struct ToolSpec {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// Parameters in declaration order
    pub parameters: Vec<ToolParameter>,
    pub handler: ToolHandler,
}

impl ToolSpec {
    pub fn new<N, D, F>(name: N, description: D, handler: F) -> Self
    where
        N: Into<String>,
        D: Into<String>,
        F: Fn(&Map<String, Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        ToolSpec {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    pub fn with_parameter<N: Into<String>, D: Into<String>>(
        mut self,
        name: N,
        parameter_type: ParameterType,
        description: D,
    ) -> Self {
        self.parameters.push(ToolParameter {
            name: name.into(),
            parameter_type,
            description: description.into(),
        });
        self
    }

    pub fn call(&self, arguments: &Map<String, Value>) -> anyhow::Result<Value> {
        (self.handler)(arguments)
    }
}

impl Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .field("handler", &"<function>")
            .finish()
    }
}
