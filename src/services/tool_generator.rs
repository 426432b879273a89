use crate::config::{ApiConfig, ApiDescription, OperationSpec, ParameterSpec};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Catalogue of invokable operations. The name index is built once in [`ToolGenerator::new`].
#[derive(Debug, Clone)]
pub struct ToolGenerator {
    config: Arc<ApiConfig>,
    index: HashMap<String, (usize, usize)>,
}

impl ToolGenerator {
    pub fn new(config: Arc<ApiConfig>) -> Result<Self, ConfigError> {
        let mut index = HashMap::new();
        for (api_idx, api) in config.apis.iter().enumerate() {
            for (tool_idx, tool) in api.tools.iter().enumerate() {
                if let Some((first_api, _)) = index.insert(tool.name.clone(), (api_idx, tool_idx)) {
                    return Err(ConfigError::DuplicateTool {
                        name: tool.name.clone(),
                        first: config.apis[first_api].name.clone(),
                        second: api.name.clone(),
                    });
                }
            }
        }
        Ok(Self { config, index })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Declaration order, across APIs in file order.
    pub fn generate_tools(&self) -> Vec<ToolDefinition> {
        self.config
            .apis
            .iter()
            .flat_map(|api| api.tools.iter().map(move |tool| build_definition(api, tool)))
            .collect()
    }

    pub fn get_tool_definition(&self, name: &str) -> Option<(&ApiDescription, &OperationSpec)> {
        let (api_idx, tool_idx) = *self.index.get(name)?;
        let api = self.config.apis.get(api_idx)?;
        Some((api, api.tools.get(tool_idx)?))
    }

    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.config
            .apis
            .iter()
            .flat_map(|api| api.tools.iter().map(|tool| tool.name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

fn build_definition(api: &ApiDescription, tool: &OperationSpec) -> ToolDefinition {
    let description = tool
        .description
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} {} ({})", tool.method, tool.endpoint, api.name));
    ToolDefinition {
        name: tool.name.clone(),
        description,
        input_schema: input_schema(&tool.parameters),
    }
}

fn input_schema(parameters: &[ParameterSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for param in parameters {
        let mut prop = Map::new();
        prop.insert("type".to_string(), json!(param.param_type.as_str()));
        if !param.description.trim().is_empty() {
            prop.insert("description".to_string(), json!(param.description));
        }
        if let Some(default) = param.default.as_ref().filter(|v| !v.is_null()) {
            prop.insert("default".to_string(), default.clone());
        }
        if let Some(values) = param.enum_values.as_ref() {
            prop.insert("enum".to_string(), Value::Array(values.clone()));
        }
        properties.insert(param.name.clone(), Value::Object(prop));
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}
