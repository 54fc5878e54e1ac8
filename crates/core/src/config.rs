use serde::{Deserialize, Serialize};

/// Tunables for the workflow engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Characters of a node result kept in its success log entry
    #[serde(default = "default_result_preview_chars")]
    pub result_preview_chars: usize,

    /// Tool used by TOOL nodes that do not name one
    #[serde(default = "default_tool")]
    pub default_tool: String,

    /// Parameter name a tool input slot maps to when the node has no mapping
    #[serde(default = "default_tool_param")]
    pub default_tool_param: String,
}

fn default_result_preview_chars() -> usize {
    200
}

fn default_tool() -> String {
    "knowledge_tool".to_string()
}

fn default_tool_param() -> String {
    "query".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            result_preview_chars: default_result_preview_chars(),
            default_tool: default_tool(),
            default_tool_param: default_tool_param(),
        }
    }
}
