// Reusable template export for workflow definitions

use crate::error::{EngineError, EngineResult};
use crate::graph::{Connection, Graph, Node};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write;

pub const TEMPLATE_VERSION: &str = "1.0";
pub const TEMPLATE_TYPE: &str = "nodeflow_workflow";

/// Exported workflow template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub name: String,
    pub description: String,
    pub version: String,
    pub template_type: String,
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
    pub variables: Vec<TemplateVariable>,
    pub documentation: String,
}

/// A node setting a template user is expected to tune
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateVariable {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: TemplateVariableType,
    pub description: String,
    pub default: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateVariableType {
    Text,
    Expression,
}

impl WorkflowTemplate {
    pub fn from_graph(graph: Graph) -> Self {
        let metadata = graph.metadata.clone().unwrap_or_default();
        let variables = extract_variables(&graph.nodes);
        let documentation = document(&graph);

        Self {
            name: metadata
                .name
                .unwrap_or_else(|| "Untitled Template".to_string()),
            description: metadata.description.unwrap_or_default(),
            version: TEMPLATE_VERSION.to_string(),
            template_type: TEMPLATE_TYPE.to_string(),
            nodes: graph.nodes,
            connections: graph.connections,
            variables,
            documentation,
        }
    }
}

/// Export a wire definition as a pretty-printed template document
pub fn export_template(raw: &Value) -> EngineResult<String> {
    let template = WorkflowTemplate::from_graph(Graph::parse(raw)?);
    serde_json::to_string_pretty(&template)
        .map_err(|e| EngineError::MalformedGraph(format!("template serialization failed: {}", e)))
}

fn config_str<'a>(node: &'a Node, key: &str) -> Option<&'a str> {
    node.config.get(key).and_then(Value::as_str)
}

fn extract_variables(nodes: &[Node]) -> Vec<TemplateVariable> {
    let mut variables = Vec::new();

    for node in nodes {
        let title = config_str(node, "title").unwrap_or("node");

        if let Some(instructions) = node.data.get("instructions") {
            variables.push(TemplateVariable {
                name: format!("{}_instructions", node.id),
                var_type: TemplateVariableType::Text,
                description: format!("Instructions for {}", title),
                default: instructions.clone(),
            });
        }

        if let Some(condition) = node.data.get("condition") {
            variables.push(TemplateVariable {
                name: format!("{}_condition", node.id),
                var_type: TemplateVariableType::Expression,
                description: format!("Condition for {}", title),
                default: condition.clone(),
            });
        }
    }

    variables
}

fn document(graph: &Graph) -> String {
    let metadata = graph.metadata.clone().unwrap_or_default();
    let mut doc = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(
        doc,
        "# {} Documentation\n",
        metadata.name.as_deref().unwrap_or("Workflow")
    );
    let _ = writeln!(doc, "## Overview");
    let _ = writeln!(
        doc,
        "{}\n",
        metadata
            .description
            .as_deref()
            .unwrap_or("No description provided")
    );

    let _ = writeln!(doc, "## Nodes");
    for node in &graph.nodes {
        let _ = writeln!(
            doc,
            "### {} ({})",
            config_str(node, "title").unwrap_or("Untitled"),
            node.kind
        );
        let _ = writeln!(doc, "- **ID**: {}", node.id);
        let _ = writeln!(
            doc,
            "- **Description**: {}",
            config_str(node, "description").unwrap_or("No description")
        );
        if !node.data.is_empty() {
            let data = serde_json::to_string_pretty(&node.data).unwrap_or_default();
            let _ = writeln!(doc, "- **Configuration**: {}", data);
        }
        doc.push('\n');
    }

    let _ = writeln!(doc, "## Connections");
    for connection in &graph.connections {
        let _ = writeln!(doc, "- {} → {}", connection.from_node, connection.to_node);
    }

    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition() -> Value {
        json!({
            "metadata": {"name": "Triage", "description": "Routes tickets"},
            "nodes": [
                {"id": "in", "type": "input"},
                {
                    "id": "ask",
                    "type": "agent",
                    "config": {"title": "Classifier", "description": "Labels the ticket"},
                    "data": {"instructions": "Label this ticket"}
                },
                {"id": "gate", "type": "condition", "data": {"condition": "input != ''"}}
            ],
            "connections": [
                {"id": "c1", "from": "in", "fromOutput": 0, "to": "ask", "toInput": 0},
                {"id": "c2", "from": "ask", "fromOutput": 0, "to": "gate", "toInput": 0}
            ]
        })
    }

    #[test]
    fn test_export_template_shape() {
        let exported = export_template(&definition()).unwrap();
        let template: Value = serde_json::from_str(&exported).unwrap();

        assert_eq!(template["name"], json!("Triage"));
        assert_eq!(template["description"], json!("Routes tickets"));
        assert_eq!(template["version"], json!("1.0"));
        assert_eq!(template["template_type"], json!("nodeflow_workflow"));
        assert_eq!(template["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(template["connections"][1]["from"], json!("ask"));
        assert!(exported.contains('\n'));
    }

    #[test]
    fn test_variables_extracted_from_node_data() {
        let graph = Graph::parse(&definition()).unwrap();
        let template = WorkflowTemplate::from_graph(graph);

        assert_eq!(
            template.variables,
            vec![
                TemplateVariable {
                    name: "ask_instructions".to_string(),
                    var_type: TemplateVariableType::Text,
                    description: "Instructions for Classifier".to_string(),
                    default: json!("Label this ticket"),
                },
                TemplateVariable {
                    name: "gate_condition".to_string(),
                    var_type: TemplateVariableType::Expression,
                    description: "Condition for node".to_string(),
                    default: json!("input != ''"),
                },
            ]
        );
    }

    #[test]
    fn test_documentation_lists_nodes_and_connections() {
        let graph = Graph::parse(&definition()).unwrap();
        let doc = WorkflowTemplate::from_graph(graph).documentation;

        assert!(doc.starts_with("# Triage Documentation\n"));
        assert!(doc.contains("## Overview\nRoutes tickets\n"));
        assert!(doc.contains("### Classifier (agent)\n- **ID**: ask\n- **Description**: Labels the ticket\n"));
        assert!(doc.contains("### Untitled (input)\n- **ID**: in\n- **Description**: No description\n"));
        assert!(doc.contains("- in → ask\n- ask → gate\n"));
    }

    #[test]
    fn test_defaults_without_metadata() {
        let exported = export_template(&json!({"nodes": [{"id": "a", "type": "output"}]})).unwrap();
        let template: Value = serde_json::from_str(&exported).unwrap();

        assert_eq!(template["name"], json!("Untitled Template"));
        assert_eq!(template["description"], json!(""));
        assert!(template["variables"].as_array().unwrap().is_empty());
        assert!(template["documentation"]
            .as_str()
            .unwrap()
            .contains("No description provided"));
    }

    #[test]
    fn test_malformed_definition_rejected() {
        assert!(export_template(&json!({"nodes": [{"type": "agent"}]})).is_err());
    }
}
