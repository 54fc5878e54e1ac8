use crate::error::EngineError;
use crate::graph::model::Graph;
use crate::types::NodeId;
use crate::workflow::dag::WorkflowDag;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Class of structural defect found by validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    MissingField,
    InvalidField,
    UnknownNodeType,
    DuplicateNode,
    DanglingConnection,
    CircularDependency,
}

/// A single structural defect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub message: String,
    /// The offending value, when there is a single one to name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            subject: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub(crate) fn into_engine_error(self) -> EngineError {
        match self.kind {
            ValidationErrorKind::UnknownNodeType => {
                EngineError::UnknownNodeType(self.subject.unwrap_or(self.message))
            }
            ValidationErrorKind::CircularDependency => EngineError::CircularDependency {
                node_id: NodeId::new(self.subject.unwrap_or_default()),
            },
            _ => EngineError::MalformedGraph(self.message),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of validating a workflow definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
    pub node_count: usize,
    pub connection_count: usize,
}

impl ValidationReport {
    pub fn has_error(&self, kind: ValidationErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }
}

/// Check a wire definition for structural defects.
///
/// Field, type and endpoint defects are all collected in one pass. Cycle
/// detection runs afterwards over the well-formed part of the graph and
/// stops at the first back-edge it finds.
pub fn validate(raw: &Value) -> ValidationReport {
    let node_count = count_entries(raw, "nodes");
    let connection_count = count_entries(raw, "connections");

    let salvage = match Graph::salvage(raw) {
        Ok(salvage) => salvage,
        Err(e) => {
            return ValidationReport {
                valid: false,
                errors: vec![ValidationError::new(
                    ValidationErrorKind::InvalidField,
                    e.to_string(),
                )],
                warnings: Vec::new(),
                node_count,
                connection_count,
            };
        }
    };

    let mut errors = salvage.issues;
    let mut warnings = Vec::new();

    let declared: HashSet<&NodeId> = salvage.declared_ids.iter().collect();
    let mut connected: HashSet<&NodeId> = HashSet::new();

    for connection in &salvage.graph.connections {
        if !declared.contains(&connection.from_node) {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::DanglingConnection,
                    format!(
                        "Connection references non-existent source node: {}",
                        connection.from_node
                    ),
                )
                .with_subject(connection.id.clone()),
            );
        }
        if !declared.contains(&connection.to_node) {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::DanglingConnection,
                    format!(
                        "Connection references non-existent target node: {}",
                        connection.to_node
                    ),
                )
                .with_subject(connection.id.clone()),
            );
        }

        connected.insert(&connection.from_node);
        connected.insert(&connection.to_node);
    }

    if salvage.declared_ids.len() > 1 {
        for id in &salvage.declared_ids {
            if !connected.contains(id) {
                warnings.push(format!("Node '{}' is not connected to the workflow", id));
            }
        }
    }

    let dag = WorkflowDag::from_graph_lenient(salvage.graph);
    if let Err(e) = dag.check_acyclic() {
        let subject = match &e {
            EngineError::CircularDependency { node_id } => node_id.to_string(),
            _ => String::new(),
        };
        errors.push(
            ValidationError::new(ValidationErrorKind::CircularDependency, e.to_string())
                .with_subject(subject),
        );
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
        node_count,
        connection_count,
    }
}

fn count_entries(raw: &Value, field: &str) -> usize {
    raw.get(field)
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}
