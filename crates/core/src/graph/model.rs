use crate::error::{EngineError, EngineResult};
use crate::graph::validate::{ValidationError, ValidationErrorKind};
use crate::types::{NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Canvas position of a node; carries no execution meaning
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A typed unit of work in a workflow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(flatten)]
    pub position: Position,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(id),
            kind,
            config: Map::new(),
            data: Map::new(),
            position: Position::default(),
        }
    }

    pub fn with_data(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    /// String field from the node's handler data
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// Directed edge from an output slot of one node to an input slot of another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    #[serde(rename = "from")]
    pub from_node: NodeId,
    #[serde(rename = "fromOutput")]
    pub from_output: usize,
    #[serde(rename = "to")]
    pub to_node: NodeId,
    #[serde(rename = "toInput")]
    pub to_input: usize,
}

impl Connection {
    pub fn new(id: impl Into<String>, from: &str, to: &str, to_input: usize) -> Self {
        Self {
            id: id.into(),
            from_node: NodeId::new(from),
            from_output: 0,
            to_node: NodeId::new(to),
            to_input,
        }
    }
}

/// Optional descriptive metadata carried with a definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Ordered nodes plus the connections between them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<GraphMetadata>,
}

/// Result of a lenient parse: every well-formed part plus every defect found
#[derive(Debug, Clone, Default)]
pub(crate) struct Salvage {
    pub graph: Graph,
    pub issues: Vec<ValidationError>,
    /// Ids of every node entry that carried one, well-formed or not
    pub declared_ids: Vec<NodeId>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, connections: Vec<Connection>) -> Self {
        Self {
            nodes,
            connections,
            metadata: None,
        }
    }

    /// Parse a wire definition, failing on the first structural defect
    pub fn parse(raw: &Value) -> EngineResult<Self> {
        let salvage = Self::salvage(raw)?;
        match salvage.issues.into_iter().next() {
            None => Ok(salvage.graph),
            Some(issue) => Err(issue.into_engine_error()),
        }
    }

    /// Parse everything that is well-formed and collect the rest as issues
    pub(crate) fn salvage(raw: &Value) -> EngineResult<Salvage> {
        let object = raw.as_object().ok_or_else(|| {
            EngineError::MalformedGraph("workflow definition must be a JSON object".to_string())
        })?;

        let mut salvage = Salvage::default();
        let mut seen = HashSet::new();

        for (position, entry) in array_field(object, "nodes")?.iter().enumerate() {
            if let Some(node) = salvage_node(position, entry, &mut salvage) {
                if seen.insert(node.id.clone()) {
                    salvage.graph.nodes.push(node);
                } else {
                    salvage.issues.push(ValidationError::new(
                        ValidationErrorKind::DuplicateNode,
                        format!("Node id '{}' is declared more than once", node.id),
                    ));
                }
            }
        }

        for (position, entry) in array_field(object, "connections")?.iter().enumerate() {
            if let Some(connection) = salvage_connection(position, entry, &mut salvage.issues) {
                salvage.graph.connections.push(connection);
            }
        }

        salvage.graph.metadata = object
            .get("metadata")
            .and_then(|m| serde_json::from_value(m.clone()).ok());

        Ok(salvage)
    }
}

fn array_field<'a>(object: &'a Map<String, Value>, field: &str) -> EngineResult<&'a [Value]> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(EngineError::MalformedGraph(format!(
            "'{}' must be an array",
            field
        ))),
    }
}

fn non_empty_str<'a>(entry: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    entry
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn salvage_node(position: usize, entry: &Value, salvage: &mut Salvage) -> Option<Node> {
    let Some(entry) = entry.as_object() else {
        salvage.issues.push(ValidationError::new(
            ValidationErrorKind::InvalidField,
            format!("Node at position {} is not an object", position),
        ));
        return None;
    };

    let id = non_empty_str(entry, "id");
    if let Some(id) = id {
        salvage.declared_ids.push(NodeId::new(id));
    } else {
        salvage.issues.push(ValidationError::new(
            ValidationErrorKind::MissingField,
            "Node missing required 'id' field",
        ));
    }
    let label = id.unwrap_or("unknown");

    let kind = match non_empty_str(entry, "type") {
        None => {
            salvage.issues.push(ValidationError::new(
                ValidationErrorKind::MissingField,
                format!("Node {} missing required 'type' field", label),
            ));
            None
        }
        Some(type_name) => match type_name.parse::<NodeKind>() {
            Ok(kind) => Some(kind),
            Err(_) => {
                salvage.issues.push(
                    ValidationError::new(
                        ValidationErrorKind::UnknownNodeType,
                        format!("Node {} has unknown type '{}'", label, type_name),
                    )
                    .with_subject(type_name),
                );
                None
            }
        },
    };

    let config = object_field(entry, "config", label, &mut salvage.issues);
    let data = object_field(entry, "data", label, &mut salvage.issues);
    let x = number_field(entry, "x", label, &mut salvage.issues);
    let y = number_field(entry, "y", label, &mut salvage.issues);

    Some(Node {
        id: NodeId::new(id?),
        kind: kind?,
        config: config?,
        data: data?,
        position: Position { x: x?, y: y? },
    })
}

fn object_field(
    entry: &Map<String, Value>,
    field: &str,
    label: &str,
    issues: &mut Vec<ValidationError>,
) -> Option<Map<String, Value>> {
    match entry.get(field) {
        None | Some(Value::Null) => Some(Map::new()),
        Some(Value::Object(map)) => Some(map.clone()),
        Some(_) => {
            issues.push(ValidationError::new(
                ValidationErrorKind::InvalidField,
                format!("Node {} field '{}' must be an object", label, field),
            ));
            None
        }
    }
}

fn number_field(
    entry: &Map<String, Value>,
    field: &str,
    label: &str,
    issues: &mut Vec<ValidationError>,
) -> Option<f64> {
    match entry.get(field) {
        None | Some(Value::Null) => Some(0.0),
        Some(value) => value.as_f64().or_else(|| {
            issues.push(ValidationError::new(
                ValidationErrorKind::InvalidField,
                format!("Node {} field '{}' must be a number", label, field),
            ));
            None
        }),
    }
}

const CONNECTION_FIELDS: [&str; 5] = ["id", "from", "to", "fromOutput", "toInput"];

fn salvage_connection(
    position: usize,
    entry: &Value,
    issues: &mut Vec<ValidationError>,
) -> Option<Connection> {
    let Some(entry) = entry.as_object() else {
        issues.push(ValidationError::new(
            ValidationErrorKind::InvalidField,
            format!("Connection at position {} is not an object", position),
        ));
        return None;
    };

    let mut complete = true;
    for field in CONNECTION_FIELDS {
        if !entry.contains_key(field) {
            issues.push(ValidationError::new(
                ValidationErrorKind::MissingField,
                format!("Connection missing required '{}' field", field),
            ));
            complete = false;
        }
    }
    if !complete {
        return None;
    }

    let id = match &entry["id"] {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => {
            issues.push(ValidationError::new(
                ValidationErrorKind::InvalidField,
                format!("Connection at position {} has a non-string 'id'", position),
            ));
            return None;
        }
    };

    let endpoint = |field: &str, issues: &mut Vec<ValidationError>| {
        let value = non_empty_str(entry, field).map(NodeId::new);
        if value.is_none() {
            issues.push(ValidationError::new(
                ValidationErrorKind::InvalidField,
                format!("Connection {} field '{}' must be a node id", id, field),
            ));
        }
        value
    };
    let from_node = endpoint("from", issues);
    let to_node = endpoint("to", issues);

    let slot = |field: &str, issues: &mut Vec<ValidationError>| {
        let value = entry[field].as_u64().map(|n| n as usize);
        if value.is_none() {
            issues.push(ValidationError::new(
                ValidationErrorKind::InvalidField,
                format!(
                    "Connection {} field '{}' must be a non-negative integer",
                    id, field
                ),
            ));
        }
        value
    };
    let from_output = slot("fromOutput", issues);
    let to_input = slot("toInput", issues);

    Some(Connection {
        id: id.clone(),
        from_node: from_node?,
        from_output: from_output?,
        to_node: to_node?,
        to_input: to_input?,
    })
}
