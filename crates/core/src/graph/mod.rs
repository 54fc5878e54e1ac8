//! Graph model parsed from the wire definition, plus structural validation.

pub mod model;
pub mod validate;

pub use model::{Connection, Graph, GraphMetadata, Node, Position};
pub use validate::{validate, ValidationError, ValidationErrorKind, ValidationReport};
