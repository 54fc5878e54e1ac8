pub mod dag;
pub mod executor;
pub mod expression;
pub mod handlers;
pub mod record;
pub mod template;

pub use dag::WorkflowDag;
pub use executor::{ExecutionOutcome, WorkflowExecutor};
pub use expression::{evaluate_condition, ExpressionError};
pub use handlers::SlotInputs;
pub use record::{ExecutionRecord, ExecutionRegistry, RecordHandle, StatusSnapshot};
pub use template::{export_template, TemplateVariable, WorkflowTemplate};
