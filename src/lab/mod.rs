//! Lab content: model, loading and authoring checks

pub mod lint;
pub mod loader;
pub mod model;

pub use lint::{LintFinding, LintReason, lint_lab};
pub use loader::{LabError, load_lab, parse_lab};
pub use model::{BlockKey, CodeBlock, Hint, Lab, Skeletons, Step, VerifySpec};
