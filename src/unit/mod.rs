mod output;
pub mod registry;
pub mod traits;

pub use output::{extract_text, inactive_output, is_inactive, replace_text};
pub use registry::{ConfiguredUnit, UnitRegistry};
pub use traits::{ExecutionUnit, ValidationReport};
