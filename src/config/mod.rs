pub mod applicator;
pub mod loader;
pub mod schema;

pub use applicator::{apply_plan, check_plan, ApplicationError, PlanResult};
pub use loader::{load_from_path, load_from_str, ConfigError, PlanOrigin};
pub use schema::{
    HashAlgorithm, Metadata, Operation, PlanConfig, SpliceDefinition, ValidationError,
    ValidationIssue, Verify,
};
