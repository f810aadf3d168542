// WordPress export migration: profiles → person
pub mod config;
pub mod document;
pub mod encoded_text;
pub mod export_version;
pub mod record;
pub mod reporter;
pub mod transformation_engine;
pub mod transformation_rule;
pub mod validation;

// Re-export core types for convenience
pub use config::{ConfigError, MigrationConfig};
pub use document::{Document, DocumentError};
pub use export_version::ExportVersion;
pub use record::{rename_if_matches, Record};
pub use reporter::{ReportFormat, TransformationReport, TransformationReporter};
pub use transformation_engine::{MigrationEngine, TransformationError, TransformationResult};
pub use transformation_rule::{
    AppliedTransformation, ChangeType, FieldMigrationRule, RelocationPolicy, RepeaterRowMigration,
};
pub use validation::{validate_config, ValidationError, ValidationReport, ValidationWarning};
