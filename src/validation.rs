use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::MigrationConfig;
use crate::transformation_rule::{Relabel, MAX_REPEATER_ROW};

/// Shape of an ACF field identifier (`field_5953aa3d25c14`).
const FIELD_IDENTIFIER_PATTERN: &str = r"^field_[0-9a-z]+$";

/// Validation report for a migration rule set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub field_path: String,
    pub error_type: ValidationErrorType,
    pub message: String,
    pub suggested_fix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationErrorType {
    EmptyValue,
    /// A shadow key (`_name`) used where a visible key is expected
    ShadowKey,
    DuplicateKey,
    OutOfRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub field_path: String,
    pub warning_type: ValidationWarningType,
    pub message: String,
    pub recommendation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationWarningType {
    UnusualIdentifier,
    NoOpRule,
    /// Rule skipped until its field identifiers are supplied
    PendingRule,
}

impl ValidationError {
    pub fn new(field_path: String, error_type: ValidationErrorType, message: String) -> Self {
        Self {
            field_path,
            error_type,
            message,
            suggested_fix: None,
        }
    }

    pub fn with_suggested_fix(mut self, fix: String) -> Self {
        self.suggested_fix = Some(fix);
        self
    }
}

impl ValidationWarning {
    pub fn new(field_path: String, warning_type: ValidationWarningType, message: String) -> Self {
        Self {
            field_path,
            warning_type,
            message,
            recommendation: None,
        }
    }

    pub fn with_recommendation(mut self, recommendation: String) -> Self {
        self.recommendation = Some(recommendation);
        self
    }
}

/// Checks a rule set before it is allowed to touch a document.
pub fn validate_config(config: &MigrationConfig) -> ValidationReport {
    let mut report = ValidationReport::new();
    let identifier_shape = Regex::new(FIELD_IDENTIFIER_PATTERN).ok();

    let mut old_keys = HashSet::new();
    let mut new_keys = HashSet::new();

    for (index, rule) in config.field_rules.iter().enumerate() {
        let path = format!("field_rules[{}]", index);

        check_visible_key(&mut report, &format!("{}.old_key", path), &rule.old_key);
        check_visible_key(&mut report, &format!("{}.new_key", path), &rule.new_key);

        check_identifier(
            &mut report,
            identifier_shape.as_ref(),
            &format!("{}.old_identifier", path),
            rule.old_identifier.as_deref(),
        );
        check_identifier(
            &mut report,
            identifier_shape.as_ref(),
            &format!("{}.new_identifier", path),
            rule.new_identifier.as_deref(),
        );
        if rule.is_pending() {
            report.add_warning(pending_warning(path.clone(), &rule.old_key, "new_identifier"));
        }

        if !old_keys.insert(rule.old_key.as_str()) {
            report.add_error(ValidationError::new(
                format!("{}.old_key", path),
                ValidationErrorType::DuplicateKey,
                format!("'{}' is migrated by more than one rule", rule.old_key),
            ));
        }
        if !new_keys.insert(rule.new_key.as_str()) {
            report.add_error(ValidationError::new(
                format!("{}.new_key", path),
                ValidationErrorType::DuplicateKey,
                format!("'{}' is the target of more than one rule", rule.new_key),
            ));
        }

        if rule.old_key == rule.new_key {
            report.add_warning(ValidationWarning::new(
                path,
                ValidationWarningType::NoOpRule,
                format!("Rule keeps '{}' under the same key", rule.old_key),
            ));
        }
    }

    for (index, rule) in config.repeater_rows.iter().enumerate() {
        let path = format!("repeater_rows[{}]", index);

        check_visible_key(&mut report, &format!("{}.source_key", path), &rule.source_key);
        check_visible_key(&mut report, &format!("{}.repeater_key", path), &rule.repeater_key);
        check_visible_key(&mut report, &format!("{}.sub_field", path), &rule.sub_field);
        if !(1..=MAX_REPEATER_ROW).contains(&rule.row) {
            report.add_error(ValidationError::new(
                format!("{}.row", path),
                ValidationErrorType::OutOfRange,
                format!("Row {} is outside 1-{}", rule.row, MAX_REPEATER_ROW),
            ));
        }
        check_identifier(
            &mut report,
            identifier_shape.as_ref(),
            &format!("{}.repeater_identifier", path),
            rule.repeater_identifier.as_deref(),
        );
        check_identifier(
            &mut report,
            identifier_shape.as_ref(),
            &format!("{}.sub_field_identifier", path),
            rule.sub_field_identifier.as_deref(),
        );
        if rule.is_pending() {
            report.add_warning(pending_warning(
                path,
                &rule.source_key,
                "repeater_identifier and sub_field_identifier",
            ));
        }
    }

    for (index, kind) in config.record_kinds.iter().enumerate() {
        if kind.trim().is_empty() {
            report.add_error(ValidationError::new(
                format!("record_kinds[{}]", index),
                ValidationErrorType::EmptyValue,
                "Record kind must not be empty".to_string(),
            ));
        }
    }

    if let Some(relabel) = &config.kind_relabel {
        check_relabel(&mut report, "kind_relabel", relabel);
    }
    if let Some(relabel) = &config.taxonomy_relabel {
        check_relabel(&mut report, "taxonomy_relabel", relabel);
    }
    for (index, relabel) in config.shortcode_renames.iter().enumerate() {
        check_relabel(&mut report, &format!("shortcode_renames[{}]", index), relabel);
    }

    if let Some(names) = &config.name_consolidation {
        check_visible_key(&mut report, "name_consolidation.target_key", &names.target_key);
        for (component, source) in ["first", "middle", "last"].iter().zip(names.sources()) {
            for key in source.keys() {
                check_visible_key(&mut report, &format!("name_consolidation.{}", component), key);
            }
        }
        if names.target_identifier.trim().is_empty() {
            report.add_error(ValidationError::new(
                "name_consolidation.target_identifier".to_string(),
                ValidationErrorType::EmptyValue,
                "Field identifier must not be empty".to_string(),
            ));
        }
    }

    if let Some(relocation) = &config.content_relocation {
        check_visible_key(&mut report, "content_relocation.source_key", &relocation.source_key);
    }

    if let Some(image) = &config.featured_image {
        check_visible_key(&mut report, "featured_image.source_key", &image.source_key);
        if image.target_key.trim().is_empty() {
            report.add_error(ValidationError::new(
                "featured_image.target_key".to_string(),
                ValidationErrorType::EmptyValue,
                "Key must not be empty".to_string(),
            ));
        }
    }

    report
}

fn check_visible_key(report: &mut ValidationReport, field_path: &str, key: &str) {
    if key.trim().is_empty() {
        report.add_error(ValidationError::new(
            field_path.to_string(),
            ValidationErrorType::EmptyValue,
            "Key must not be empty".to_string(),
        ));
    } else if key.starts_with('_') {
        report.add_error(
            ValidationError::new(
                field_path.to_string(),
                ValidationErrorType::ShadowKey,
                format!("'{}' is a shadow key", key),
            )
            .with_suggested_fix(format!("Use '{}'", key.trim_start_matches('_'))),
        );
    }
}

/// Absent identifiers are left to the pending-rule warning; present ones
/// must be non-empty and should look like ACF keys.
fn check_identifier(
    report: &mut ValidationReport,
    shape: Option<&Regex>,
    field_path: &str,
    identifier: Option<&str>,
) {
    let Some(identifier) = identifier else {
        return;
    };
    if identifier.trim().is_empty() {
        report.add_error(ValidationError::new(
            field_path.to_string(),
            ValidationErrorType::EmptyValue,
            "Field identifier must not be empty".to_string(),
        ));
    } else if shape.is_some_and(|shape| !shape.is_match(identifier)) {
        report.add_warning(
            ValidationWarning::new(
                field_path.to_string(),
                ValidationWarningType::UnusualIdentifier,
                format!("'{}' does not look like an ACF field key", identifier),
            )
            .with_recommendation("Copy the key from the ACF field group export".to_string()),
        );
    }
}

fn pending_warning(field_path: String, source_key: &str, missing: &str) -> ValidationWarning {
    ValidationWarning::new(
        field_path,
        ValidationWarningType::PendingRule,
        format!("'{}' is not migrated until {} is set", source_key, missing),
    )
    .with_recommendation("Add the ACF field keys of the person field group to a rules file".to_string())
}

fn check_relabel(report: &mut ValidationReport, field_path: &str, relabel: &Relabel) {
    if relabel.from.trim().is_empty() || relabel.to.trim().is_empty() {
        report.add_error(ValidationError::new(
            field_path.to_string(),
            ValidationErrorType::EmptyValue,
            "Both labels must be set".to_string(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformation_rule::{FieldMigrationRule, RepeaterRowMigration};

    #[test]
    fn test_validation_report_creation() {
        let report = ValidationReport::new();
        assert!(report.is_valid);
        assert!(!report.has_errors());
        assert!(!report.has_warnings());
    }

    #[test]
    fn test_validation_report_add_error() {
        let mut report = ValidationReport::new();
        report.add_error(ValidationError::new(
            "field_rules[0].old_key".to_string(),
            ValidationErrorType::EmptyValue,
            "Key must not be empty".to_string(),
        ));

        assert!(!report.is_valid);
        assert!(report.has_errors());
    }

    #[test]
    fn test_default_config_is_valid() {
        let report = validate_config(&MigrationConfig::default());
        assert!(report.is_valid, "{:?}", report.errors);

        // every warning is a rule waiting for site-specific identifiers
        let pending: Vec<&str> = report
            .warnings
            .iter()
            .inspect(|warning| assert_eq!(warning.warning_type, ValidationWarningType::PendingRule))
            .map(|warning| warning.field_path.as_str())
            .collect();
        assert_eq!(
            pending,
            vec!["field_rules[1]", "field_rules[2]", "field_rules[3]", "repeater_rows[0]"]
        );
    }

    #[test]
    fn test_repeater_row_out_of_range_rejected() {
        let mut config = MigrationConfig::default();
        config.repeater_rows = vec![
            RepeaterRowMigration::pending("phone", "person_phone_numbers", "number", 0),
            RepeaterRowMigration::pending("fax", "person_phone_numbers", "number", MAX_REPEATER_ROW + 1),
        ];

        let report = validate_config(&config);
        let out_of_range: Vec<&str> = report
            .errors
            .iter()
            .filter(|error| error.error_type == ValidationErrorType::OutOfRange)
            .map(|error| error.field_path.as_str())
            .collect();
        assert_eq!(out_of_range, vec!["repeater_rows[0].row", "repeater_rows[1].row"]);
    }

    #[test]
    fn test_empty_record_kind_rejected() {
        let config = MigrationConfig {
            record_kinds: vec!["person".to_string(), " ".to_string()],
            ..MigrationConfig::default()
        };

        let report = validate_config(&config);
        assert!(!report.is_valid);
        assert_eq!(report.errors[0].field_path, "record_kinds[1]");
    }

    #[test]
    fn test_shadow_key_rejected() {
        let config = MigrationConfig {
            field_rules: vec![FieldMigrationRule::new(
                "_position",
                "person_jobtitle",
                "field_156",
                "field_5953aa3d25c14",
            )],
            ..MigrationConfig::default()
        };

        let report = validate_config(&config);
        assert!(!report.is_valid);
        assert_eq!(report.errors[0].error_type, ValidationErrorType::ShadowKey);
        assert_eq!(report.errors[0].suggested_fix.as_deref(), Some("Use 'position'"));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let config = MigrationConfig {
            field_rules: vec![
                FieldMigrationRule::new("position", "person_jobtitle", "field_156", "field_1a"),
                FieldMigrationRule::new("position", "person_title", "field_156", "field_1b"),
                FieldMigrationRule::new("title", "person_jobtitle", "field_157", "field_1a"),
            ],
            ..MigrationConfig::default()
        };

        let report = validate_config(&config);
        let duplicates = report
            .errors
            .iter()
            .filter(|error| error.error_type == ValidationErrorType::DuplicateKey)
            .count();
        assert_eq!(duplicates, 2);
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let config = MigrationConfig {
            field_rules: vec![FieldMigrationRule::new("position", "person_jobtitle", "field_156", "")],
            ..MigrationConfig::default()
        };

        let report = validate_config(&config);
        assert!(!report.is_valid);
        assert_eq!(report.errors[0].field_path, "field_rules[0].new_identifier");
    }

    #[test]
    fn test_unusual_identifier_warns() {
        let config = MigrationConfig {
            field_rules: vec![FieldMigrationRule::new(
                "position",
                "position",
                "field_156",
                "Field-Job-Title",
            )],
            ..MigrationConfig::default()
        };

        let report = validate_config(&config);
        assert!(report.is_valid);

        let kinds: Vec<ValidationWarningType> =
            report.warnings.iter().map(|warning| warning.warning_type).collect();
        assert!(kinds.contains(&ValidationWarningType::UnusualIdentifier));
        assert!(kinds.contains(&ValidationWarningType::NoOpRule));
    }

    #[test]
    fn test_empty_relabel_rejected() {
        let config = MigrationConfig {
            kind_relabel: Some(Relabel::new("profiles", "")),
            ..MigrationConfig::default()
        };

        assert!(!validate_config(&config).is_valid);
    }
}
