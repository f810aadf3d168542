use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{
    export_version::ExportVersion,
    transformation_engine::TransformationResult,
    transformation_rule::{AppliedTransformation, ChangeType},
    validation::ValidationReport,
};

/// Reporter for generating migration reports in various formats
pub struct TransformationReporter {
    output_format: ReportFormat,
}

/// Available output formats for migration reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Console,
    Json,
    Yaml,
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" => Ok(ReportFormat::Console),
            "json" => Ok(ReportFormat::Json),
            "yaml" | "yml" => Ok(ReportFormat::Yaml),
            other => Err(ReportError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportFormat::Console => "console",
            ReportFormat::Json => "json",
            ReportFormat::Yaml => "yaml",
        };
        f.write_str(name)
    }
}

/// Migration report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationReport {
    pub export_version: Option<ExportVersion>,
    pub dry_run: bool,
    pub output_file: Option<String>,
    pub applied_transformations: Vec<AppliedTransformation>,
    pub validation_summary: ValidationSummary,
    pub transformation_summary: TransformationSummary,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Summary of rule set validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_errors: usize,
    pub total_warnings: usize,
    pub is_valid: bool,
}

/// Summary of migration results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformationSummary {
    pub records_processed: usize,
    pub records_changed: usize,
    pub total_transformations: usize,
    pub by_change_type: BTreeMap<ChangeType, usize>,
    pub by_rule: BTreeMap<String, usize>,
}

impl TransformationReporter {
    pub fn new() -> Self {
        Self {
            output_format: ReportFormat::Console,
        }
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Builds the report for one migration run
    pub fn generate_report(
        &self,
        result: &TransformationResult,
        output_file: Option<String>,
        dry_run: bool,
    ) -> TransformationReport {
        let validation_summary = self.create_validation_summary(&result.validation_report);
        let transformation_summary = self.create_transformation_summary(result);
        let recommendations = self.generate_recommendations(result, dry_run);

        TransformationReport {
            export_version: result.export_version,
            dry_run,
            output_file,
            applied_transformations: result.applied_transformations.clone(),
            validation_summary,
            transformation_summary,
            warnings: result
                .warnings
                .iter()
                .map(|warning| match &warning.record {
                    Some(record) => format!("Record {}: {}", record, warning.message),
                    None => warning.message.clone(),
                })
                .chain(
                    result
                        .validation_report
                        .warnings
                        .iter()
                        .map(|warning| format!("{}: {}", warning.field_path, warning.message)),
                )
                .collect(),
            recommendations,
        }
    }

    /// Format the report according to the configured output format
    pub fn format_report(&self, report: &TransformationReport) -> Result<String, ReportError> {
        match self.output_format {
            ReportFormat::Console => Ok(self.format_console_report(report)),
            ReportFormat::Json => serde_json::to_string_pretty(report)
                .map_err(|e| ReportError::SerializationError(e.to_string())),
            ReportFormat::Yaml => serde_yaml::to_string(report)
                .map_err(|e| ReportError::SerializationError(e.to_string())),
        }
    }

    fn create_validation_summary(&self, report: &ValidationReport) -> ValidationSummary {
        ValidationSummary {
            total_errors: report.errors.len(),
            total_warnings: report.warnings.len(),
            is_valid: report.is_valid,
        }
    }

    fn create_transformation_summary(&self, result: &TransformationResult) -> TransformationSummary {
        let mut summary = TransformationSummary {
            records_processed: result.records_processed,
            records_changed: result.records_changed,
            total_transformations: result.applied_transformations.len(),
            ..TransformationSummary::default()
        };

        for transformation in &result.applied_transformations {
            *summary.by_change_type.entry(transformation.change_type).or_default() += 1;
            *summary.by_rule.entry(transformation.rule_id.clone()).or_default() += 1;
        }

        summary
    }

    fn generate_recommendations(&self, result: &TransformationResult, dry_run: bool) -> Vec<String> {
        let mut recommendations = Vec::new();

        if result.records_processed == 0 {
            recommendations.push("The export holds no records; check that the right file was given".to_string());
        } else if result.is_noop() {
            recommendations.push("Nothing to migrate; the export already uses the new field layout".to_string());
        }

        if !result.warnings.is_empty() {
            recommendations.push("Spot-check the output before importing it".to_string());
        }

        if dry_run && !result.is_noop() {
            recommendations.push("Run again without --dry-run to write the migrated export".to_string());
        }

        if recommendations.is_empty() {
            recommendations.push("Migration completed successfully".to_string());
        }

        recommendations
    }

    fn format_console_report(&self, report: &TransformationReport) -> String {
        let summary = &report.transformation_summary;
        let mut output = String::new();

        output.push_str("=== Profile Migration Report ===\n\n");

        match report.export_version {
            Some(version) => output.push_str(&format!("Export Version: {}\n", version)),
            None => output.push_str("Export Version: Unknown\n"),
        }
        output.push_str(&format!(
            "Records: {} processed, {} changed\n",
            summary.records_processed, summary.records_changed
        ));
        output.push_str(&format!("Transformations Applied: {}\n", summary.total_transformations));

        if !summary.by_change_type.is_empty() {
            output.push_str("\nChanges by type:\n");
            for (change_type, count) in &summary.by_change_type {
                output.push_str(&format!("  {:?}: {}\n", change_type, count));
            }
        }

        if !summary.by_rule.is_empty() {
            output.push_str("\nChanges by rule:\n");
            for (rule_id, count) in &summary.by_rule {
                output.push_str(&format!("  {}: {}\n", rule_id, count));
            }
        }

        if !report.warnings.is_empty() {
            output.push_str("\nWarnings:\n");
            for warning in &report.warnings {
                output.push_str(&format!("  ⚠ {}\n", warning));
            }
        }

        if !report.recommendations.is_empty() {
            output.push_str("\nRecommendations:\n");
            for rec in &report.recommendations {
                output.push_str(&format!("  • {}\n", rec));
            }
        }

        output
    }
}

impl Default for TransformationReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Unknown report format '{0}' (expected console, json or yaml)")]
    UnknownFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(applied: Vec<AppliedTransformation>) -> TransformationResult {
        TransformationResult {
            records_processed: 2,
            records_changed: if applied.is_empty() { 0 } else { 1 },
            applied_transformations: applied,
            validation_report: ValidationReport::new(),
            warnings: Vec::new(),
            export_version: Some(ExportVersion::new(1, 2)),
        }
    }

    fn sample_changes() -> Vec<AppliedTransformation> {
        vec![
            AppliedTransformation::new("12", "kind", "post_type", ChangeType::Relabeled)
                .with_values(Some("profiles"), Some("person")),
            AppliedTransformation::new(
                "12",
                "field:position->person_jobtitle",
                "person_jobtitle",
                ChangeType::Renamed,
            ),
            AppliedTransformation::new(
                "12",
                "field:position->person_jobtitle",
                "_person_jobtitle",
                ChangeType::Added,
            ),
        ]
    }

    #[test]
    fn test_transformation_reporter_creation() {
        let reporter = TransformationReporter::new();
        assert_eq!(reporter.output_format, ReportFormat::Console);
    }

    #[test]
    fn test_reporter_with_format() {
        let reporter = TransformationReporter::new().with_format(ReportFormat::Json);
        assert_eq!(reporter.output_format, ReportFormat::Json);
    }

    #[test]
    fn test_report_format_from_str() {
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("YML".parse::<ReportFormat>().unwrap(), ReportFormat::Yaml);
        assert!(matches!(
            "html".parse::<ReportFormat>(),
            Err(ReportError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_generate_report_counts() {
        let reporter = TransformationReporter::new();
        let report = reporter.generate_report(&result_with(sample_changes()), None, false);

        let summary = &report.transformation_summary;
        assert_eq!(summary.total_transformations, 3);
        assert_eq!(summary.records_changed, 1);
        assert_eq!(summary.by_change_type.get(&ChangeType::Relabeled), Some(&1));
        assert_eq!(summary.by_rule.get("field:position->person_jobtitle"), Some(&2));
        assert!(report.validation_summary.is_valid);
        assert_eq!(report.recommendations, vec!["Migration completed successfully".to_string()]);
    }

    #[test]
    fn test_noop_run_recommendation() {
        let reporter = TransformationReporter::new();
        let report = reporter.generate_report(&result_with(Vec::new()), None, true);

        assert!(report.recommendations[0].starts_with("Nothing to migrate"));
        assert_eq!(report.recommendations.len(), 1);
    }

    #[test]
    fn test_record_warnings_name_their_record() {
        use crate::transformation_engine::{TransformationWarning, TransformationWarningType};

        let mut result = result_with(sample_changes());
        result.warnings.push(
            TransformationWarning::new(
                "'position' (Director) kept beside 'person_jobtitle' (Dean)".to_string(),
                TransformationWarningType::ConflictingValues,
            )
            .with_record("12".to_string()),
        );
        result.warnings.push(TransformationWarning::new(
            "Export format 2.0 has not been tested".to_string(),
            TransformationWarningType::UnsupportedExportVersion,
        ));

        let report = TransformationReporter::new().generate_report(&result, None, false);
        assert_eq!(
            report.warnings,
            vec![
                "Record 12: 'position' (Director) kept beside 'person_jobtitle' (Dean)".to_string(),
                "Export format 2.0 has not been tested".to_string(),
            ]
        );
    }

    #[test]
    fn test_format_console_report() {
        let reporter = TransformationReporter::new();
        let report = reporter.generate_report(
            &result_with(sample_changes()),
            Some("export-migrated.xml".to_string()),
            true,
        );

        let formatted = reporter.format_report(&report).unwrap();
        assert!(formatted.contains("Profile Migration Report"));
        assert!(formatted.contains("Export Version: 1.2"));
        assert!(formatted.contains("Records: 2 processed, 1 changed"));
        assert!(formatted.contains("Renamed: 1"));
        assert!(formatted.contains("--dry-run"));
    }

    #[test]
    fn test_format_json_report() {
        let reporter = TransformationReporter::new().with_format(ReportFormat::Json);
        let report = reporter.generate_report(&result_with(sample_changes()), None, false);

        let formatted = reporter.format_report(&report).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&formatted).unwrap();
        assert_eq!(parsed["transformation_summary"]["by_change_type"]["Added"], 1);
        assert_eq!(parsed["export_version"]["minor"], 2);
    }

    #[test]
    fn test_format_yaml_report() {
        let reporter = TransformationReporter::new().with_format(ReportFormat::Yaml);
        let report = reporter.generate_report(&result_with(sample_changes()), None, false);

        let formatted = reporter.format_report(&report).unwrap();
        let parsed: TransformationReport = serde_yaml::from_str(&formatted).unwrap();
        assert_eq!(parsed.applied_transformations.len(), 3);
    }
}
