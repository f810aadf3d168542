use regex::{Captures, Regex};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    config::MigrationConfig,
    document::{Document, DocumentError},
    encoded_text,
    export_version::ExportVersion,
    record::{rename_if_matches, shadow_key, Record},
    transformation_rule::{
        AppliedTransformation, ChangeType, ContentRelocation, FeaturedImage, FieldMigrationRule,
        NameConsolidation, NameSource, PersonName, Relabel, RelocationPolicy, RepeaterRowMigration,
    },
    validation::{validate_config, ValidationReport},
};

/// Applies a migration rule set to every record of an export
pub struct MigrationEngine {
    config: MigrationConfig,
    validation_report: ValidationReport,
    guid_pattern: Option<Regex>,
    shortcode_patterns: Vec<(Relabel, Regex)>,
}

/// Result of a migration run
#[derive(Debug, Clone)]
pub struct TransformationResult {
    pub applied_transformations: Vec<AppliedTransformation>,
    pub validation_report: ValidationReport,
    pub warnings: Vec<TransformationWarning>,
    pub export_version: Option<ExportVersion>,
    pub records_processed: usize,
    pub records_changed: usize,
}

impl TransformationResult {
    pub fn is_noop(&self) -> bool {
        self.applied_transformations.is_empty()
    }
}

/// Warning generated during a migration run
#[derive(Debug, Clone)]
pub struct TransformationWarning {
    pub message: String,
    pub record: Option<String>,
    pub warning_type: TransformationWarningType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformationWarningType {
    UnknownExportVersion,
    UnsupportedExportVersion,
    /// Old and new field both hold a value and they differ
    ConflictingValues,
}

impl TransformationWarning {
    pub fn new(message: String, warning_type: TransformationWarningType) -> Self {
        Self {
            message,
            record: None,
            warning_type,
        }
    }

    pub fn with_record(mut self, record: String) -> Self {
        self.record = Some(record);
        self
    }
}

/// Errors that can occur during a migration run
#[derive(Debug, Error)]
pub enum TransformationError {
    #[error("Rule set validation failed with {} error(s)", .0.errors.len())]
    ValidationFailed(ValidationReport),

    #[error("Record {record}: {source}")]
    RecordFailed {
        record: String,
        #[source]
        source: DocumentError,
    },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Invalid rewrite pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl MigrationEngine {
    /// Validates the rule set and prepares its patterns. A rule set with
    /// validation errors is refused.
    pub fn new(config: MigrationConfig) -> Result<Self, TransformationError> {
        let validation_report = validate_config(&config);
        if !validation_report.is_valid {
            return Err(TransformationError::ValidationFailed(validation_report));
        }
        for warning in &validation_report.warnings {
            warn!("{}: {}", warning.field_path, warning.message);
        }

        let guid_pattern = config
            .kind_relabel
            .as_ref()
            .map(|relabel| guid_pattern(&relabel.from))
            .transpose()?;

        let shortcode_patterns = config
            .shortcode_renames
            .iter()
            .map(|rename| Ok((rename.clone(), shortcode_pattern(&rename.from)?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            config,
            validation_report,
            guid_pattern,
            shortcode_patterns,
        })
    }

    /// Migrates every record of `document` in place, in document order. The
    /// first record that cannot be migrated aborts the run.
    pub fn migrate(&self, document: &mut Document) -> Result<TransformationResult, TransformationError> {
        let mut warnings = Vec::new();
        let export_version = document.export_version();
        match export_version {
            Some(version) if !version.is_supported() => {
                warn!(
                    "Export format {} is outside the supported range {}-{}",
                    version,
                    ExportVersion::OLDEST_SUPPORTED,
                    ExportVersion::NEWEST_SUPPORTED
                );
                warnings.push(TransformationWarning::new(
                    format!("Export format {} has not been tested", version),
                    TransformationWarningType::UnsupportedExportVersion,
                ));
            }
            None => {
                warn!("Export format version could not be determined");
                warnings.push(TransformationWarning::new(
                    "Export format version could not be determined".to_string(),
                    TransformationWarningType::UnknownExportVersion,
                ));
            }
            Some(version) => debug!("Export format {}", version),
        }

        info!("Migrating {} record(s)", document.record_count());

        let mut applied_transformations = Vec::new();
        let mut records_processed = 0;
        let mut records_changed = 0;

        for mut record in document.records_mut() {
            let label = record.label();
            let changes = self
                .migrate_record(&mut record, &label, &mut warnings)
                .map_err(|source| TransformationError::RecordFailed {
                    record: label.clone(),
                    source,
                })?;

            records_processed += 1;
            if !changes.is_empty() {
                records_changed += 1;
                debug!("Record {}: {} change(s)", label, changes.len());
            }
            applied_transformations.extend(changes);
        }

        applied_transformations.extend(self.relabel_terms(document)?);

        info!(
            "Migrated {} of {} record(s), {} change(s)",
            records_changed,
            records_processed,
            applied_transformations.len()
        );

        Ok(TransformationResult {
            applied_transformations,
            validation_report: self.validation_report.clone(),
            warnings,
            export_version,
            records_processed,
            records_changed,
        })
    }

    /// Applies the full rule list to one record. Rules whose target is absent
    /// are skipped. Custom fields are only touched on the configured record
    /// kinds; shortcode renames apply to every record.
    pub fn migrate_record(
        &self,
        record: &mut Record<'_>,
        label: &str,
        warnings: &mut Vec<TransformationWarning>,
    ) -> Result<Vec<AppliedTransformation>, DocumentError> {
        let mut applied = Vec::new();

        if let Some(relabel) = &self.config.kind_relabel {
            applied.extend(relabel_kind(record, label, relabel)?);
        }

        // guid and categories only belong to the new kind once the record has it
        let kind = record.kind()?;
        let has_new_kind = self
            .config
            .kind_relabel
            .as_ref()
            .map_or(true, |relabel| kind.eq_ignore_ascii_case(&relabel.to));

        if has_new_kind {
            if let Some(relabel) = &self.config.kind_relabel {
                applied.extend(self.rewrite_guid(record, label, relabel)?);
            }
            if let Some(relabel) = &self.config.taxonomy_relabel {
                applied.extend(relabel_categories(record, label, relabel)?);
            }
        }

        let migrates_fields = self.config.migrates_kind(&kind);
        if migrates_fields {
            for rule in &self.config.field_rules {
                applied.extend(apply_field_rule(record, label, rule, warnings)?);
            }

            for rule in &self.config.repeater_rows {
                applied.extend(apply_repeater_row(record, label, rule)?);
            }

            if let Some(names) = &self.config.name_consolidation {
                applied.extend(consolidate_name(record, label, names)?);
            }

            if let Some(relocation) = &self.config.content_relocation {
                applied.extend(self.relocate_content(record, label, relocation)?);
            }
        } else {
            debug!("Record {}: kind '{}' keeps its fields", label, kind);
        }

        applied.extend(self.rename_shortcodes(record, label)?);

        if migrates_fields {
            if let Some(image) = &self.config.featured_image {
                applied.extend(promote_featured_image(record, label, image)?);
            }

            if self.config.purge_superseded {
                applied.extend(self.purge_carried_over(record, label)?);
            }
        }

        Ok(applied)
    }

    /// Removes source fields, with their shadows, whose value the record now
    /// holds under the target. A source that is empty goes too. Anything else
    /// is kept, so purging never loses data.
    fn purge_carried_over(
        &self,
        record: &mut Record<'_>,
        label: &str,
    ) -> Result<Vec<AppliedTransformation>, DocumentError> {
        let mut applied = Vec::new();
        for key in self.carried_over_keys(record)? {
            let removed = record.remove_all(&key)?;
            if removed > 0 {
                debug!("Record {}: removed {} attachment(s) for '{}'", label, removed, key);
                applied.push(
                    AppliedTransformation::new(label, "purge", &key, ChangeType::Removed)
                        .with_values(Some(&key), None),
                );
            }
        }
        Ok(applied)
    }

    fn carried_over_keys(&self, record: &Record<'_>) -> Result<Vec<String>, DocumentError> {
        let mut keys = Vec::new();

        // old pairs only survive the field rules when the new key already held a value
        for rule in &self.config.field_rules {
            if rule.is_pending() || !record.has_key(&rule.old_key)? || !record.has_key(&rule.new_key)? {
                continue;
            }
            if held_by_target(&record.find_value(&rule.old_key)?, &record.find_value(&rule.new_key)?) {
                keys.push(rule.old_key.clone());
            }
        }

        for rule in &self.config.repeater_rows {
            if rule.is_pending() || !record.has_key(&rule.source_key)? {
                continue;
            }
            if held_by_target(
                &record.find_value(&rule.source_key)?,
                &record.find_value(&rule.target_key())?,
            ) {
                keys.push(rule.source_key.clone());
            }
        }

        if let Some(names) = &self.config.name_consolidation {
            if record.has_key(&names.target_key)? {
                let mut name_keys = Vec::new();
                let mut all_used = true;
                for source in names.sources() {
                    let used = read_name_component(record, source)?;
                    for key in source.keys() {
                        if record.has_key(key)? {
                            all_used &= held_by_target(&record.find_value(key)?, &used);
                            name_keys.push(key.to_string());
                        }
                    }
                }
                // a fallback that lost to its primary would be read once the
                // primary is gone, so the names go together or not at all
                if all_used {
                    keys.extend(name_keys);
                }
            }
        }

        if let Some(relocation) = &self.config.content_relocation {
            if record.has_key(&relocation.source_key)? {
                let (moved, _) = self.rename_shortcodes_in(&record.find_value(&relocation.source_key)?);
                let content = if record.has_main_content() {
                    record.main_content()?
                } else {
                    String::new()
                };
                if held_by_target(&moved, &content) {
                    keys.push(relocation.source_key.clone());
                }
            }
        }

        if let Some(image) = &self.config.featured_image {
            if record.has_key(&image.source_key)?
                && held_by_target(
                    &record.find_value(&image.source_key)?,
                    &record.find_value(&image.target_key)?,
                )
            {
                keys.push(image.source_key.clone());
            }
        }

        Ok(keys)
    }

    fn rewrite_guid(
        &self,
        record: &mut Record<'_>,
        label: &str,
        relabel: &Relabel,
    ) -> Result<Option<AppliedTransformation>, DocumentError> {
        let (Some(pattern), Some(node)) = (&self.guid_pattern, record.guid_mut()) else {
            return Ok(None);
        };

        let guid = encoded_text::read(node)?;
        let updated = pattern
            .replace_all(&guid, |caps: &Captures| {
                if caps.name("query").is_some() {
                    format!("post_type={}", relabel.to)
                } else {
                    format!("/{}/", relabel.to)
                }
            })
            .into_owned();

        if updated == guid {
            return Ok(None);
        }
        encoded_text::write(node, &updated);

        Ok(Some(
            AppliedTransformation::new(label, "guid", "guid", ChangeType::Modified)
                .with_values(Some(&guid), Some(&updated)),
        ))
    }

    /// Applies every shortcode rename to `text`, returning the result and the
    /// renames that matched.
    fn rename_shortcodes_in(&self, text: &str) -> (String, Vec<&Relabel>) {
        let mut content = text.to_string();
        let mut matched = Vec::new();

        for (rename, pattern) in &self.shortcode_patterns {
            let updated = pattern
                .replace_all(&content, |caps: &Captures| {
                    format!("[{}{}{}", &caps[1], rename.to, &caps[2])
                })
                .into_owned();
            if updated != content {
                matched.push(rename);
                content = updated;
            }
        }
        (content, matched)
    }

    fn rename_shortcodes(
        &self,
        record: &mut Record<'_>,
        label: &str,
    ) -> Result<Vec<AppliedTransformation>, DocumentError> {
        if self.shortcode_patterns.is_empty() || !record.has_main_content() {
            return Ok(Vec::new());
        }

        let node = record.main_content_mut()?;
        let original = encoded_text::read(node)?;
        let (content, matched) = self.rename_shortcodes_in(&original);
        if matched.is_empty() {
            return Ok(Vec::new());
        }
        encoded_text::write(node, &content);

        Ok(matched
            .into_iter()
            .map(|rename| {
                AppliedTransformation::new(
                    label,
                    &format!("shortcode:{}", rename.from),
                    "content",
                    ChangeType::Relabeled,
                )
                .with_values(Some(&rename.from), Some(&rename.to))
            })
            .collect())
    }

    /// Copies an attachment's value, shortcodes already renamed, into the main
    /// content. Records whose source attachment is missing or blank are left
    /// alone.
    fn relocate_content(
        &self,
        record: &mut Record<'_>,
        label: &str,
        relocation: &ContentRelocation,
    ) -> Result<Option<AppliedTransformation>, DocumentError> {
        let source = record.find_value(&relocation.source_key)?;
        if source.trim().is_empty() {
            return Ok(None);
        }

        let (value, _) = self.rename_shortcodes_in(&source);
        let node = record.main_content_mut()?;
        let previous = encoded_text::read(node)?;
        if previous == value {
            return Ok(None);
        }

        let moved = match relocation.policy {
            RelocationPolicy::Overwrite => {
                encoded_text::write(node, &value);
                true
            }
            RelocationPolicy::WhenEmpty => rename_if_matches(node, "", &value)?,
        };
        if !moved {
            return Ok(None);
        }

        Ok(Some(
            AppliedTransformation::new(label, "content", &relocation.source_key, ChangeType::Relocated)
                .with_values(Some(&previous), Some(&value)),
        ))
    }

    /// Relabels channel-level term definitions of the old taxonomy.
    fn relabel_terms(&self, document: &mut Document) -> Result<Vec<AppliedTransformation>, DocumentError> {
        let Some(relabel) = &self.config.taxonomy_relabel else {
            return Ok(Vec::new());
        };

        let taxonomy = document.namespaces().term_taxonomy().to_string();
        let mut applied = Vec::new();
        for term in document.terms_mut() {
            let Some(node) = term.child_mut(&taxonomy) else {
                continue;
            };
            if rename_if_matches(node, &relabel.from, &relabel.to)? {
                applied.push(
                    AppliedTransformation::new("channel", "taxonomy", &taxonomy, ChangeType::Relabeled)
                        .with_values(Some(&relabel.from), Some(&relabel.to)),
                );
            }
        }
        Ok(applied)
    }
}

/// Whether a purge candidate's value is already held by its target.
fn held_by_target(source: &str, target: &str) -> bool {
    let source = source.trim();
    source.is_empty() || source == target.trim()
}

/// Upserts one attachment and records it as added or modified.
fn upsert_recorded(
    record: &mut Record<'_>,
    label: &str,
    rule_id: &str,
    key: &str,
    value: &str,
) -> Result<Option<AppliedTransformation>, DocumentError> {
    let previous = record.has_key(key)?.then(|| record.find_value(key)).transpose()?;
    if !record.upsert(key, value)? {
        return Ok(None);
    }
    let change_type = if previous.is_some() {
        ChangeType::Modified
    } else {
        ChangeType::Added
    };
    Ok(Some(
        AppliedTransformation::new(label, rule_id, key, change_type)
            .with_values(previous.as_deref(), Some(value)),
    ))
}

/// `post_type=<kind>` in a query string, or `/<kind>/` as a path segment.
fn guid_pattern(kind: &str) -> Result<Regex, regex::Error> {
    let kind = regex::escape(kind);
    Regex::new(&format!(r"(?P<query>post_type=){}\b|/{}/", kind, kind))
}

/// Opening, closing and self-closing forms of one shortcode tag.
fn shortcode_pattern(tag: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"\[(/?){}(\s|\]|/)", regex::escape(tag)))
}

fn relabel_kind(
    record: &mut Record<'_>,
    label: &str,
    relabel: &Relabel,
) -> Result<Option<AppliedTransformation>, DocumentError> {
    let node = record.kind_node_mut()?;
    let previous = encoded_text::read(node)?;
    if !rename_if_matches(node, &relabel.from, &relabel.to)? {
        return Ok(None);
    }

    debug!("Record {}: kind {} -> {}", label, previous, relabel.to);
    Ok(Some(
        AppliedTransformation::new(label, "kind", "post_type", ChangeType::Relabeled)
            .with_values(Some(&previous), Some(&relabel.to)),
    ))
}

fn relabel_categories(
    record: &mut Record<'_>,
    label: &str,
    relabel: &Relabel,
) -> Result<Vec<AppliedTransformation>, DocumentError> {
    let mut applied = Vec::new();
    for category in record.categories_mut() {
        if category.attribute("domain")?.as_deref() != Some(relabel.from.as_str()) {
            continue;
        }
        category.set_attribute("domain", &relabel.to)?;
        applied.push(
            AppliedTransformation::new(label, "taxonomy", "category", ChangeType::Relabeled)
                .with_values(Some(&relabel.from), Some(&relabel.to)),
        );
    }
    Ok(applied)
}

/// Moves one field to its new key. For each attachment, in order: rename the
/// visible key; else rename the shadow key and force the new identifier;
/// else normalize an already-renamed shadow's identifier. A visible key left
/// without a shadow gets one appended.
///
/// When the record already holds the new key, the old pair stays where it is
/// and only an empty new value is filled from it. Pending rules do nothing.
pub fn apply_field_rule(
    record: &mut Record<'_>,
    label: &str,
    rule: &FieldMigrationRule,
    warnings: &mut Vec<TransformationWarning>,
) -> Result<Vec<AppliedTransformation>, DocumentError> {
    let Some(new_identifier) = rule.new_identifier.as_deref() else {
        return Ok(Vec::new());
    };
    let rule_id = rule.rule_id();
    let old_shadow = rule.old_shadow_key();
    let new_shadow = rule.new_shadow_key();
    let target = record
        .has_key(&rule.new_key)?
        .then(|| record.find_value(&rule.new_key))
        .transpose()?;
    let mut left_behind = None;
    let mut applied = Vec::new();

    for mut attachment in record.attachments_mut() {
        if target.is_some() {
            let key = attachment.key()?;
            if key.eq_ignore_ascii_case(&rule.old_key) {
                if left_behind.is_none() {
                    left_behind = Some(attachment.value()?);
                }
                continue;
            }
            if key.eq_ignore_ascii_case(&old_shadow) {
                continue;
            }
        }

        if rename_if_matches(attachment.key_node_mut()?, &rule.old_key, &rule.new_key)? {
            applied.push(
                AppliedTransformation::new(label, &rule_id, &rule.new_key, ChangeType::Renamed)
                    .with_values(Some(&rule.old_key), Some(&rule.new_key)),
            );
        } else if rename_if_matches(attachment.key_node_mut()?, &old_shadow, &new_shadow)? {
            applied.push(
                AppliedTransformation::new(label, &rule_id, &new_shadow, ChangeType::Renamed)
                    .with_values(Some(&old_shadow), Some(&new_shadow)),
            );

            let value = attachment.value_node_mut()?;
            let previous = encoded_text::read(value)?;
            if previous != new_identifier {
                encoded_text::write(value, new_identifier);
                applied.push(
                    AppliedTransformation::new(
                        label,
                        &rule_id,
                        &new_shadow,
                        ChangeType::IdentifierRewritten,
                    )
                    .with_values(Some(&previous), Some(new_identifier)),
                );
            }
        } else if attachment.key()? == new_shadow {
            let Some(old_identifier) = rule.old_identifier.as_deref() else {
                continue;
            };
            let value = attachment.value_node_mut()?;
            if rename_if_matches(value, old_identifier, new_identifier)? {
                applied.push(
                    AppliedTransformation::new(
                        label,
                        &rule_id,
                        &new_shadow,
                        ChangeType::IdentifierRewritten,
                    )
                    .with_values(Some(old_identifier), Some(new_identifier)),
                );
            }
        }
    }

    if let (Some(target), Some(old_value)) = (&target, &left_behind) {
        if target.trim().is_empty() && !old_value.trim().is_empty() {
            applied.extend(upsert_recorded(record, label, &rule_id, &rule.new_key, old_value)?);
        } else if !old_value.trim().is_empty() && target.trim() != old_value.trim() {
            warn!(
                "Record {}: '{}' kept, '{}' already holds a different value",
                label, rule.old_key, rule.new_key
            );
            warnings.push(
                TransformationWarning::new(
                    format!(
                        "'{}' ({}) kept beside '{}' ({})",
                        rule.old_key, old_value, rule.new_key, target
                    ),
                    TransformationWarningType::ConflictingValues,
                )
                .with_record(label.to_string()),
            );
        }
    }

    if record.has_key(&rule.new_key)? && !record.has_key(&new_shadow)? {
        record.append(&new_shadow, new_identifier);
        applied.push(
            AppliedTransformation::new(label, &rule_id, &new_shadow, ChangeType::Added)
                .with_values(None, Some(new_identifier)),
        );
    }

    Ok(applied)
}

/// Copies a flat field into its repeater cell while that cell is still
/// empty, growing the row count to reach it. The source attachment stays.
pub fn apply_repeater_row(
    record: &mut Record<'_>,
    label: &str,
    rule: &RepeaterRowMigration,
) -> Result<Vec<AppliedTransformation>, DocumentError> {
    let (Some(repeater_identifier), Some(sub_field_identifier)) = (
        rule.repeater_identifier.as_deref(),
        rule.sub_field_identifier.as_deref(),
    ) else {
        return Ok(Vec::new());
    };

    let value = record.find_value(&rule.source_key)?;
    let target_key = rule.target_key();
    if value.trim().is_empty() || !record.find_value(&target_key)?.trim().is_empty() {
        return Ok(Vec::new());
    }

    let rule_id = rule.rule_id();
    let rows = record
        .find_value(&rule.repeater_key)?
        .trim()
        .parse::<usize>()
        .unwrap_or(0);
    let mut applied = Vec::new();

    if rows < rule.row {
        applied.extend(upsert_recorded(record, label, &rule_id, &rule.repeater_key, &rule.row.to_string())?);
    }
    applied.extend(upsert_recorded(
        record,
        label,
        &rule_id,
        &shadow_key(&rule.repeater_key),
        repeater_identifier,
    )?);

    // rows added ahead of the target one start out empty
    for index in rows..rule.row.saturating_sub(1) {
        let cell = rule.cell_key(index);
        if !record.has_key(&cell)? {
            applied.extend(upsert_recorded(record, label, &rule_id, &cell, "")?);
            applied.extend(upsert_recorded(record, label, &rule_id, &shadow_key(&cell), sub_field_identifier)?);
        }
    }

    applied.extend(upsert_recorded(record, label, &rule_id, &target_key, &value)?);
    applied.extend(upsert_recorded(
        record,
        label,
        &rule_id,
        &shadow_key(&target_key),
        sub_field_identifier,
    )?);

    debug!("Record {}: '{}' copied to {}", label, rule.source_key, target_key);
    Ok(applied)
}

fn read_name_component(record: &Record<'_>, source: &NameSource) -> Result<String, DocumentError> {
    let primary = record.find_value(&source.primary)?;
    let value = match &source.fallback {
        Some(fallback) if primary.trim().is_empty() => record.find_value(fallback)?,
        _ => primary,
    };
    Ok(value.trim().to_string())
}

/// Regenerates the sortable order-key and its shadow from the name fields.
/// An empty name still yields an (empty) order-key, but an existing one is
/// kept when the record no longer has any name field to rebuild it from.
pub fn consolidate_name(
    record: &mut Record<'_>,
    label: &str,
    names: &NameConsolidation,
) -> Result<Vec<AppliedTransformation>, DocumentError> {
    let mut has_source = false;
    for key in names.sources().iter().flat_map(|source| source.keys()) {
        if record.has_key(key)? {
            has_source = true;
            break;
        }
    }
    if !has_source && record.has_key(&names.target_key)? {
        return Ok(Vec::new());
    }

    let name = PersonName::new(
        &read_name_component(record, &names.first)?,
        &read_name_component(record, &names.middle)?,
        &read_name_component(record, &names.last)?,
    );
    let sort_form = name.sort_form();
    let target_shadow = shadow_key(&names.target_key);
    let mut applied = Vec::new();

    for (key, value) in [
        (names.target_key.as_str(), sort_form.as_str()),
        (target_shadow.as_str(), names.target_identifier.as_str()),
    ] {
        applied.extend(upsert_recorded(record, label, "name", key, value)?);
    }

    if !applied.is_empty() {
        debug!("Record {}: order-key '{}' for {}", label, sort_form, name.display());
    }
    Ok(applied)
}

/// Uses the photo attachment as featured image when the record has none.
pub fn promote_featured_image(
    record: &mut Record<'_>,
    label: &str,
    image: &FeaturedImage,
) -> Result<Option<AppliedTransformation>, DocumentError> {
    if record.has_key(&image.target_key)? {
        return Ok(None);
    }

    let photo = record.find_value(&image.source_key)?;
    let photo = photo.trim();
    if photo.is_empty() {
        return Ok(None);
    }

    record.append(&image.target_key, photo);
    Ok(Some(
        AppliedTransformation::new(label, "featured_image", &image.target_key, ChangeType::Added)
            .with_values(None, Some(photo)),
    ))
}
