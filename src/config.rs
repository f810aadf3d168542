//! Rule set for a migration run.
//!
//! Every section has a built-in default matching the profiles → person
//! migration, so a rules file only needs to name what it changes. Setting an
//! optional section to `null` switches that step off.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::transformation_rule::{
    ContentRelocation, FeaturedImage, FieldMigrationRule, NameConsolidation, NameSource, Relabel,
    RelocationPolicy, RepeaterRowMigration,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read rules file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Record kind (`wp:post_type`) rewrite; also rewrites the item guid.
    pub kind_relabel: Option<Relabel>,
    /// Category domain rewrite, applied to relabeled records and to the
    /// channel's term definitions.
    pub taxonomy_relabel: Option<Relabel>,
    /// Kinds whose custom fields are migrated, compared ignoring case after
    /// the kind relabel. Empty means every record.
    pub record_kinds: Vec<String>,
    pub field_rules: Vec<FieldMigrationRule>,
    pub repeater_rows: Vec<RepeaterRowMigration>,
    pub name_consolidation: Option<NameConsolidation>,
    pub content_relocation: Option<ContentRelocation>,
    pub featured_image: Option<FeaturedImage>,
    pub shortcode_renames: Vec<Relabel>,
    /// Remove source fields whose value is already held by their target.
    pub purge_superseded: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            kind_relabel: Some(Relabel::new("profiles", "person")),
            taxonomy_relabel: Some(Relabel::new("profiles_category", "people_group")),
            record_kinds: vec!["profiles".to_string(), "person".to_string()],
            field_rules: default_field_rules(),
            repeater_rows: vec![RepeaterRowMigration::pending(
                "phone",
                "person_phone_numbers",
                "number",
                1,
            )],
            name_consolidation: Some(NameConsolidation {
                first: NameSource::new("first_name", Some("avf_first_name_1")),
                middle: NameSource::new("middle_initial", Some("avf_middle_initial_1")),
                last: NameSource::new("last_name", Some("avf_last_name_1")),
                target_key: "person_orderby_name".to_string(),
                target_identifier: "field_59669002f433d".to_string(),
            }),
            content_relocation: Some(ContentRelocation {
                source_key: "biography".to_string(),
                policy: RelocationPolicy::Overwrite,
            }),
            featured_image: Some(FeaturedImage {
                source_key: "photo".to_string(),
                target_key: "_thumbnail_id".to_string(),
            }),
            shortcode_renames: vec![Relabel::new("accordion", "ucf_college_accordion")],
            purge_superseded: false,
        }
    }
}

/// Field moves of the profiles → person migration. Only the job title
/// identifiers are known from a live export. The other field keys are
/// assigned per site by ACF, so those rules stay pending until a rules file
/// supplies them.
fn default_field_rules() -> Vec<FieldMigrationRule> {
    vec![
        FieldMigrationRule::new("position", "person_jobtitle", "field_156", "field_5953aa3d25c14"),
        FieldMigrationRule::pending("email", "person_email"),
        FieldMigrationRule::pending("office_address", "person_room"),
        FieldMigrationRule::pending("education", "person_educationspecialties"),
    ]
}

impl MigrationConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Whether custom-field steps apply to a record of `kind`.
    pub fn migrates_kind(&self, kind: &str) -> bool {
        self.record_kinds.is_empty()
            || self
                .record_kinds
                .iter()
                .any(|candidate| candidate.trim().eq_ignore_ascii_case(kind.trim()))
    }
}
