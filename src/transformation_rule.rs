use serde::{Deserialize, Serialize};

use crate::record::shadow_key;

/// Moves one custom field from the old schema to the new one, together with
/// the ACF identifier held by its shadow attachment.
///
/// A rule without `new_identifier` is pending: the engine skips it, since
/// renaming the key without the matching shadow would break the pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMigrationRule {
    pub old_key: String,
    pub new_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_identifier: Option<String>,
}

impl FieldMigrationRule {
    pub fn new(old_key: &str, new_key: &str, old_identifier: &str, new_identifier: &str) -> Self {
        Self {
            old_key: old_key.to_string(),
            new_key: new_key.to_string(),
            old_identifier: Some(old_identifier.to_string()),
            new_identifier: Some(new_identifier.to_string()),
        }
    }

    /// A rule whose field identifiers still have to come from a rules file.
    pub fn pending(old_key: &str, new_key: &str) -> Self {
        Self {
            old_key: old_key.to_string(),
            new_key: new_key.to_string(),
            old_identifier: None,
            new_identifier: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.new_identifier.is_none()
    }

    pub fn rule_id(&self) -> String {
        format!("field:{}->{}", self.old_key, self.new_key)
    }

    pub fn old_shadow_key(&self) -> String {
        shadow_key(&self.old_key)
    }

    pub fn new_shadow_key(&self) -> String {
        shadow_key(&self.new_key)
    }
}

/// Highest repeater row a rule may fill.
pub const MAX_REPEATER_ROW: usize = 9;

/// Copies a flat field into one sub-field of an ACF repeater row.
///
/// ACF stores a repeater as a row count under `repeater_key` and each cell
/// as `<repeater_key>_<index>_<sub_field>`, with a zero-based index. `row` is
/// one-based. Like [`FieldMigrationRule`], the rule is pending until both
/// identifiers are known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeaterRowMigration {
    pub source_key: String,
    pub repeater_key: String,
    pub sub_field: String,
    #[serde(default = "first_row")]
    pub row: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeater_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_field_identifier: Option<String>,
}

fn first_row() -> usize {
    1
}

impl RepeaterRowMigration {
    pub fn pending(source_key: &str, repeater_key: &str, sub_field: &str, row: usize) -> Self {
        Self {
            source_key: source_key.to_string(),
            repeater_key: repeater_key.to_string(),
            sub_field: sub_field.to_string(),
            row,
            repeater_identifier: None,
            sub_field_identifier: None,
        }
    }

    pub fn with_identifiers(mut self, repeater_identifier: &str, sub_field_identifier: &str) -> Self {
        self.repeater_identifier = Some(repeater_identifier.to_string());
        self.sub_field_identifier = Some(sub_field_identifier.to_string());
        self
    }

    pub fn is_pending(&self) -> bool {
        self.repeater_identifier.is_none() || self.sub_field_identifier.is_none()
    }

    pub fn rule_id(&self) -> String {
        format!(
            "repeater:{}->{}[{}].{}",
            self.source_key, self.repeater_key, self.row, self.sub_field
        )
    }

    /// Key of the sub-field cell in the zero-based row `index`.
    pub fn cell_key(&self, index: usize) -> String {
        format!("{}_{}_{}", self.repeater_key, index, self.sub_field)
    }

    /// Key of the cell this rule fills.
    pub fn target_key(&self) -> String {
        self.cell_key(self.row.saturating_sub(1))
    }
}

/// Conditional rewrite of one fixed label into another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relabel {
    pub from: String,
    pub to: String,
}

impl Relabel {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Where one name component is read from. The fallback key is only consulted
/// when the primary one holds nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameSource {
    pub primary: String,
    #[serde(default)]
    pub fallback: Option<String>,
}

impl NameSource {
    pub fn new(primary: &str, fallback: Option<&str>) -> Self {
        Self {
            primary: primary.to_string(),
            fallback: fallback.map(str::to_string),
        }
    }

    /// Every key this source may read, primary first.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.fallback.as_deref())
    }
}

/// Builds the sortable order-key from first, middle and last name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameConsolidation {
    pub first: NameSource,
    pub middle: NameSource,
    pub last: NameSource,
    pub target_key: String,
    pub target_identifier: String,
}

impl NameConsolidation {
    pub fn sources(&self) -> [&NameSource; 3] {
        [&self.first, &self.middle, &self.last]
    }
}

/// A person's name as read from a record. Empty components are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonName {
    pub first: String,
    pub middle: String,
    pub last: String,
}

impl PersonName {
    pub fn new(first: &str, middle: &str, last: &str) -> Self {
        Self {
            first: first.to_string(),
            middle: middle.to_string(),
            last: last.to_string(),
        }
    }

    fn given_names(&self) -> String {
        join_present(&[self.first.as_str(), self.middle.as_str()])
    }

    /// "Ada King Lovelace"
    pub fn display(&self) -> String {
        join_present(&[self.first.as_str(), self.middle.as_str(), self.last.as_str()])
    }

    /// "Lovelace, Ada King". A last name alone keeps its separator
    /// ("Lovelace, ") so every sort key of the export has the same shape.
    pub fn sort_form(&self) -> String {
        if self.last.is_empty() {
            self.given_names()
        } else {
            format!("{}, {}", self.last, self.given_names())
        }
    }
}

fn join_present(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// How relocated content treats what the main-content field already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelocationPolicy {
    /// Always replace the main content.
    #[default]
    Overwrite,
    /// Only fill main content that is still empty.
    WhenEmpty,
}

/// Moves an attachment's value into the record's main content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRelocation {
    pub source_key: String,
    #[serde(default)]
    pub policy: RelocationPolicy,
}

/// Promotes a photo attachment to the featured image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturedImage {
    pub source_key: String,
    pub target_key: String,
}

/// Represents a transformation that was applied during processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedTransformation {
    pub record: String,
    pub rule_id: String,
    pub target: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub change_type: ChangeType,
}

impl AppliedTransformation {
    pub fn new(record: &str, rule_id: &str, target: &str, change_type: ChangeType) -> Self {
        Self {
            record: record.to_string(),
            rule_id: rule_id.to_string(),
            target: target.to_string(),
            old_value: None,
            new_value: None,
            change_type,
        }
    }

    pub fn with_values(mut self, old_value: Option<&str>, new_value: Option<&str>) -> Self {
        self.old_value = old_value.map(str::to_string);
        self.new_value = new_value.map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChangeType {
    /// Kind, taxonomy or shortcode label rewritten
    Relabeled,
    /// Attachment key renamed
    Renamed,
    /// Shadow identifier replaced
    IdentifierRewritten,
    Added,
    Modified,
    Relocated,
    Removed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_migration_rule_creation() {
        let rule = FieldMigrationRule::new(
            "position",
            "person_jobtitle",
            "field_156",
            "field_5953aa3d25c14",
        );

        assert_eq!(rule.rule_id(), "field:position->person_jobtitle");
        assert_eq!(rule.old_shadow_key(), "_position");
        assert_eq!(rule.new_shadow_key(), "_person_jobtitle");
        assert!(!rule.is_pending());
    }

    #[test]
    fn test_pending_rule_from_yaml() {
        let rule: FieldMigrationRule =
            serde_yaml::from_str("old_key: email\nnew_key: person_email\n").unwrap();
        assert_eq!(rule, FieldMigrationRule::pending("email", "person_email"));
        assert!(rule.is_pending());
    }

    #[test]
    fn test_repeater_cell_keys() {
        let rule = RepeaterRowMigration::pending("phone", "person_phone_numbers", "number", 1);
        assert!(rule.is_pending());
        assert_eq!(rule.target_key(), "person_phone_numbers_0_number");
        assert_eq!(rule.cell_key(2), "person_phone_numbers_2_number");
        assert_eq!(rule.rule_id(), "repeater:phone->person_phone_numbers[1].number");

        let rule = rule.with_identifiers("field_a1", "field_b2");
        assert!(!rule.is_pending());

        let rule: RepeaterRowMigration = serde_yaml::from_str(
            "source_key: fax\nrepeater_key: person_phone_numbers\nsub_field: number\n",
        )
        .unwrap();
        assert_eq!(rule.row, 1);
    }

    #[test]
    fn test_sort_form_first_and_last() {
        let name = PersonName::new("Ada", "", "Lovelace");
        assert_eq!(name.sort_form(), "Lovelace, Ada");
        assert_eq!(name.display(), "Ada Lovelace");
    }

    #[test]
    fn test_sort_form_last_only_keeps_separator() {
        let name = PersonName::new("", "", "Lovelace");
        assert_eq!(name.sort_form(), "Lovelace, ");
        assert_eq!(name.display(), "Lovelace");
    }

    #[test]
    fn test_sort_form_all_components() {
        let name = PersonName::new("Ada", "K", "Lovelace");
        assert_eq!(name.sort_form(), "Lovelace, Ada K");
        assert_eq!(name.display(), "Ada K Lovelace");
    }

    #[test]
    fn test_sort_form_without_last_name() {
        assert_eq!(PersonName::new("", "K", "").sort_form(), "K");
        assert_eq!(PersonName::new("Ada", "K", "").sort_form(), "Ada K");
    }

    #[test]
    fn test_empty_name() {
        let name = PersonName::default();
        assert_eq!(name.sort_form(), "");
        assert_eq!(name.display(), "");
    }

    #[test]
    fn test_name_source_keys() {
        let source = NameSource::new("first_name", Some("avf_first_name_1"));
        assert_eq!(source.keys().collect::<Vec<_>>(), vec!["first_name", "avf_first_name_1"]);

        let source = NameSource::new("first_name", None);
        assert_eq!(source.keys().count(), 1);
    }

    #[test]
    fn test_relocation_policy_serde() {
        let relocation: ContentRelocation =
            serde_yaml::from_str("source_key: biography\npolicy: when_empty\n").unwrap();
        assert_eq!(relocation.policy, RelocationPolicy::WhenEmpty);

        let relocation: ContentRelocation = serde_yaml::from_str("source_key: biography\n").unwrap();
        assert_eq!(relocation.policy, RelocationPolicy::Overwrite);
    }
}
