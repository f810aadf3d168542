//! One export record (`channel/item`) and its custom-field attachments.
//!
//! Attachments are the `wp:postmeta` children of an item. Keys may repeat and
//! their order is kept. Every lookup here is scoped to the item it was built
//! from; nothing reaches into sibling records.

use crate::document::{DocumentError, Element, ExportNamespaces, Node};
use crate::encoded_text;

/// Key of the shadow attachment that holds a field's opaque identifier.
pub fn shadow_key(key: &str) -> String {
    format!("_{}", key)
}

/// Overwrites the decoded value of `node` with `new_value` if it currently
/// equals `expected_old`, ignoring case. Returns whether it rewrote.
///
/// Every migration step is built on this, which is what makes a second run a
/// no-op: by then the node holds `new_value`, not `expected_old`.
pub fn rename_if_matches(
    node: &mut Element,
    expected_old: &str,
    new_value: &str,
) -> Result<bool, DocumentError> {
    let current = encoded_text::read(node)?;
    if current.to_lowercase() != expected_old.to_lowercase() {
        return Ok(false);
    }
    encoded_text::write(node, new_value);
    Ok(true)
}

fn required<'e>(parent: &'e Element, name: &str) -> Result<&'e Element, DocumentError> {
    parent.child(name).ok_or_else(|| parent.missing(name))
}

fn required_mut<'e>(parent: &'e mut Element, name: &str) -> Result<&'e mut Element, DocumentError> {
    let context = parent.name().to_string();
    parent
        .child_mut(name)
        .ok_or_else(|| DocumentError::MissingNode {
            node: name.to_string(),
            context,
        })
}

fn attachment_key(meta: &Element, namespaces: &ExportNamespaces) -> Result<String, DocumentError> {
    encoded_text::read(required(meta, namespaces.meta_key())?)
}

/// Mutable view of one `wp:postmeta`.
pub struct Attachment<'a> {
    node: &'a mut Element,
    namespaces: &'a ExportNamespaces,
}

impl<'a> Attachment<'a> {
    pub fn key(&self) -> Result<String, DocumentError> {
        attachment_key(self.node, self.namespaces)
    }

    pub fn value(&self) -> Result<String, DocumentError> {
        encoded_text::read(required(self.node, self.namespaces.meta_value())?)
    }

    pub fn key_node_mut(&mut self) -> Result<&mut Element, DocumentError> {
        required_mut(self.node, self.namespaces.meta_key())
    }

    pub fn value_node_mut(&mut self) -> Result<&mut Element, DocumentError> {
        required_mut(self.node, self.namespaces.meta_value())
    }
}

pub struct Record<'a> {
    item: &'a mut Element,
    namespaces: &'a ExportNamespaces,
}

impl<'a> Record<'a> {
    pub fn new(item: &'a mut Element, namespaces: &'a ExportNamespaces) -> Self {
        Self { item, namespaces }
    }

    /// Short identification for logs and reports: the post id, else the title.
    pub fn label(&self) -> String {
        let text_of = |name: &str| {
            self.item
                .child(name)
                .and_then(|node| encoded_text::read(node).ok())
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
        };

        text_of(self.namespaces.post_id())
            .or_else(|| text_of("title"))
            .unwrap_or_else(|| "(untitled)".to_string())
    }

    pub fn kind(&self) -> Result<String, DocumentError> {
        encoded_text::read(required(self.item, self.namespaces.post_type())?)
    }

    pub fn kind_node_mut(&mut self) -> Result<&mut Element, DocumentError> {
        required_mut(self.item, self.namespaces.post_type())
    }

    pub fn main_content(&self) -> Result<String, DocumentError> {
        encoded_text::read(required(self.item, self.namespaces.content_encoded())?)
    }

    pub fn has_main_content(&self) -> bool {
        self.item.child(self.namespaces.content_encoded()).is_some()
    }

    pub fn main_content_mut(&mut self) -> Result<&mut Element, DocumentError> {
        required_mut(self.item, self.namespaces.content_encoded())
    }

    pub fn guid_mut(&mut self) -> Option<&mut Element> {
        self.item.child_mut("guid")
    }

    /// The item's `category` elements (terms it is filed under).
    pub fn categories_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.item.children_named_mut("category")
    }

    /// Decoded value of the first attachment keyed exactly `key`, or `""`.
    pub fn find_value(&self, key: &str) -> Result<String, DocumentError> {
        for meta in self.item.children_named(self.namespaces.postmeta()) {
            if attachment_key(meta, self.namespaces)? == key {
                return encoded_text::read(required(meta, self.namespaces.meta_value())?);
            }
        }
        Ok(String::new())
    }

    pub fn has_key(&self, key: &str) -> Result<bool, DocumentError> {
        for meta in self.item.children_named(self.namespaces.postmeta()) {
            if attachment_key(meta, self.namespaces)? == key {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Attachment keys in document order.
    pub fn keys(&self) -> Result<Vec<String>, DocumentError> {
        self.item
            .children_named(self.namespaces.postmeta())
            .map(|meta| attachment_key(meta, self.namespaces))
            .collect()
    }

    pub fn attachments_mut(&mut self) -> impl Iterator<Item = Attachment<'_>> {
        let namespaces = self.namespaces;
        self.item
            .children_named_mut(namespaces.postmeta())
            .map(move |node| Attachment { node, namespaces })
    }

    /// Adds a new attachment after every existing child of the item.
    pub fn append(&mut self, key: &str, value: &str) {
        let mut key_node = Element::new(self.namespaces.meta_key());
        encoded_text::write(&mut key_node, key);
        let mut value_node = Element::new(self.namespaces.meta_value());
        encoded_text::write(&mut value_node, value);

        let mut meta = Element::new(self.namespaces.postmeta());
        meta.push(Node::Element(key_node));
        meta.push(Node::Element(value_node));
        self.item.push(Node::Element(meta));
    }

    /// Sets the value of the first attachment keyed `key`, appending one if
    /// there is none. Returns whether anything changed.
    pub fn upsert(&mut self, key: &str, value: &str) -> Result<bool, DocumentError> {
        for mut attachment in self.attachments_mut() {
            if attachment.key()? != key {
                continue;
            }
            let node = attachment.value_node_mut()?;
            if encoded_text::read(node)? == value {
                return Ok(false);
            }
            encoded_text::write(node, value);
            return Ok(true);
        }

        self.append(key, value);
        Ok(true)
    }

    /// Removes every attachment keyed `key` together with its shadow.
    pub fn remove_all(&mut self, key: &str) -> Result<usize, DocumentError> {
        let shadow = shadow_key(key);
        let namespaces = self.namespaces;
        self.item.try_retain_elements(|child| {
            if child.name() != namespaces.postmeta() {
                return Ok(true);
            }
            attachment_key(child, namespaces).map(|child_key| child_key != key && child_key != shadow)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    const EXPORT: &str = r#"<rss xmlns:wp="http://wordpress.org/export/1.2/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
<channel>
<item>
<title>Ada Lovelace</title>
<content:encoded><![CDATA[]]></content:encoded>
<wp:post_id>12</wp:post_id>
<wp:post_type><![CDATA[profiles]]></wp:post_type>
<wp:postmeta><wp:meta_key><![CDATA[position]]></wp:meta_key><wp:meta_value><![CDATA[Director]]></wp:meta_value></wp:postmeta>
<wp:postmeta><wp:meta_key><![CDATA[_position]]></wp:meta_key><wp:meta_value><![CDATA[field_156]]></wp:meta_value></wp:postmeta>
<wp:postmeta><wp:meta_key><![CDATA[phone]]></wp:meta_key><wp:meta_value><![CDATA[407-555-0100]]></wp:meta_value></wp:postmeta>
<wp:postmeta><wp:meta_key><![CDATA[phone]]></wp:meta_key><wp:meta_value><![CDATA[407-555-0199]]></wp:meta_value></wp:postmeta>
</item>
<item>
<title>Grace Hopper</title>
<wp:post_type><![CDATA[profiles]]></wp:post_type>
<wp:postmeta><wp:meta_key><![CDATA[email]]></wp:meta_key><wp:meta_value><![CDATA[grace@example.edu]]></wp:meta_value></wp:postmeta>
</item>
</channel>
</rss>"#;

    #[test]
    fn test_find_value_returns_first_match() {
        let mut document = Document::parse(EXPORT).unwrap();
        let record = document.records_mut().next().unwrap();

        assert_eq!(record.find_value("position").unwrap(), "Director");
        assert_eq!(record.find_value("phone").unwrap(), "407-555-0100");
        assert_eq!(record.find_value("Position").unwrap(), "");
        assert_eq!(record.find_value("missing").unwrap(), "");
    }

    #[test]
    fn test_find_value_is_scoped_to_record() {
        let mut document = Document::parse(EXPORT).unwrap();
        let mut records = document.records_mut();
        let first = records.next().unwrap();
        let second = records.next().unwrap();

        assert_eq!(first.find_value("email").unwrap(), "");
        assert_eq!(second.find_value("position").unwrap(), "");
        assert_eq!(second.find_value("email").unwrap(), "grace@example.edu");
    }

    const SIBLING_ITEM: &str = r#"<item>
<title>Grace Hopper</title>
<wp:post_id>13</wp:post_id>
<wp:post_type><![CDATA[profiles]]></wp:post_type>
<wp:postmeta><wp:meta_key><![CDATA[position]]></wp:meta_key><wp:meta_value><![CDATA[Director]]></wp:meta_value></wp:postmeta>
<wp:postmeta><wp:meta_key><![CDATA[_position]]></wp:meta_key><wp:meta_value><![CDATA[field_156]]></wp:meta_value></wp:postmeta>
</item>"#;

    #[test]
    fn test_rewrites_do_not_reach_sibling_with_same_field() {
        let xml = format!(
            r#"<rss xmlns:wp="http://wordpress.org/export/1.2/"><channel>
<item>
<wp:post_id>12</wp:post_id>
<wp:post_type><![CDATA[profiles]]></wp:post_type>
<wp:postmeta><wp:meta_key><![CDATA[position]]></wp:meta_key><wp:meta_value><![CDATA[Director]]></wp:meta_value></wp:postmeta>
<wp:postmeta><wp:meta_key><![CDATA[_position]]></wp:meta_key><wp:meta_value><![CDATA[field_156]]></wp:meta_value></wp:postmeta>
</item>
{}
</channel></rss>"#,
            SIBLING_ITEM
        );
        let mut document = Document::parse(&xml).unwrap();

        {
            let mut records = document.records_mut();
            let mut first = records.next().unwrap();
            let second = records.next().unwrap();

            let mut renamed = 0;
            for mut attachment in first.attachments_mut() {
                if rename_if_matches(attachment.key_node_mut().unwrap(), "position", "person_jobtitle").unwrap() {
                    renamed += 1;
                }
            }
            assert_eq!(renamed, 1);
            assert!(first.upsert("_person_jobtitle", "field_5953aa3d25c14").unwrap());
            assert_eq!(first.remove_all("position").unwrap(), 1);

            assert_eq!(first.find_value("person_jobtitle").unwrap(), "Director");
            assert_eq!(second.find_value("position").unwrap(), "Director");
            assert_eq!(second.find_value("_position").unwrap(), "field_156");
            assert!(!second.has_key("person_jobtitle").unwrap());
            assert!(!second.has_key("_person_jobtitle").unwrap());
        }

        let output = String::from_utf8(document.to_bytes().unwrap()).unwrap();
        assert!(output.contains(SIBLING_ITEM));
    }

    #[test]
    fn test_rename_if_matches_ignores_case() {
        let mut node = Element::new("wp:post_type");
        encoded_text::write(&mut node, "Profiles");

        assert!(rename_if_matches(&mut node, "profiles", "person").unwrap());
        assert_eq!(encoded_text::read(&node).unwrap(), "person");

        assert!(!rename_if_matches(&mut node, "profiles", "person").unwrap());
        assert_eq!(encoded_text::read(&node).unwrap(), "person");
    }

    #[test]
    fn test_append_adds_attachment_at_end() {
        let mut document = Document::parse(EXPORT).unwrap();
        let mut record = document.records_mut().nth(1).unwrap();

        record.append("person_orderby_name", "Hopper, Grace");

        assert_eq!(
            record.keys().unwrap(),
            vec!["email".to_string(), "person_orderby_name".to_string()]
        );
        assert_eq!(record.find_value("person_orderby_name").unwrap(), "Hopper, Grace");
    }

    #[test]
    fn test_upsert_overwrites_then_reports_unchanged() {
        let mut document = Document::parse(EXPORT).unwrap();
        let mut record = document.records_mut().next().unwrap();

        assert!(record.upsert("position", "Dean").unwrap());
        assert!(!record.upsert("position", "Dean").unwrap());
        assert!(record.upsert("person_orderby_name", "Lovelace, Ada").unwrap());

        assert_eq!(record.find_value("position").unwrap(), "Dean");
        assert_eq!(record.keys().unwrap().len(), 5);
    }

    #[test]
    fn test_remove_all_removes_key_and_shadow() {
        let mut document = Document::parse(EXPORT).unwrap();
        let mut record = document.records_mut().next().unwrap();

        assert_eq!(record.remove_all("position").unwrap(), 2);
        assert_eq!(record.remove_all("phone").unwrap(), 2);
        assert_eq!(record.remove_all("missing").unwrap(), 0);
        assert!(record.keys().unwrap().is_empty());
    }

    #[test]
    fn test_kind_and_missing_kind() {
        let xml = r#"<rss><channel><item><title>No type</title></item></channel></rss>"#;
        let mut document = Document::parse(xml).unwrap();
        let mut record = document.records_mut().next().unwrap();

        assert!(matches!(record.kind(), Err(DocumentError::MissingNode { .. })));
        assert!(record.kind_node_mut().is_err());
        assert_eq!(record.label(), "No type");
    }

    #[test]
    fn test_attachment_without_value_is_malformed() {
        let xml = r#"<rss><channel><item><wp:postmeta><wp:meta_key><![CDATA[position]]></wp:meta_key></wp:postmeta></item></channel></rss>"#;
        let mut document = Document::parse(xml).unwrap();
        let record = document.records_mut().next().unwrap();

        assert!(matches!(
            record.find_value("position"),
            Err(DocumentError::MissingNode { .. })
        ));
    }

    #[test]
    fn test_shadow_key() {
        assert_eq!(shadow_key("person_jobtitle"), "_person_jobtitle");
    }
}
