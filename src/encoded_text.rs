//! Scalar text access for export nodes.
//!
//! WordPress wraps most scalar values in CDATA so that markup inside a value
//! is never read as document structure. Callers only ever see decoded text;
//! writes re-apply the node's own convention.

use quick_xml::events::{BytesCData, BytesText};

use crate::document::{DocumentError, Element, Node};

const CDATA_END: &str = "]]>";

/// How a scalar node stores its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    CData,
    /// Plain character data with entity references (`&amp;`).
    Escaped,
}

impl TextEncoding {
    /// Nodes without any content default to CDATA, the export's convention
    /// for scalar values.
    pub fn of(node: &Element) -> Self {
        let mut has_text = false;
        for child in node.children() {
            match child {
                Node::CData(_) => return TextEncoding::CData,
                Node::Text(text) if !text.iter().all(u8::is_ascii_whitespace) => has_text = true,
                _ => {}
            }
        }

        if has_text {
            TextEncoding::Escaped
        } else {
            TextEncoding::CData
        }
    }
}

/// Decoded text content of `node`. A node without text reads as `""`.
pub fn read(node: &Element) -> Result<String, DocumentError> {
    let mut value = String::new();
    for child in node.children() {
        match child {
            Node::Text(text) => {
                let unescaped = text.unescape().map_err(|e| node.malformed(e))?;
                value.push_str(&unescaped);
            }
            Node::CData(cdata) => {
                let content = std::str::from_utf8(&cdata[..]).map_err(|e| node.malformed(e))?;
                value.push_str(content);
            }
            _ => {}
        }
    }
    Ok(value)
}

/// Replaces the content of `node` with `value`, encoded the way the node
/// already stores text.
pub fn write(node: &mut Element, value: &str) {
    let children = match TextEncoding::of(node) {
        TextEncoding::CData => cdata_sections(value)
            .into_iter()
            .map(|section| Node::CData(BytesCData::new(section)))
            .collect(),
        TextEncoding::Escaped if value.is_empty() => Vec::new(),
        TextEncoding::Escaped => vec![Node::Text(BytesText::new(value).into_owned())],
    };
    node.set_children(children);
}

/// Splits `value` so that no section contains `]]>`. An empty value still
/// yields one (empty) section.
fn cdata_sections(value: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut rest = value;
    while let Some(index) = rest.find(CDATA_END) {
        // "]]" closes this section, ">" opens the next one
        sections.push(rest[..index + 2].to_string());
        rest = &rest[index + 2..];
    }
    sections.push(rest.to_string());
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn first_value(xml: &str) -> Element {
        let document = Document::parse(xml).unwrap();
        document.root().unwrap().clone()
    }

    #[test]
    fn test_read_cdata() {
        let node = first_value("<wp:meta_value><![CDATA[<p>Dean & Professor</p>]]></wp:meta_value>");
        assert_eq!(read(&node).unwrap(), "<p>Dean & Professor</p>");
        assert_eq!(TextEncoding::of(&node), TextEncoding::CData);
    }

    #[test]
    fn test_read_escaped_text() {
        let node = first_value("<guid>https://example.edu/?post_type=profiles&amp;p=12</guid>");
        assert_eq!(read(&node).unwrap(), "https://example.edu/?post_type=profiles&p=12");
        assert_eq!(TextEncoding::of(&node), TextEncoding::Escaped);
    }

    #[test]
    fn test_read_absent_value_is_empty() {
        assert_eq!(read(&first_value("<wp:meta_value/>")).unwrap(), "");
        assert_eq!(read(&first_value("<wp:meta_value></wp:meta_value>")).unwrap(), "");
        assert_eq!(read(&first_value("<wp:meta_value><![CDATA[]]></wp:meta_value>")).unwrap(), "");
    }

    #[test]
    fn test_read_undefined_entity_is_malformed() {
        let node = first_value("<title>Caf&eacute;</title>");
        assert!(matches!(read(&node), Err(DocumentError::Malformed { .. })));
    }

    #[test]
    fn test_write_keeps_cdata_convention() {
        let mut node = first_value("<wp:meta_key><![CDATA[position]]></wp:meta_key>");
        write(&mut node, "person_jobtitle");

        assert_eq!(read(&node).unwrap(), "person_jobtitle");
        assert_eq!(node.children().len(), 1);
        assert!(matches!(node.children()[0], Node::CData(_)));
    }

    #[test]
    fn test_write_keeps_escaped_convention() {
        let mut node = first_value("<guid>https://example.edu/profiles/ada/</guid>");
        write(&mut node, "https://example.edu/person/ada/?a=1&b=2");

        assert_eq!(TextEncoding::of(&node), TextEncoding::Escaped);
        assert_eq!(read(&node).unwrap(), "https://example.edu/person/ada/?a=1&b=2");
    }

    #[test]
    fn test_write_empty_node_uses_cdata() {
        let mut node = Element::new("wp:meta_value");
        write(&mut node, "");

        assert_eq!(TextEncoding::of(&node), TextEncoding::CData);
        assert_eq!(node.children().len(), 1);
        assert_eq!(read(&node).unwrap(), "");
    }

    #[test]
    fn test_cdata_terminator_is_split() {
        assert_eq!(cdata_sections("a]]>b"), vec!["a]]".to_string(), ">b".to_string()]);
        assert_eq!(cdata_sections("plain"), vec!["plain".to_string()]);
        assert_eq!(cdata_sections(""), vec![String::new()]);
    }

    #[test]
    fn test_structural_characters_survive_serialization() {
        let value = "<b>Research & Teaching</b> ]]> \"quoted\" 'single' &amp;";
        let xml = "<rss><value><![CDATA[old]]></value><text>old</text></rss>";
        let mut document = Document::parse(xml).unwrap();

        let root = document.root_mut().unwrap();
        write(root.child_mut("value").unwrap(), value);
        write(root.child_mut("text").unwrap(), value);

        let bytes = document.to_bytes().unwrap();
        let reparsed = Document::parse(std::str::from_utf8(&bytes).unwrap()).unwrap();
        let root = reparsed.root().unwrap();

        let value_node = root.child("value").unwrap();
        assert_eq!(TextEncoding::of(value_node), TextEncoding::CData);
        assert_eq!(read(value_node).unwrap(), value);

        let text_node = root.child("text").unwrap();
        assert_eq!(TextEncoding::of(text_node), TextEncoding::Escaped);
        assert_eq!(read(text_node).unwrap(), value);
    }
}
