//! Owned XML element tree.

use std::path::Path;

use super::TreeNode;
use crate::errors::{LaunchError, LaunchResult};

/// Immutable element with its attributes, direct text and children.
///
/// Comments and processing instructions are dropped while loading, and the
/// text of an element is the trimmed concatenation of its direct text nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into().trim().to_string();
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Parse XML text. `document` names the input in error messages.
    pub fn parse(document: &str, xml: &str) -> LaunchResult<Self> {
        let doc = roxmltree::Document::parse(xml).map_err(|e| LaunchError::Parse {
            document: document.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::from_node(doc.root_element()))
    }

    /// Read and parse an XML file.
    pub fn load(path: &Path) -> LaunchResult<Self> {
        let xml = std::fs::read_to_string(path)?;
        let element = Self::parse(&path.display().to_string(), &xml)?;
        tracing::debug!(path = %path.display(), root = %element.name, "Loaded document");
        Ok(element)
    }

    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let mut text = String::new();
        let mut children = Vec::new();

        for child in node.children() {
            if child.is_element() {
                children.push(Self::from_node(child));
            } else if child.is_text()
                && let Some(t) = child.text()
            {
                text.push_str(t);
            }
        }

        Self {
            name: node.tag_name().name().to_string(),
            attributes: node
                .attributes()
                .map(|attr| (attr.name().to_string(), attr.value().to_string()))
                .collect(),
            text: text.trim().to_string(),
            children,
        }
    }
}

impl TreeNode for Element {
    fn name(&self) -> &str {
        &self.name
    }

    fn text(&self) -> Option<&str> {
        if self.text.is_empty() {
            None
        } else {
            Some(&self.text)
        }
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn children(&self) -> impl Iterator<Item = &Self> {
        self.children.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collects_text_and_attributes() {
        let root = Element::parse(
            "board",
            r#"<acrn-config board="nuc"><!-- c --><bus type="pci" address="0x0">
                 <device address="0x1f0006"><class> 0x020000 </class></device>
               </bus></acrn-config>"#,
        )
        .unwrap();

        assert_eq!(root.name(), "acrn-config");
        assert_eq!(root.attribute("board"), Some("nuc"));
        assert_eq!(root.text(), None);

        let device = root.find("bus/device").unwrap();
        assert_eq!(device.attribute("address"), Some("0x1f0006"));
        assert_eq!(device.child_text("class"), Some("0x020000"));
    }

    #[test]
    fn test_parse_rejects_malformed_xml() {
        let err = Element::parse("scenario", "<acrn-config><vm></acrn-config>").unwrap_err();
        assert!(matches!(err, LaunchError::Parse { ref document, .. } if document == "scenario"));
    }

    #[test]
    fn test_builder_matches_parsed_tree() {
        let built = Element::new("memory").with_child(Element::new("size").with_text("1024"));
        let parsed = Element::parse("x", "<memory><size>1024</size></memory>").unwrap();
        assert_eq!(built, parsed);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Element::load(&dir.path().join("absent.xml")).unwrap_err();
        assert!(matches!(err, LaunchError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }
}
