//! Normalization of export markup into a generic nested tree.
//!
//! The export format is only loosely schematized, so the first step turns the
//! document into a [`NormalizedNode`] tree without interpreting it. Element
//! attributes are kept as `$name` entries, repeated sibling elements collapse
//! into a [`NormalizedNode::List`] in document order, and text that sits next
//! to child elements is kept under [`TEXT_KEY`].

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::error::{ErrorKind, parse_error};

/// Byte-order mark some exporters prepend to the document.
const BOM: char = '\u{feff}';

/// Field holding an element's own text when it also has children or attributes.
pub const TEXT_KEY: &str = "_";

/// Prefix applied to attribute names so they can't collide with child elements.
pub const ATTRIBUTE_PREFIX: char = '$';

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NormalizedNode {
    Text(String),
    Map(BTreeMap<String, NormalizedNode>),
    List(Vec<NormalizedNode>),
}

/// Parse raw markup into a [`NormalizedNode`] tree.
///
/// The returned node is a single-entry map keyed by the root element's name.
pub fn normalize(text: &str) -> Result<NormalizedNode, ErrorKind> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let doc = roxmltree::Document::parse(text)?;
    let root = doc.root_element();

    let mut map = BTreeMap::new();
    map.insert(root.tag_name().name().to_string(), normalize_element(&root));
    Ok(NormalizedNode::Map(map))
}

/// Like [`normalize`], but for raw file contents.
pub fn normalize_bytes(bytes: &[u8]) -> Result<NormalizedNode, ErrorKind> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| parse_error(format!("document is not valid UTF-8: {e}")))?;
    normalize(text)
}

fn normalize_element(node: &roxmltree::Node) -> NormalizedNode {
    let mut fields: BTreeMap<String, NormalizedNode> = BTreeMap::new();
    for attr in node.attributes() {
        fields.insert(
            format!("{ATTRIBUTE_PREFIX}{}", attr.name()),
            NormalizedNode::Text(attr.value().to_string()),
        );
    }

    let mut text = String::new();
    for child in node.children() {
        if child.is_element() {
            let value = normalize_element(&child);
            match fields.entry(child.tag_name().name().to_string()) {
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
                Entry::Occupied(mut slot) => {
                    // Elements never normalize to a list, so an existing list
                    // can only come from an earlier repeat of this name.
                    let existing = slot.get_mut();
                    if let NormalizedNode::List(items) = existing {
                        items.push(value);
                    } else {
                        let first = std::mem::replace(existing, NormalizedNode::List(Vec::new()));
                        *existing = NormalizedNode::List(vec![first, value]);
                    }
                }
            }
        } else if child.is_text()
            && let Some(t) = child.text()
        {
            text.push_str(t);
        }
    }

    let text = text.trim();
    if fields.is_empty() {
        return NormalizedNode::Text(text.to_string());
    }
    if !text.is_empty() {
        fields.insert(TEXT_KEY.to_string(), NormalizedNode::Text(text.to_string()));
    }
    NormalizedNode::Map(fields)
}

impl NormalizedNode {
    /// Child node by field name. Only maps have children.
    pub fn get(&self, name: &str) -> Option<&NormalizedNode> {
        match self {
            NormalizedNode::Map(fields) => fields.get(name),
            _ => None,
        }
    }

    /// Follow a path of field names.
    pub fn path(&self, names: &[&str]) -> Option<&NormalizedNode> {
        names.iter().try_fold(self, |node, name| node.get(name))
    }

    /// The node's text, if it is a text node or a map carrying text.
    pub fn text(&self) -> Option<&str> {
        match self {
            NormalizedNode::Text(t) => Some(t.as_str()),
            NormalizedNode::Map(fields) => fields.get(TEXT_KEY).and_then(NormalizedNode::text),
            NormalizedNode::List(_) => None,
        }
    }

    /// The node's text, ignoring empty values.
    pub fn non_empty_text(&self) -> Option<&str> {
        self.text().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Integer interpretation of the node's text. Fractional values truncate.
    pub fn as_i64(&self) -> Option<i64> {
        let text = self.non_empty_text()?;
        text.parse::<i64>()
            .ok()
            .or_else(|| text.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
    }

    pub fn as_bool(&self) -> Option<bool> {
        let text = self.non_empty_text()?;
        if text.eq_ignore_ascii_case("true") || text == "1" {
            Some(true)
        } else if text.eq_ignore_ascii_case("false") || text == "0" {
            Some(false)
        } else {
            None
        }
    }

    /// An element with neither text nor children.
    pub fn is_empty(&self) -> bool {
        match self {
            NormalizedNode::Text(t) => t.trim().is_empty(),
            NormalizedNode::Map(fields) => fields.is_empty(),
            NormalizedNode::List(items) => items.is_empty(),
        }
    }

    /// View this node as a sequence: lists yield their items, empty nodes
    /// yield nothing, and anything else is a sequence of one.
    pub fn items(&self) -> Vec<&NormalizedNode> {
        match self {
            NormalizedNode::List(items) => items.iter().collect(),
            node if node.is_empty() => Vec::new(),
            node => vec![node],
        }
    }

    /// All children named `name` as a sequence. See [`NormalizedNode::items`].
    pub fn children(&self, name: &str) -> Vec<&NormalizedNode> {
        self.get(name).map(NormalizedNode::items).unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strips_byte_order_mark() {
        let doc = "\u{feff}<Character><Key>ABC</Key></Character>";
        let root = normalize(doc).unwrap();
        assert_eq!(
            root.path(&["Character", "Key"]).and_then(NormalizedNode::text),
            Some("ABC")
        );
    }

    #[test]
    fn repeated_siblings_become_list() {
        let doc = "<Skills>
            <CharSkill><Key>ATHL</Key></CharSkill>
            <CharSkill><Key>COOL</Key></CharSkill>
        </Skills>";
        let root = normalize(doc).unwrap();
        let skills = root.get("Skills").unwrap().children("CharSkill");
        assert_eq!(skills.len(), 2);
        assert_eq!(skills[1].get("Key").unwrap().text(), Some("COOL"));
    }

    #[test]
    fn single_child_is_sequence_of_one() {
        let doc = "<Weapons><CharWeapon><ItemKey>BLASTPISTOL</ItemKey></CharWeapon></Weapons>";
        let root = normalize(doc).unwrap();
        let weapons = root.get("Weapons").unwrap().children("CharWeapon");
        assert_eq!(weapons.len(), 1);
    }

    #[test]
    fn empty_element_has_no_items() {
        let root = normalize("<Gear/>").unwrap();
        let gear = root.get("Gear").unwrap();
        assert_eq!(gear, &NormalizedNode::Text(String::new()));
        assert!(gear.items().is_empty());
    }

    #[test]
    fn attributes_and_mixed_text() {
        let doc = r#"<Source Page="12">Core Rulebook</Source>"#;
        let root = normalize(doc).unwrap();
        let source = root.get("Source").unwrap();
        assert_eq!(source.get("$Page").and_then(NormalizedNode::text), Some("12"));
        assert_eq!(source.text(), Some("Core Rulebook"));
    }

    #[test]
    fn typed_accessors() {
        let root = normalize("<R><A>3</A><B>true</B><C>2.7</C><D>x</D></R>").unwrap();
        let r = root.get("R").unwrap();
        assert_eq!(r.get("A").unwrap().as_i64(), Some(3));
        assert_eq!(r.get("B").unwrap().as_bool(), Some(true));
        assert_eq!(r.get("C").unwrap().as_i64(), Some(2));
        assert_eq!(r.get("D").unwrap().as_i64(), None);
        assert_eq!(r.get("D").unwrap().as_bool(), None);
    }

    #[test]
    fn malformed_markup_is_parse_error() {
        let err = normalize("<Character><Key>ABC</Character>").unwrap_err();
        assert!(matches!(err, ErrorKind::ParseError { .. }));
        assert!(err.is_fatal());
    }
}
