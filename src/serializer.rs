//! Model to XML
//!
//! The reverse of the mapper: one element per instance, attributes from the
//! scalar fields that hold a value, `text` as the element body, children in
//! declared child-type order. Reference fields are not written.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::fmt;

use crate::document::{Document, Element};
use crate::error::DocumentError;
use crate::model::{Instance, TEXT_FIELD};

/// Owned element tree, comparable across documents and instances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Copy an element subtree out of a parsed document
    pub fn from_element(document: &Document, element: &Element) -> Self {
        Self {
            tag: element.tag().to_string(),
            attributes: element
                .attributes()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            text: element.text().map(str::to_string),
            children: document
                .children(element)
                .map(|child| Self::from_element(document, child))
                .collect(),
        }
    }

    pub fn from_document(document: &Document) -> Self {
        Self::from_element(document, document.root())
    }

    /// Attributes sorted by name, for order-insensitive comparison
    pub fn normalized(&self) -> Self {
        let mut attributes = self.attributes.clone();
        attributes.sort();
        Self {
            tag: self.tag.clone(),
            attributes,
            text: self.text.clone(),
            children: self.children.iter().map(Self::normalized).collect(),
        }
    }

    /// Drop attributes `keep` rejects, recursively
    pub fn retain_attributes(&mut self, keep: &dyn Fn(&str) -> bool) {
        self.attributes.retain(|(name, _)| keep(name.as_str()));
        for child in &mut self.children {
            child.retain_attributes(keep);
        }
    }

    pub fn to_xml_string(&self) -> Result<String, DocumentError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_error)?;
        write_node(&mut writer, self)?;
        String::from_utf8(writer.into_inner()).map_err(write_error)
    }
}

/// Element tree of `instance` and its descendants
pub fn to_element(instance: &Instance) -> XmlNode {
    let mut attributes = Vec::new();
    let mut text = None;
    for (name, value) in instance.scalar_values() {
        if name == TEXT_FIELD {
            text = Some(value.to_string());
        } else {
            attributes.push((name, value.to_string()));
        }
    }

    XmlNode {
        tag: instance.type_name(),
        attributes,
        text,
        children: instance.children().iter().map(to_element).collect(),
    }
}

/// Serialized XML text of `instance` and its descendants
pub fn to_xml_string(instance: &Instance) -> Result<String, DocumentError> {
    to_element(instance).to_xml_string()
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<(), DocumentError> {
    let start = BytesStart::new(node.tag.as_str()).with_attributes(
        node.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str())),
    );

    if node.children.is_empty() && node.text.is_none() {
        return writer.write_event(Event::Empty(start)).map_err(write_error);
    }

    writer.write_event(Event::Start(start)).map_err(write_error)?;
    if let Some(text) = &node.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_error)?;
    }
    for child in &node.children {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(node.tag.as_str())))
        .map_err(write_error)
}

fn write_error(err: impl fmt::Display) -> DocumentError {
    DocumentError::Write {
        details: err.to_string(),
    }
}
