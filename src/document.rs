//! Element tree
//!
//! A minimal read-only XML tree built with `quick-xml`. Elements are stored in
//! document order, so iterating the arena is a pre-order walk. Namespace
//! prefixes are dropped from tags and attribute names.

use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fmt;
use std::path::Path;

use crate::error::DocumentError;

/// Source position of an element, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, line {}", self.file, self.line)
    }
}

/// Index of an element within its document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(usize);

#[derive(Debug, Clone)]
pub struct Element {
    id: ElementId,
    tag: String,
    attributes: IndexMap<String, String>,
    text: Option<String>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    line: usize,
    path: String,
}

impl Element {
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Local tag name
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Direct text content, trimmed; `None` when empty
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn parent_id(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn child_ids(&self) -> &[ElementId] {
        &self.children
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// Stable path, e.g. `/Contacts/Person[2]/Phone`.
    ///
    /// A positional index is only present when the parent has more than one
    /// child with the same tag.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Parsed XML document
#[derive(Debug, Clone)]
pub struct Document {
    source: String,
    elements: Vec<Element>,
}

impl Document {
    /// Parse XML text; `source` identifies the document in diagnostics
    pub fn parse_str(source: impl Into<String>, xml: &str) -> Result<Document, DocumentError> {
        let source = source.into();
        let mut reader = Reader::from_str(xml);

        let mut elements: Vec<Element> = Vec::new();
        let mut open: Vec<usize> = Vec::new();
        // leading text of each open element, closed once a child starts
        let mut text: Vec<(String, bool)> = Vec::new();
        let mut lines = LineCounter::new(xml);

        loop {
            let offset = reader.buffer_position() as usize;
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let line = lines.line_of_tag(offset);
                    let id = push_element(&source, &mut elements, &open, e, line, &reader)?;
                    close_leading_text(&mut text);
                    open.push(id);
                    text.push((String::new(), false));
                }
                Ok(Event::Empty(ref e)) => {
                    let line = lines.line_of_tag(offset);
                    push_element(&source, &mut elements, &open, e, line, &reader)?;
                    close_leading_text(&mut text);
                }
                Ok(Event::End(_)) => {
                    if let (Some(id), Some((body, _))) = (open.pop(), text.pop()) {
                        let body = body.trim();
                        if !body.is_empty() {
                            elements[id].text = Some(body.to_string());
                        }
                    }
                }
                Ok(Event::Text(ref t)) => {
                    let content = t.unescape().map_err(|err| DocumentError::Malformed {
                        file: source.clone(),
                        position: reader.buffer_position() as u64,
                        details: err.to_string(),
                    })?;
                    if let Some((body, false)) = text.last_mut() {
                        body.push_str(&content);
                    }
                }
                Ok(Event::CData(t)) => {
                    if let Some((body, false)) = text.last_mut() {
                        body.push_str(&String::from_utf8_lossy(&t.into_inner()));
                    }
                }
                Ok(Event::Eof) => break,
                Err(err) => {
                    return Err(DocumentError::Malformed {
                        file: source,
                        position: reader.error_position() as u64,
                        details: err.to_string(),
                    });
                }
                _ => {}
            }
        }

        if elements.is_empty() {
            return Err(DocumentError::NoRoot { file: source });
        }
        if !open.is_empty() {
            return Err(DocumentError::Malformed {
                file: source,
                position: xml.len() as u64,
                details: format!("unclosed element '{}'", elements[open[0]].tag),
            });
        }

        assign_paths(&mut elements);
        Ok(Document { source, elements })
    }

    /// Read and parse a file
    pub async fn load(path: impl AsRef<Path>) -> Result<Document, DocumentError> {
        let path = path.as_ref();
        let xml = tokio::fs::read_to_string(path).await?;
        Self::parse_str(path.display().to_string(), &xml)
    }

    /// Blocking variant of [`Document::load`]
    pub fn open(path: impl AsRef<Path>) -> Result<Document, DocumentError> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path)?;
        Self::parse_str(path.display().to_string(), &xml)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Element {
        &self.elements[0]
    }

    pub fn get(&self, id: ElementId) -> &Element {
        &self.elements[id.0]
    }

    pub fn parent(&self, element: &Element) -> Option<&Element> {
        element.parent.map(|id| self.get(id))
    }

    pub fn children<'a>(&'a self, element: &'a Element) -> impl Iterator<Item = &'a Element> {
        element.children.iter().map(move |id| self.get(*id))
    }

    /// Every element, ancestors before descendants
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    pub fn location(&self, element: &Element) -> Location {
        Location {
            file: self.source.clone(),
            line: element.line,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

fn push_element(
    source: &str,
    elements: &mut Vec<Element>,
    open: &[usize],
    start: &BytesStart<'_>,
    line: usize,
    reader: &Reader<&[u8]>,
) -> Result<usize, DocumentError> {
    let malformed = |details: String| DocumentError::Malformed {
        file: source.to_string(),
        position: reader.buffer_position() as u64,
        details,
    };

    let parent = open.last().copied();
    if parent.is_none() && !elements.is_empty() {
        return Err(DocumentError::MultipleRoots {
            file: source.to_string(),
        });
    }

    let mut attributes = IndexMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| malformed(err.to_string()))?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let name = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| malformed(err.to_string()))?;
        attributes.insert(name, value.to_string());
    }

    let id = elements.len();
    elements.push(Element {
        id: ElementId(id),
        tag: String::from_utf8_lossy(start.local_name().as_ref()).to_string(),
        attributes,
        text: None,
        parent: parent.map(ElementId),
        children: Vec::new(),
        line,
        path: String::new(),
    });
    if let Some(pid) = parent {
        elements[pid].children.push(ElementId(id));
    }
    Ok(id)
}

/// Text after the first child element is not part of the parent's text
fn close_leading_text(text: &mut [(String, bool)]) {
    if let Some((_, closed)) = text.last_mut() {
        *closed = true;
    }
}

/// Fill element paths once every sibling is known
fn assign_paths(elements: &mut [Element]) {
    for id in 0..elements.len() {
        let path = match elements[id].parent {
            None => format!("/{}", elements[id].tag),
            Some(pid) => {
                let parent = &elements[pid.0];
                let tag = &elements[id].tag;
                let same_tag: Vec<ElementId> = parent
                    .children
                    .iter()
                    .copied()
                    .filter(|c| elements[c.0].tag == *tag)
                    .collect();
                if same_tag.len() > 1 {
                    let position = same_tag
                        .iter()
                        .position(|c| c.0 == id)
                        .map_or(1, |p| p + 1);
                    format!("{}/{}[{}]", parent.path, tag, position)
                } else {
                    format!("{}/{}", parent.path, tag)
                }
            }
        };
        elements[id].path = path;
    }
}

/// Incremental byte offset to line number conversion
struct LineCounter<'a> {
    bytes: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn new(xml: &'a str) -> Self {
        Self {
            bytes: xml.as_bytes(),
            offset: 0,
            line: 1,
        }
    }

    /// Line of the first `<` at or after `from`; offsets must not decrease
    fn line_of_tag(&mut self, from: usize) -> usize {
        let from = from.max(self.offset).min(self.bytes.len());
        let target = self.bytes[from..]
            .iter()
            .position(|b| *b == b'<')
            .map_or(from, |i| from + i);
        self.line += self.bytes[self.offset..target]
            .iter()
            .filter(|b| **b == b'\n')
            .count();
        self.offset = target;
        self.line
    }
}
