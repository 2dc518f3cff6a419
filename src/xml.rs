//! XML response bodies as JSON values.
//!
//! The mapping is the usual one for XML-over-JSON APIs: an element becomes
//! `{name: value}`, attributes become `@name` keys, text next to attributes or
//! children goes under `#text`, and repeated children collect into an array.
//! An element with neither attributes nor children maps to its text, or
//! `null` when it has none.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

struct Node {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Node {
    fn document() -> Self {
        Self {
            name: String::new(),
            fields: Map::new(),
            text: String::new(),
        }
    }

    fn open(start: &BytesStart<'_>) -> Result<Self> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(malformed)?
            .to_string();
        let mut fields = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(malformed)?;
            let key = std::str::from_utf8(attr.key.as_ref()).map_err(malformed)?;
            let value = attr.unescape_value().map_err(malformed)?;
            fields.insert(format!("@{key}"), Value::String(value.into_owned()));
        }
        Ok(Self {
            name,
            fields,
            text: String::new(),
        })
    }

    fn into_value(mut self) -> Value {
        if self.fields.is_empty() {
            return if self.text.is_empty() {
                Value::Null
            } else {
                Value::String(self.text)
            };
        }
        if !self.text.is_empty() {
            self.fields.insert("#text".to_string(), Value::String(self.text));
        }
        Value::Object(self.fields)
    }
}

fn malformed(e: impl std::fmt::Display) -> Error {
    Error::MalformedInput(format!("invalid XML: {e}"))
}

fn top(stack: &mut [Node]) -> Result<&mut Node> {
    stack
        .last_mut()
        .ok_or_else(|| malformed("unbalanced element"))
}

fn attach(stack: &mut [Node], node: Node) -> Result<()> {
    let parent = top(stack)?;
    let name = node.name.clone();
    let value = node.into_value();
    match parent.fields.get_mut(&name) {
        // Element values are never arrays, so an array here means a repeat.
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            parent.fields.insert(name, value);
        }
    }
    Ok(())
}

/// Decode an XML document into a JSON object keyed by the root element.
///
/// # Errors
///
/// Returns [`Error::MalformedInput`] if the document is not well-formed.
pub fn to_json(xml: &str) -> Result<Value> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack = vec![Node::document()];
    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(start) => stack.push(Node::open(&start)?),
            Event::Empty(start) => {
                let node = Node::open(&start)?;
                attach(&mut stack, node)?;
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(malformed("closing tag without an open element"));
                }
                let node = top_pop(&mut stack)?;
                attach(&mut stack, node)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(malformed)?;
                top(&mut stack)?.text.push_str(&text);
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                top(&mut stack)?.text.push_str(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(malformed("document ended inside an element"));
    }
    let document = top_pop(&mut stack)?;
    if document.fields.is_empty() {
        return Err(malformed("no root element"));
    }
    Ok(Value::Object(document.fields))
}

fn top_pop(stack: &mut Vec<Node>) -> Result<Node> {
    stack.pop().ok_or_else(|| malformed("unbalanced element"))
}
