//! XML parsing: element tree to object conversion.
//!
//! Attributes become keys prefixed with `@`. Text content at a leaf becomes
//! the element's value; an element with both attributes and text exposes the
//! text under `#text`. Repeated child element names collapse into an array.
//! Numeric and `true`/`false` text is coerced to typed values.

use indexmap::IndexMap;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{ParseError, ParseResult};
use crate::value::{coerce_scalar_with_bool, Value};

const MAX_ELEMENT_DEPTH: usize = 64;

struct XmlNode {
    map: IndexMap<String, Value>,
    text: String,
}

impl XmlNode {
    fn new() -> Self {
        Self {
            map: IndexMap::new(),
            text: String::new(),
        }
    }

    fn append_text(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
    }

    fn into_value(self) -> Value {
        let mut map = self.map;
        match (map.is_empty(), self.text.is_empty()) {
            (true, true) => Value::Null,
            (true, false) => coerce_scalar_with_bool(&self.text),
            (false, true) => Value::Obj(map),
            (false, false) => {
                map.insert("#text".to_string(), coerce_scalar_with_bool(&self.text));
                Value::Obj(map)
            }
        }
    }
}

/// Parse an XML document into a [`Value`] tree rooted at an object keyed
/// by the document's top-level element name(s).
pub fn try_parse(text: &str) -> ParseResult<Value> {
    let mut reader = Reader::from_str(text);
    // Synthetic root at the bottom; real elements stack on top.
    let mut stack: Vec<(String, XmlNode)> = vec![(String::new(), XmlNode::new())];

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                if stack.len() > MAX_ELEMENT_DEPTH {
                    return Err(ParseError::new("xml", "element nesting too deep"));
                }
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                let mut node = XmlNode::new();
                for attr in start.attributes() {
                    let attr = attr.map_err(|e| ParseError::new("xml", e.to_string()))?;
                    let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
                    let value = attr
                        .unescape_value()
                        .map_err(|e| ParseError::new("xml", e.to_string()))?;
                    node.map.insert(key, coerce_scalar_with_bool(value.trim()));
                }
                stack.push((name, node));
            }
            Ok(Event::Empty(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                let mut node = XmlNode::new();
                for attr in start.attributes() {
                    let attr = attr.map_err(|e| ParseError::new("xml", e.to_string()))?;
                    let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
                    let value = attr
                        .unescape_value()
                        .map_err(|e| ParseError::new("xml", e.to_string()))?;
                    node.map.insert(key, coerce_scalar_with_bool(value.trim()));
                }
                let value = node.into_value();
                let parent = &mut stack.last_mut().expect("stack has root").1;
                insert_child(&mut parent.map, name, value);
            }
            Ok(Event::Text(bytes)) => {
                let text = bytes
                    .unescape()
                    .map_err(|e| ParseError::new("xml", e.to_string()))?;
                stack.last_mut().expect("stack has root").1.append_text(&text);
            }
            Ok(Event::CData(bytes)) => {
                let raw = bytes.into_inner();
                let text = String::from_utf8_lossy(&raw).into_owned();
                stack.last_mut().expect("stack has root").1.append_text(&text);
            }
            Ok(Event::End(_)) => {
                let (name, node) = stack.pop().expect("stack has root");
                if stack.is_empty() {
                    return Err(ParseError::new("xml", "unbalanced closing tag"));
                }
                let value = node.into_value();
                let parent = &mut stack.last_mut().expect("stack has root").1;
                insert_child(&mut parent.map, name, value);
            }
            Ok(Event::Decl(_)) | Ok(Event::Comment(_)) | Ok(Event::PI(_)) | Ok(Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::new("xml", e.to_string())),
        }
    }

    if stack.len() != 1 {
        return Err(ParseError::new("xml", "unclosed element"));
    }
    let (_, root) = stack.pop().expect("stack has root");
    if root.map.is_empty() {
        return Err(ParseError::new("xml", "no elements found"));
    }
    Ok(Value::Obj(root.map))
}

/// Insert a child value, collapsing repeated element names into an array.
fn insert_child(map: &mut IndexMap<String, Value>, name: String, value: Value) {
    match map.get_mut(&name) {
        Some(Value::Arr(items)) => items.push(value),
        Some(existing) => {
            let first = std::mem::replace(existing, Value::Null);
            *existing = Value::Arr(vec![first, value]);
        }
        None => {
            map.insert(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_and_text() {
        let value = try_parse(r#"<pod name="web-1" restarts="0">Running</pod>"#).unwrap();
        let root = value.as_obj().unwrap();
        let pod = root.get("pod").unwrap().as_obj().unwrap();
        assert_eq!(pod.get("@name"), Some(&Value::Str("web-1".into())));
        assert_eq!(pod.get("@restarts"), Some(&Value::Int(0)));
        assert_eq!(pod.get("#text"), Some(&Value::Str("Running".into())));
    }

    #[test]
    fn test_leaf_text_is_value() {
        let value = try_parse("<m><cpu>250</cpu><ready>true</ready></m>").unwrap();
        let m = value.as_obj().unwrap().get("m").unwrap().as_obj().unwrap().clone();
        assert_eq!(m.get("cpu"), Some(&Value::Int(250)));
        assert_eq!(m.get("ready"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_repeated_children_collapse_to_array() {
        let value = try_parse("<l><item>1</item><item>2</item><item>3</item></l>").unwrap();
        let l = value.as_obj().unwrap().get("l").unwrap().as_obj().unwrap().clone();
        let items = l.get("item").unwrap().as_arr().unwrap();
        assert_eq!(items, [Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_empty_element_is_null() {
        let value = try_parse("<a><b/></a>").unwrap();
        let a = value.as_obj().unwrap().get("a").unwrap().as_obj().unwrap().clone();
        assert_eq!(a.get("b"), Some(&Value::Null));
    }

    #[test]
    fn test_plain_text_rejected() {
        assert!(try_parse("not xml at all").is_err());
        assert!(try_parse("").is_err());
    }

    #[test]
    fn test_unclosed_element_rejected() {
        assert!(try_parse("<a><b>text</b>").is_err());
    }
}
