//! XML response bodies to JSON.
//!
//! Query and REST-XML services answer in XML whose shape differs from the
//! JSON services: lower-camel element names, `<member>`/`<item>` list
//! wrappers, `<entry><key/><value/></entry>` maps and an outer
//! `...Response`/`...Result` envelope. Conversion produces the same shape a
//! JSON service would have returned, so catalog extraction paths and rules
//! work on one representation.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};

use super::ProviderError;

#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

/// Parse an XML document into its element tree.
fn parse(xml: &str) -> Result<Element, ProviderError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<Element> = vec![Element::default()];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                stack.push(Element { name, ..Element::default() });
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Element { name, ..Element::default() });
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).to_string();
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Ok(Event::End(_)) => {
                let finished = stack.pop();
                match (finished, stack.last_mut()) {
                    (Some(element), Some(parent)) => parent.children.push(element),
                    _ => return Err(malformed("unbalanced closing tag")),
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(malformed(&e.to_string())),
        }
        buf.clear();
    }

    let mut document = stack.pop().ok_or_else(|| malformed("empty document"))?;
    if !stack.is_empty() {
        return Err(malformed("unclosed element"));
    }
    document.children.pop().ok_or_else(|| malformed("no root element"))
}

fn malformed(reason: &str) -> ProviderError {
    ProviderError::Transport(format!("Malformed XML response: {}", reason))
}

/// Upper-case the first character: `vpcId` -> `VpcId`.
pub fn upper_camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// List containers whose names carry no `Set`/`List`/`Items` suffix.
const KNOWN_LISTS: &[&str] = &[
    "SecurityGroupInfo",
    "LoadBalancerDescriptions",
    "ListenerDescriptions",
    "PolicyDescriptions",
    "PolicyNames",
    "AttachedPolicies",
    "MFADevices",
    "SSHPublicKeys",
    "Users",
    "Groups",
    "Buckets",
    "DBInstances",
    "DBClusters",
    "Identities",
    "Errors",
];

/// Container names that denote a list even when empty. Any other empty
/// element stays an empty string.
fn is_plural(name: &str) -> bool {
    name.ends_with("Set") || name.ends_with("List") || name.ends_with("Items") || KNOWN_LISTS.contains(&name)
}

/// Children that all share one name form a list when they are `member` or
/// `item` wrappers, or when the container name extends the child name
/// (`DBInstances` > `DBInstance`). A single child under any other container
/// is read as a nested object.
fn is_list(element: &Element) -> bool {
    let Some(first) = element.children.first() else {
        return false;
    };
    if !element.children.iter().all(|child| child.name == first.name) {
        return false;
    }
    let container = element.name.to_lowercase();
    let child = first.name.to_lowercase();
    child == "member"
        || child == "item"
        || container == "items"
        || (container.len() > child.len() && container.starts_with(&child))
}

fn is_map(element: &Element) -> bool {
    !element.children.is_empty()
        && element.children.iter().all(|child| {
            child.name == "entry"
                && child.children.iter().any(|c| c.name == "key")
                && child.children.iter().any(|c| c.name == "value")
        })
}

fn to_value(element: &Element) -> Value {
    if element.children.is_empty() {
        if element.text.is_empty() && is_plural(&upper_camel(&element.name)) {
            return Value::Array(Vec::new());
        }
        return Value::String(element.text.clone());
    }

    if is_map(element) {
        let mut map = Map::new();
        for entry in &element.children {
            let key = entry.children.iter().find(|c| c.name == "key").map(|k| k.text.clone());
            let value = entry.children.iter().find(|c| c.name == "value").map(to_value);
            if let (Some(key), Some(value)) = (key, value) {
                map.insert(key, value);
            }
        }
        return Value::Object(map);
    }

    if is_list(element) {
        return Value::Array(element.children.iter().map(to_value).collect());
    }

    let mut map = Map::new();
    for child in &element.children {
        let key = upper_camel(&child.name);
        let value = to_value(child);
        let repeated = element.children.iter().filter(|c| c.name == child.name).count() > 1;
        if repeated {
            if let Value::Array(values) = map.entry(key).or_insert_with(|| Value::Array(Vec::new())) {
                values.push(value);
            }
        } else {
            map.insert(key, value);
        }
    }
    Value::Object(map)
}

/// Convert a query-protocol response, dropping the `...Response` envelope and
/// unwrapping its `...Result` member when present.
pub fn query_response_to_json(xml: &str) -> Result<Value, ProviderError> {
    let root = parse(xml)?;
    let result = root
        .children
        .iter()
        .find(|child| child.name.ends_with("Result") && !child.children.is_empty());

    match result {
        Some(result) => Ok(object_of(result)),
        None => Ok(object_of(&root)),
    }
}

/// Convert a REST-XML response; the root element is kept as the single key.
pub fn rest_response_to_json(xml: &str) -> Result<Value, ProviderError> {
    let root = parse(xml)?;
    let mut map = Map::new();
    map.insert(upper_camel(&root.name), to_value(&root));
    Ok(Value::Object(map))
}

/// Body of an element as an object even when its children look like a list.
fn object_of(element: &Element) -> Value {
    match to_value(element) {
        Value::Object(map) => Value::Object(map),
        _ => {
            let mut map = Map::new();
            for child in &element.children {
                map.insert(upper_camel(&child.name), to_value(child));
            }
            Value::Object(map)
        }
    }
}

/// Error code and message from an XML error body.
pub fn error_from_xml(xml: &str) -> Option<(String, String)> {
    let root = parse(xml).ok()?;
    let error = find(&root, "Error")?;
    let code = error.children.iter().find(|c| c.name == "Code")?.text.clone();
    let message = error
        .children
        .iter()
        .find(|c| c.name == "Message")
        .map(|m| m.text.clone())
        .unwrap_or_default();
    Some((code, message))
}

fn find<'a>(element: &'a Element, name: &str) -> Option<&'a Element> {
    if element.name == name {
        return Some(element);
    }
    element.children.iter().find_map(|child| find(child, name))
}
