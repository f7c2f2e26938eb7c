//! Model markup used by tests and tooling.
//!
//! ```text
//! <paragraph>foo<$text bold="true">b[ar</$text>]</paragraph>
//! ```
//!
//! `[` and `]` mark the selection (`[]` when collapsed). Attribute values are
//! read as JSON when they parse as JSON and as plain strings otherwise.

use crate::error::{EngineError, Result};
use crate::model::{
    offset_size_of, Attributes, BatchKind, Document, Model, NodeId, NodeKind, NodeSnapshot, Path, Position,
    Range, TEXT_NAME,
};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedModel {
    pub nodes: Vec<NodeSnapshot>,
    /// Start and end of the selection as paths from the root.
    pub selection: Option<(Path, Path)>,
}

struct Frame {
    name: String,
    attributes: Attributes,
    children: Vec<NodeSnapshot>,
    offset: usize,
}

pub fn parse_model(markup: &str) -> Result<ParsedModel> {
    let chars: Vec<char> = markup.chars().collect();
    let mut stack = vec![Frame {
        name: String::new(),
        attributes: Attributes::new(),
        children: Vec::new(),
        offset: 0,
    }];
    let mut text_attributes: Option<Attributes> = None;
    let mut start: Option<Path> = None;
    let mut end: Option<Path> = None;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '<' => {
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == '>')
                    .map(|p| i + p)
                    .ok_or_else(|| markup_error(i, "unterminated tag"))?;
                let tag: String = chars[i + 1..close].iter().collect();
                if let Some(name) = tag.strip_prefix('/') {
                    let name = name.trim();
                    if name == TEXT_NAME {
                        if text_attributes.take().is_none() {
                            return Err(markup_error(i, "unexpected </$text>"));
                        }
                    } else {
                        close_element(&mut stack, name, i)?;
                    }
                } else {
                    let self_closing = tag.ends_with('/');
                    let tag = tag.trim_end_matches('/');
                    let (name, attributes) = parse_tag(tag, i)?;
                    if name == TEXT_NAME {
                        if text_attributes.is_some() {
                            return Err(markup_error(i, "nested <$text>"));
                        }
                        text_attributes = Some(attributes);
                    } else {
                        let parent = stack.last().ok_or_else(|| markup_error(i, "no open element"))?;
                        stack.push(Frame {
                            name: name.clone(),
                            attributes,
                            offset: offset_size_of(&parent.children),
                            children: Vec::new(),
                        });
                        if self_closing {
                            close_element(&mut stack, &name, i)?;
                        }
                    }
                }
                i = close + 1;
            }
            '[' | ']' => {
                let path = current_path(&stack);
                if chars[i] == '[' {
                    if start.is_some() {
                        return Err(markup_error(i, "selection start is set twice"));
                    }
                    start = Some(path);
                } else {
                    if start.is_none() || end.is_some() {
                        return Err(markup_error(i, "unexpected selection end"));
                    }
                    end = Some(path);
                }
                i += 1;
            }
            c => {
                let attributes = text_attributes.clone().unwrap_or_default();
                if let Some(frame) = stack.last_mut() {
                    push_char(&mut frame.children, c, attributes);
                }
                i += 1;
            }
        }
    }

    if stack.len() != 1 {
        let name = stack.last().map(|f| f.name.clone()).unwrap_or_default();
        return Err(markup_error(chars.len(), &format!("<{name}> is not closed")));
    }
    let selection = match (start, end) {
        (Some(start), Some(end)) => Some((start, end)),
        (None, None) => None,
        _ => return Err(markup_error(chars.len(), "selection is not closed")),
    };
    let nodes = stack.pop().map(|frame| frame.children).unwrap_or_default();
    Ok(ParsedModel { nodes, selection })
}

fn markup_error(offset: usize, message: &str) -> EngineError {
    EngineError::Markup {
        offset,
        message: message.to_string(),
    }
}

fn current_path(stack: &[Frame]) -> Path {
    let mut path: Path = stack.iter().skip(1).map(|frame| frame.offset).collect();
    path.push(stack.last().map_or(0, |frame| offset_size_of(&frame.children)));
    path
}

fn close_element(stack: &mut Vec<Frame>, name: &str, offset: usize) -> Result<()> {
    if stack.len() < 2 || stack.last().map(|f| f.name.as_str()) != Some(name) {
        return Err(markup_error(offset, &format!("unexpected </{name}>")));
    }
    let frame = stack.pop().ok_or_else(|| markup_error(offset, "no open element"))?;
    let mut element = NodeSnapshot::element(frame.name).with_children(frame.children);
    *element.attributes_mut() = frame.attributes;
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    }
    Ok(())
}

fn push_char(children: &mut Vec<NodeSnapshot>, c: char, attributes: Attributes) {
    if let Some(NodeSnapshot::Text {
        data,
        attributes: last,
    }) = children.last_mut()
    {
        if *last == attributes {
            data.push(c);
            return;
        }
    }
    let mut text = NodeSnapshot::text(c.to_string());
    *text.attributes_mut() = attributes;
    children.push(text);
}

fn parse_tag(tag: &str, offset: usize) -> Result<(String, Attributes)> {
    let tag = tag.trim();
    let (name, mut rest) = match tag.find(char::is_whitespace) {
        Some(split) => (&tag[..split], tag[split..].trim_start()),
        None => (tag, ""),
    };
    if name.is_empty() {
        return Err(markup_error(offset, "empty tag name"));
    }
    let mut attributes = Attributes::new();
    while !rest.is_empty() {
        let (key, after) = rest
            .split_once("=\"")
            .ok_or_else(|| markup_error(offset, "expected key=\"value\""))?;
        let (raw, after) = after
            .split_once('"')
            .ok_or_else(|| markup_error(offset, "unterminated attribute value"))?;
        let raw = unescape(raw);
        let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
        attributes.insert(key.trim().to_string(), value);
        rest = after.trim_start();
    }
    Ok((name.to_string(), attributes))
}

fn unescape(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => escape(s),
        other => escape(&other.to_string()),
    }
}

fn format_attributes(attributes: &Attributes) -> String {
    attributes
        .iter()
        .map(|(key, value)| format!(" {key}=\"{}\"", format_value(value)))
        .collect()
}

/// Replaces the content of the root with `markup` and sets the selection,
/// in a transparent batch.
pub fn set_data(model: &mut Model, markup: &str) -> Result<()> {
    let parsed = parse_model(markup)?;
    let batch = model.create_batch(BatchKind::Transparent);
    model.change_in(batch, move |writer| {
        let root = writer.document().root();
        let all = writer.document().range_in(root);
        writer.remove(all)?;
        writer.insert(parsed.nodes, Position::new(root, 0))?;
        let range = match parsed.selection {
            Some((start, end)) => {
                let doc = writer.document();
                Range::new(doc.position_at_path(&start)?, doc.position_at_path(&end)?)
            }
            None => Range::collapsed(writer.document().default_position()),
        };
        writer.set_selection(range, false)
    })
}

/// The root content as markup, with the selection when `with_selection` is
/// set.
pub fn get_data(doc: &Document, with_selection: bool) -> String {
    let range = with_selection.then(|| doc.selection().range());
    let mut out = String::new();
    write_children(doc, doc.root(), range.as_ref(), &mut out);
    out
}

/// Markup of a single node and its content.
pub fn stringify_node(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, node, 0, None, &mut out);
    out
}

fn markers_at(range: Option<&Range>, parent: NodeId, offset: usize, out: &mut String) {
    let Some(range) = range else {
        return;
    };
    if range.start.parent == parent && range.start.offset == offset {
        out.push('[');
    }
    if range.end.parent == parent && range.end.offset == offset {
        out.push(']');
    }
}

fn write_children(doc: &Document, parent: NodeId, range: Option<&Range>, out: &mut String) {
    let mut offset = 0;
    for child in doc.children(parent) {
        markers_at(range, parent, offset, out);
        write_node(doc, *child, offset, range, out);
        offset += doc.offset_size(*child);
    }
    markers_at(range, parent, offset, out);
}

fn write_node(doc: &Document, node: NodeId, start: usize, range: Option<&Range>, out: &mut String) {
    let Some(data) = doc.node(node) else {
        return;
    };
    match &data.kind {
        NodeKind::Element { name, .. } => {
            out.push_str(&format!("<{name}{}>", format_attributes(&data.attributes)));
            write_children(doc, node, range, out);
            out.push_str(&format!("</{name}>"));
        }
        NodeKind::Text { data: text } => {
            let wrapped = !data.attributes.is_empty();
            if wrapped {
                out.push_str(&format!("<{TEXT_NAME}{}>", format_attributes(&data.attributes)));
            }
            let parent = doc.parent(node).unwrap_or(node);
            for (i, c) in text.chars().enumerate() {
                if i > 0 {
                    markers_at(range, parent, start + i, out);
                }
                out.push(c);
            }
            if wrapped {
                out.push_str(&format!("</{TEXT_NAME}>"));
            }
        }
    }
}
