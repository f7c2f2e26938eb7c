//! HTML ↔ view tree.
//!
//! The parser is lenient in the way browsers are: unknown closing tags are
//! ignored, unclosed elements are closed at the end of their parent, and
//! comments and doctypes are skipped. Runs of whitespace in text collapse to
//! a single space.

use crate::error::{EngineError, Result};
use crate::view::{
    join_classes, join_styles, View, ViewElementKind, ViewId, ViewNodeKind, ViewPosition, ViewWriter,
};

/// Elements that never have content or a closing tag.
pub const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "source", "wbr"];

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// Parses an HTML fragment into a fresh view whose root holds the fragment.
pub fn parse_html(html: &str) -> Result<View> {
    let mut view = View::new("$root");
    let root = view.root();
    parse_html_into(&mut view, root, html)?;
    Ok(view)
}

pub fn parse_html_into(view: &mut View, parent: ViewId, html: &str) -> Result<()> {
    let mut writer = ViewWriter::new(view);
    let mut stack: Vec<(String, ViewId)> = vec![(String::new(), parent)];
    let mut text = String::new();
    let mut rest = html;
    let mut offset = 0;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("<!--") {
            flush_text(&mut writer, &mut text, &stack)?;
            let skip = after.find("-->").map_or(after.len(), |end| end + 3);
            offset += 4 + skip;
            rest = &after[skip..];
            continue;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            flush_text(&mut writer, &mut text, &stack)?;
            let skip = rest.find('>').map_or(rest.len(), |end| end + 1);
            offset += skip;
            rest = &rest[skip..];
            continue;
        }
        let is_tag = rest.starts_with('<')
            && rest[1..]
                .chars()
                .next()
                .map_or(false, |c| c.is_ascii_alphabetic() || c == '/');
        if !is_tag {
            let first = rest.chars().next().map_or(1, char::len_utf8);
            let next = rest[first..].find('<').map_or(rest.len(), |p| p + first);
            text.push_str(&rest[..next]);
            offset += next;
            rest = &rest[next..];
            continue;
        }

        flush_text(&mut writer, &mut text, &stack)?;
        let end = find_tag_end(rest).ok_or(EngineError::Markup {
            offset,
            message: "unterminated tag".into(),
        })?;
        let tag = &rest[1..end];
        offset += end + 1;
        rest = &rest[end + 1..];

        if let Some(name) = tag.strip_prefix('/') {
            let name = name.trim().to_ascii_lowercase();
            if let Some(index) = stack.iter().rposition(|(open, _)| *open == name) {
                if index > 0 {
                    stack.truncate(index);
                }
            }
            continue;
        }

        let self_closing = tag.ends_with('/');
        let (name, attributes) = parse_start_tag(tag.trim_end_matches('/'));
        let attributes: Vec<(&str, &str)> = attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let element = if is_void(&name) {
            writer.create_empty_element(&name, &attributes)
        } else {
            writer.create_container_element(&name, &attributes)
        };
        let (_, current) = stack.last().cloned().unwrap_or((String::new(), parent));
        writer.append(element, current)?;
        if !self_closing && !is_void(&name) {
            stack.push((name, element));
        }
    }
    flush_text(&mut writer, &mut text, &stack)
}

fn find_tag_end(input: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

fn flush_text(writer: &mut ViewWriter<'_>, text: &mut String, stack: &[(String, ViewId)]) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    let data = collapse_whitespace(&decode_entities(text));
    text.clear();
    let Some((_, parent)) = stack.last() else {
        return Ok(());
    };
    let node = writer.create_text(&data);
    writer.append(node, *parent)
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn parse_start_tag(tag: &str) -> (String, Vec<(String, String)>) {
    let tag = tag.trim();
    let name_end = tag.find(|c: char| c.is_whitespace()).unwrap_or(tag.len());
    let name = tag[..name_end].to_ascii_lowercase();
    let mut attributes = Vec::new();
    let mut rest = tag[name_end..].trim_start();

    while !rest.is_empty() {
        let key_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let key = rest[..key_end].to_ascii_lowercase();
        rest = rest[key_end..].trim_start();
        let value = if let Some(after) = rest.strip_prefix('=') {
            let after = after.trim_start();
            let (value, remaining) = match after.chars().next() {
                Some(q @ ('"' | '\'')) => {
                    let body = &after[1..];
                    let end = body.find(q).unwrap_or(body.len());
                    (&body[..end], body.get(end + 1..).unwrap_or(""))
                }
                _ => {
                    let end = after.find(char::is_whitespace).unwrap_or(after.len());
                    (&after[..end], &after[end..])
                }
            };
            rest = remaining.trim_start();
            decode_entities(value)
        } else {
            String::new()
        };
        if !key.is_empty() {
            attributes.push((key, value));
        }
    }
    (name, attributes)
}

pub fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        let decoded = rest.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\u{a0}', "&nbsp;")
}

pub fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Serializes the children of `element`. UI elements are included only
/// when `include_ui` is set.
pub fn stringify_children(view: &View, element: ViewId, include_ui: bool) -> String {
    let mut out = String::new();
    for child in view.children(element) {
        write_node(view, *child, include_ui, None, &mut out);
    }
    out
}

pub fn stringify_node(view: &View, node: ViewId) -> String {
    let mut out = String::new();
    write_node(view, node, true, None, &mut out);
    out
}

/// Like [`stringify_children`] with the view selection drawn as `[` and
/// `]` between nodes and `{` and `}` inside text.
pub fn stringify_with_selection(view: &View, element: ViewId) -> String {
    let mut out = String::new();
    let selection = view.selection.map(|range| (range.start, range.end));
    write_children(view, element, true, selection.as_ref(), &mut out);
    out
}

type Markers = (ViewPosition, ViewPosition);

fn marker(selection: Option<&Markers>, parent: ViewId, offset: usize, text: bool, out: &mut String) {
    let Some((start, end)) = selection else {
        return;
    };
    if start.parent == parent && start.offset == offset {
        out.push(if text { '{' } else { '[' });
    }
    if end.parent == parent && end.offset == offset {
        out.push(if text { '}' } else { ']' });
    }
}

fn write_children(view: &View, element: ViewId, include_ui: bool, selection: Option<&Markers>, out: &mut String) {
    for (index, child) in view.children(element).iter().enumerate() {
        marker(selection, element, index, false, out);
        write_node(view, *child, include_ui, selection, out);
    }
    marker(selection, element, view.children(element).len(), false, out);
}

fn write_node(view: &View, node: ViewId, include_ui: bool, selection: Option<&Markers>, out: &mut String) {
    let Some(data) = view.node(node) else {
        return;
    };
    match &data.kind {
        ViewNodeKind::Text(text) => {
            if selection.is_none() {
                out.push_str(&escape_text(text));
                return;
            }
            let mut offset = 0;
            for c in text.chars() {
                marker(selection, node, offset, true, out);
                out.push_str(&escape_text(&c.to_string()));
                offset += 1;
            }
            marker(selection, node, offset, true, out);
        }
        ViewNodeKind::Element(element) => {
            if element.kind == ViewElementKind::Ui && !include_ui {
                return;
            }
            out.push('<');
            out.push_str(&element.name);
            if !element.classes.is_empty() {
                out.push_str(&format!(" class=\"{}\"", escape_attribute(&join_classes(&element.classes))));
            }
            if !element.styles.is_empty() {
                out.push_str(&format!(" style=\"{}\"", escape_attribute(&join_styles(&element.styles))));
            }
            for (key, value) in &element.attributes {
                out.push_str(&format!(" {key}=\"{}\"", escape_attribute(value)));
            }
            out.push('>');
            if is_void(&element.name) {
                return;
            }
            if selection.is_some() {
                write_children(view, node, include_ui, selection, out);
            } else {
                for child in &element.children {
                    write_node(view, *child, include_ui, None, out);
                }
            }
            out.push_str(&format!("</{}>", element.name));
        }
    }
}
