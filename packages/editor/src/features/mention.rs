//! # Mentions
//!
//! A mention is text carrying a `mention` attribute:
//! `{ "id": "@Lily", "_text": "@Lily", "_uid": "…" }`. In the view it is
//! `<span class="mention" data-mention="@Lily">@Lily</span>`.
//!
//! A mention stays valid only while its live text equals `_text`. Three
//! post-fixers keep it that way:
//!
//! - [`RemovePartialMention`] strips the attribute from text that no longer
//!   matches (typing inside a mention, splitting it, pasting into it)
//! - [`ExtendAttributeOnMention`] spreads an attribute applied to part of a
//!   mention over the whole mention
//! - [`SelectionMentionAttribute`] keeps a collapsed selection after a
//!   mention from carrying the attribute, so typing there gives plain text

use crate::command::{parse_params, resolve_range, Command};
use crate::editor::Editor;
use crate::errors::{EditorError, Result};
use crate::plugin::Plugin;
use folio_engine::conversion::{downcast_helpers, upcast_helpers, ViewMatcher};
use folio_engine::model::{
    Attributes, ChangeEntry, Document, Item, Model, NodeId, PathRange, Position, PostFixer, Range, Schema,
    Writer, TEXT_NAME,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

pub const MENTION: &str = "mention";

pub const REMOVE_PARTIAL_FIXER: &str = "mention-remove-partial";
pub const EXTEND_ATTRIBUTE_FIXER: &str = "mention-extend-attribute";
pub const SELECTION_FIXER: &str = "mention-selection-attribute";

/// Names of the mention post-fixers, for fixers that must run after them.
pub const MENTION_FIXERS: &[&str] = &[REMOVE_PARTIAL_FIXER, EXTEND_ATTRIBUTE_FIXER, SELECTION_FIXER];

const MENTION_PRIORITY: i32 = 20;

fn new_uid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Attribute value for a mention `id` rendered as `text`.
pub fn mention_attribute(id: &str, text: &str) -> Value {
    json!({ "id": id, "_text": text, "_uid": new_uid() })
}

/// Text whose `mention` attribute no longer matches its content.
fn is_broken(document: &Document, node: NodeId) -> bool {
    if !document.is_text(node) {
        return false;
    }
    let Some(mention) = document.attribute(node, MENTION) else {
        return false;
    };
    let expected = mention.get("_text").and_then(Value::as_str);
    document.data(node) != expected
}

fn push_candidate(candidates: &mut Vec<NodeId>, node: Option<NodeId>) {
    if let Some(node) = node {
        if !candidates.contains(&node) {
            candidates.push(node);
        }
    }
}

fn text_nodes_in(document: &Document, element: NodeId) -> Vec<NodeId> {
    document
        .items(&document.range_in(element), true)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| match item {
            Item::Text(proxy) => Some(proxy.node),
            Item::Element(_) => None,
        })
        .collect()
}

/// Text nodes a change may have broken a mention in.
fn affected_text(document: &Document, schema: &Schema, change: &ChangeEntry) -> Vec<NodeId> {
    let mut candidates = Vec::new();
    let position = change.position();
    if !document.is_attached(position.parent) {
        return candidates;
    }
    let name = change.name().unwrap_or_default();

    if name == TEXT_NAME {
        let text_node = document.text_node_at(position);
        push_candidate(&mut candidates, text_node);
        push_candidate(&mut candidates, text_node.and_then(|node| document.next_sibling(node)));
        push_candidate(&mut candidates, document.node_before(position));
        push_candidate(&mut candidates, document.node_after(position));
        if let ChangeEntry::Insert { length, .. } = change {
            let end = position.shifted_by(*length as isize);
            push_candidate(&mut candidates, document.text_node_at(end));
            push_candidate(&mut candidates, document.node_after(end));
        }
    }

    if let ChangeEntry::Insert { node, .. } = change {
        if name != TEXT_NAME {
            if let Some(inserted) = node.or_else(|| document.node_after(position)) {
                for text in text_nodes_in(document, inserted) {
                    push_candidate(&mut candidates, Some(text));
                }
            }
        }
        if schema.is_inline(name) {
            push_candidate(&mut candidates, document.node_before(position));
            let after = document.node_after(position).and_then(|node| document.next_sibling(node));
            push_candidate(&mut candidates, after);
        }
    }
    candidates
}

#[derive(Debug, Default)]
pub struct RemovePartialMention;

impl PostFixer for RemovePartialMention {
    fn name(&self) -> &str {
        REMOVE_PARTIAL_FIXER
    }

    fn fix(&mut self, writer: &mut Writer<'_>) -> folio_engine::Result<bool> {
        let document = writer.document();
        let mut broken: Vec<Range> = Vec::new();
        for change in document.changes() {
            for node in affected_text(document, writer.schema(), &change) {
                if is_broken(document, node) {
                    let range = document.range_on(node)?;
                    if !broken.contains(&range) {
                        broken.push(range);
                    }
                }
            }
        }
        // Attribute changes keep offsets, so the ranges stay valid.
        for range in &broken {
            debug!(?range, "Removing broken mention");
            writer.remove_attribute(MENTION, *range)?;
        }
        Ok(!broken.is_empty())
    }
}

#[derive(Debug, Default)]
pub struct ExtendAttributeOnMention;

impl PostFixer for ExtendAttributeOnMention {
    fn name(&self) -> &str {
        EXTEND_ATTRIBUTE_FIXER
    }

    fn fix(&mut self, writer: &mut Writer<'_>) -> folio_engine::Result<bool> {
        let document = writer.document();
        let mut fixes: Vec<(String, Option<Value>, Range)> = Vec::new();
        for change in document.changes() {
            let ChangeEntry::Attribute {
                range, key, new_value, ..
            } = change
            else {
                continue;
            };
            if key == MENTION || !document.is_attached(range.start.parent) {
                continue;
            }
            let edges = [document.node_before(range.start), document.node_after(range.end)];
            for node in edges.into_iter().flatten() {
                if is_broken(document, node) && document.attribute(node, &key) != new_value.as_ref() {
                    fixes.push((key.clone(), new_value.clone(), document.range_on(node)?));
                }
            }
        }
        for (key, value, range) in &fixes {
            match value {
                Some(value) => writer.set_attribute(key, value.clone(), *range)?,
                None => writer.remove_attribute(key, *range)?,
            }
        }
        Ok(!fixes.is_empty())
    }
}

#[derive(Debug, Default)]
pub struct SelectionMentionAttribute;

impl PostFixer for SelectionMentionAttribute {
    fn name(&self) -> &str {
        SELECTION_FIXER
    }

    fn fix(&mut self, writer: &mut Writer<'_>) -> folio_engine::Result<bool> {
        let document = writer.document();
        let selection = document.selection();
        let after_text = document
            .node_before(selection.focus())
            .map_or(false, |node| document.is_text(node));
        if selection.is_collapsed() && selection.has_attribute(MENTION) && after_text {
            writer.remove_selection_attribute(MENTION);
            return Ok(true);
        }
        Ok(false)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MentionParams {
    /// An id string or an object with at least an `id`.
    pub mention: Value,
    pub marker: String,
    /// Inserted text; the id when absent.
    pub text: Option<String>,
    /// Replaced content; the selection when absent.
    pub range: Option<PathRange>,
}

fn command_error(code: &'static str, message: impl Into<String>) -> EditorError {
    EditorError::Command {
        code,
        message: message.into(),
    }
}

/// Inserts a mention followed by a space.
#[derive(Debug, Default)]
pub struct MentionCommand {
    enabled: bool,
}

impl Command for MentionCommand {
    fn refresh(&mut self, document: &Document, schema: &Schema) {
        self.enabled = schema.check_attribute_in_selection(document, MENTION);
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn execute(&mut self, model: &mut Model, params: Value) -> Result<()> {
        let params: MentionParams = parse_params(params)?;
        if params.marker.chars().count() != 1 {
            return Err(command_error(
                "mentioncommand-incorrect-marker",
                "the marker must be a single character",
            ));
        }
        let mut data = match params.mention {
            Value::String(id) => {
                let mut data = Map::new();
                data.insert("id".into(), Value::String(id));
                data
            }
            Value::Object(data) => data,
            _ => return Err(command_error("mentioncommand-incorrect-id", "mention must be an id or an object")),
        };
        let id = data.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        if !id.starts_with(&params.marker) {
            return Err(command_error(
                "mentioncommand-incorrect-id",
                format!("{id:?} does not start with {:?}", params.marker),
            ));
        }
        let text = params.text.unwrap_or_else(|| id.clone());
        data.insert("_text".into(), Value::String(text.clone()));
        data.insert("_uid".into(), Value::String(new_uid()));

        model.change(|writer| {
            let range = match &params.range {
                Some(range) => resolve_range(range, writer.document())?,
                None => writer.document().selection().range(),
            };
            let plain: Attributes = writer
                .document()
                .selection()
                .attributes()
                .iter()
                .filter(|(key, _)| key.as_str() != MENTION && writer.schema().check_attribute(TEXT_NAME, key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            let mut with_mention = plain.clone();
            with_mention.insert(MENTION.to_string(), Value::Object(data));

            writer.delete_content(range)?;
            let start = range.start;
            let length = text.chars().count();
            writer.insert_text(&text, with_mention, start)?;
            writer.insert_text(" ", plain, Position::new(start.parent, start.offset + length))?;
            writer.set_selection_at(Position::new(start.parent, start.offset + length + 1))
        })?;
        Ok(())
    }
}

/// Rejects feeds whose marker is missing or not a single character.
pub fn validate_config(editor: &Editor) -> Result<()> {
    for feed in &editor.config().mention.feeds {
        let valid = feed
            .marker
            .as_deref()
            .map_or(false, |marker| marker.chars().count() == 1);
        if !valid {
            return Err(EditorError::configuration(
                "mentionconfig-incorrect-marker",
                format!("mention feed marker {:?} must be a single character", feed.marker),
            ));
        }
    }
    Ok(())
}

pub struct Mention;

impl Plugin for Mention {
    fn name(&self) -> &'static str {
        "Mention"
    }

    fn init(&self, editor: &mut Editor) -> Result<()> {
        validate_config(editor)?;

        editor
            .model_mut()
            .schema_mut()
            .extend(TEXT_NAME, |definition| definition.allow_attributes.push(MENTION.to_string()));

        let mut conversion = editor.conversion();
        upcast_helpers::element_to_attribute(
            &mut conversion.upcast,
            ViewMatcher::element("span").class("mention").attribute("data-mention"),
            MENTION,
            |view, element| {
                // Empty mentions are not converted.
                let first = view.children(element).first().copied()?;
                let text = view.text(first)?;
                let id = view.attribute(element, "data-mention")?;
                Some(mention_attribute(id, text))
            },
        );
        conversion.for_downcast(|dispatcher| {
            downcast_helpers::attribute_to_element(dispatcher, MENTION, |value, writer| {
                let id = value.get("id")?.as_str()?;
                let uid = value.get("_uid").and_then(Value::as_str).map(str::to_string);
                Some(writer.create_attribute_element(
                    "span",
                    &[("class", "mention"), ("data-mention", id)],
                    MENTION_PRIORITY,
                    uid,
                ))
            });
        });
        drop(conversion);

        let model = editor.model_mut();
        model.register_post_fixer(RemovePartialMention)?;
        model.register_post_fixer(ExtendAttributeOnMention)?;
        model.register_post_fixer(SelectionMentionAttribute)?;

        editor.add_command(MENTION, MentionCommand::default());
        Ok(())
    }
}
