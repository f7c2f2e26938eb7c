//! Integration tests for the editor crate

use folio_editor::features::video::{abort_upload, finish_upload, CAPTION, UPLOAD_ID, VIDEO};
use folio_editor::features::{self, Paragraph, VideoCaption};
use folio_editor::typing::{ChangeBuffer, InputCommand};
use folio_editor::{Command, Editor, EditorConfig, EditorError};
use folio_engine::dev_utils::{get_data, set_data};
use folio_engine::model::{
    FnPostFixer, ItemDefinition, Model, NodeId, Position, Range, MAX_POST_FIXER_PASSES, ROOT_NAME,
};
use folio_engine::EngineError;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn editor() -> Editor {
    Editor::create(EditorConfig::default(), features::standard_plugins()).unwrap()
}

fn first_paragraph(editor: &Editor) -> NodeId {
    let document = editor.model().document();
    document.children(document.root())[0]
}

/// A bare model with the typing pieces wired by hand, so the buffer is
/// reachable.
fn typing_model(markup: &str) -> (Model, Rc<RefCell<ChangeBuffer>>, InputCommand) {
    let mut model = Model::new();
    model
        .schema_mut()
        .register("paragraph", ItemDefinition::default().allowed_in(ROOT_NAME).block());
    set_data(&mut model, markup).unwrap();
    let buffer = Rc::new(RefCell::new(ChangeBuffer::new(20)));
    model.add_observer(buffer.clone());
    let command = InputCommand::new(buffer.clone());
    (model, buffer, command)
}

#[test]
fn test_typing_between_words() {
    let (mut model, buffer, mut input) = typing_model("<paragraph>foo[]bar</paragraph>");
    input.refresh(model.document(), model.schema());
    input.execute(&mut model, json!({ "text": "X" })).unwrap();

    assert_eq!(get_data(model.document(), true), "<paragraph>fooX[]bar</paragraph>");
    assert_eq!(buffer.borrow().size(), 1);
}

#[test]
fn test_change_buffer_counts_typed_characters() {
    let (mut model, buffer, mut input) = typing_model("<paragraph>[]</paragraph>");
    input.execute(&mut model, json!({ "text": "bar" })).unwrap();
    assert_eq!(buffer.borrow().size(), 3);
    assert!(!buffer.borrow().is_locked());

    let (mut model, buffer, mut input) = typing_model("<paragraph>foo</paragraph>");
    input
        .execute(&mut model, json!({ "text": "", "range": { "start": [0, 0], "end": [0, 3] } }))
        .unwrap();
    assert_eq!(get_data(model.document(), false), "<paragraph></paragraph>");
    assert_eq!(buffer.borrow().size(), 0);
}

#[test]
fn test_reversed_range_is_typed_over() {
    let mut editor = editor();
    editor.set_data("<p>foobar</p>").unwrap();
    editor
        .execute("input", json!({ "text": "X", "range": { "start": [0, 4], "end": [0, 1] } }))
        .unwrap();
    assert_eq!(editor.get_data().unwrap(), "<p>fXar</p>");
}

#[test]
fn test_failed_input_releases_the_buffer_lock() {
    let (mut model, buffer, mut input) = typing_model("<paragraph>foo[]</paragraph>");
    let result = input.execute(
        &mut model,
        json!({ "text": "X", "resultRange": { "start": [7, 0], "end": [7, 0] } }),
    );
    assert!(matches!(result, Err(EditorError::Engine(EngineError::InvalidPath(_)))));
    assert!(!buffer.borrow().is_locked());
}

#[test]
fn test_commands_follow_model_changes() {
    let mut editor = editor();
    editor.set_data("<p>foo</p>").unwrap();
    assert_eq!(editor.command("bold").unwrap().borrow().value(), json!(false));

    let paragraph = first_paragraph(&editor);
    editor
        .model_mut()
        .change(|writer| {
            let range = Range::flat(paragraph, 0, 3);
            writer.set_attribute("bold", json!(true), range)?;
            writer.set_selection(range, false)
        })
        .unwrap();
    assert_eq!(editor.command("bold").unwrap().borrow().value(), json!(true));
}

#[test]
fn test_typing_inside_mention_demotes_it() {
    let mut editor = editor();
    editor
        .set_data("<p>foo <span class=\"mention\" data-mention=\"@Lily\">@Lily</span> bar</p>")
        .unwrap();
    let paragraph = first_paragraph(&editor);
    assert!(editor
        .model()
        .document()
        .children(paragraph)
        .iter()
        .any(|node| editor.model().document().has_attribute(*node, "mention")));

    // After "@Li".
    editor
        .execute("input", json!({ "text": "X", "range": { "start": [0, 7], "end": [0, 7] } }))
        .unwrap();

    let document = editor.model().document();
    assert!(document
        .children(paragraph)
        .iter()
        .all(|node| !document.has_attribute(*node, "mention")));
    assert_eq!(editor.get_data().unwrap(), "<p>foo @LiXly bar</p>");
}

#[test]
fn test_bold_on_half_a_mention_covers_all_of_it() {
    let mut editor = editor();
    editor
        .set_data("<p>foo <span class=\"mention\" data-mention=\"@Lily\">@Lily</span> bar</p>")
        .unwrap();
    let paragraph = first_paragraph(&editor);
    editor
        .model_mut()
        .change(|writer| {
            let range = Range::new(Position::new(paragraph, 4), Position::new(paragraph, 6));
            writer.set_selection(range, false)
        })
        .unwrap();
    editor.execute("bold", Value::Null).unwrap();

    let document = editor.model().document();
    let mentions: Vec<_> = document
        .children(paragraph)
        .iter()
        .filter(|node| document.has_attribute(**node, "mention"))
        .collect();
    assert_eq!(mentions.len(), 1);
    assert_eq!(document.data(*mentions[0]), Some("@Lily"));
    assert!(document.has_attribute(*mentions[0], "bold"));
    assert_eq!(document.data(document.children(paragraph)[0]), Some("foo "));
    assert!(!document.has_attribute(document.children(paragraph)[0], "bold"));
}

#[test]
fn test_video_without_caption_gets_one() {
    let mut editor = editor();
    editor
        .set_data("<figure class=\"video\"><video src=\"a.mp4\"></video></figure>")
        .unwrap();

    let document = editor.model().document();
    let video = document.children(document.root())[0];
    assert!(document.is(video, VIDEO));
    let captions: Vec<_> = document
        .children(video)
        .iter()
        .filter(|node| document.is(**node, CAPTION))
        .collect();
    assert_eq!(captions.len(), 1);
    assert!(document.is_empty(*captions[0]));
    assert!(editor.editing_html().contains("ck-hidden"));
}

#[test]
fn test_caption_with_mention_round_trip() {
    let mut editor = editor();
    let html = "<figure class=\"video\"><video controls=\"\" src=\"a.mp4\"></video><figcaption>By <span class=\"mention\" data-mention=\"@Lily\">@Lily</span></figcaption></figure>";
    editor.set_data(html).unwrap();
    assert_eq!(editor.get_data().unwrap(), html);
    assert!(!editor.editing_html().contains("ck-hidden"));
}

#[test]
fn test_stencil_round_trip() {
    let config = EditorConfig::from_json_str(
        r#"{ "stencil": { "blocks": [{
            "selector": "app-hero-block",
            "label": "Hero",
            "properties": "hero",
            "descriptors": [{ "name": "properties", "value": "hero" }]
        }] } }"#,
    )
    .unwrap();
    let mut editor = Editor::create(config, features::standard_plugins()).unwrap();
    let html = "<p>Hi <app-hero-block class=\"stencil-template\" style=\"font-size:14px;min-width:120px;\" data-properties=\"hero\"></app-hero-block></p>";
    editor.set_data(html).unwrap();
    assert_eq!(editor.get_data().unwrap(), html);
}

#[test]
fn test_post_fixers_stop_after_a_clean_pass() {
    let mut editor = editor();
    editor.set_data("<p>foo</p>").unwrap();

    let first_calls = Rc::new(Cell::new(0));
    let second_calls = Rc::new(Cell::new(0));
    let counter = first_calls.clone();
    editor
        .model_mut()
        .register_post_fixer(FnPostFixer::new("changes-once", move |_| {
            counter.set(counter.get() + 1);
            Ok(counter.get() == 1)
        }))
        .unwrap();
    let counter = second_calls.clone();
    editor
        .model_mut()
        .register_post_fixer(FnPostFixer::new("never-changes", move |_| {
            counter.set(counter.get() + 1);
            Ok(false)
        }))
        .unwrap();

    editor
        .execute("input", json!({ "text": "X", "range": { "start": [0, 3], "end": [0, 3] } }))
        .unwrap();
    assert_eq!(first_calls.get(), 2);
    assert_eq!(second_calls.get(), 2);
}

#[test]
fn test_diverging_post_fixer_fails_loudly() {
    let mut editor = editor();
    editor.set_data("<p>foo</p>").unwrap();
    editor
        .model_mut()
        .register_post_fixer(FnPostFixer::new("always-changes", |_| Ok(true)))
        .unwrap();

    let err = editor
        .execute("input", json!({ "text": "X", "range": { "start": [0, 3], "end": [0, 3] } }))
        .unwrap_err();
    match err {
        EditorError::Engine(EngineError::PostFixerDivergence { passes, fixers }) => {
            assert_eq!(passes, MAX_POST_FIXER_PASSES);
            assert!(fixers.contains(&"always-changes".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }

    // Observers heard about the block even though it failed.
    assert_eq!(editor.get_data().unwrap(), "<p>fooX</p>");
    assert!(editor.editing_html().contains("fooX"));
    assert!(editor.command("undo").unwrap().borrow().is_enabled());
}

#[test]
fn test_undo_and_redo_typing() {
    let mut editor = editor();
    editor.set_data("<p>foo</p>").unwrap();
    editor
        .execute("input", json!({ "text": "bar", "range": { "start": [0, 3], "end": [0, 3] } }))
        .unwrap();
    assert_eq!(editor.get_data().unwrap(), "<p>foobar</p>");

    editor.execute("undo", Value::Null).unwrap();
    assert_eq!(editor.get_data().unwrap(), "<p>foo</p>");
    assert!(editor.command("redo").unwrap().borrow().is_enabled());

    editor.execute("redo", Value::Null).unwrap();
    assert_eq!(editor.get_data().unwrap(), "<p>foobar</p>");
}

fn start_upload(editor: &mut Editor) -> String {
    editor.set_data("<p></p>").unwrap();
    editor
        .execute("videoUpload", json!({ "file": { "name": "clip.mp4", "mimeType": "video/mp4" } }))
        .unwrap();
    let document = editor.model().document();
    let video = document.children(document.root())[0];
    document
        .attribute(video, UPLOAD_ID)
        .and_then(Value::as_str)
        .unwrap()
        .to_string()
}

#[test]
fn test_failed_upload_warns_and_removes_placeholder() {
    let mut editor = editor();
    let id = start_upload(&mut editor);
    finish_upload(&mut editor, &id, Err("Server is down".into())).unwrap();

    let document = editor.model().document();
    assert!(document
        .descendants(document.root())
        .iter()
        .all(|node| !document.is(*node, VIDEO)));
    let warnings: Vec<_> = editor.notifications().warnings().cloned().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "Server is down");
}

#[test]
fn test_aborted_upload_removes_placeholder() {
    let mut editor = editor();
    let id = start_upload(&mut editor);
    abort_upload(&mut editor, &id).unwrap();

    let document = editor.model().document();
    assert!(document
        .descendants(document.root())
        .iter()
        .all(|node| !document.is(*node, VIDEO)));
    assert!(editor.file_repository().borrow().is_empty());
    assert_eq!(editor.notifications().warnings().count(), 0);
}

#[test]
fn test_bad_mention_marker_blocks_startup() {
    for marker in [json!("@@"), Value::Null] {
        let config = EditorConfig::from_json_str(
            &json!({ "mention": { "feeds": [{ "marker": marker, "feed": ["@Lily"] }] } }).to_string(),
        )
        .unwrap();
        let err = Editor::create(config, features::standard_plugins()).unwrap_err();
        assert_eq!(err.code(), Some("mentionconfig-incorrect-marker"));
        assert!(err.to_string().contains("#error-mentionconfig-incorrect-marker"));
    }
}

#[test]
fn test_missing_required_plugin() {
    let err = Editor::create(EditorConfig::default(), vec![Box::new(Paragraph), Box::new(VideoCaption)]).unwrap_err();
    assert!(matches!(
        err,
        EditorError::MissingPlugin { ref plugin, ref missing } if plugin == "VideoCaption" && missing == "Video"
    ));
}
