//! Model → view conversion driven by real change blocks

use folio_engine::conversion::{
    downcast_helpers, upcast_helpers, Consumable, DowncastDispatcher, Mapper, UpcastDispatcher, ViewMatcher,
};
use folio_engine::dev_utils::{parse_html, set_data, stringify_children};
use folio_engine::model::{
    Attributes, ChangeBlock, ChangeObserver, ItemDefinition, Model, NodeSnapshot, Position, Range, Scheduler,
    ROOT_NAME, TEXT_NAME,
};
use folio_engine::view::View;
use folio_engine::Result;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

struct Pipeline {
    dispatcher: DowncastDispatcher,
    view: View,
    mapper: Mapper,
}

impl ChangeObserver for Pipeline {
    fn on_change_block(&mut self, block: &ChangeBlock<'_>, _: &mut Scheduler<'_>) -> Result<()> {
        self.dispatcher
            .convert_changes(block.document, block.schema, block.changes, &mut self.view, &mut self.mapper)
    }
}

fn downcast() -> DowncastDispatcher {
    let mut dispatcher = DowncastDispatcher::new();
    downcast_helpers::insert_text(&mut dispatcher);
    downcast_helpers::remove(&mut dispatcher);
    downcast_helpers::element_to_element(&mut dispatcher, "paragraph", |_, _, writer| {
        Some(writer.create_container_element("p", &[]))
    });
    downcast_helpers::attribute_to_element(&mut dispatcher, "bold", |_, writer| {
        Some(writer.create_attribute_element("strong", &[], 10, None))
    });
    downcast_helpers::attribute_to_attribute(&mut dispatcher, "paragraph", "alignment", |value| {
        value.as_str().map(|align| ("style".to_string(), format!("text-align:{align}")))
    });
    dispatcher
}

fn setup() -> (Model, Rc<RefCell<Pipeline>>) {
    let mut model = Model::new();
    model.schema_mut().register(
        "paragraph",
        ItemDefinition::default()
            .allowed_in(ROOT_NAME)
            .block()
            .with_attributes(&["alignment"]),
    );
    model
        .schema_mut()
        .extend(TEXT_NAME, |def| def.allow_attributes.push("bold".into()));

    let mut pipeline = Pipeline {
        dispatcher: downcast(),
        view: View::new("div"),
        mapper: Mapper::new(),
    };
    let view_root = pipeline.view.root();
    pipeline
        .mapper
        .bind_elements(model.document().root(), view_root)
        .unwrap();
    let pipeline = Rc::new(RefCell::new(pipeline));
    model.add_observer(pipeline.clone());
    (model, pipeline)
}

fn html(pipeline: &Rc<RefCell<Pipeline>>) -> String {
    let pipeline = pipeline.borrow();
    stringify_children(&pipeline.view, pipeline.view.root(), true)
}

#[test]
fn test_typing_inside_text_is_converted() {
    let (mut model, pipeline) = setup();
    set_data(&mut model, "<paragraph>foo[]bar</paragraph>").unwrap();
    assert_eq!(html(&pipeline), "<p>foobar</p>");

    model
        .change(|writer| {
            let position = writer.document().selection().first_position();
            writer.insert_text("X", Attributes::new(), position)
        })
        .unwrap();
    assert_eq!(html(&pipeline), "<p>fooXbar</p>");
}

#[test]
fn test_attribute_changes_wrap_and_unwrap() {
    let (mut model, pipeline) = setup();
    set_data(&mut model, "<paragraph>foo[bar]</paragraph>").unwrap();

    model
        .change(|writer| {
            let range = writer.document().selection().range();
            writer.set_attribute("bold", json!(true), range)
        })
        .unwrap();
    assert_eq!(html(&pipeline), "<p>foo<strong>bar</strong></p>");

    model
        .change(|writer| {
            let range = writer.document().selection().range();
            writer.remove_attribute("bold", range)
        })
        .unwrap();
    assert_eq!(html(&pipeline), "<p>foobar</p>");
}

#[test]
fn test_element_attribute_to_style() {
    let (mut model, pipeline) = setup();
    set_data(&mut model, "<paragraph>foo</paragraph>").unwrap();

    model
        .change(|writer| {
            let root = writer.document().root();
            let paragraph = writer.document().children(root)[0];
            writer.set_attribute_on("alignment", json!("center"), paragraph)
        })
        .unwrap();
    assert_eq!(html(&pipeline), r#"<p style="text-align:center;">foo</p>"#);
}

#[test]
fn test_removed_elements_are_unbound() {
    let (mut model, pipeline) = setup();
    set_data(&mut model, "<paragraph>a</paragraph><paragraph>b</paragraph>").unwrap();
    assert_eq!(pipeline.borrow().mapper.len(), 3);

    model
        .change(|writer| {
            let root = writer.document().root();
            let first = writer.document().children(root)[0];
            writer.remove_node(first)
        })
        .unwrap();
    assert_eq!(html(&pipeline), "<p>b</p>");
    assert_eq!(pipeline.borrow().mapper.len(), 2);
}

#[test]
fn test_mapper_is_a_bijection_over_attached_elements() {
    let (mut model, pipeline) = setup();
    set_data(
        &mut model,
        r#"<paragraph>a</paragraph><paragraph><$text bold="true">b</$text></paragraph><paragraph>c</paragraph>"#,
    )
    .unwrap();
    model
        .change(|writer| {
            let root = writer.document().root();
            let second = writer.document().children(root)[1];
            writer.remove_node(second)?;
            writer.insert(
                vec![NodeSnapshot::element("paragraph").with_children(vec![NodeSnapshot::text("d")])],
                Position::new(root, 0),
            )
        })
        .unwrap();

    let pipeline = pipeline.borrow();
    let doc = model.document();
    for element in doc.descendants(doc.root()).into_iter().filter(|id| doc.is_element(*id)) {
        let view = pipeline.mapper.to_view_element(element).expect("attached element is bound");
        assert_eq!(pipeline.mapper.to_model_element(view), Some(element));
    }
    for (model_element, view_element) in pipeline.mapper.bindings() {
        assert_eq!(pipeline.mapper.to_view_element(model_element), Some(view_element));
        assert!(doc.is_attached(model_element));
    }
    assert_eq!(
        stringify_children(&pipeline.view, pipeline.view.root(), true),
        "<p>d</p><p>a</p><p>c</p>"
    );
}

#[test]
fn test_view_selection_maps_back() {
    let (mut model, pipeline) = setup();
    set_data(&mut model, r#"<paragraph>fo[o<$text bold="true">ba]r</$text></paragraph>"#).unwrap();

    let pipeline = pipeline.borrow();
    let range = model.document().selection().range();
    let view_range = pipeline.mapper.to_view_range(model.document(), &pipeline.view, &range).unwrap();
    let start = pipeline.mapper.to_model_position(model.document(), &pipeline.view, view_range.start);
    let end = pipeline.mapper.to_model_position(model.document(), &pipeline.view, view_range.end);
    assert_eq!(Range::new(start.unwrap(), end.unwrap()), range);
}

#[test]
fn test_consuming_twice_fails() {
    let mut consumable = Consumable::new();
    consumable.add("bold");
    assert_eq!(consumable.test(&"bold"), Some(true));
    assert!(consumable.consume(&"bold"));
    assert!(!consumable.consume(&"bold"));
    assert_eq!(consumable.test(&"bold"), Some(false));
    assert_eq!(consumable.test(&"italic"), None);
}

#[test]
fn test_html_round_trip() {
    let (mut model, _) = setup();
    let mut upcast = UpcastDispatcher::new();
    upcast_helpers::element_to_element(&mut upcast, ViewMatcher::element("p"), |_, _| {
        Some(NodeSnapshot::element("paragraph"))
    });
    upcast_helpers::element_to_attribute(&mut upcast, ViewMatcher::element("strong"), "bold", |_, _| {
        Some(json!(true))
    });

    let source = "<p>foo <strong>bar</strong></p><p>baz</p>";
    let view = parse_html(source).unwrap();
    let nodes = upcast.convert(&view, view.root(), model.schema(), ROOT_NAME).unwrap();
    model
        .change(move |writer| {
            let root = writer.document().root();
            writer.insert(nodes, Position::new(root, 0))
        })
        .unwrap();

    let mut data_view = View::new("$root");
    let mut mapper = Mapper::new();
    let doc = model.document();
    mapper.bind_elements(doc.root(), data_view.root()).unwrap();
    downcast()
        .convert_insert(doc, model.schema(), &doc.range_in(doc.root()), &mut data_view, &mut mapper)
        .unwrap();
    assert_eq!(stringify_children(&data_view, data_view.root(), false), source);
}

#[test]
fn test_unconverted_element_leaves_siblings_rendered() {
    let (mut model, pipeline) = setup();
    model
        .schema_mut()
        .register("widget", ItemDefinition::default().allowed_in(ROOT_NAME).object());
    set_data(
        &mut model,
        "<paragraph>a</paragraph><widget></widget><paragraph>b</paragraph>",
    )
    .unwrap();
    assert_eq!(html(&pipeline), "<p>a</p><p>b</p>");

    let root = model.document().root();
    let children = model.document().children(root).to_vec();
    model
        .change(|writer| writer.insert_text("c", Attributes::new(), Position::new(children[2], 1)))
        .unwrap();
    assert_eq!(html(&pipeline), "<p>a</p><p>bc</p>");

    model
        .change(|writer| {
            writer.insert(vec![NodeSnapshot::element("paragraph")], Position::new(root, 2))
        })
        .unwrap();
    assert_eq!(html(&pipeline), "<p>a</p><p></p><p>bc</p>");

    model.change(|writer| writer.remove_node(children[1])).unwrap();
    assert_eq!(html(&pipeline), "<p>a</p><p></p><p>bc</p>");

    model.change(|writer| writer.remove_node(children[2])).unwrap();
    assert_eq!(html(&pipeline), "<p>a</p><p></p>");
}

#[test]
fn test_removed_view_nodes_are_reused() {
    let (mut model, pipeline) = setup();
    set_data(&mut model, "<paragraph>foo[bar]</paragraph>").unwrap();
    let settled = pipeline.borrow().view.node_count();

    for _ in 0..5 {
        model
            .change(|writer| {
                let range = writer.document().selection().range();
                writer.set_attribute("bold", json!(true), range)
            })
            .unwrap();
        model
            .change(|writer| {
                let range = writer.document().selection().range();
                writer.remove_attribute("bold", range)
            })
            .unwrap();
    }
    assert_eq!(html(&pipeline), "<p>foobar</p>");
    assert_eq!(pipeline.borrow().view.node_count(), settled);
}
