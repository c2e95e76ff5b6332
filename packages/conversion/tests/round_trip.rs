use folio_common::Priority;
use folio_conversion::{
    AttributeToAttribute, AttributeToElement, Conversion, ConversionGroup, DowncastApi, DowncastData, ElementToElement,
    Mapper, MarkerToHighlight, ViewElementDefinition,
};
use folio_model::{
    DocumentFragment, Element, Model, Node, Position, Range, Schema, SchemaContext, SchemaItemDefinition, Text,
    FRAGMENT_ROOT_NAME,
};
use folio_view::{DowncastWriter, HtmlDataProcessor, ViewDocument, ViewFragment};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

fn schema() -> Schema {
    let mut schema = Schema::new();
    schema
        .register("paragraph", SchemaItemDefinition::default().inherit_all_from("$block"))
        .expect("Failed to register paragraph");
    schema
        .register(
            "heading",
            SchemaItemDefinition::default()
                .inherit_all_from("$block")
                .allow_attributes("level"),
        )
        .expect("Failed to register heading");
    schema
        .extend("$text", SchemaItemDefinition::default().allow_attributes("bold"))
        .expect("Failed to extend text");
    schema
}

fn conversion() -> Conversion {
    let mut conversion = Conversion::new();
    conversion.element_to_element(ElementToElement::new("paragraph", "p"));
    conversion.element_to_element(ElementToElement::new("heading", "h2"));
    conversion.attribute_to_attribute(AttributeToAttribute::new("level", "data-level").on_elements("heading", "h2"));
    conversion.attribute_to_element(AttributeToElement::new("bold", "strong"));
    conversion.marker_to_highlight(MarkerToHighlight::new(
        "comment",
        ViewElementDefinition::new("span").with_class("comment"),
    ));
    conversion
}

fn model() -> Model {
    let mut model = Model::new();
    *model.schema_mut() = schema();
    model
}

struct DataView {
    view: ViewDocument,
    mapper: Mapper,
}

impl DataView {
    fn new() -> Self {
        let mut view = ViewDocument::new();
        view.create_root("main", "div").expect("Failed to create view root");
        let mut mapper = Mapper::new();
        mapper.bind_roots("main", "main");
        Self { view, mapper }
    }

    fn convert(&mut self, model: &mut Model, conversion: &Conversion) {
        for change_set in model.take_change_sets() {
            let mut writer = DowncastWriter::new(&mut self.view);
            let mut api = DowncastApi::new(model.document(), &mut writer, &mut self.mapper);
            conversion
                .data_downcast()
                .convert_changes(&change_set, &mut api)
                .expect("Failed to downcast");
        }
    }

    fn html(&self) -> String {
        let root = self.view.get_root("main").expect("Expected the main root");
        HtmlDataProcessor::new().to_data(&ViewFragment::from_nodes(root.children().to_vec()))
    }
}

fn to_data(model: &mut Model, conversion: &Conversion) -> String {
    let mut data_view = DataView::new();
    data_view.convert(model, conversion);
    data_view.html()
}

fn to_model(html: &str, conversion: &Conversion) -> DocumentFragment {
    let view = HtmlDataProcessor::new().to_view(html).expect("Failed to parse");
    conversion
        .upcast()
        .convert(&view, &schema(), SchemaContext::new(["$root"]))
        .expect("Failed to upcast")
}

fn insert(model: &mut Model, nodes: Vec<Node>) {
    model
        .change(|writer| writer.insert(nodes, &Position::at("main", &[], 0)))
        .expect("Failed to change")
        .expect("Failed to insert");
}

fn main_children(model: &Model) -> Vec<Node> {
    model
        .document()
        .get_root("main")
        .expect("Expected the main root")
        .children()
        .to_vec()
}

#[test]
fn test_plain_text_round_trip() {
    let conversion = conversion();
    let mut model = model();
    insert(
        &mut model,
        vec![
            Element::new("paragraph").with_text("Hello").into(),
            Element::new("paragraph").with_text("world").into(),
        ],
    );

    let html = to_data(&mut model, &conversion);
    assert_eq!(html, "<p>Hello</p><p>world</p>");
    assert_eq!(to_model(&html, &conversion).children(), main_children(&model).as_slice());
}

#[test]
fn test_attribute_bearing_element_round_trip() {
    let conversion = conversion();
    let mut model = model();
    insert(
        &mut model,
        vec![Element::new("heading")
            .with_attribute("level", "2")
            .with_children(vec![Node::from("Big "), Text::new("news").with_attribute("bold", true).into()])
            .into()],
    );

    let html = to_data(&mut model, &conversion);
    assert_eq!(html, "<h2 data-level=\"2\">Big <strong>news</strong></h2>");
    assert_eq!(to_model(&html, &conversion).children(), main_children(&model).as_slice());
}

#[test]
fn test_marker_highlight_round_trip() {
    let conversion = conversion();
    let mut model = model();
    insert(&mut model, vec![Element::new("paragraph").with_text("foobar").into()]);
    model
        .change(|writer| {
            let range = Range::new(Position::at("main", &[0], 1), Position::at("main", &[0], 4))?;
            writer.add_marker("comment:1", range, true, false)
        })
        .expect("Failed to change")
        .expect("Failed to add marker");

    let html = to_data(&mut model, &conversion);
    assert_eq!(
        html,
        "<p>f<span class=\"comment\" data-marker=\"comment:1\">oob</span>ar</p>"
    );

    let fragment = to_model(&html, &conversion);
    assert_eq!(fragment.children(), main_children(&model).as_slice());
    let range = fragment.markers().get("comment:1").expect("Expected the comment marker");
    assert_eq!(range.start(), &Position::at(FRAGMENT_ROOT_NAME, &[0], 1));
    assert_eq!(range.end(), &Position::at(FRAGMENT_ROOT_NAME, &[0], 4));
}

#[test]
fn test_marker_highlight_across_paragraphs_round_trip() {
    let conversion = conversion();
    let mut model = model();
    insert(
        &mut model,
        vec![
            Element::new("paragraph").with_text("abc").into(),
            Element::new("paragraph").with_text("def").into(),
        ],
    );
    model
        .change(|writer| {
            let range = Range::new(Position::at("main", &[0], 1), Position::at("main", &[1], 2))?;
            writer.add_marker("comment:1", range, true, false)
        })
        .expect("Failed to change")
        .expect("Failed to add marker");

    let html = to_data(&mut model, &conversion);
    assert_eq!(
        html,
        "<p>a<span class=\"comment\" data-marker=\"comment:1\">bc</span></p>\
         <p><span class=\"comment\" data-marker=\"comment:1\">de</span>f</p>"
    );

    let fragment = to_model(&html, &conversion);
    assert_eq!(fragment.children(), main_children(&model).as_slice());
    let range = fragment.markers().get("comment:1").expect("Expected the comment marker");
    assert_eq!(range.start(), &Position::at(FRAGMENT_ROOT_NAME, &[0], 1));
    assert_eq!(range.end(), &Position::at(FRAGMENT_ROOT_NAME, &[1], 2));
}

#[test]
fn test_incremental_changes_keep_view_in_step() {
    let conversion = conversion();
    let mut model = model();
    let mut data_view = DataView::new();

    insert(
        &mut model,
        vec![
            Element::new("paragraph").with_text("one").into(),
            Element::new("paragraph").with_text("two").into(),
        ],
    );
    data_view.convert(&mut model, &conversion);
    assert_eq!(data_view.html(), "<p>one</p><p>two</p>");

    model
        .change(|writer| {
            let range = Range::new(Position::at("main", &[], 0), Position::at("main", &[], 1))?;
            writer.remove(&range)
        })
        .expect("Failed to change")
        .expect("Failed to remove");
    data_view.convert(&mut model, &conversion);
    assert_eq!(data_view.html(), "<p>two</p>");

    model
        .change(|writer| writer.insert_text(" more", Default::default(), &Position::at("main", &[0], 3)))
        .expect("Failed to change")
        .expect("Failed to insert text");
    data_view.convert(&mut model, &conversion);
    assert_eq!(data_view.html(), "<p>two more</p>");
}

#[test]
fn test_converters_run_in_priority_order() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let mut conversion = conversion();
    for (label, priority) in [("low", Priority::Low), ("highest", Priority::Highest), ("high", Priority::High)] {
        let calls = Rc::clone(&calls);
        conversion.for_group(ConversionGroup::DataDowncast).add(move |dispatcher| {
            let calls = Rc::clone(&calls);
            dispatcher.on("insert:paragraph", priority, move |_, data, api| {
                if let DowncastData::Insert { item, range } = data {
                    let available = api.consumable.test(&item.consumable_item(range), "insert") == Some(true);
                    calls.borrow_mut().push((label, available));
                }
                Ok(())
            });
        });
    }

    let mut model = model();
    insert(&mut model, vec![Element::new("paragraph").with_text("x").into()]);
    let html = to_data(&mut model, &conversion);

    // The paragraph converter runs at normal priority, between high and low
    assert_eq!(
        *calls.borrow(),
        vec![("highest", true), ("high", true), ("low", false)]
    );
    assert_eq!(html, "<p>x</p>");
}
