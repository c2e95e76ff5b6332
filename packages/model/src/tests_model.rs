//! Positions, ranges and change blocks working together.

use crate::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

fn list_tree() -> BTreeMap<String, Element> {
    let mut roots = BTreeMap::new();
    roots.insert(
        "main".to_string(),
        Element::new("$root").with_child(Element::new("paragraph")).with_child(
            Element::new("ul")
                .with_child(Element::new("li").with_text("foz"))
                .with_child(Element::new("li").with_text("bar")),
        ),
    );
    roots
}

fn pos(path: &[usize]) -> Position {
    Position::new("main", path.to_vec()).expect("Failed to create position")
}

fn range(start: &[usize], end: &[usize]) -> Range {
    Range::new(pos(start), pos(end)).expect("Failed to create range")
}

fn model_with(children: Vec<Node>) -> Model {
    let mut model = Model::new();
    model
        .schema_mut()
        .register("paragraph", SchemaItemDefinition::default().inherit_all_from("$block"))
        .expect("Failed to register paragraph");
    model
        .change(|writer| writer.insert(children, &Position::at_start("main", &[])))
        .expect("Failed to run change")
        .expect("Failed to insert content");
    model.take_change_sets();
    model
}

fn paragraphs(texts: &[&str]) -> Vec<Node> {
    texts
        .iter()
        .map(|text| Node::from(Element::new("paragraph").with_text(text)))
        .collect()
}

fn main_texts(model: &Model) -> Vec<String> {
    model
        .document()
        .get_root("main")
        .map(|root| root.children().iter().map(|child| match child {
            Node::Element(element) => element.text_content(),
            Node::Text(text) => text.data().to_string(),
        }).collect())
        .unwrap_or_default()
}

// Positions

#[test]
fn test_main_root_document() {
    let mut document = Document::with_main_root();
    let names: Vec<&str> = document.root_names().collect();
    assert_eq!(names, vec![DEFAULT_ROOT_NAME]);
    assert!(document.get_root(GRAVEYARD_ROOT_NAME).is_some_and(Element::is_empty));
    assert_eq!(document.get_root(DEFAULT_ROOT_NAME).map(Element::name), Some("$root"));
    assert!(matches!(
        document.create_root("$root", DEFAULT_ROOT_NAME),
        Err(ModelError::RootExists(_))
    ));
}

#[test]
fn test_before_and_after_meet_between_siblings() {
    let roots = list_tree();
    let before_second = Position::before(&roots, "main", &[1, 1]).expect("Failed to create position");
    let after_first = Position::after(&roots, "main", &[1, 0]).expect("Failed to create position");

    assert_eq!(before_second.path(), &[1, 1]);
    assert_eq!(after_first.path(), &[1, 1]);
    assert_eq!(before_second, after_first);
}

#[test]
fn test_no_position_around_root() {
    let roots = list_tree();
    assert_eq!(
        Position::before(&roots, "main", &[]),
        Err(ModelError::Position(PositionError::BeforeRoot))
    );
    assert_eq!(
        Position::after(&roots, "main", &[]),
        Err(ModelError::Position(PositionError::AfterRoot))
    );
    assert_eq!(
        Position::new("main", Vec::new()),
        Err(ModelError::Position(PositionError::EmptyPath))
    );
}

#[test]
fn test_insertion_before_position_shifts_offset() {
    let transformed = pos(&[1, 2, 3]).get_transformed_by_insertion(&pos(&[1, 2, 2]), 2, false);
    assert_eq!(transformed.offset(), 5);
}

#[test]
fn test_insertion_tie_depends_on_insert_before() {
    let position = pos(&[0, 2]);
    assert_eq!(position.get_transformed_by_insertion(&pos(&[0, 2]), 3, false).offset(), 2);
    assert_eq!(position.get_transformed_by_insertion(&pos(&[0, 2]), 3, true).offset(), 5);
}

#[test]
fn test_deletion_around_position_removes_it() {
    assert_eq!(pos(&[1, 2, 4]).get_transformed_by_deletion(&pos(&[1, 2, 3]), 5), None);
    assert_eq!(
        pos(&[1, 2, 9]).get_transformed_by_deletion(&pos(&[1, 2, 3]), 5),
        Some(pos(&[1, 2, 4]))
    );
}

#[test]
fn test_move_end_boundary_follows_only_when_sticky() {
    let end_of_moved = pos(&[0, 3]);
    let source = pos(&[0, 1]);
    let target = pos(&[1, 0]);

    assert_eq!(end_of_moved.get_transformed_by_move(&source, &target, 2, false), pos(&[0, 1]));
    assert_eq!(end_of_moved.get_transformed_by_move(&source, &target, 2, true), pos(&[1, 2]));
}

#[test]
fn test_positions_in_different_roots_are_incomparable() {
    let other = Position::new("sidebar", vec![0]).expect("Failed to create position");
    assert_eq!(pos(&[0]).compare_with(&other), PositionRelation::Different);
    assert_eq!(pos(&[0]).compare_with(&pos(&[0, 1])), PositionRelation::Before);
    assert_eq!(pos(&[1]).compare_with(&pos(&[0, 1])), PositionRelation::After);
}

#[test]
fn test_end_of_element_touches_position_after_it() {
    let roots = list_tree();
    let end_of_first_item = pos(&[1, 0, 3]);
    let between_items = pos(&[1, 1]);
    let start_of_second_item = pos(&[1, 1, 0]);

    assert_eq!(end_of_first_item.is_touching(&between_items, &roots), Ok(true));
    assert_eq!(between_items.is_touching(&start_of_second_item, &roots), Ok(true));
    assert_eq!(pos(&[1, 0, 2]).is_touching(&between_items, &roots), Ok(false));
}

#[test]
fn test_position_json() {
    assert_eq!(
        Position::new("root", vec![0]).expect("Failed to create position").to_json(),
        json!({ "root": "root", "path": [0] })
    );
    assert_eq!(
        Position::at(GRAVEYARD_ROOT_NAME, &[], 2).to_json(),
        json!({ "root": "$$graveyard", "path": [2] })
    );
    assert_eq!(
        Position::from_json(json!({ "root": "nope", "path": [0] }), &list_tree()),
        Err(ModelError::NoSuchRoot("nope".to_string()))
    );
}

// Ranges

#[test]
fn test_range_difference_and_intersection() {
    let outer = range(&[0, 0], &[0, 6]);
    let inner = range(&[0, 2], &[0, 4]);

    assert_eq!(outer.get_difference(&inner), vec![range(&[0, 0], &[0, 2]), range(&[0, 4], &[0, 6])]);
    assert_eq!(outer.get_intersection(&inner), Some(inner.clone()));
    assert!(outer.contains_range(&inner, false));
    assert!(!range(&[0, 0], &[0, 2]).is_intersecting(&inner));
}

#[test]
fn test_minimal_flat_ranges_of_cross_element_range() {
    let roots = list_tree();
    let across = range(&[1, 0, 1], &[1, 1, 2]);
    let flat = across.get_minimal_flat_ranges(&roots).expect("Failed to get flat ranges");

    assert_eq!(
        flat,
        vec![range(&[1, 0, 1], &[1, 0, 3]), range(&[1, 1, 0], &[1, 1, 2])]
    );
}

#[test]
fn test_range_cannot_be_reversed() {
    assert_eq!(Range::new(pos(&[0, 3]), pos(&[0, 1])), Err(ModelError::InvalidRange));
}

// Change blocks

#[test]
fn test_change_block_produces_one_change_set() {
    let mut model = model_with(Vec::new());
    model
        .change(|writer| {
            let start = Position::at_start("main", &[]);
            writer.insert_element("paragraph", Attributes::new(), &start)?;
            writer.insert_text("foo", Attributes::new(), &start.child(0))
        })
        .expect("Failed to run change")
        .expect("Failed to write");

    let change_sets = model.take_change_sets();
    assert_eq!(change_sets.len(), 1);
    let changes = &change_sets[0].changes;
    assert_eq!(changes.len(), 1);
    assert!(matches!(&changes[0], DiffItem::Insert { name, length: 1, .. } if name == "paragraph"));
    assert!(change_sets[0].has_data_changes);
    assert_eq!(change_sets[0].batches.len(), 1);
    assert_eq!(change_sets[0].batches[0].operations().len(), 2);
}

#[test]
fn test_insert_then_remove_leaves_no_changes() {
    let mut model = model_with(paragraphs(&["foo"]));
    model
        .change(|writer| {
            writer.insert_text("x", Attributes::new(), &Position::at("main", &[0], 1))?;
            writer.remove(&Range::from_position_and_shift(&Position::at("main", &[0], 1), 1))
        })
        .expect("Failed to run change")
        .expect("Failed to write");

    let change_sets = model.take_change_sets();
    assert!(change_sets[0].changes.is_empty());
    assert!(!change_sets[0].has_data_changes);
    assert_eq!(main_texts(&model), vec!["foo"]);
}

#[test]
fn test_marker_collapses_when_its_content_is_removed() {
    let mut model = model_with(paragraphs(&["foo"]));
    model
        .change(|writer| writer.add_marker("comment:1", range(&[0, 1], &[0, 2]), true, true))
        .expect("Failed to run change")
        .expect("Failed to add marker");
    model.take_change_sets();

    model
        .change(|writer| writer.remove(&range(&[0, 0], &[0, 3])))
        .expect("Failed to run change")
        .expect("Failed to remove");

    let marker = model.document().markers().get("comment:1").expect("Marker should survive");
    assert!(marker.range().is_collapsed());
    assert_eq!(marker.range().start(), &pos(&[0, 0]));

    let change_set = &model.take_change_sets()[0];
    assert_eq!(change_set.marker_changes.len(), 1);
    assert_eq!(change_set.markers_to_add, vec![("comment:1".to_string(), range(&[0, 0], &[0, 0]))]);
}

#[test]
fn test_adding_existing_marker_fails() {
    let mut model = model_with(paragraphs(&["foo"]));
    let result = model
        .change(|writer| {
            writer.add_marker("m", range(&[0, 0], &[0, 1]), false, false)?;
            writer.add_marker("m", range(&[0, 1], &[0, 2]), false, false)
        })
        .expect("Failed to run change");
    assert_eq!(result, Err(ModelError::MarkerExists("m".to_string())));
}

#[test]
fn test_post_fixers_run_until_nothing_changes() {
    let mut model = model_with(paragraphs(&["foo"]));
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    model.register_post_fixer(move |writer| {
        counter.set(counter.get() + 1);
        let empty = writer.document().get_root("main").is_some_and(Element::is_empty);
        if empty {
            writer.insert_element("paragraph", Attributes::new(), &Position::at_start("main", &[]))?;
        }
        Ok(empty)
    });

    model
        .change(|writer| writer.remove(&range(&[0], &[1])))
        .expect("Failed to run change")
        .expect("Failed to remove");

    assert_eq!(calls.get(), 2);
    assert_eq!(main_texts(&model), vec![""]);
    let change_set = &model.take_change_sets()[0];
    assert_eq!(change_set.batches.len(), 1);
    assert_eq!(change_set.batches[0].operations().len(), 2);
}

#[test]
fn test_enqueued_change_runs_after_callback() {
    let mut model = model_with(paragraphs(&[""]));
    model
        .change(|writer| {
            writer.enqueue_change(BatchKind::Default, |writer| {
                writer.insert_text("b", Attributes::new(), &Position::at("main", &[0], 0))
            });
            writer.insert_text("a", Attributes::new(), &Position::at("main", &[0], 0))
        })
        .expect("Failed to run change")
        .expect("Failed to write");

    assert_eq!(main_texts(&model), vec!["ba"]);
    assert_eq!(model.take_change_sets()[0].batches.len(), 2);
}

#[test]
fn test_selection_is_moved_into_text() {
    let mut model = model_with(paragraphs(&["foo"]));
    model
        .change(|writer| writer.set_selection_at(Position::at_start("main", &[])))
        .expect("Failed to run change")
        .expect("Failed to set selection");

    let selection = model.document().selection();
    assert_eq!(selection.first_range().map(|range| range.start().clone()), Some(pos(&[0, 0])));
}

#[test]
fn test_set_attribute_skips_nodes_that_already_have_it() {
    let mut model = model_with(vec![Node::from(
        Element::new("paragraph")
            .with_child(Text::new("ab").with_attribute("bold", true))
            .with_child(Text::new("cd")),
    )]);
    model
        .change(|writer| writer.set_attribute("bold", json!(true), &range(&[0, 0], &[0, 4])))
        .expect("Failed to run change")
        .expect("Failed to set attribute");

    let change_set = &model.take_change_sets()[0];
    assert_eq!(change_set.batches[0].operations().len(), 1);
    let paragraph = model.document().element_at("main", &[0]).expect("Paragraph should exist");
    assert_eq!(paragraph.child_count(), 1);
}

#[test]
fn test_wrap_then_unwrap_restores_content() {
    let mut model = model_with(paragraphs(&["foo", "bar"]));
    model
        .change(|writer| writer.wrap(&range(&[0], &[2]), Element::new("blockQuote")))
        .expect("Failed to run change")
        .expect("Failed to wrap");
    let root = model.document().get_root("main").expect("Root should exist");
    assert_eq!(root.child_count(), 1);
    assert_eq!(root.get_child(0).map(Node::schema_name), Some("blockQuote"));

    model
        .change(|writer| writer.unwrap("main", &[0]))
        .expect("Failed to run change")
        .expect("Failed to unwrap");
    assert_eq!(main_texts(&model), vec!["foo", "bar"]);
    assert_eq!(model.document().graveyard().child_count(), 1);
}

#[test]
fn test_split_then_merge() {
    let mut model = model_with(paragraphs(&["foo"]));
    let between = model
        .change(|writer| writer.split(&pos(&[0, 1])))
        .expect("Failed to run change")
        .expect("Failed to split");
    assert_eq!(between, pos(&[1]));
    assert_eq!(main_texts(&model), vec!["f", "oo"]);

    model
        .change(|writer| writer.merge(&between))
        .expect("Failed to run change")
        .expect("Failed to merge");
    assert_eq!(main_texts(&model), vec!["foo"]);
}

#[test]
fn test_fragment_markers_land_in_document() {
    let mut model = model_with(Vec::new());
    let mut fragment = DocumentFragment::from_nodes(paragraphs(&["foo"]));
    let marker_range = Range::new(
        Position::at(FRAGMENT_ROOT_NAME, &[0], 1),
        Position::at(FRAGMENT_ROOT_NAME, &[0], 2),
    )
    .expect("Failed to create range");
    fragment.set_marker("highlight", marker_range);

    model
        .change(|writer| writer.insert_fragment(fragment, &Position::at_start("main", &[])))
        .expect("Failed to run change")
        .expect("Failed to insert fragment");

    let marker = model.document().markers().get("highlight").expect("Marker should exist");
    assert_eq!(marker.range(), &range(&[0, 1], &[0, 2]));
}

#[test]
fn test_operation_with_stale_version_is_rejected() {
    let mut model = model_with(paragraphs(&["foo"]));
    let stale = Operation::Insert(InsertOperation::new(pos(&[0, 0]), vec![Node::from("x")])).with_base_version(0);
    let result = model
        .change(|writer| writer.apply_operation(stale))
        .expect("Failed to run change");
    assert!(matches!(result, Err(ModelError::OperationVersion { actual: 0, .. })));
    assert_eq!(main_texts(&model), vec!["foo"]);
}

#[test]
fn test_history_records_every_operation() {
    let model = model_with(paragraphs(&["foo", "bar"]));
    let history = model.document().history();
    assert_eq!(history.version(), model.document().version());
    assert_eq!(history.last_operation().map(Operation::type_name), Some("insert"));
}
