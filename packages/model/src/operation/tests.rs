use super::*;
use crate::document::GRAVEYARD_ROOT_NAME;
use crate::node::Text;
use pretty_assertions::assert_eq;
use serde_json::json;

fn tree() -> Roots {
    let mut roots = BTreeMap::new();
    roots.insert(
        "main".to_string(),
        Element::new("$root")
            .with_child(Element::new("paragraph").with_text("foo"))
            .with_child(Element::new("paragraph").with_text("bar")),
    );
    roots.insert(GRAVEYARD_ROOT_NAME.to_string(), Element::new("$graveyard"));
    roots
}

fn pos(path: &[usize]) -> Position {
    Position::new("main", path.to_vec()).expect("Failed to create position")
}

fn apply(roots: &mut Roots, op: &Operation) {
    op.validate(roots).expect("Operation should be valid");
    op.execute(roots).expect("Failed to execute operation");
}

/// Execute `op`, then its reverse, and check the main root is unchanged
fn assert_reversible(op: Operation) {
    let mut roots = tree();
    let original = roots["main"].clone();
    apply(&mut roots, &op);
    assert_ne!(roots["main"], original, "{} should change the tree", op.type_name());
    apply(&mut roots, &op.get_reversed());
    assert_eq!(roots["main"], original);
}

/// Apply `a` then `b'`, and `b` then `a'`, and compare the main roots
fn assert_converges(a: Operation, b: Operation) -> Element {
    let a_after_b = transform(&a, &b, &TransformContext::strong());
    let b_after_a = transform(&b, &a, &TransformContext::weak());

    let mut left = tree();
    apply(&mut left, &a);
    for op in &b_after_a {
        apply(&mut left, op);
    }

    let mut right = tree();
    apply(&mut right, &b);
    for op in &a_after_b {
        apply(&mut right, op);
    }

    assert_eq!(left["main"], right["main"]);
    left["main"].clone()
}

fn insert_text(path: &[usize], data: &str) -> Operation {
    Operation::Insert(InsertOperation::new(pos(path), vec![Node::Text(Text::new(data))]))
}

#[test]
fn test_insert_is_reversible() {
    assert_reversible(insert_text(&[0, 1], "xy"));
}

#[test]
fn test_move_is_reversible() {
    assert_reversible(Operation::Move(MoveOperation::new(pos(&[1]), 1, pos(&[0]))));
}

#[test]
fn test_attribute_is_reversible() {
    let range = Range::new(pos(&[0, 1]), pos(&[0, 3])).expect("Failed to create range");
    assert_reversible(Operation::Attribute(AttributeOperation::new(range, "bold", None, Some(json!(true)))));
}

#[test]
fn test_rename_is_reversible() {
    assert_reversible(Operation::Rename(RenameOperation::new(pos(&[1]), "paragraph", "heading")));
}

#[test]
fn test_split_is_reversible() {
    assert_reversible(Operation::Split(SplitOperation::new(pos(&[0, 1]), 2, None)));
}

#[test]
fn test_merge_is_reversible() {
    let merge = MergeOperation::new(pos(&[1, 0]), 3, pos(&[0, 3]), graveyard_start());
    let mut roots = tree();
    let original = roots["main"].clone();
    apply(&mut roots, &Operation::Merge(merge.clone()));

    assert_eq!(roots["main"].child_count(), 1);
    assert_eq!(roots["main"].text_content(), "foobar");
    assert_eq!(roots[GRAVEYARD_ROOT_NAME].child_count(), 1);

    apply(&mut roots, &Operation::Merge(merge).get_reversed());
    assert_eq!(roots["main"], original);
    assert!(roots[GRAVEYARD_ROOT_NAME].is_empty());
}

#[test]
fn test_reversed_operation_follows_base_version() {
    let op = insert_text(&[0, 0], "x").with_base_version(4);
    assert_eq!(op.get_reversed().base_version(), Some(5));
    assert_eq!(op.get_reversed().type_name(), "remove");
}

#[test]
fn test_move_into_itself_is_rejected() {
    let op = Operation::Move(MoveOperation::new(pos(&[0]), 1, pos(&[0, 1])));
    assert!(matches!(op.validate(&tree()), Err(ModelError::InvalidOperation(_))));
}

#[test]
fn test_rename_checks_old_name() {
    let op = Operation::Rename(RenameOperation::new(pos(&[0]), "heading", "paragraph"));
    assert!(op.validate(&tree()).is_err());
}

#[test]
fn test_split_checks_how_many() {
    let op = Operation::Split(SplitOperation::new(pos(&[0, 1]), 5, None));
    assert!(op.validate(&tree()).is_err());
}

#[test]
fn test_type_names() {
    let remove = Operation::Move(MoveOperation::remove(pos(&[0]), 1));
    let reinsert = Operation::Move(MoveOperation::new(graveyard_start(), 1, pos(&[0])));
    assert_eq!(remove.type_name(), "remove");
    assert_eq!(reinsert.type_name(), "reinsert");
    assert_eq!(Operation::no_op(None).type_name(), "noop");
}

#[test]
fn test_json_uses_type_tag() {
    let json = insert_text(&[0, 0], "x").to_json().expect("Failed to serialize");
    assert_eq!(json["type"], "insert");
    assert_eq!(json["position"]["root"], "main");

    let parsed = Operation::from_json(json, &tree()).expect("Failed to deserialize");
    assert_eq!(parsed, insert_text(&[0, 0], "x"));
}

#[test]
fn test_json_with_unknown_root_fails() {
    let json = json!({
        "type": "insert",
        "position": { "root": "sidebar", "path": [0] },
        "nodes": []
    });
    assert!(matches!(
        Operation::from_json(json, &tree()),
        Err(ModelError::NoSuchRoot(root)) if root == "sidebar"
    ));
}

#[test]
fn test_insert_tie_is_broken_by_strength() {
    let a = insert_text(&[0, 1], "x");
    let b = insert_text(&[0, 1], "y");

    let strong = transform(&a, &b, &TransformContext::strong());
    let weak = transform(&a, &b, &TransformContext::weak());
    assert!(matches!(&strong[..], [Operation::Insert(op)] if op.position == pos(&[0, 1])));
    assert!(matches!(&weak[..], [Operation::Insert(op)] if op.position == pos(&[0, 2])));

    assert_eq!(assert_converges(a, b).text_content(), "fxyoobar");
}

#[test]
fn test_insert_into_removed_content_goes_to_graveyard() {
    let insert = insert_text(&[0, 2], "x");
    let remove = Operation::Move(MoveOperation::remove(pos(&[0, 1]), 2));

    let transformed = transform(&insert, &remove, &TransformContext::strong());
    match &transformed[..] {
        [Operation::Insert(op)] => assert_eq!(op.position.root_name(), GRAVEYARD_ROOT_NAME),
        other => panic!("Unexpected transformation result: {other:?}"),
    }
    assert_converges(insert, remove);
}

#[test]
fn test_overlapping_attributes() {
    let a = Operation::Attribute(AttributeOperation::new(
        Range::new(pos(&[0, 0]), pos(&[0, 3])).expect("Failed to create range"),
        "bold",
        None,
        Some(json!(true)),
    ));
    let b = Operation::Attribute(AttributeOperation::new(
        Range::new(pos(&[0, 1]), pos(&[0, 2])).expect("Failed to create range"),
        "bold",
        None,
        Some(json!(false)),
    ));

    assert_eq!(transform(&a, &b, &TransformContext::strong()).len(), 3);
    assert_eq!(transform(&a, &b, &TransformContext::weak()).len(), 2);

    let root = assert_converges(a, b);
    let paragraph = root.get_child(0).and_then(Node::as_element).expect("Paragraph should exist");
    assert_eq!(paragraph.child_count(), 1);
    assert_eq!(paragraph.children()[0].get_attribute("bold"), Some(&json!(true)));
}

#[test]
fn test_insert_at_split_position_stays_in_first_half() {
    let split = Operation::Split(SplitOperation::new(pos(&[0, 1]), 2, None));
    let insert = insert_text(&[0, 1], "x");

    let root = assert_converges(split, insert);
    let texts: Vec<String> = root
        .children()
        .iter()
        .filter_map(Node::as_element)
        .map(Element::text_content)
        .collect();
    assert_eq!(texts, vec!["fx", "oo", "bar"]);
}

#[test]
fn test_rename_follows_split_element() {
    let rename = Operation::Rename(RenameOperation::new(pos(&[0]), "paragraph", "heading"));
    let split = Operation::Split(SplitOperation::new(pos(&[0, 1]), 2, None));

    let root = assert_converges(rename, split);
    let names: Vec<&str> = root.children().iter().filter_map(Node::as_element).map(Element::name).collect();
    assert_eq!(names, vec!["heading", "heading", "paragraph"]);
}

#[test]
fn test_insert_into_merged_element_moves_with_content() {
    let merge = Operation::Merge(MergeOperation::new(pos(&[1, 0]), 3, pos(&[0, 3]), graveyard_start()));
    let insert = insert_text(&[1, 1], "x");

    let root = assert_converges(merge, insert);
    assert_eq!(root.child_count(), 1);
    assert_eq!(root.text_content(), "foobxar");
}

#[test]
fn test_same_rename_twice_keeps_strong_name() {
    let a = Operation::Rename(RenameOperation::new(pos(&[0]), "paragraph", "heading"));
    let b = Operation::Rename(RenameOperation::new(pos(&[0]), "paragraph", "quote"));

    let root = assert_converges(a, b);
    assert_eq!(root.get_child(0).map(Node::schema_name), Some("heading"));
}

#[test]
fn test_move_into_removed_content_is_removed_with_it() {
    let moved = Operation::Move(MoveOperation::new(pos(&[0, 0]), 1, pos(&[1, 1])));
    let remove = Operation::Move(MoveOperation::remove(pos(&[1, 0]), 2));

    assert_eq!(assert_converges(moved.clone(), remove.clone()).text_content(), "oor");
    assert_eq!(assert_converges(remove, moved).text_content(), "oor");
}

#[test]
fn test_move_into_moved_content_travels_with_it() {
    let moved = Operation::Move(MoveOperation::new(pos(&[0, 1]), 1, pos(&[1, 2])));
    let carried = Operation::Move(MoveOperation::new(pos(&[1, 0]), 3, pos(&[0, 0])));

    let root = assert_converges(moved.clone(), carried.clone());
    assert_eq!(root.get_child(0).and_then(Node::as_element).map(Element::text_content), Some("baorfo".to_string()));
    assert_eq!(root.get_child(1).and_then(Node::as_element).map(Element::child_count), Some(0));
    assert_eq!(assert_converges(carried, moved), root);
}

#[test]
fn test_transform_sets_renumbers_versions() {
    let a = vec![insert_text(&[0, 0], "a").with_base_version(3)];
    let b = vec![
        insert_text(&[1, 0], "b").with_base_version(3),
        insert_text(&[1, 0], "c").with_base_version(4),
    ];

    let sets = transform_sets(&a, &b, true);
    assert_eq!(sets.operations_a[0].base_version(), Some(5));
    assert_eq!(sets.operations_b[0].base_version(), Some(4));
    assert_eq!(sets.operations_b[1].base_version(), Some(5));
}
