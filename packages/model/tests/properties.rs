//! Property tests for positions, operations and the differ.

use folio_model::{
    graveyard_start, transform, AttributeOperation, Attributes, Element, InsertOperation, MarkerOperation,
    MergeOperation, Model, MoveOperation, Node, Operation, Position, Range, RenameOperation, SplitOperation,
    TransformContext,
};
use proptest::prelude::*;
use serde_json::json;

fn model_with(texts: &[String]) -> Model {
    let mut model = Model::new();
    let paragraphs: Vec<Node> = texts
        .iter()
        .map(|text| Node::from(Element::new("paragraph").with_text(text)))
        .collect();
    model
        .change(|writer| writer.insert(paragraphs, &Position::at_start("main", &[])))
        .expect("Failed to run change")
        .expect("Failed to insert paragraphs");
    model.take_change_sets();
    model
}

fn apply(model: &mut Model, ops: &[Operation]) {
    for op in ops {
        model
            .change(|writer| writer.apply_operation(op.clone()))
            .expect("Failed to run change")
            .expect("Failed to apply operation");
    }
}

fn main_root(model: &Model) -> Element {
    model.document().get_root("main").cloned().expect("Main root should exist")
}

fn markers(model: &Model) -> Vec<(String, Range)> {
    model
        .document()
        .markers()
        .iter()
        .map(|marker| (marker.name().to_string(), marker.range().clone()))
        .collect()
}

fn flat(paragraph: usize, start: usize, end: usize) -> Range {
    Range::new(Position::at("main", &[paragraph], start), Position::at("main", &[paragraph], end))
        .expect("Failed to create range")
}

/// Raw choices turned into a valid operation for a given set of paragraphs
#[derive(Debug, Clone)]
struct OpSeed {
    kind: u8,
    paragraph: usize,
    x: usize,
    y: usize,
    text: String,
    flag: bool,
}

fn op_seed() -> impl Strategy<Value = OpSeed> {
    (0u8..8, 0usize..8, 0usize..16, 0usize..16, "[a-z]{1,3}", any::<bool>()).prop_map(
        |(kind, paragraph, x, y, text, flag)| OpSeed {
            kind,
            paragraph,
            x,
            y,
            text,
            flag,
        },
    )
}

fn texts() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,6}", 1..4)
}

impl OpSeed {
    fn build(&self, texts: &[String]) -> Operation {
        let paragraph = self.paragraph % texts.len();
        let len = texts[paragraph].chars().count();
        let start = self.x % len;
        let end = start + 1 + self.y % (len - start);
        let insert = || {
            Operation::Insert(InsertOperation::new(
                Position::at("main", &[paragraph], self.x % (len + 1)),
                vec![Node::from(self.text.as_str())],
            ))
        };

        match self.kind {
            0 => insert(),
            1 => Operation::Move(MoveOperation::remove(Position::at("main", &[paragraph], start), end - start)),
            2 => Operation::Attribute(AttributeOperation::new(
                flat(paragraph, start, end),
                "bold",
                None,
                Some(json!(self.flag)),
            )),
            3 => {
                let new_name = if self.flag { "heading" } else { "quote" };
                Operation::Rename(RenameOperation::new(
                    Position::at("main", &[], paragraph),
                    "paragraph",
                    new_name,
                ))
            }
            4 => {
                let name = if self.flag { "comment" } else { "search" };
                Operation::Marker(MarkerOperation::new(name, None, Some(flat(paragraph, start, end)), false))
            }
            5 => {
                let offset = self.x % (len + 1);
                Operation::Split(SplitOperation::new(
                    Position::at("main", &[paragraph], offset),
                    len - offset,
                    None,
                ))
            }
            6 if texts.len() > 1 => {
                let target = paragraph % (texts.len() - 1);
                let source_len = texts[target + 1].chars().count();
                let target_len = texts[target].chars().count();
                Operation::Merge(MergeOperation::new(
                    Position::at("main", &[target + 1], 0),
                    source_len,
                    Position::at("main", &[target], target_len),
                    graveyard_start(),
                ))
            }
            7 if texts.len() > 1 => {
                let other = (paragraph + 1 + self.y % (texts.len() - 1)) % texts.len();
                let other_len = texts[other].chars().count();
                Operation::Move(MoveOperation::new(
                    Position::at("main", &[paragraph], start),
                    end - start,
                    Position::at("main", &[other], (self.x + self.y) % (other_len + 1)),
                ))
            }
            _ => insert(),
        }
    }
}

proptest! {
    #[test]
    fn inserting_nothing_never_moves_a_position(
        path in prop::collection::vec(0usize..10, 1..5),
        insert_path in prop::collection::vec(0usize..10, 1..5),
        insert_before in any::<bool>(),
    ) {
        let position = Position::new("main", path).expect("Path is not empty");
        let insert = Position::new("main", insert_path).expect("Path is not empty");
        prop_assert_eq!(position.get_transformed_by_insertion(&insert, 0, insert_before), position);
    }

    #[test]
    fn operation_followed_by_its_reverse_restores_the_tree(texts in texts(), seed in op_seed()) {
        let mut model = model_with(&texts);
        let original = main_root(&model);
        let op = seed.build(&texts);

        apply(&mut model, &[op]);
        let applied = model
            .document()
            .history()
            .last_operation()
            .cloned()
            .expect("History should hold the operation");
        apply(&mut model, &[applied.get_reversed()]);

        prop_assert_eq!(main_root(&model), original);
        prop_assert!(markers(&model).is_empty());
    }

    #[test]
    fn concurrent_operations_converge(texts in texts(), seed_a in op_seed(), seed_b in op_seed()) {
        let a = seed_a.build(&texts);
        let b = seed_b.build(&texts);

        let mut left = model_with(&texts);
        apply(&mut left, &[a.clone()]);
        apply(&mut left, &transform(&b, &a, &TransformContext::weak()));

        let mut right = model_with(&texts);
        apply(&mut right, &[b.clone()]);
        apply(&mut right, &transform(&a, &b, &TransformContext::strong()));

        prop_assert_eq!(main_root(&left), main_root(&right));
        prop_assert_eq!(markers(&left), markers(&right));
    }

    #[test]
    fn insert_then_remove_in_one_block_is_not_a_change(
        texts in texts(),
        paragraph in 0usize..8,
        offset in 0usize..16,
        text in "[a-z]{1,4}",
    ) {
        let mut model = model_with(&texts);
        let paragraph = paragraph % texts.len();
        let position = Position::at("main", &[paragraph], offset % (texts[paragraph].len() + 1));
        let length = text.len();

        model
            .change(|writer| {
                writer.insert_text(&text, Attributes::new(), &position)?;
                writer.remove(&Range::from_position_and_shift(&position, length))
            })
            .expect("Failed to run change")
            .expect("Failed to write");

        let change_sets = model.take_change_sets();
        prop_assert_eq!(change_sets.len(), 1);
        prop_assert!(change_sets[0].changes.is_empty());
    }

    #[test]
    fn marker_collapses_when_its_content_is_removed(texts in texts(), seed in op_seed()) {
        let mut model = model_with(&texts);
        let paragraph = seed.paragraph % texts.len();
        let len = texts[paragraph].len();
        let start = seed.x % len;
        let end = start + 1 + seed.y % (len - start);

        model
            .change(|writer| writer.add_marker("comment", flat(paragraph, start, end), true, false))
            .expect("Failed to run change")
            .expect("Failed to add marker");
        model
            .change(|writer| writer.remove(&flat(paragraph, 0, len)))
            .expect("Failed to run change")
            .expect("Failed to remove");

        let marker = model.document().markers().get("comment").expect("Marker should survive");
        prop_assert!(marker.range().is_collapsed());
        prop_assert_eq!(marker.range().start(), &Position::at("main", &[paragraph], 0));
    }
}
