use criterion::{black_box, criterion_group, criterion_main, Criterion};
use folio_model::{
    transform, transform_sets, AttributeOperation, InsertOperation, MoveOperation, Node, Operation, Position, Range,
    TransformContext,
};
use serde_json::json;

fn insert(paragraph: usize, offset: usize) -> Operation {
    Operation::Insert(InsertOperation::new(
        Position::at("main", &[paragraph], offset),
        vec![Node::from("x")],
    ))
}

fn remove(paragraph: usize, offset: usize, how_many: usize) -> Operation {
    Operation::Move(MoveOperation::remove(Position::at("main", &[paragraph], offset), how_many))
}

fn bold(paragraph: usize, start: usize, end: usize) -> Operation {
    let range = Range::new(Position::at("main", &[paragraph], start), Position::at("main", &[paragraph], end))
        .expect("Failed to create range");
    Operation::Attribute(AttributeOperation::new(range, "bold", None, Some(json!(true))))
}

fn transform_pairs(c: &mut Criterion) {
    let pairs = vec![
        (insert(0, 2), insert(0, 2)),
        (insert(0, 3), remove(0, 1, 4)),
        (bold(0, 0, 8), remove(0, 2, 3)),
        (remove(0, 1, 5), remove(0, 3, 5)),
    ];

    c.bench_function("transform_pairs", |b| {
        b.iter(|| {
            for (a, other) in &pairs {
                black_box(transform(black_box(a), black_box(other), &TransformContext::strong()));
            }
        })
    });
}

fn transform_concurrent_sessions(c: &mut Criterion) {
    let local: Vec<Operation> = (0..50).map(|i| insert(i % 10, i % 4)).collect();
    let remote: Vec<Operation> = (0..50)
        .map(|i| if i % 2 == 0 { remove(i % 10, 0, 2) } else { bold(i % 10, 0, 3) })
        .collect();

    c.bench_function("transform_sets_50x50", |b| {
        b.iter(|| transform_sets(black_box(&local), black_box(&remote), true))
    });
}

criterion_group!(benches, transform_pairs, transform_concurrent_sessions);
criterion_main!(benches);
