//! Iteration over the model tree, one step at a time.
//!
//! Walking forward, entering an element yields `ElementStart` and leaving it
//! yields `ElementEnd`; walking backward the order is reversed. Text comes
//! as whole (possibly clipped) text nodes unless `single_characters` is set.

use crate::document::TreeRoots;
use crate::node::{Attributes, Element, Node};
use crate::position::Position;
use crate::range::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkerValueKind {
    ElementStart,
    ElementEnd,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WalkerItem<'a> {
    Element { element: &'a Element, path: Vec<usize> },
    Text { data: String, attributes: &'a Attributes },
}

impl WalkerItem<'_> {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            WalkerItem::Element { element, .. } => Some(element),
            WalkerItem::Text { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeWalkerValue<'a> {
    pub kind: WalkerValueKind,
    pub item: WalkerItem<'a>,
    pub previous_position: Position,
    pub next_position: Position,
    /// Offsets covered by the step; zero when leaving an element
    pub length: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TreeWalkerOptions {
    pub direction: Direction,
    pub boundaries: Option<Range>,
    pub single_characters: bool,
    pub shallow: bool,
    pub ignore_element_end: bool,
}

pub struct TreeWalker<'a> {
    root: &'a Element,
    position: Position,
    options: TreeWalkerOptions,
}

impl<'a> TreeWalker<'a> {
    /// Start at `start`, or at the boundary matching the direction
    pub fn new<T: TreeRoots>(tree: &'a T, start: Option<Position>, options: TreeWalkerOptions) -> Option<Self> {
        let position = match (start, &options.boundaries, options.direction) {
            (Some(position), _, _) => position,
            (None, Some(boundaries), Direction::Forward) => boundaries.start().clone(),
            (None, Some(boundaries), Direction::Backward) => boundaries.end().clone(),
            (None, None, _) => return None,
        };
        let root = tree.root(position.root_name())?;
        Some(Self { root, position, options })
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    fn parent(&self) -> Option<&'a Element> {
        self.root.element_at_path(self.position.parent_path())
    }

    fn next_forward(&mut self) -> Option<TreeWalkerValue<'a>> {
        if let Some(boundaries) = &self.options.boundaries {
            if self.position == *boundaries.end() {
                return None;
            }
        }
        let parent = self.parent()?;
        let previous = self.position.clone();
        let offset = previous.offset();

        if offset < parent.max_offset() {
            let (index, start) = parent.child_at_offset(offset)?;
            match &parent.children()[index] {
                Node::Element(element) => {
                    let path = previous.path().to_vec();
                    self.position = if self.options.shallow {
                        previous.shifted_by(1)
                    } else {
                        previous.child(0)
                    };
                    Some(TreeWalkerValue {
                        kind: WalkerValueKind::ElementStart,
                        item: WalkerItem::Element { element, path },
                        previous_position: previous,
                        next_position: self.position.clone(),
                        length: 1,
                    })
                }
                Node::Text(text) => {
                    let mut end = if self.options.single_characters {
                        offset + 1
                    } else {
                        start + text.len()
                    };
                    if let Some(boundaries) = &self.options.boundaries {
                        if boundaries.end().has_same_parent_as(&previous) {
                            end = end.min(boundaries.end().offset());
                        }
                    }
                    let data: String = text.data().chars().skip(offset - start).take(end - offset).collect();
                    self.position = previous.with_offset(end);
                    Some(TreeWalkerValue {
                        kind: WalkerValueKind::Text,
                        item: WalkerItem::Text {
                            data,
                            attributes: text.attributes(),
                        },
                        previous_position: previous,
                        next_position: self.position.clone(),
                        length: end - offset,
                    })
                }
            }
        } else {
            let parent_position = previous.parent_position()?;
            self.position = parent_position.shifted_by(1);
            if self.options.ignore_element_end {
                return self.next_forward();
            }
            Some(TreeWalkerValue {
                kind: WalkerValueKind::ElementEnd,
                item: WalkerItem::Element {
                    element: parent,
                    path: parent_position.path().to_vec(),
                },
                previous_position: previous,
                next_position: self.position.clone(),
                length: 0,
            })
        }
    }

    fn next_backward(&mut self) -> Option<TreeWalkerValue<'a>> {
        if let Some(boundaries) = &self.options.boundaries {
            if self.position == *boundaries.start() {
                return None;
            }
        }
        let parent = self.parent()?;
        let previous = self.position.clone();
        let offset = previous.offset();

        if offset > 0 {
            let (index, start) = parent.child_at_offset(offset - 1)?;
            match &parent.children()[index] {
                Node::Element(element) => {
                    let before = previous.shifted_by(-1);
                    let path = before.path().to_vec();
                    if self.options.shallow {
                        self.position = before;
                        return Some(TreeWalkerValue {
                            kind: WalkerValueKind::ElementStart,
                            item: WalkerItem::Element { element, path },
                            previous_position: previous,
                            next_position: self.position.clone(),
                            length: 1,
                        });
                    }
                    self.position = before.child(element.max_offset());
                    if self.options.ignore_element_end {
                        return self.next_backward();
                    }
                    Some(TreeWalkerValue {
                        kind: WalkerValueKind::ElementEnd,
                        item: WalkerItem::Element { element, path },
                        previous_position: previous,
                        next_position: self.position.clone(),
                        length: 0,
                    })
                }
                Node::Text(text) => {
                    let mut begin = if self.options.single_characters { offset - 1 } else { start };
                    if let Some(boundaries) = &self.options.boundaries {
                        if boundaries.start().has_same_parent_as(&previous) {
                            begin = begin.max(boundaries.start().offset());
                        }
                    }
                    let data: String = text.data().chars().skip(begin - start).take(offset - begin).collect();
                    self.position = previous.with_offset(begin);
                    Some(TreeWalkerValue {
                        kind: WalkerValueKind::Text,
                        item: WalkerItem::Text {
                            data,
                            attributes: text.attributes(),
                        },
                        previous_position: previous,
                        next_position: self.position.clone(),
                        length: offset - begin,
                    })
                }
            }
        } else {
            let parent_position = previous.parent_position()?;
            self.position = parent_position.clone();
            Some(TreeWalkerValue {
                kind: WalkerValueKind::ElementStart,
                item: WalkerItem::Element {
                    element: parent,
                    path: parent_position.path().to_vec(),
                },
                previous_position: previous,
                next_position: self.position.clone(),
                length: 1,
            })
        }
    }
}

impl<'a> Iterator for TreeWalker<'a> {
    type Item = TreeWalkerValue<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.options.direction {
            Direction::Forward => self.next_forward(),
            Direction::Backward => self.next_backward(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn tree() -> BTreeMap<String, Element> {
        let mut roots = BTreeMap::new();
        roots.insert(
            "main".to_string(),
            Element::new("$root")
                .with_child(Element::new("paragraph").with_text("ab"))
                .with_child(Element::new("image")),
        );
        roots
    }

    fn kinds(walker: TreeWalker<'_>) -> Vec<WalkerValueKind> {
        walker.map(|value| value.kind).collect()
    }

    #[test]
    fn test_forward_walk_visits_every_boundary() {
        let roots = tree();
        let boundaries = Range::in_element(&roots, "main", &[]).expect("Failed to create range");
        let walker = TreeWalker::new(
            &roots,
            None,
            TreeWalkerOptions {
                boundaries: Some(boundaries),
                ..Default::default()
            },
        )
        .expect("Failed to create walker");

        assert_eq!(
            kinds(walker),
            vec![
                WalkerValueKind::ElementStart,
                WalkerValueKind::Text,
                WalkerValueKind::ElementEnd,
                WalkerValueKind::ElementStart,
                WalkerValueKind::ElementEnd,
            ]
        );
    }

    #[test]
    fn test_backward_walk_mirrors_forward() {
        let roots = tree();
        let boundaries = Range::in_element(&roots, "main", &[]).expect("Failed to create range");
        let walker = TreeWalker::new(
            &roots,
            None,
            TreeWalkerOptions {
                direction: Direction::Backward,
                boundaries: Some(boundaries),
                ..Default::default()
            },
        )
        .expect("Failed to create walker");

        assert_eq!(
            kinds(walker),
            vec![
                WalkerValueKind::ElementEnd,
                WalkerValueKind::ElementStart,
                WalkerValueKind::ElementEnd,
                WalkerValueKind::Text,
                WalkerValueKind::ElementStart,
            ]
        );
    }

    #[test]
    fn test_text_is_clipped_to_boundaries() {
        let roots = tree();
        let boundaries = Range::new(Position::at("main", &[0], 0), Position::at("main", &[0], 1))
            .expect("Failed to create range");
        let values: Vec<_> = TreeWalker::new(
            &roots,
            None,
            TreeWalkerOptions {
                boundaries: Some(boundaries),
                ..Default::default()
            },
        )
        .expect("Failed to create walker")
        .collect();

        assert_eq!(values.len(), 1);
        assert_eq!(
            values[0].item,
            WalkerItem::Text {
                data: "a".to_string(),
                attributes: &Attributes::new()
            }
        );
    }
}
