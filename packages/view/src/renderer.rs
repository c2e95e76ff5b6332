//! # Renderer
//!
//! Turns view roots into a plain DOM mirror ([`DomNode`]) and reconciles it
//! with the previously rendered mirror as a list of [`DomPatch`]es.
//!
//! ## Design
//!
//! - Only roots the writer touched since the last render are diffed
//! - Patches address nodes by index path from the root element and are
//!   meant to be applied in order; removals of trailing children are emitted
//!   last-first so earlier indexes stay valid
//! - Empty blocks get a filler `<br data-cke-filler="true">` so they keep
//!   their height in a real browser

use crate::document::ViewDocument;
use crate::error::{ViewError, ViewResult};
use crate::node::{ElementKind, ViewElement, ViewNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Attribute marking filler nodes the view does not know about
pub const FILLER_ATTRIBUTE: &str = "data-cke-filler";

/// DOM mirror node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomNode {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
        children: Vec<DomNode>,
    },
    Text {
        content: String,
    },
    /// Opaque markup owned by a raw element
    Raw {
        html: String,
    },
}

impl DomNode {
    pub fn element(tag: impl Into<String>) -> Self {
        DomNode::Element {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        DomNode::Text {
            content: content.into(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let DomNode::Element { ref mut attributes, .. } = self {
            attributes.insert(key.into(), value.into());
        }
        self
    }

    pub fn with_child(mut self, child: DomNode) -> Self {
        if let DomNode::Element { ref mut children, .. } = self {
            children.push(child);
        }
        self
    }

    pub fn children(&self) -> &[DomNode] {
        match self {
            DomNode::Element { children, .. } => children,
            _ => &[],
        }
    }

    pub fn is_filler(&self) -> bool {
        matches!(self, DomNode::Element { attributes, .. } if attributes.contains_key(FILLER_ATTRIBUTE))
    }

    fn children_mut(&mut self) -> Option<&mut Vec<DomNode>> {
        match self {
            DomNode::Element { children, .. } => Some(children),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DomPatch {
    CreateNode { path: Vec<usize>, node: DomNode },
    RemoveNode { path: Vec<usize> },
    ReplaceNode { path: Vec<usize>, node: DomNode },
    UpdateAttributes {
        path: Vec<usize>,
        attributes: BTreeMap<String, String>,
    },
    UpdateText { path: Vec<usize>, content: String },
}

/// Patches for one rendered root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootPatches {
    pub root: String,
    pub patches: Vec<DomPatch>,
}

fn needs_filler(element: &ViewElement) -> bool {
    element.is_empty() && matches!(element.kind(), ElementKind::Container | ElementKind::Editable | ElementKind::Root)
}

pub fn render_element(element: &ViewElement) -> DomNode {
    let mut children: Vec<DomNode> = element.children().iter().map(render_node).collect();
    if let ElementKind::Raw { html } = element.kind() {
        children.push(DomNode::Raw { html: html.clone() });
    }
    if needs_filler(element) {
        children.push(DomNode::element("br").with_attr(FILLER_ATTRIBUTE, "true"));
    }
    DomNode::Element {
        tag: element.name().to_string(),
        attributes: element.attribute_entries(),
        children,
    }
}

fn render_node(node: &ViewNode) -> DomNode {
    match node {
        ViewNode::Element(element) => render_element(element),
        ViewNode::Text(text) => DomNode::text(text.data()),
    }
}

/// Patches turning `old` into `new`
pub fn diff_dom_node(old: &DomNode, new: &DomNode) -> Vec<DomPatch> {
    diff_node(Some(old), Some(new), Vec::new())
}

fn diff_node(old: Option<&DomNode>, new: Option<&DomNode>, path: Vec<usize>) -> Vec<DomPatch> {
    match (old, new) {
        (None, Some(node)) => vec![DomPatch::CreateNode {
            path,
            node: node.clone(),
        }],
        (Some(_), None) => vec![DomPatch::RemoveNode { path }],
        (Some(old_node), Some(new_node)) => diff_same_path(old_node, new_node, path),
        (None, None) => Vec::new(),
    }
}

fn diff_same_path(old: &DomNode, new: &DomNode, path: Vec<usize>) -> Vec<DomPatch> {
    let mut patches = Vec::new();

    match (old, new) {
        (
            DomNode::Element {
                tag: old_tag,
                attributes: old_attrs,
                children: old_children,
            },
            DomNode::Element {
                tag: new_tag,
                attributes: new_attrs,
                children: new_children,
            },
        ) if old_tag == new_tag => {
            if old_attrs != new_attrs {
                patches.push(DomPatch::UpdateAttributes {
                    path: path.clone(),
                    attributes: new_attrs.clone(),
                });
            }

            let common = old_children.len().min(new_children.len());
            for i in 0..common {
                patches.extend(diff_node(old_children.get(i), new_children.get(i), child_path(&path, i)));
            }
            for i in common..new_children.len() {
                patches.extend(diff_node(None, new_children.get(i), child_path(&path, i)));
            }
            for i in (common..old_children.len()).rev() {
                patches.extend(diff_node(old_children.get(i), None, child_path(&path, i)));
            }
        }
        (DomNode::Text { content: old_content }, DomNode::Text { content: new_content }) => {
            if old_content != new_content {
                patches.push(DomPatch::UpdateText {
                    path,
                    content: new_content.clone(),
                });
            }
        }
        _ if old == new => {}
        _ => patches.push(DomPatch::ReplaceNode {
            path,
            node: new.clone(),
        }),
    }

    patches
}

fn child_path(path: &[usize], index: usize) -> Vec<usize> {
    let mut child = path.to_vec();
    child.push(index);
    child
}

fn node_at_path_mut<'a>(root: &'a mut DomNode, path: &[usize]) -> ViewResult<&'a mut DomNode> {
    let mut current = root;
    for index in path {
        current = current
            .children_mut()
            .and_then(|children| children.get_mut(*index))
            .ok_or_else(|| ViewError::invalid_path("dom", path))?;
    }
    Ok(current)
}

fn parent_and_index<'a>(root: &'a mut DomNode, path: &[usize]) -> ViewResult<(&'a mut Vec<DomNode>, usize)> {
    let (index, parent_path) = path.split_last().ok_or_else(|| ViewError::invalid_path("dom", path))?;
    let children = node_at_path_mut(root, parent_path)?
        .children_mut()
        .ok_or_else(|| ViewError::invalid_path("dom", path))?;
    Ok((children, *index))
}

/// Apply patches in order, the way a DOM host would
pub fn apply_patches(root: &mut DomNode, patches: &[DomPatch]) -> ViewResult<()> {
    for patch in patches {
        match patch {
            DomPatch::CreateNode { path, node } => {
                let (children, index) = parent_and_index(root, path)?;
                children.insert(index.min(children.len()), node.clone());
            }
            DomPatch::RemoveNode { path } => {
                let (children, index) = parent_and_index(root, path)?;
                if index >= children.len() {
                    return Err(ViewError::invalid_path("dom", path));
                }
                children.remove(index);
            }
            DomPatch::ReplaceNode { path, node } => {
                *node_at_path_mut(root, path)? = node.clone();
            }
            DomPatch::UpdateAttributes { path, attributes } => {
                if let DomNode::Element { attributes: current, .. } = node_at_path_mut(root, path)? {
                    *current = attributes.clone();
                }
            }
            DomPatch::UpdateText { path, content } => {
                if let DomNode::Text { content: current } = node_at_path_mut(root, path)? {
                    *current = content.clone();
                }
            }
        }
    }
    Ok(())
}

/// Keeps the last rendered mirror of every root
#[derive(Debug, Default)]
pub struct Renderer {
    rendered: BTreeMap<String, DomNode>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render every root changed since the last call
    pub fn render(&mut self, document: &mut ViewDocument) -> Vec<RootPatches> {
        let mut result = Vec::new();

        for root_name in document.take_changed_roots() {
            let Some(view_root) = document.get_root(&root_name) else {
                self.rendered.remove(&root_name);
                continue;
            };
            let new = render_element(view_root);
            let patches = match self.rendered.get(&root_name) {
                Some(old) => diff_dom_node(old, &new),
                None => vec![DomPatch::ReplaceNode {
                    path: Vec::new(),
                    node: new.clone(),
                }],
            };

            debug!(root = %root_name, patches = patches.len(), "Rendered view root");
            if !patches.is_empty() {
                result.push(RootPatches {
                    root: root_name.clone(),
                    patches,
                });
            }
            self.rendered.insert(root_name, new);
        }

        result
    }

    pub fn dom_root(&self, name: &str) -> Option<&DomNode> {
        self.rendered.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paragraph(text: &str) -> DomNode {
        DomNode::element("p").with_child(DomNode::text(text))
    }

    fn root(children: Vec<DomNode>) -> DomNode {
        children.into_iter().fold(DomNode::element("div"), DomNode::with_child)
    }

    #[test]
    fn test_diff_create_node() {
        let old = root(vec![]);
        let new = root(vec![paragraph("foo")]);

        let patches = diff_dom_node(&old, &new);
        assert_eq!(patches.len(), 1);
        match &patches[0] {
            DomPatch::CreateNode { path, .. } => assert_eq!(path, &vec![0]),
            other => panic!("Expected CreateNode patch, got {other:?}"),
        }
    }

    #[test]
    fn test_diff_update_text() {
        let patches = diff_dom_node(&root(vec![paragraph("old")]), &root(vec![paragraph("new")]));
        assert_eq!(
            patches,
            vec![DomPatch::UpdateText {
                path: vec![0, 0],
                content: "new".to_string()
            }]
        );
    }

    #[test]
    fn test_diff_tag_change_replaces_node() {
        let new = root(vec![DomNode::element("h2").with_child(DomNode::text("foo"))]);
        let patches = diff_dom_node(&root(vec![paragraph("foo")]), &new);
        assert!(matches!(&patches[..], [DomPatch::ReplaceNode { path, .. }] if path == &vec![0]));
    }

    #[test]
    fn test_patches_reproduce_new_tree() {
        let old = root(vec![paragraph("a"), paragraph("b"), paragraph("c")]);
        let new = root(vec![paragraph("a").with_attr("class", "x")]);

        let patches = diff_dom_node(&old, &new);
        let mut applied = old.clone();
        apply_patches(&mut applied, &patches).expect("Failed to apply patches");
        assert_eq!(applied, new);
    }

    #[test]
    fn test_empty_block_gets_filler() {
        let rendered = render_element(&ViewElement::container("p"));
        assert_eq!(rendered.children().len(), 1);
        assert!(rendered.children()[0].is_filler());
    }

    #[test]
    fn test_renderer_only_reports_changes() {
        let mut document = ViewDocument::new();
        document.create_root("main", "div").expect("Failed to create root");
        let mut renderer = Renderer::new();

        let first = renderer.render(&mut document);
        assert!(matches!(&first[..], [RootPatches { patches, .. }] if matches!(&patches[..], [DomPatch::ReplaceNode { .. }])));
        assert!(renderer.render(&mut document).is_empty());
        assert!(renderer.dom_root("main").is_some_and(|root| root.children()[0].is_filler()));
    }
}
