mod convert;
mod replay;
mod transform;

pub use convert::{convert, ConvertArgs};
pub use replay::{replay, ReplayArgs};
pub use transform::{transform, TransformArgs};

use anyhow::{Context, Result};
use folio_conversion::{AttributeToElement, ElementToElement, MarkerToHighlight, ViewElementDefinition};
use folio_editor::{Editor, EditorConfig};
use folio_model::{ModelError, Operation, SchemaItemDefinition, TreeRoots};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("{path}: expected a JSON array of operations")]
    NotAnArray { path: String },

    #[error("{path}: operation {index} is invalid: {source}")]
    InvalidOperation {
        path: String,
        index: usize,
        #[source]
        source: ModelError,
    },
}

/// An editor with headings, bold, italic and comment highlights
pub fn build_editor(config: &EditorConfig) -> Result<Editor> {
    let mut editor = Editor::new(config.clone())?;

    let schema = editor.schema_mut();
    for heading in ["heading1", "heading2", "heading3"] {
        schema.register(heading, SchemaItemDefinition::default().inherit_all_from("$block"))?;
    }
    schema.extend(
        "$text",
        SchemaItemDefinition::default()
            .allow_attributes("bold")
            .allow_attributes("italic"),
    )?;

    let conversion = editor.conversion_mut();
    conversion.element_to_element(ElementToElement::new("heading1", "h1"));
    conversion.element_to_element(ElementToElement::new("heading2", "h2"));
    conversion.element_to_element(ElementToElement::new("heading3", "h3"));
    conversion.attribute_to_element(AttributeToElement::new("bold", "strong"));
    conversion.attribute_to_element(AttributeToElement::new("italic", "em"));
    conversion.marker_to_highlight(MarkerToHighlight::new(
        "comment",
        ViewElementDefinition::new("span").with_class("comment"),
    ));

    Ok(editor)
}

pub fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_array(path: &Path) -> Result<Vec<Value>> {
    let content = read_file(path)?;
    let value: Value =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(CliError::NotAnArray {
            path: path.display().to_string(),
        }
        .into()),
    }
}

/// Operations whose roots must exist in `tree`
pub fn read_operations_for<T: TreeRoots>(path: &Path, tree: &T) -> Result<Vec<Operation>> {
    read_array(path)?
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            Operation::from_json(value, tree).map_err(|source| {
                anyhow::Error::from(CliError::InvalidOperation {
                    path: path.display().to_string(),
                    index,
                    source,
                })
            })
        })
        .collect()
}

/// Operations read without a document to check them against
pub fn read_detached_operations(path: &Path) -> Result<Vec<Operation>> {
    read_array(path)?
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value::<Operation>(value)
                .map(Operation::normalized)
                .map_err(|error| {
                    anyhow::Error::from(CliError::InvalidOperation {
                        path: path.display().to_string(),
                        index,
                        source: ModelError::from(error),
                    })
                })
        })
        .collect()
}

pub fn to_pretty_json(value: &impl serde::Serialize) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_features_round_trip() {
        let mut editor = build_editor(&EditorConfig::default()).expect("Failed to build editor");
        let html = "<h2>Title</h2><p><strong>bold</strong> and <em>italic</em></p>";
        editor.set_data(html).expect("Failed to set data");
        assert_eq!(editor.get_data().expect("Failed to get data"), html);
    }

    #[test]
    fn test_read_operations() {
        let dir = std::env::temp_dir().join("folio-cli-read-operations");
        std::fs::create_dir_all(&dir).expect("Failed to create temp dir");

        let ops = dir.join("ops.json");
        let op = Operation::Insert(folio_model::InsertOperation::new(
            folio_model::Position::at("main", &[], 0),
            vec![folio_model::Node::from("x")],
        ));
        let json = serde_json::to_string(&vec![op.to_json().expect("Failed to serialize")])
            .expect("Failed to serialize");
        std::fs::write(&ops, json).expect("Failed to write ops");
        assert_eq!(read_detached_operations(&ops).expect("Failed to read ops").len(), 1);

        let not_array = dir.join("object.json");
        std::fs::write(&not_array, "{}").expect("Failed to write file");
        let error = read_detached_operations(&not_array).expect_err("Expected an error");
        assert!(error.to_string().contains("expected a JSON array"));
    }
}
