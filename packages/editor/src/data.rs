//! # Data Pipeline
//!
//! Reads and writes the editor's data format (HTML).
//!
//! ## Design
//!
//! - `get` downcasts a whole root into a fresh view document with the data
//!   downcast, so the editing view is never touched
//! - `set` replaces a root's content in a `Transparent` batch, which undo
//!   never records
//! - Markers inside the root are written as highlights or boundary
//!   elements and read back as markers
//!
//! ```rust,ignore
//! let data = DataController::new();
//! data.set(&mut model, &conversion, "main", "<p>Hello</p>")?;
//! assert_eq!(data.get(&model, &conversion, "main")?, "<p>Hello</p>");
//! ```

use crate::errors::{EditorError, EditorResult};
use folio_conversion::{Conversion, DowncastApi, Mapper};
use folio_model::{BatchKind, DocumentFragment, Model, Position, Range, SchemaContext, DEFAULT_ROOT_NAME};
use folio_view::{DowncastWriter, HtmlDataProcessor, ViewDocument, ViewFragment};
use tracing::{debug, instrument};

#[derive(Debug, Default)]
pub struct DataController {
    processor: HtmlDataProcessor,
}

impl DataController {
    pub fn new() -> Self {
        Self {
            processor: HtmlDataProcessor::new(),
        }
    }

    /// Serialize the content of `root_name`
    pub fn get(&self, model: &Model, conversion: &Conversion, root_name: &str) -> EditorResult<String> {
        let view = self.to_view(model, conversion, root_name)?;
        Ok(self.processor.to_data(&view))
    }

    /// Serialize a detached model fragment, markers included
    pub fn stringify(&self, fragment: DocumentFragment, conversion: &Conversion) -> EditorResult<String> {
        let mut scratch = Model::new();
        scratch.change_with(BatchKind::Transparent, |writer| {
            writer.insert_fragment(fragment, &Position::at_start(DEFAULT_ROOT_NAME, &[]))
        })??;
        self.get(&scratch, conversion, DEFAULT_ROOT_NAME)
    }

    /// The content of `root_name` as a detached view fragment
    #[instrument(skip(self, model, conversion))]
    pub fn to_view(&self, model: &Model, conversion: &Conversion, root_name: &str) -> EditorResult<ViewFragment> {
        let document = model.document();
        if document.get_root(root_name).is_none() {
            return Err(EditorError::NoSuchRoot(root_name.to_string()));
        }

        let mut view = ViewDocument::new();
        view.create_root(root_name, "div")?;
        let mut mapper = Mapper::new();
        mapper.bind_roots(root_name, root_name);

        {
            let mut writer = DowncastWriter::new(&mut view);
            let mut api = DowncastApi::new(document, &mut writer, &mut mapper);
            let dispatcher = conversion.data_downcast();
            dispatcher.convert_insert(&Range::in_element(document, root_name, &[])?, &mut api)?;
            for marker in document.markers().iter() {
                if marker.range().root_name() == root_name {
                    dispatcher.convert_marker_add(marker.name(), marker.range(), &mut api)?;
                }
            }
        }

        let children = view
            .get_root(root_name)
            .map(|root| root.children().to_vec())
            .unwrap_or_default();
        Ok(ViewFragment::from_nodes(children))
    }

    /// Parse data into a model fragment allowed in `context`
    pub fn parse(&self, data: &str, model: &Model, conversion: &Conversion, context: SchemaContext) -> EditorResult<DocumentFragment> {
        let view = self.processor.to_view(data)?;
        self.to_model(&view, model, conversion, context)
    }

    pub fn to_model(
        &self,
        view: &ViewFragment,
        model: &Model,
        conversion: &Conversion,
        context: SchemaContext,
    ) -> EditorResult<DocumentFragment> {
        Ok(conversion.upcast().convert(view, model.schema(), context)?)
    }

    /// Replace the content of `root_name` with parsed `data`
    #[instrument(skip(self, model, conversion, data), fields(len = data.len()))]
    pub fn set(&self, model: &mut Model, conversion: &Conversion, root_name: &str, data: &str) -> EditorResult<()> {
        let root_element = model
            .document()
            .get_root(root_name)
            .map(|root| root.name().to_string())
            .ok_or_else(|| EditorError::NoSuchRoot(root_name.to_string()))?;
        let fragment = self.parse(data, model, conversion, SchemaContext::new([root_element]))?;
        debug!(offsets = fragment.max_offset(), markers = fragment.markers().len(), "Parsed data");

        let root_name = root_name.to_string();
        model.change_with(BatchKind::Transparent, |writer| -> EditorResult<()> {
            let content = Range::in_element(writer.document(), &root_name, &[])?;
            writer.remove(&content)?;
            writer.insert_fragment(fragment, &Position::at_start(&root_name, &[]))?;
            Ok(())
        })?
    }

    pub fn processor(&self) -> &HtmlDataProcessor {
        &self.processor
    }
}
