//! The editing pipeline: model changes flow into the editing view through
//! the editing downcast, then get rendered.

use crate::errors::EditorResult;
use folio_conversion::{Conversion, DowncastApi, Mapper};
use folio_model::{ChangeSet, Document};
use folio_view::View;
use tracing::{instrument, warn};

#[derive(Debug)]
pub struct EditingController {
    view: View,
    mapper: Mapper,
}

impl EditingController {
    /// An editing view with one attached root per model root name
    pub fn new<'r>(root_names: impl IntoIterator<Item = &'r str>) -> EditorResult<Self> {
        let mut view = View::new();
        let mut mapper = Mapper::new();
        for root_name in root_names {
            view.document_mut().create_root(root_name, "div")?;
            view.attach_dom_root(root_name)?;
            mapper.bind_roots(root_name, root_name);
        }
        Ok(Self { view, mapper })
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut View {
        &mut self.view
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// Downcast one finished change block, then the model selection
    #[instrument(skip_all, fields(changes = change_set.changes.len()))]
    pub fn convert(&mut self, document: &Document, change_set: &ChangeSet, conversion: &Conversion) -> EditorResult<()> {
        let Self { view, mapper } = self;
        view.change(|writer| -> EditorResult<()> {
            let mut api = DowncastApi::new(document, writer, mapper);
            let dispatcher = conversion.editing_downcast();
            dispatcher.convert_changes(change_set, &mut api)?;

            let selection = document.selection();
            if selection.range_count() > 0 {
                // Selection is UI state; losing it must not lose the content change
                if let Err(error) = dispatcher.convert_selection(selection.ranges(), selection.is_backward(), &mut api) {
                    warn!(%error, "Selection could not be converted");
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_conversion::ElementToElement;
    use folio_model::{Element, Model, Position};
    use folio_view::{HtmlDataProcessor, ViewFragment};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_changes_reach_the_editing_view() {
        let mut conversion = Conversion::new();
        conversion.element_to_element(ElementToElement::new("paragraph", "p"));
        let mut editing = EditingController::new(["main"]).expect("Failed to create editing view");
        assert_eq!(editing.view().attached_roots().collect::<Vec<_>>(), vec!["main"]);

        let mut model = Model::new();
        model
            .change(|writer| {
                writer.insert(
                    vec![Element::new("paragraph").with_text("Hi").into()],
                    &Position::at("main", &[], 0),
                )
            })
            .expect("Failed to change")
            .expect("Failed to insert");
        for change_set in model.take_change_sets() {
            editing
                .convert(model.document(), &change_set, &conversion)
                .expect("Failed to convert");
        }

        let root = editing.view().document().get_root("main").expect("Expected the main root");
        let html = HtmlDataProcessor::new().to_data(&ViewFragment::from_nodes(root.children().to_vec()));
        assert_eq!(html, "<p>Hi</p>");
        assert!(editing.view().dom_root("main").is_some());
    }
}
