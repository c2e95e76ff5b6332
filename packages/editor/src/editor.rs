//! # Editor
//!
//! Ties the model, the conversion pipelines, undo and collaboration
//! together behind one entry point.
//!
//! ## Design
//!
//! - Every change goes through [`Editor::change`] (or a method built on
//!   it), which then flushes: the finished change sets feed undo, the
//!   collaboration session and the editing view, in that order
//! - Read-only mode blocks local changes and disables the view observers;
//!   remote operations and data loading still go through
//! - Loading data clears undo, since the steps no longer refer to the
//!   loaded content
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut editor = Editor::new(EditorConfig::default())?;
//! editor.set_data("<p>Hello</p>")?;
//! editor.change(|writer| writer.insert_text("!", Attributes::new(), &Position::at("main", &[0], 5)))?;
//! assert_eq!(editor.get_data()?, "<p>Hello!</p>");
//! editor.undo()?;
//! ```

use crate::config::EditorConfig;
use crate::data::DataController;
use crate::editing::EditingController;
use crate::errors::{EditorError, EditorResult};
use crate::pending_actions::PendingActions;
use crate::session::CollaborationSession;
use crate::undo::UndoManager;
use folio_conversion::{Conversion, ElementToElement};
use folio_model::{BatchKind, DiffItem, Document, Model, ModelResult, Operation, Schema, SchemaItemDefinition, Writer};
use tracing::{debug, info, instrument};

pub struct Editor {
    model: Model,
    conversion: Conversion,
    editing: EditingController,
    data: DataController,
    undo: UndoManager,
    session: CollaborationSession,
    pending_actions: PendingActions,
    config: EditorConfig,
    /// Differ output of the most recent flush
    last_changes: Vec<DiffItem>,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("config", &self.config)
            .field("version", &self.model.document().version())
            .finish()
    }
}

impl Editor {
    /// An editor with one root and the paragraph feature registered
    #[instrument(skip_all, fields(root = %config.root_name, client = config.client_id))]
    pub fn new(config: EditorConfig) -> EditorResult<Self> {
        let mut model = Model::with_document(Document::new(), Schema::new());
        model.create_root("$root", &config.root_name)?;
        if !model.schema().is_registered(&config.paragraph_element) {
            model.schema_mut().register(
                &config.paragraph_element,
                SchemaItemDefinition::default().inherit_all_from("$block"),
            )?;
        }

        let mut conversion = Conversion::with_paragraph_element(&config.paragraph_element);
        conversion.element_to_element(ElementToElement::new(config.paragraph_element.as_str(), "p"));

        let mut editor = Self {
            model,
            conversion,
            editing: EditingController::new([config.root_name.as_str()])?,
            data: DataController::new(),
            undo: UndoManager::new(config.undo.max_levels),
            session: CollaborationSession::new(config.client_id),
            pending_actions: PendingActions::new(),
            config,
            last_changes: Vec::new(),
        };
        editor.apply_read_only();
        info!("Editor ready");
        Ok(editor)
    }

    pub fn from_json_config(json: &str) -> EditorResult<Self> {
        Self::new(EditorConfig::from_json(json)?)
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Schema changes do not produce change sets, so no flush is needed
    pub fn schema_mut(&mut self) -> &mut Schema {
        self.model.schema_mut()
    }

    pub fn conversion(&self) -> &Conversion {
        &self.conversion
    }

    pub fn conversion_mut(&mut self) -> &mut Conversion {
        &mut self.conversion
    }

    pub fn editing(&self) -> &EditingController {
        &self.editing
    }

    pub fn editing_mut(&mut self) -> &mut EditingController {
        &mut self.editing
    }

    pub fn data(&self) -> &DataController {
        &self.data
    }

    pub fn undo_manager(&self) -> &UndoManager {
        &self.undo
    }

    pub fn session(&self) -> &CollaborationSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut CollaborationSession {
        &mut self.session
    }

    pub fn pending_actions(&self) -> &PendingActions {
        &self.pending_actions
    }

    pub fn pending_actions_mut(&mut self) -> &mut PendingActions {
        &mut self.pending_actions
    }

    pub fn root_name(&self) -> &str {
        &self.config.root_name
    }

    /// Run a change block and flush it; fails when read-only
    pub fn change<R>(&mut self, f: impl FnOnce(&mut Writer<'_>) -> ModelResult<R>) -> EditorResult<R> {
        self.ensure_writable()?;
        let result = self.model.change(f);
        // Operations applied before a failure stay applied and must be flushed
        self.flush()?;
        Ok(result??)
    }

    pub fn enqueue_change(&mut self, f: impl FnOnce(&mut Writer<'_>) -> ModelResult<()> + 'static) -> EditorResult<()> {
        self.ensure_writable()?;
        let result = self.model.enqueue_change(BatchKind::Default, f);
        self.flush()?;
        Ok(result?)
    }

    /// Hand finished change sets to undo, the session and the editing view
    fn flush(&mut self) -> EditorResult<()> {
        self.last_changes.clear();
        for change_set in self.model.take_change_sets() {
            self.last_changes.extend(change_set.changes.iter().cloned());
            self.undo.record(change_set.batches.iter());
            self.session.record_local(change_set.batches.iter());
            self.editing
                .convert(self.model.document(), &change_set, &self.conversion)?;
        }
        Ok(())
    }

    /// Changes made by the last change, undo, data load or remote batch
    pub fn last_changes(&self) -> &[DiffItem] {
        &self.last_changes
    }

    /// Apply prepared operations in one undoable batch, each at the
    /// current document version
    #[instrument(skip_all, fields(operations = operations.len()))]
    pub fn apply_operations(&mut self, operations: Vec<Operation>) -> EditorResult<()> {
        self.change(|writer| {
            for op in operations {
                let version = writer.document().version();
                writer.apply_operation(op.with_base_version(version))?;
            }
            Ok(())
        })
    }

    pub fn undo(&mut self) -> EditorResult<bool> {
        self.ensure_writable()?;
        let result = self.undo.undo(&mut self.model);
        self.flush()?;
        Ok(result?)
    }

    pub fn redo(&mut self) -> EditorResult<bool> {
        self.ensure_writable()?;
        let result = self.undo.redo(&mut self.model);
        self.flush()?;
        Ok(result?)
    }

    /// Replace the root content with parsed HTML
    pub fn set_data(&mut self, data: &str) -> EditorResult<()> {
        let result = self
            .data
            .set(&mut self.model, &self.conversion, &self.config.root_name, data);
        self.flush()?;
        self.undo.clear();
        result
    }

    pub fn get_data(&self) -> EditorResult<String> {
        self.data.get(&self.model, &self.conversion, &self.config.root_name)
    }

    /// Apply operations from another client; see [`CollaborationSession::receive_remote`]
    pub fn receive_remote(&mut self, operations: Vec<Operation>, remote_client_id: u32) -> EditorResult<usize> {
        let result = self
            .session
            .receive_remote(&mut self.model, operations, remote_client_id);
        self.flush()?;
        Ok(result?)
    }

    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        if self.config.read_only != read_only {
            self.config.read_only = read_only;
            self.apply_read_only();
        }
    }

    fn apply_read_only(&mut self) {
        let read_only = self.config.read_only;
        let view = self.editing.view_mut();
        view.document_mut().set_read_only(read_only);
        if read_only {
            view.disable_observers();
        } else {
            view.enable_observers();
        }
        debug!(read_only, "Read-only mode applied");
    }

    fn ensure_writable(&self) -> EditorResult<()> {
        if self.config.read_only {
            return Err(EditorError::ReadOnly);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_model::{Attributes, Position};
    use folio_view::ObserverKind;
    use pretty_assertions::assert_eq;

    fn editing_html(editor: &Editor) -> String {
        let root = editor
            .editing()
            .view()
            .document()
            .get_root("main")
            .expect("Expected the main root");
        editor
            .data()
            .processor()
            .to_data(&folio_view::ViewFragment::from_nodes(root.children().to_vec()))
    }

    #[test]
    fn test_change_flushes_to_editing_view_and_undo() {
        let mut editor = Editor::new(EditorConfig::default()).expect("Failed to create editor");
        editor.set_data("<p>Hello</p>").expect("Failed to set data");
        assert_eq!(editing_html(&editor), "<p>Hello</p>");
        assert!(!editor.undo_manager().can_undo());

        editor
            .change(|writer| writer.insert_text("!", Attributes::new(), &Position::at("main", &[0], 5)))
            .expect("Failed to change");
        assert_eq!(editing_html(&editor), "<p>Hello!</p>");
        assert_eq!(editor.get_data().expect("Failed to get data"), "<p>Hello!</p>");
        assert!(editor.undo_manager().can_undo());

        assert!(editor.undo().expect("Failed to undo"));
        assert_eq!(editing_html(&editor), "<p>Hello</p>");
        assert!(editor.redo().expect("Failed to redo"));
        assert_eq!(editing_html(&editor), "<p>Hello!</p>");
    }

    #[test]
    fn test_read_only_blocks_changes() {
        let mut editor = Editor::new(EditorConfig::default().with_read_only(true)).expect("Failed to create editor");
        assert!(editor.editing().view().document().is_read_only());
        assert!(!editor.editing().view().is_observer_enabled(ObserverKind::Key));

        let result = editor.change(|writer| writer.insert_text("x", Attributes::new(), &Position::at("main", &[], 0)));
        assert!(matches!(result, Err(EditorError::ReadOnly)));
        assert!(matches!(editor.undo(), Err(EditorError::ReadOnly)));

        // Loading data still works
        editor.set_data("<p>a</p>").expect("Failed to set data");

        editor.set_read_only(false);
        assert!(editor.editing().view().is_observer_enabled(ObserverKind::Key));
        editor
            .change(|writer| writer.insert_text("b", Attributes::new(), &Position::at("main", &[0], 1)))
            .expect("Failed to change");
        assert_eq!(editor.get_data().expect("Failed to get data"), "<p>ab</p>");
    }

    #[test]
    fn test_custom_root_and_paragraph() {
        let config = EditorConfig::from_json(r#"{ "rootName": "body", "paragraphElement": "para" }"#)
            .expect("Failed to parse config");
        let mut editor = Editor::new(config).expect("Failed to create editor");
        editor.set_data("text").expect("Failed to set data");
        let root = editor.model().document().get_root("body").expect("Expected the body root");
        assert_eq!(root.children()[0].as_element().map(|element| element.name()), Some("para"));
        assert_eq!(editor.get_data().expect("Failed to get data"), "<p>text</p>");
    }

    #[test]
    fn test_apply_operations_reports_changes() {
        let mut editor = Editor::new(EditorConfig::default()).expect("Failed to create editor");
        editor.set_data("<p>ab</p>").expect("Failed to set data");
        let op = Operation::Insert(folio_model::InsertOperation::new(
            Position::at("main", &[0], 1),
            vec![folio_model::Node::from("X")],
        ));
        editor.apply_operations(vec![op.with_base_version(999)]).expect("Failed to apply");
        assert_eq!(editor.get_data().expect("Failed to get data"), "<p>aXb</p>");
        assert_eq!(editor.last_changes().len(), 1);
        assert!(matches!(editor.last_changes()[0], DiffItem::Insert { length: 1, .. }));
        assert!(editor.undo_manager().can_undo());
    }

    #[test]
    fn test_failed_change_still_flushes() {
        let mut editor = Editor::new(EditorConfig::default()).expect("Failed to create editor");
        editor.set_data("<p>a</p>").expect("Failed to set data");
        let result = editor.change(|writer| {
            writer.insert_text("b", Attributes::new(), &Position::at("main", &[0], 1))?;
            writer.insert_text("c", Attributes::new(), &Position::at("main", &[7], 0))
        });
        assert!(matches!(result, Err(EditorError::Model(_))));
        assert_eq!(editing_html(&editor), "<p>ab</p>");
    }
}
