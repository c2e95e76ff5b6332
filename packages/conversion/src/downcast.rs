//! # Downcast Dispatcher
//!
//! Turns model changes into view changes by firing one event per changed
//! item and letting registered converters write the view.
//!
//! ## Design
//!
//! - Event names are namespaced: `insert:$text`, `insert:paragraph`,
//!   `remove:paragraph`, `attribute:bold:$text`, `addMarker:comment:1`,
//!   `removeMarker:comment:1` and `selection`. A converter registered for
//!   `insert` hears every insertion.
//! - Converters run in priority order. Before firing, every item is added
//!   to the [`ModelConsumable`]; a converter consumes the item before it
//!   writes anything, so lower priority converters see it as handled.
//! - A change set is converted in a fixed order: removed markers, then the
//!   differ entries in document order, then added markers. Differ entries
//!   use running coordinates, so converting them one after another keeps
//!   the view in step with the model.
//!
//! ```rust,ignore
//! let mut dispatcher = DowncastDispatcher::new();
//! dispatcher.on("insert:$text", Priority::Lowest, insert_text);
//! let mut api = DowncastApi::new(model.document(), &mut writer, &mut mapper);
//! dispatcher.convert_changes(&change_set, &mut api)?;
//! ```

use crate::consumable::{ConsumableItem, ModelConsumable};
use crate::error::{ConversionError, ConversionResult};
use crate::mapper::Mapper;
use folio_common::{matches_namespace, EventInfo, HandlerList, ListenerId, Priority};
use folio_model::{
    Attributes, ChangeSet, DiffItem, Document, ModelError, NodeId, Position, Range, TreeWalker, TreeWalkerOptions,
    WalkerItem, GRAVEYARD_ROOT_NAME,
};
use folio_view::{DowncastWriter, ViewPosition, ViewRange};
use serde_json::Value;
use tracing::{debug, instrument, trace};

/// Snapshot of a model item taken when its event fires
#[derive(Debug, Clone, PartialEq)]
pub enum ModelItem {
    Element {
        id: NodeId,
        name: String,
        attributes: Attributes,
    },
    Text {
        data: String,
        attributes: Attributes,
    },
}

impl ModelItem {
    /// Element name, or `$text`
    pub fn name(&self) -> &str {
        match self {
            ModelItem::Element { name, .. } => name,
            ModelItem::Text { .. } => "$text",
        }
    }

    pub fn attributes(&self) -> &Attributes {
        match self {
            ModelItem::Element { attributes, .. } | ModelItem::Text { attributes, .. } => attributes,
        }
    }

    /// Key under which the item is added to the consumable
    pub fn consumable_item(&self, range: &Range) -> ConsumableItem {
        match self {
            ModelItem::Element { id, .. } => ConsumableItem::Element(*id),
            ModelItem::Text { .. } => ConsumableItem::range(range),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DowncastData {
    Insert {
        item: ModelItem,
        range: Range,
    },
    /// `position` is where the removed content used to start
    Remove {
        position: Position,
        length: usize,
        name: String,
    },
    Attribute {
        item: ModelItem,
        range: Range,
        key: String,
        old_value: Option<Value>,
        new_value: Option<Value>,
    },
    /// Fired once for the whole range (`item` is `None`), then once per item
    AddMarker {
        marker_name: String,
        marker_range: Range,
        item: Option<(ModelItem, Range)>,
    },
    RemoveMarker {
        marker_name: String,
        marker_range: Range,
    },
    Selection {
        ranges: Vec<Range>,
        backward: bool,
    },
}

/// What converters get to work with
pub struct DowncastApi<'a, 'w> {
    pub model: &'a Document,
    pub writer: &'a mut DowncastWriter<'w>,
    pub mapper: &'a mut Mapper,
    pub consumable: ModelConsumable,
}

impl<'a, 'w> DowncastApi<'a, 'w> {
    pub fn new(model: &'a Document, writer: &'a mut DowncastWriter<'w>, mapper: &'a mut Mapper) -> Self {
        Self {
            model,
            writer,
            mapper,
            consumable: ModelConsumable::new(),
        }
    }

    pub fn to_view_position(&self, position: &Position) -> ConversionResult<ViewPosition> {
        self.mapper.to_view_position(self.model, self.writer.document(), position)
    }

    pub fn to_view_range(&self, range: &Range) -> ConversionResult<ViewRange> {
        self.mapper.to_view_range(self.model, self.writer.document(), range)
    }
}

pub type DowncastHandler = Box<dyn Fn(&mut EventInfo, &DowncastData, &mut DowncastApi<'_, '_>) -> ConversionResult<()>>;

#[derive(Default)]
pub struct DowncastDispatcher {
    handlers: HandlerList<(String, DowncastHandler)>,
}

impl std::fmt::Debug for DowncastDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DowncastDispatcher")
            .field(
                "events",
                &self.handlers.iter().map(|(event, _)| event.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Items inside `range`, each with the range it covers
pub fn range_items(model: &Document, range: &Range, shallow: bool) -> ConversionResult<Vec<(ModelItem, Range)>> {
    let options = TreeWalkerOptions {
        boundaries: Some(range.clone()),
        shallow,
        ignore_element_end: true,
        ..TreeWalkerOptions::default()
    };
    let walker = TreeWalker::new(model, None, options)
        .ok_or_else(|| ModelError::NoSuchRoot(range.root_name().to_string()))?;

    let mut items = Vec::new();
    for value in walker {
        let start = value.previous_position.clone();
        let item = match value.item {
            WalkerItem::Element { element, .. } => ModelItem::Element {
                id: element.id(),
                name: element.name().to_string(),
                attributes: element.attributes().clone(),
            },
            WalkerItem::Text { data, attributes } => ModelItem::Text {
                data,
                attributes: attributes.clone(),
            },
        };
        let end = match item {
            ModelItem::Element { .. } => start.shifted_by(1),
            ModelItem::Text { .. } => value.next_position.clone(),
        };
        items.push((item, Range::new(start, end)?));
    }
    Ok(items)
}

impl DowncastDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter; `event` may be a namespace such as `insert`
    pub fn on<F>(&mut self, event: impl Into<String>, priority: Priority, handler: F) -> ListenerId
    where
        F: Fn(&mut EventInfo, &DowncastData, &mut DowncastApi<'_, '_>) -> ConversionResult<()> + 'static,
    {
        self.handlers.insert(priority, (event.into(), Box::new(handler)))
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.handlers.remove(id).is_some()
    }

    pub fn has_handlers(&self, event: &str) -> bool {
        self.handlers
            .iter()
            .any(|(registered, _)| matches_namespace(registered, event))
    }

    fn fire(&self, event: &str, data: &DowncastData, api: &mut DowncastApi<'_, '_>) -> ConversionResult<EventInfo> {
        trace!(event, "Firing downcast event");
        let mut info = EventInfo::new(event);
        for (registered, handler) in self.handlers.iter() {
            if !matches_namespace(registered, event) {
                continue;
            }
            handler(&mut info, data, api)?;
            if info.is_stopped() {
                break;
            }
        }
        Ok(info)
    }

    /// Convert everything one change block did
    #[instrument(skip_all, fields(changes = change_set.changes.len(), markers = change_set.marker_changes.len()))]
    pub fn convert_changes(&self, change_set: &ChangeSet, api: &mut DowncastApi<'_, '_>) -> ConversionResult<()> {
        api.consumable = ModelConsumable::new();

        for (name, range) in &change_set.markers_to_remove {
            self.convert_marker_remove(name, range, api)?;
        }

        for change in &change_set.changes {
            match change {
                DiffItem::Insert { position, length, .. } => {
                    self.convert_insert(&Range::from_position_and_shift(position, *length), api)?;
                }
                DiffItem::Remove {
                    position, length, name, ..
                } => {
                    self.convert_remove(position, *length, name, api)?;
                }
                DiffItem::Attribute {
                    range,
                    attribute_key,
                    attribute_old_value,
                    attribute_new_value,
                } => {
                    self.convert_attribute(range, attribute_key, attribute_old_value, attribute_new_value, api)?;
                }
            }
        }

        for (name, range) in &change_set.markers_to_add {
            self.convert_marker_add(name, range, api)?;
        }
        Ok(())
    }

    /// Fire `insert` for every item in `range`, each followed by its attributes
    pub fn convert_insert(&self, range: &Range, api: &mut DowncastApi<'_, '_>) -> ConversionResult<()> {
        let items = range_items(api.model, range, false)?;
        for (item, item_range) in &items {
            let consumable = item.consumable_item(item_range);
            api.consumable.add(consumable.clone(), "insert");
            for key in item.attributes().keys() {
                api.consumable.add(consumable.clone(), &format!("attribute:{key}"));
            }
        }

        for (item, item_range) in items {
            let name = item.name().to_string();
            let data = DowncastData::Insert {
                item: item.clone(),
                range: item_range.clone(),
            };
            self.fire(&format!("insert:{name}"), &data, api)?;
            if api.consumable.test(&item.consumable_item(&item_range), "insert") == Some(true) {
                debug!(item = %name, range = %item_range, "No converter consumed insertion");
            }

            for (key, value) in item.attributes() {
                let data = DowncastData::Attribute {
                    item: item.clone(),
                    range: item_range.clone(),
                    key: key.clone(),
                    old_value: None,
                    new_value: Some(value.clone()),
                };
                self.fire(&format!("attribute:{key}:{name}"), &data, api)?;
            }
        }
        Ok(())
    }

    pub fn convert_remove(
        &self,
        position: &Position,
        length: usize,
        name: &str,
        api: &mut DowncastApi<'_, '_>,
    ) -> ConversionResult<()> {
        let data = DowncastData::Remove {
            position: position.clone(),
            length,
            name: name.to_string(),
        };
        self.fire(&format!("remove:{name}"), &data, api)?;
        Ok(())
    }

    pub fn convert_attribute(
        &self,
        range: &Range,
        key: &str,
        old_value: &Option<Value>,
        new_value: &Option<Value>,
        api: &mut DowncastApi<'_, '_>,
    ) -> ConversionResult<()> {
        let items = range_items(api.model, range, true)?;
        let kind = format!("attribute:{key}");
        for (item, item_range) in &items {
            api.consumable.add(item.consumable_item(item_range), &kind);
        }
        for (item, item_range) in items {
            let event = format!("attribute:{key}:{}", item.name());
            let data = DowncastData::Attribute {
                item,
                range: item_range,
                key: key.to_string(),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
            };
            self.fire(&event, &data, api)?;
        }
        Ok(())
    }

    /// Fire `addMarker` for the whole range, then for each item unless the
    /// whole-range converter consumed the marker
    pub fn convert_marker_add(&self, name: &str, range: &Range, api: &mut DowncastApi<'_, '_>) -> ConversionResult<()> {
        if range.root_name() == GRAVEYARD_ROOT_NAME {
            return Ok(());
        }
        let event = format!("addMarker:{name}");
        let whole = ConsumableItem::range(range);
        api.consumable.add(whole.clone(), &event);
        let data = DowncastData::AddMarker {
            marker_name: name.to_string(),
            marker_range: range.clone(),
            item: None,
        };
        self.fire(&event, &data, api)?;
        if api.consumable.test(&whole, &event) != Some(true) {
            return Ok(());
        }

        let items = range_items(api.model, range, false)?;
        for (item, item_range) in &items {
            api.consumable.add(item.consumable_item(item_range), &event);
        }
        for (item, item_range) in items {
            let data = DowncastData::AddMarker {
                marker_name: name.to_string(),
                marker_range: range.clone(),
                item: Some((item, item_range)),
            };
            self.fire(&event, &data, api)?;
        }
        Ok(())
    }

    pub fn convert_marker_remove(&self, name: &str, range: &Range, api: &mut DowncastApi<'_, '_>) -> ConversionResult<()> {
        if range.root_name() == GRAVEYARD_ROOT_NAME {
            return Ok(());
        }
        let data = DowncastData::RemoveMarker {
            marker_name: name.to_string(),
            marker_range: range.clone(),
        };
        self.fire(&format!("removeMarker:{name}"), &data, api)?;
        Ok(())
    }

    pub fn convert_selection(&self, ranges: &[Range], backward: bool, api: &mut DowncastApi<'_, '_>) -> ConversionResult<()> {
        api.consumable.add(ConsumableItem::Selection, "selection");
        let data = DowncastData::Selection {
            ranges: ranges.to_vec(),
            backward,
        };
        self.fire("selection", &data, api)?;
        Ok(())
    }
}

/// Default converter for `insert:$text`
pub fn insert_text(_: &mut EventInfo, data: &DowncastData, api: &mut DowncastApi<'_, '_>) -> ConversionResult<()> {
    let DowncastData::Insert {
        item: item @ ModelItem::Text { data: text, .. },
        range,
    } = data
    else {
        return Ok(());
    };
    if !api.consumable.consume(&item.consumable_item(range), "insert") {
        return Ok(());
    }
    let position = api.to_view_position(range.start())?;
    let text = api.writer.create_text(text);
    api.writer.insert(&position, vec![text.into()])?;
    Ok(())
}

/// Default converter for `remove`: drops the mapped view range and the
/// bindings of everything in it
pub fn remove(_: &mut EventInfo, data: &DowncastData, api: &mut DowncastApi<'_, '_>) -> ConversionResult<()> {
    let DowncastData::Remove { position, length, .. } = data else {
        return Ok(());
    };
    let start = api.to_view_position(position)?;
    let end = api.to_view_position(&position.shifted_by(*length as isize))?;
    let removed = api.writer.remove(&ViewRange::new(start, end)?)?;
    for node in removed.children() {
        api.mapper.unbind_subtree(node);
    }
    Ok(())
}

/// Default converter for `selection`: maps every range to the view
pub fn convert_range_selection(
    _: &mut EventInfo,
    data: &DowncastData,
    api: &mut DowncastApi<'_, '_>,
) -> ConversionResult<()> {
    let DowncastData::Selection { ranges, backward } = data else {
        return Ok(());
    };
    if !api.consumable.consume(&ConsumableItem::Selection, "selection") {
        return Ok(());
    }
    let view_ranges = ranges
        .iter()
        .map(|range| api.to_view_range(range))
        .collect::<ConversionResult<Vec<_>>>()?;
    api.writer.set_selection(view_ranges, *backward);
    Ok(())
}

/// Model element bound to nothing in the view
pub(crate) fn unmapped(id: NodeId) -> ConversionError {
    ConversionError::UnmappedModelElement(id)
}
