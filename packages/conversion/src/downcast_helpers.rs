//! Model to view halves of the converter configurations.
//!
//! Each `downcast` registers its converters on a [`DowncastDispatcher`] at
//! the configuration's priority and returns the listener ids so the
//! converters can be removed again.

use crate::consumable::ConsumableItem;
use crate::definition::{
    value_to_view, AttributeToAttribute, AttributeToElement, ElementToElement, MarkerToElement, MarkerToHighlight,
    ViewElementDefinition, MARKER_NAME_ATTRIBUTE,
};
use crate::downcast::{unmapped, DowncastApi, DowncastData, DowncastDispatcher, ModelItem};
use crate::error::ConversionResult;
use folio_common::ListenerId;
use folio_model::Range;
use folio_view::{ElementKind, ViewDocument, ViewElement, ViewRange};
use tracing::{trace, warn};

impl ElementToElement {
    pub fn downcast(&self, dispatcher: &mut DowncastDispatcher) -> Vec<ListenerId> {
        let view = self.view.clone();
        let id = dispatcher.on(format!("insert:{}", self.model), self.priority, move |_, data, api| {
            let DowncastData::Insert {
                item: item @ ModelItem::Element { id, .. },
                range,
            } = data
            else {
                return Ok(());
            };
            if !api.consumable.consume(&item.consumable_item(range), "insert") {
                return Ok(());
            }
            let position = api.to_view_position(range.start())?;
            let element = view.to_element();
            api.mapper.bind_elements(*id, element.id());
            api.writer.insert(&position, vec![element.into()])?;
            Ok(())
        });
        vec![id]
    }
}

/// View range covering a downcast item: the mapped text range, or the view
/// element bound to a model element
fn item_view_range(api: &DowncastApi<'_, '_>, item: &ModelItem, range: &Range) -> ConversionResult<Option<ViewRange>> {
    match item {
        ModelItem::Text { .. } => Ok(Some(api.to_view_range(range)?)),
        ModelItem::Element { id, .. } => {
            let view_id = api.mapper.to_view_element(*id).ok_or_else(|| unmapped(*id))?;
            let document = api.writer.document();
            let Some(element) = document.element(view_id) else {
                return Ok(None);
            };
            if *element.kind() == ElementKind::Container {
                return Ok(None);
            }
            let Some((root, path)) = document.find_element(view_id) else {
                return Ok(None);
            };
            Ok(Some(ViewRange::on(root, &path)?))
        }
    }
}

impl AttributeToElement {
    pub fn downcast(&self, dispatcher: &mut DowncastDispatcher) -> Vec<ListenerId> {
        let config = self.clone();
        let id = dispatcher.on(format!("attribute:{}", self.model_key), self.priority, move |_, data, api| {
            let DowncastData::Attribute {
                item,
                range,
                key,
                old_value,
                new_value,
            } = data
            else {
                return Ok(());
            };
            let old_view = old_value.as_ref().and_then(|value| config.view_for(value));
            let new_view = new_value.as_ref().and_then(|value| config.view_for(value));
            if old_view.is_none() && new_view.is_none() {
                return Ok(());
            }
            if !api.consumable.consume(&item.consumable_item(range), &format!("attribute:{key}")) {
                return Ok(());
            }
            let Some(mut view_range) = item_view_range(api, item, range)? else {
                return Ok(());
            };
            if let Some(old_view) = old_view {
                view_range = api.writer.unwrap(&view_range, &old_view.to_attribute_element())?;
            }
            if let Some(new_view) = new_view {
                api.writer.wrap(&view_range, &new_view.to_attribute_element())?;
            }
            Ok(())
        });
        vec![id]
    }
}

impl AttributeToAttribute {
    pub fn downcast(&self, dispatcher: &mut DowncastDispatcher) -> Vec<ListenerId> {
        let event = match &self.model_element {
            Some(element) => format!("attribute:{}:{element}", self.model_key),
            None => format!("attribute:{}", self.model_key),
        };
        let view_key = self.view_key.clone();
        let id = dispatcher.on(event, self.priority, move |_, data, api| {
            let DowncastData::Attribute {
                item: item @ ModelItem::Element { id, .. },
                range,
                key,
                new_value,
                ..
            } = data
            else {
                return Ok(());
            };
            if !api.consumable.consume(&item.consumable_item(range), &format!("attribute:{key}")) {
                return Ok(());
            }
            let view_id = api.mapper.to_view_element(*id).ok_or_else(|| unmapped(*id))?;
            match new_value {
                Some(value) => api.writer.set_attribute(&view_key, &value_to_view(value), view_id)?,
                None => api.writer.remove_attribute(&view_key, view_id)?,
            }
            Ok(())
        });
        vec![id]
    }
}

/// Attribute element a highlight marker is shown with
fn highlight_element(view: &ViewElementDefinition, marker_name: &str) -> ViewElement {
    view.to_attribute_element()
        .with_id(marker_name)
        .with_attribute(MARKER_NAME_ATTRIBUTE, marker_name)
}

/// First attribute element in the view carrying `marker_name` as its id
fn find_highlight(document: &ViewDocument, marker_name: &str) -> Option<(String, Vec<usize>, ViewElement)> {
    fn search(element: &ViewElement, marker_name: &str, path: &mut Vec<usize>) -> Option<(Vec<usize>, ViewElement)> {
        for (index, child) in element.children().iter().enumerate() {
            let Some(child) = child.as_element() else {
                continue;
            };
            path.push(index);
            if child.is_attribute() && child.attribute_id() == Some(marker_name) {
                return Some((path.clone(), child.clone()));
            }
            if let Some(found) = search(child, marker_name, path) {
                return Some(found);
            }
            path.pop();
        }
        None
    }

    document.roots().iter().find_map(|(root_name, root)| {
        search(root, marker_name, &mut Vec::new()).map(|(path, element)| (root_name.clone(), path, element))
    })
}

impl MarkerToHighlight {
    pub fn downcast(&self, dispatcher: &mut DowncastDispatcher) -> Vec<ListenerId> {
        let view = self.view.clone();
        let add = dispatcher.on(format!("addMarker:{}", self.group), self.priority, move |_, data, api| {
            let DowncastData::AddMarker {
                marker_name,
                item: Some((item @ ModelItem::Text { .. }, range)),
                ..
            } = data
            else {
                return Ok(());
            };
            if !api.consumable.consume(&item.consumable_item(range), &format!("addMarker:{marker_name}")) {
                return Ok(());
            }
            let view_range = api.to_view_range(range)?;
            api.writer.wrap(&view_range, &highlight_element(&view, marker_name))?;
            Ok(())
        });

        let remove = dispatcher.on(format!("removeMarker:{}", self.group), self.priority, |_, data, api| {
            let DowncastData::RemoveMarker { marker_name, .. } = data else {
                return Ok(());
            };
            while let Some((root, path, element)) = find_highlight(api.writer.document(), marker_name) {
                api.writer.unwrap(&ViewRange::on(root, &path)?, &element)?;
                if api.writer.document().element(element.id()).is_some() {
                    warn!(marker = %marker_name, "Highlight element survived unwrapping");
                    break;
                }
            }
            trace!(marker = %marker_name, "Removed highlight");
            Ok(())
        });
        vec![add, remove]
    }
}

impl MarkerToElement {
    pub fn downcast(&self, dispatcher: &mut DowncastDispatcher) -> Vec<ListenerId> {
        let view = self.view.clone();
        let add = dispatcher.on(format!("addMarker:{}", self.group), self.priority, move |_, data, api| {
            let DowncastData::AddMarker {
                marker_name,
                marker_range,
                item: None,
            } = data
            else {
                return Ok(());
            };
            if !api
                .consumable
                .consume(&ConsumableItem::range(marker_range), &format!("addMarker:{marker_name}"))
            {
                return Ok(());
            }
            // End first so the start position still maps to the same place
            for position in [marker_range.end(), marker_range.start()] {
                let view_position = api.to_view_position(position)?;
                let boundary = view.to_ui_element().with_attribute(MARKER_NAME_ATTRIBUTE, marker_name.as_str());
                api.mapper.bind_element_to_marker(boundary.id(), marker_name);
                api.writer.insert(&view_position, vec![boundary.into()])?;
            }
            Ok(())
        });

        let remove = dispatcher.on(format!("removeMarker:{}", self.group), self.priority, |_, data, api| {
            let DowncastData::RemoveMarker { marker_name, .. } = data else {
                return Ok(());
            };
            for id in api.mapper.marker_name_to_elements(marker_name) {
                api.mapper.unbind_element_from_marker(id, marker_name);
                if api.writer.document().element(id).is_some() {
                    api.writer.remove_element(id)?;
                }
            }
            Ok(())
        });
        vec![add, remove]
    }
}
