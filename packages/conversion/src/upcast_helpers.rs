//! View to model halves of the converter configurations.
//!
//! Element converters run at the configuration's priority. Converters that
//! only add an attribute to what another converter produced run at
//! [`Priority::Low`], after the element itself has been converted.

use crate::consumable::ViewConsumable;
use crate::definition::{
    AttributeToAttribute, AttributeToElement, ElementToElement, MarkerToElement, MarkerToHighlight, MARKER_NAME_ATTRIBUTE,
};
use crate::error::ConversionResult;
use crate::upcast::{UpcastApi, UpcastData, UpcastDispatcher, MARKER_ELEMENT, MARKER_ELEMENT_NAME_ATTRIBUTE};
use folio_common::{ListenerId, Priority};
use folio_model::{Element, ModelError, Position, Range, FRAGMENT_ROOT_NAME};
use folio_view::{MatchResult, MatcherPattern, ViewElement, ViewNode};
use serde_json::Value;
use tracing::trace;

/// Element of the upcast item when `pattern` matches it and the matched
/// parts are still available
fn matched_element<'v>(
    data: &UpcastData<'v>,
    consumable: &ViewConsumable,
    pattern: &MatcherPattern,
) -> Option<(&'v ViewElement, MatchResult)> {
    let ViewNode::Element(element) = data.view_item else {
        return None;
    };
    let matched = pattern.match_element(element)?;
    (consumable.test(&data.view_path, &matched) == Some(true)).then_some((element, matched))
}

/// `true` when `marker_name` is `group` or one of its `group:` members
fn in_group(marker_name: &str, group: &str) -> bool {
    marker_name == group
        || marker_name
            .strip_prefix(group)
            .is_some_and(|rest| rest.starts_with(':'))
}

impl ElementToElement {
    pub fn upcast(&self, dispatcher: &mut UpcastDispatcher) -> Vec<ListenerId> {
        let pattern = self.view.to_pattern();
        let model = self.model.clone();
        let id = dispatcher.on(format!("element:{}", self.view.name), self.priority, move |_, data, api| {
            let Some((view_element, matched)) = matched_element(data, &api.consumable, &pattern) else {
                return Ok(());
            };
            let element = Element::new(model.as_str());
            let id = element.id();
            if !api.safe_insert(element, &data.model_cursor)? {
                return Ok(());
            }
            api.consumable.consume(&data.view_path, &matched);
            let path = api
                .element_path(id)
                .ok_or_else(|| ModelError::invalid_path(FRAGMENT_ROOT_NAME, data.model_cursor.path()))?;
            api.convert_children(view_element, &data.view_path, Position::at_start(FRAGMENT_ROOT_NAME, &path))?;
            api.update_conversion_result(id, data)?;
            Ok(())
        });
        vec![id]
    }
}

impl AttributeToElement {
    /// One converter per attribute value, each matching its own element
    pub fn upcast(&self, dispatcher: &mut UpcastDispatcher) -> Vec<ListenerId> {
        self.views
            .iter()
            .map(|(value, view)| {
                let pattern = view.to_pattern();
                let key = self.model_key.clone();
                let value = value.clone();
                dispatcher.on(format!("element:{}", view.name), Priority::Low, move |_, data, api| {
                    let Some((view_element, matched)) = matched_element(data, &api.consumable, &pattern) else {
                        return Ok(());
                    };
                    api.consumable.consume(&data.view_path, &matched);
                    let range = match data.model_range.clone() {
                        Some(range) => range,
                        None => {
                            let (range, cursor) =
                                api.convert_children(view_element, &data.view_path, data.model_cursor.clone())?;
                            data.model_cursor = cursor;
                            range
                        }
                    };
                    if !api.set_attribute_on(&range, &key, &value)? {
                        trace!(attribute = %key, "Attribute is not allowed on converted content");
                    }
                    data.model_range = Some(range);
                    Ok(())
                })
            })
            .collect()
    }
}

/// The parts of `element` standing for the view attribute `key`
fn attribute_parts(element: &ViewElement, key: &str) -> MatchResult {
    match key {
        "class" => MatchResult {
            classes: element.classes().iter().cloned().collect(),
            ..MatchResult::default()
        },
        "style" => MatchResult {
            styles: element.styles().keys().cloned().collect(),
            ..MatchResult::default()
        },
        _ => MatchResult {
            attributes: vec![key.to_string()],
            ..MatchResult::default()
        },
    }
}

impl AttributeToAttribute {
    pub fn upcast(&self, dispatcher: &mut UpcastDispatcher) -> Vec<ListenerId> {
        let event = match &self.view_element {
            Some(element) => format!("element:{element}"),
            None => "element".to_string(),
        };
        let config = self.clone();
        let id = dispatcher.on(event, Priority::Low, move |_, data, api| {
            let ViewNode::Element(view_element) = data.view_item else {
                return Ok(());
            };
            let (Some(value), Some(range)) = (view_element.get_attribute(&config.view_key), data.model_range.clone())
            else {
                return Ok(());
            };
            let parts = attribute_parts(view_element, &config.view_key);
            if api.consumable.test(&data.view_path, &parts) != Some(true) {
                return Ok(());
            }
            if set_element_attribute(api, &config, range.start(), Value::String(value))? {
                api.consumable.consume(&data.view_path, &parts);
            }
            Ok(())
        });
        vec![id]
    }
}

/// Set the attribute on the element right after `position` when its name
/// and the schema allow it
fn set_element_attribute(
    api: &mut UpcastApi<'_>,
    config: &AttributeToAttribute,
    position: &Position,
    value: Value,
) -> ConversionResult<bool> {
    let mut context = api.schema_context(position.parent_path());
    let Some(element) = api.fragment.root_element().element_at_path(position.path()) else {
        return Ok(false);
    };
    if config.model_element.as_deref().is_some_and(|name| name != element.name()) {
        return Ok(false);
    }
    context.push(element.name());
    if !api.schema.check_attribute(&context, &config.model_key) {
        return Ok(false);
    }
    if let Some(element) = api.fragment.root_element_mut().element_at_path_mut(position.path()) {
        element.set_attribute(config.model_key.as_str(), value);
    }
    Ok(true)
}

/// Insert a `$marker` boundary element at `position`; returns the range it
/// takes
fn insert_marker_boundary(api: &mut UpcastApi<'_>, marker_name: &str, position: &Position) -> ConversionResult<Range> {
    let boundary = Element::new(MARKER_ELEMENT).with_attribute(MARKER_ELEMENT_NAME_ATTRIBUTE, marker_name);
    api.insert(vec![boundary.into()], position)?;
    Ok(Range::from_position_and_shift(position, 1))
}

impl MarkerToElement {
    pub fn upcast(&self, dispatcher: &mut UpcastDispatcher) -> Vec<ListenerId> {
        let pattern = self.view.to_pattern().with_any_attribute(MARKER_NAME_ATTRIBUTE);
        let group = self.group.clone();
        let id = dispatcher.on(format!("element:{}", self.view.name), self.priority, move |_, data, api| {
            let Some((view_element, matched)) = matched_element(data, &api.consumable, &pattern) else {
                return Ok(());
            };
            let Some(marker_name) = view_element
                .get_attribute(MARKER_NAME_ATTRIBUTE)
                .filter(|name| in_group(name, &group))
            else {
                return Ok(());
            };
            api.consumable.consume(&data.view_path, &matched);
            let range = insert_marker_boundary(api, &marker_name, &data.model_cursor)?;
            data.model_cursor = range.end().clone();
            data.model_range = Some(range);
            Ok(())
        });
        vec![id]
    }
}

impl MarkerToHighlight {
    pub fn upcast(&self, dispatcher: &mut UpcastDispatcher) -> Vec<ListenerId> {
        let pattern = self.view.to_pattern().with_any_attribute(MARKER_NAME_ATTRIBUTE);
        let group = self.group.clone();
        let id = dispatcher.on(format!("element:{}", self.view.name), self.priority, move |_, data, api| {
            let Some((view_element, matched)) = matched_element(data, &api.consumable, &pattern) else {
                return Ok(());
            };
            let Some(marker_name) = view_element
                .get_attribute(MARKER_NAME_ATTRIBUTE)
                .filter(|name| in_group(name, &group))
            else {
                return Ok(());
            };
            api.consumable.consume(&data.view_path, &matched);
            let (content, cursor) = api.convert_children(view_element, &data.view_path, data.model_cursor.clone())?;

            // End boundary first so the start of the content stays put
            let end = insert_marker_boundary(api, &marker_name, content.end())?;
            let cursor = if &cursor == content.end() {
                end.end().clone()
            } else {
                cursor.get_transformed_by_insertion(content.end(), 1, true)
            };
            insert_marker_boundary(api, &marker_name, content.start())?;
            let cursor = cursor.get_transformed_by_insertion(content.start(), 1, true);
            let end = end.end().get_transformed_by_insertion(content.start(), 1, true);

            data.model_range = Some(Range::new(content.start().clone(), end)?);
            data.model_cursor = cursor;
            Ok(())
        });
        vec![id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ViewElementDefinition;
    use crate::upcast::{convert_text, convert_to_model_fragment};
    use folio_model::{DocumentFragment, Node, Schema, SchemaContext, SchemaItemDefinition, Text};
    use folio_view::{HtmlDataProcessor, ViewFragment};
    use pretty_assertions::assert_eq;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema
            .register("paragraph", SchemaItemDefinition::default().inherit_all_from("$block"))
            .expect("Failed to register paragraph");
        schema
            .register(
                "heading",
                SchemaItemDefinition::default()
                    .inherit_all_from("$block")
                    .allow_attributes("level"),
            )
            .expect("Failed to register heading");
        schema
            .extend("$text", SchemaItemDefinition::default().allow_attributes("bold"))
            .expect("Failed to extend text");
        schema
    }

    fn dispatcher(configure: impl FnOnce(&mut UpcastDispatcher)) -> UpcastDispatcher {
        let mut dispatcher = UpcastDispatcher::new();
        dispatcher.on("text", Priority::Lowest, convert_text);
        dispatcher.on("element", Priority::Lowest, convert_to_model_fragment);
        configure(&mut dispatcher);
        dispatcher
    }

    fn upcast(dispatcher: &UpcastDispatcher, html: &str) -> DocumentFragment {
        let view = HtmlDataProcessor::new().to_view(html).expect("Failed to parse");
        dispatcher
            .convert(&view, &schema(), SchemaContext::new(["$root"]))
            .expect("Failed to convert")
    }

    #[test]
    fn test_elements_and_text_attributes() {
        let dispatcher = dispatcher(|dispatcher| {
            ElementToElement::new("paragraph", "p").upcast(dispatcher);
            AttributeToElement::new("bold", "strong").upcast(dispatcher);
        });
        let fragment = upcast(&dispatcher, "<p>foo<strong>bar</strong></p>");

        let expected = Element::new("paragraph").with_children(vec![
            Node::from("foo"),
            Text::new("bar").with_attribute("bold", true).into(),
        ]);
        let paragraph = fragment.children()[0].as_element().expect("Expected a paragraph");
        assert_eq!(paragraph.children(), expected.children());
    }

    #[test]
    fn test_attribute_refused_by_schema_is_dropped() {
        let dispatcher = dispatcher(|dispatcher| {
            ElementToElement::new("paragraph", "p").upcast(dispatcher);
            AttributeToElement::new("italic", "em").upcast(dispatcher);
        });
        let fragment = upcast(&dispatcher, "<p><em>foo</em></p>");
        let paragraph = fragment.children()[0].as_element().expect("Expected a paragraph");
        assert_eq!(paragraph.children(), &[Node::from("foo")]);
    }

    #[test]
    fn test_view_attribute_becomes_model_attribute() {
        let dispatcher = dispatcher(|dispatcher| {
            ElementToElement::new("heading", "h2").upcast(dispatcher);
            AttributeToAttribute::new("level", "data-level")
                .on_elements("heading", "h2")
                .upcast(dispatcher);
        });
        let fragment = upcast(&dispatcher, "<h2 data-level=\"2\">Title</h2>");
        let heading = fragment.children()[0].as_element().expect("Expected a heading");
        assert_eq!(heading.name(), "heading");
        assert_eq!(heading.get_attribute("level"), Some(&Value::from("2")));
    }

    #[test]
    fn test_nested_block_is_split_out() {
        let dispatcher = dispatcher(|dispatcher| {
            ElementToElement::new("paragraph", "p").upcast(dispatcher);
        });
        let view = ViewFragment::from_nodes(vec![ViewElement::container("p")
            .with_text("foo")
            .with_child(ViewElement::container("p").with_text("bar"))
            .with_text("baz")
            .into()]);
        let fragment = dispatcher
            .convert(&view, &schema(), SchemaContext::new(["$root"]))
            .expect("Failed to convert");

        let texts: Vec<String> = fragment
            .children()
            .iter()
            .filter_map(Node::as_element)
            .map(Element::text_content)
            .collect();
        assert_eq!(texts, vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn test_highlight_and_boundaries_become_markers() {
        let dispatcher = dispatcher(|dispatcher| {
            ElementToElement::new("paragraph", "p").upcast(dispatcher);
            MarkerToHighlight::new("comment", ViewElementDefinition::new("span").with_class("comment"))
                .upcast(dispatcher);
            MarkerToElement::new("search", "mark").upcast(dispatcher);
        });
        let fragment = upcast(
            &dispatcher,
            "<p>f<span class=\"comment\" data-marker=\"comment:1\">oob</span>a<mark data-marker=\"search:a\"></mark>r</p>",
        );

        assert_eq!(fragment.text_content(), "foobar");
        let comment = fragment.markers().get("comment:1").expect("Comment marker");
        assert_eq!(comment.start(), &Position::at(FRAGMENT_ROOT_NAME, &[0], 1));
        assert_eq!(comment.end(), &Position::at(FRAGMENT_ROOT_NAME, &[0], 4));
        let search = fragment.markers().get("search:a").expect("Search marker");
        assert!(search.is_collapsed());
        assert_eq!(search.start(), &Position::at(FRAGMENT_ROOT_NAME, &[0], 5));
    }

    #[test]
    fn test_marker_group_membership() {
        assert!(in_group("comment", "comment"));
        assert!(in_group("comment:1", "comment"));
        assert!(!in_group("commentary:1", "comment"));
    }
}
