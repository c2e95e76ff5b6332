//! View element definitions and converter configurations.
//!
//! One definition describes both the element a downcast converter creates
//! and the pattern an upcast converter matches, so each configuration can
//! register converters for both directions.

use folio_common::Priority;
use folio_view::data_processor::VOID_ELEMENTS;
use folio_view::{MatcherPattern, ViewElement, DEFAULT_PRIORITY};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute carrying the marker name on highlight and boundary elements
pub const MARKER_NAME_ATTRIBUTE: &str = "data-marker";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewElementDefinition {
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
    #[serde(default)]
    pub priority: Option<i32>,
}

impl ViewElementDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles.insert(property.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    fn decorate(&self, mut element: ViewElement) -> ViewElement {
        for (key, value) in &self.attributes {
            element = element.with_attribute(key.as_str(), value.as_str());
        }
        for class in &self.classes {
            element = element.with_class(class.as_str());
        }
        for (property, value) in &self.styles {
            element = element.with_style(property.as_str(), value.as_str());
        }
        element
    }

    /// A container element, or an empty one for void HTML names
    pub fn to_element(&self) -> ViewElement {
        if VOID_ELEMENTS.contains(&self.name.as_str()) {
            self.decorate(ViewElement::empty(&self.name))
        } else {
            self.decorate(ViewElement::container(&self.name))
        }
    }

    pub fn to_attribute_element(&self) -> ViewElement {
        self.decorate(ViewElement::attribute(&self.name, self.priority.unwrap_or(DEFAULT_PRIORITY)))
    }

    pub fn to_ui_element(&self) -> ViewElement {
        self.decorate(ViewElement::ui(&self.name))
    }

    /// Pattern matching elements created from this definition
    pub fn to_pattern(&self) -> MatcherPattern {
        let mut pattern = MatcherPattern::name(&self.name);
        for (key, value) in &self.attributes {
            pattern = pattern.with_attribute(key.as_str(), value.as_str());
        }
        for class in &self.classes {
            pattern = pattern.with_class(class.as_str());
        }
        for (property, value) in &self.styles {
            pattern = pattern.with_style(property.as_str(), value.as_str());
        }
        pattern
    }
}

impl From<&str> for ViewElementDefinition {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Model element `model` shown as the view element `view`
#[derive(Debug, Clone, PartialEq)]
pub struct ElementToElement {
    pub model: String,
    pub view: ViewElementDefinition,
    pub priority: Priority,
}

impl ElementToElement {
    pub fn new(model: impl Into<String>, view: impl Into<ViewElementDefinition>) -> Self {
        Self {
            model: model.into(),
            view: view.into(),
            priority: Priority::Normal,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Text attribute shown as an attribute element wrapping the text
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeToElement {
    pub model_key: String,
    /// Attribute value and the element standing for it
    pub views: Vec<(Value, ViewElementDefinition)>,
    pub priority: Priority,
}

impl AttributeToElement {
    /// A boolean attribute: `true` is shown as `view`
    pub fn new(model_key: impl Into<String>, view: impl Into<ViewElementDefinition>) -> Self {
        Self {
            model_key: model_key.into(),
            views: vec![(Value::Bool(true), view.into())],
            priority: Priority::Normal,
        }
    }

    /// An attribute whose values each get their own element
    pub fn with_values(model_key: impl Into<String>) -> Self {
        Self {
            model_key: model_key.into(),
            views: Vec::new(),
            priority: Priority::Normal,
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>, view: impl Into<ViewElementDefinition>) -> Self {
        self.views.push((value.into(), view.into()));
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn view_for(&self, value: &Value) -> Option<&ViewElementDefinition> {
        self.views
            .iter()
            .find(|(candidate, _)| candidate == value)
            .map(|(_, view)| view)
    }
}

/// Element attribute shown as an attribute of the bound view element
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeToAttribute {
    pub model_key: String,
    pub view_key: String,
    /// Only elements of this name, when set
    pub model_element: Option<String>,
    pub view_element: Option<String>,
    pub priority: Priority,
}

impl AttributeToAttribute {
    pub fn new(model_key: impl Into<String>, view_key: impl Into<String>) -> Self {
        Self {
            model_key: model_key.into(),
            view_key: view_key.into(),
            model_element: None,
            view_element: None,
            priority: Priority::Normal,
        }
    }

    pub fn on_elements(mut self, model: impl Into<String>, view: impl Into<String>) -> Self {
        self.model_element = Some(model.into());
        self.view_element = Some(view.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Markers of a group shown as attribute elements around their text
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerToHighlight {
    pub group: String,
    pub view: ViewElementDefinition,
    pub priority: Priority,
}

impl MarkerToHighlight {
    pub fn new(group: impl Into<String>, view: impl Into<ViewElementDefinition>) -> Self {
        Self {
            group: group.into(),
            view: view.into(),
            priority: Priority::Normal,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Markers of a group shown as a pair of UI elements at their boundaries
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerToElement {
    pub group: String,
    pub view: ViewElementDefinition,
    pub priority: Priority,
}

impl MarkerToElement {
    pub fn new(group: impl Into<String>, view: impl Into<ViewElementDefinition>) -> Self {
        Self {
            group: group.into(),
            view: view.into(),
            priority: Priority::Normal,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// String form of a model attribute value as written to the view
pub fn value_to_view(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
