//! # Conversion
//!
//! Facade over the dispatchers of one editor: the editing downcast (model
//! to editing view), the data downcast (model to output data) and the
//! upcast (data to model).
//!
//! ## Design
//!
//! - Converters are registered per group. `Downcast` covers both downcast
//!   dispatchers, `EditingDowncast` and `DataDowncast` one each.
//! - The two-way helpers register the same configuration in every
//!   dispatcher, so data written by the data downcast reads back through
//!   the upcast.
//! - Default converters (text, removal, selection, unclaimed elements) sit
//!   at [`Priority::Lowest`] and are overridable by anything registered later.
//!
//! ```rust,ignore
//! let mut conversion = Conversion::new();
//! conversion.element_to_element(ElementToElement::new("paragraph", "p"));
//! conversion
//!     .for_group(ConversionGroup::EditingDowncast)
//!     .add(|dispatcher| dispatcher.on("insert:image", Priority::High, image_converter));
//! ```

use crate::definition::{AttributeToAttribute, AttributeToElement, ElementToElement, MarkerToElement, MarkerToHighlight};
use crate::downcast::{convert_range_selection, insert_text, remove, DowncastDispatcher};
use crate::upcast::{convert_text, convert_to_model_fragment, UpcastDispatcher};
use folio_common::Priority;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConversionGroup {
    Downcast,
    EditingDowncast,
    DataDowncast,
    Upcast,
}

#[derive(Debug)]
pub struct Conversion {
    editing_downcast: DowncastDispatcher,
    data_downcast: DowncastDispatcher,
    upcast: UpcastDispatcher,
}

impl Default for Conversion {
    fn default() -> Self {
        Self::new()
    }
}

fn with_default_downcast(mut dispatcher: DowncastDispatcher) -> DowncastDispatcher {
    dispatcher.on("insert:$text", Priority::Lowest, insert_text);
    dispatcher.on("remove", Priority::Lowest, remove);
    dispatcher.on("selection", Priority::Lowest, convert_range_selection);
    dispatcher
}

impl Conversion {
    pub fn new() -> Self {
        Self::with_paragraph_element("paragraph")
    }

    /// Conversion whose upcast wraps stray text in `paragraph_element`
    pub fn with_paragraph_element(paragraph_element: &str) -> Self {
        let mut upcast = UpcastDispatcher::new().with_paragraph_element(paragraph_element);
        upcast.on("text", Priority::Lowest, convert_text);
        upcast.on("element", Priority::Lowest, convert_to_model_fragment);
        Self {
            editing_downcast: with_default_downcast(DowncastDispatcher::new()),
            data_downcast: with_default_downcast(DowncastDispatcher::new()),
            upcast,
        }
    }

    pub fn editing_downcast(&self) -> &DowncastDispatcher {
        &self.editing_downcast
    }

    pub fn data_downcast(&self) -> &DowncastDispatcher {
        &self.data_downcast
    }

    pub fn upcast(&self) -> &UpcastDispatcher {
        &self.upcast
    }

    pub fn for_group(&mut self, group: ConversionGroup) -> GroupHelpers<'_> {
        GroupHelpers {
            conversion: self,
            group,
        }
    }

    fn downcast_dispatchers(&mut self, group: ConversionGroup) -> Vec<&mut DowncastDispatcher> {
        match group {
            ConversionGroup::Downcast => vec![&mut self.editing_downcast, &mut self.data_downcast],
            ConversionGroup::EditingDowncast => vec![&mut self.editing_downcast],
            ConversionGroup::DataDowncast => vec![&mut self.data_downcast],
            ConversionGroup::Upcast => Vec::new(),
        }
    }

    pub fn element_to_element(&mut self, config: ElementToElement) {
        self.for_group(ConversionGroup::Downcast).element_to_element(&config);
        self.for_group(ConversionGroup::Upcast).element_to_element(&config);
    }

    pub fn attribute_to_element(&mut self, config: AttributeToElement) {
        self.for_group(ConversionGroup::Downcast).attribute_to_element(&config);
        self.for_group(ConversionGroup::Upcast).attribute_to_element(&config);
    }

    pub fn attribute_to_attribute(&mut self, config: AttributeToAttribute) {
        self.for_group(ConversionGroup::Downcast).attribute_to_attribute(&config);
        self.for_group(ConversionGroup::Upcast).attribute_to_attribute(&config);
    }

    pub fn marker_to_highlight(&mut self, config: MarkerToHighlight) {
        self.for_group(ConversionGroup::Downcast).marker_to_highlight(&config);
        self.for_group(ConversionGroup::Upcast).marker_to_highlight(&config);
    }

    pub fn marker_to_element(&mut self, config: MarkerToElement) {
        self.for_group(ConversionGroup::Downcast).marker_to_element(&config);
        self.for_group(ConversionGroup::Upcast).marker_to_element(&config);
    }
}

/// Helpers registering converters in every dispatcher of one group
pub struct GroupHelpers<'a> {
    conversion: &'a mut Conversion,
    group: ConversionGroup,
}

impl GroupHelpers<'_> {
    /// Run `register` on each downcast dispatcher of the group
    pub fn add(self, register: impl Fn(&mut DowncastDispatcher)) -> Self {
        for dispatcher in self.conversion.downcast_dispatchers(self.group) {
            register(dispatcher);
        }
        self
    }

    /// Run `register` on the upcast dispatcher when this is the upcast group
    pub fn add_upcast(self, register: impl FnOnce(&mut UpcastDispatcher)) -> Self {
        if self.group == ConversionGroup::Upcast {
            register(&mut self.conversion.upcast);
        }
        self
    }

    pub fn element_to_element(self, config: &ElementToElement) -> Self {
        self.add(|dispatcher| {
            config.downcast(dispatcher);
        })
        .add_upcast(|dispatcher| {
            config.upcast(dispatcher);
        })
    }

    pub fn attribute_to_element(self, config: &AttributeToElement) -> Self {
        self.add(|dispatcher| {
            config.downcast(dispatcher);
        })
        .add_upcast(|dispatcher| {
            config.upcast(dispatcher);
        })
    }

    pub fn attribute_to_attribute(self, config: &AttributeToAttribute) -> Self {
        self.add(|dispatcher| {
            config.downcast(dispatcher);
        })
        .add_upcast(|dispatcher| {
            config.upcast(dispatcher);
        })
    }

    pub fn marker_to_highlight(self, config: &MarkerToHighlight) -> Self {
        self.add(|dispatcher| {
            config.downcast(dispatcher);
        })
        .add_upcast(|dispatcher| {
            config.upcast(dispatcher);
        })
    }

    pub fn marker_to_element(self, config: &MarkerToElement) -> Self {
        self.add(|dispatcher| {
            config.downcast(dispatcher);
        })
        .add_upcast(|dispatcher| {
            config.upcast(dispatcher);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_reach_their_dispatchers() {
        let mut conversion = Conversion::new();
        conversion
            .for_group(ConversionGroup::EditingDowncast)
            .element_to_element(&ElementToElement::new("image", "figure"));
        assert!(conversion.editing_downcast().has_handlers("insert:image"));
        assert!(!conversion.data_downcast().has_handlers("insert:image"));

        conversion.element_to_element(ElementToElement::new("paragraph", "p"));
        assert!(conversion.editing_downcast().has_handlers("insert:paragraph"));
        assert!(conversion.data_downcast().has_handlers("insert:paragraph"));
    }

    #[test]
    fn test_defaults_are_registered() {
        let conversion = Conversion::new();
        assert!(conversion.data_downcast().has_handlers("insert:$text"));
        assert!(conversion.data_downcast().has_handlers("remove:paragraph"));
        assert!(conversion.editing_downcast().has_handlers("selection"));
        assert_eq!(conversion.upcast().paragraph_element(), "paragraph");
    }
}
