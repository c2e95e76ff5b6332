//! # Folio Conversion
//!
//! Moves content between the model and the view in both directions.
//!
//! ## Architecture
//!
//! ```text
//!   model ChangeSet ──► DowncastDispatcher ──► DowncastWriter ──► view
//!                           │        ▲
//!                           ▼        │
//!                            Mapper
//!                           ▲        │
//!                           │        ▼
//!   view fragment ──► UpcastDispatcher ──► DocumentFragment ──► model
//! ```
//!
//! ## Core Principles
//!
//! 1. **Events per item**: every changed model item and every view node
//!    fires its own namespaced event
//! 2. **Consume before acting**: converters run in priority order and skip
//!    whatever a higher priority converter already handled
//! 3. **Schema first**: upcast output always satisfies the schema, splitting
//!    or paragraph-wrapping content when it has to
//! 4. **Markers survive the trip**: highlights and boundary elements carry
//!    the marker name and read back as fragment markers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_conversion::{AttributeToElement, Conversion, ElementToElement};
//!
//! let mut conversion = Conversion::new();
//! conversion.element_to_element(ElementToElement::new("paragraph", "p"));
//! conversion.attribute_to_element(AttributeToElement::new("bold", "strong"));
//!
//! let fragment = conversion.upcast().convert(&view, &schema, context)?;
//! ```

pub mod consumable;
pub mod conversion;
pub mod definition;
pub mod downcast;
pub mod downcast_helpers;
pub mod error;
pub mod mapper;
pub mod upcast;
pub mod upcast_helpers;

pub use consumable::{ConsumableItem, ModelConsumable, ViewConsumable};
pub use conversion::{Conversion, ConversionGroup, GroupHelpers};
pub use definition::{
    AttributeToAttribute, AttributeToElement, ElementToElement, MarkerToElement, MarkerToHighlight,
    ViewElementDefinition, MARKER_NAME_ATTRIBUTE,
};
pub use downcast::{DowncastApi, DowncastData, DowncastDispatcher, DowncastHandler, ModelItem};
pub use error::{ConversionError, ConversionResult};
pub use mapper::Mapper;
pub use upcast::{UpcastApi, UpcastData, UpcastDispatcher, UpcastHandler, MARKER_ELEMENT};
