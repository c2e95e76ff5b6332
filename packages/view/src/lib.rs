//! # Folio View
//!
//! A lightweight tree mirroring the rendered DOM, plus everything that
//! connects it to a real DOM: observers, the renderer and the HTML data
//! processor.
//!
//! ## Architecture
//!
//! ```text
//! DOM events ──▶ View::handle_dom_event ──▶ Observer ──▶ ViewDocument::fire
//!
//! DowncastWriter ──▶ ViewDocument roots ──▶ Renderer ──▶ DomPatch list
//!
//! HTML ◀──▶ HtmlDataProcessor ◀──▶ ViewFragment
//! ```
//!
//! ## Element kinds
//!
//! - **Container**: blocks such as `<p>`; never split by attribute wrapping
//! - **Attribute**: inline formatting; broken and merged by the writer,
//!   nested by priority
//! - **Empty**, **UI** and **Raw**: leaves whose content the view does not
//!   edit
//! - **Editable** and **Root**: nested and top level editing hosts

pub mod data_processor;
pub mod document;
pub mod dom_context;
pub mod error;
pub mod keyboard;
pub mod lexer;
pub mod matcher;
pub mod node;
pub mod observer;
pub mod position;
pub mod renderer;
pub mod selection;
pub mod view;
pub mod writer;

pub use data_processor::HtmlDataProcessor;
pub use document::ViewDocument;
pub use dom_context::{DomContext, DomListener};
pub use error::{ViewError, ViewResult};
pub use keyboard::{is_arrow_key_code, key_code, keystroke_to_string, parse_keystroke, KeystrokeInfo};
pub use matcher::{MatchResult, Matcher, MatcherPattern};
pub use node::{ElementKind, ViewAttributes, ViewElement, ViewFragment, ViewNode, ViewNodeId, ViewText, DEFAULT_PRIORITY};
pub use observer::{
    ClickObserver, CompositionObserver, CompositionState, DomEvent, DomEventData, DomEventSource, FocusObserver,
    KeyObserver, MouseObserver, ObservedEvent, Observer, ObserverKind, PointerObserver, TouchObserver,
};
pub use position::{ViewPosition, ViewRange};
pub use renderer::{apply_patches, diff_dom_node, render_element, DomNode, DomPatch, Renderer, RootPatches};
pub use selection::ViewSelection;
pub use view::View;
pub use writer::DowncastWriter;
