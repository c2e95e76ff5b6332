//! # Folio Common
//!
//! Building blocks shared by every layer of the engine:
//!
//! - [`Priority`] and [`HandlerList`]: ordered handler chains
//! - [`Emitter`]: a typed event bus with stop/return semantics
//! - [`Observable`]: a value that notifies listeners when it changes

pub mod emitter;
pub mod error;
pub mod observable;
pub mod priority;
pub mod result;

pub use emitter::*;
pub use error::*;
pub use observable::*;
pub use priority::*;
pub use result::*;
