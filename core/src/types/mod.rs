//! Type definitions shared across the engine
//!
//! - Source locations (Span)
//! - Runtime values (Val)

pub mod ast;
pub mod values;

pub use ast::Span;
pub use values::{ContentHash, Number, Val};
