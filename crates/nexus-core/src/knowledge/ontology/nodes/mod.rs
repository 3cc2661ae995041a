//! Node types for the knowledge graph.
//!
//! Nodes represent entities in the codebase. They are organized by domain:
//!
//! - **Structure**: Files
//! - **Code**: Functions, Classes, Interfaces, Methods
//! - **Overlay**: Communities, Processes

mod code;
mod overlay;
mod structure;

pub use code::*;
pub use overlay::*;
pub use structure::*;
