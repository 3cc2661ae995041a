//! Knowledge Graph Ontology
//!
//! Defines the schema of the code knowledge graph.
//!
//! ## Modules
//!
//! - `nodes/` - Entity types: Structure (File), Code (Function, Class, Interface,
//!   Method), Overlays (Community, Process)
//! - `edges/` - The single typed relation `CodeRelation` with its relation types
//! - `schema` - Static description of node/edge types for ad-hoc queries
//!
//! ## Design Principles
//!
//! - Files and symbols form the base graph, owned by the assembler
//! - Communities and processes are derived overlays that reference symbols
//!   by value and never hold back-pointers into them

pub mod edges;
pub mod nodes;
pub mod schema;

pub use edges::*;
pub use nodes::*;

use serde::{Deserialize, Serialize};

/// Reference to a node inside one graph snapshot.
///
/// The index addresses the snapshot collection of the matching variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeRef {
    File(usize),
    Symbol(usize),
    Community(usize),
    Process(usize),
}

impl NodeRef {
    /// Symbol index if this references a symbol.
    pub fn symbol(self) -> Option<usize> {
        match self {
            Self::Symbol(idx) => Some(idx),
            _ => None,
        }
    }

    /// File index if this references a file.
    pub fn file(self) -> Option<usize> {
        match self {
            Self::File(idx) => Some(idx),
            _ => None,
        }
    }
}

/// Categories of nodes for filtering and organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Source files
    Structure,
    /// Code symbols (functions, classes, interfaces, methods)
    Code,
    /// Derived analysis nodes (communities, processes)
    Overlay,
}
