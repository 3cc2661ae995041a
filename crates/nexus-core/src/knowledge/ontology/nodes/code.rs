//! Code entity nodes: Functions, Classes, Interfaces, Methods.
//!
//! These represent the core code constructs that make up a codebase.

use serde::{Deserialize, Serialize};

// =============================================================================
// SYMBOL KIND
// =============================================================================

/// The closed set of symbol kinds the extractors produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Interface,
    Method,
}

impl SymbolKind {
    pub const ALL: [SymbolKind; 4] = [Self::Function, Self::Class, Self::Interface, Self::Method];

    /// Lower-case name, used in ids and table names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Method => "method",
        }
    }

    /// Display name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Function => "Function",
            Self::Class => "Class",
            Self::Interface => "Interface",
            Self::Method => "Method",
        }
    }

    /// Kinds that contain executable code and so can make calls.
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function | Self::Method)
    }

    /// Kinds a call can resolve to. Classes count because of constructor calls.
    pub fn is_call_target(&self) -> bool {
        matches!(self, Self::Function | Self::Method | Self::Class)
    }

    /// Kinds that may appear in a heritage clause.
    pub fn is_type(&self) -> bool {
        matches!(self, Self::Class | Self::Interface)
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// SOURCE RANGE
// =============================================================================

/// Byte range plus 1-based line span of a syntax node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceRange {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: u32,
    pub end_line: u32,
}

impl SourceRange {
    /// Whether `other` lies entirely within this range.
    pub fn contains(&self, other: &SourceRange) -> bool {
        self.start_byte <= other.start_byte && other.end_byte <= self.end_byte
    }
}

// =============================================================================
// SYMBOL NODE
// =============================================================================

/// A named definition in a source file.
///
/// Identity is `(file_path, kind, name, range)`; two symbols with the same
/// name in different files are distinct nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolNode {
    /// Unique identifier (`<kind>:<path>:<name>:<startByte>`)
    pub id: String,

    /// Symbol name
    pub name: String,

    /// Symbol kind
    pub kind: SymbolKind,

    /// File declaring this symbol
    pub file_path: String,

    /// Location in the file
    pub range: SourceRange,

    /// Id of the enclosing symbol (the class of a method)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing: Option<String>,

    /// Source text of the definition, kept for keyword search
    pub snippet: String,
}

impl SymbolNode {
    /// Node id for a symbol.
    pub fn id_for(kind: SymbolKind, path: &str, name: &str, start_byte: usize) -> String {
        format!("{}:{}:{}:{}", kind.as_str(), path, name, start_byte)
    }
}
