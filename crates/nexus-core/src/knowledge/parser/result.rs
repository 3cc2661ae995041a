//! Extraction result types: definitions and references found in one file.

use thiserror::Error;

use crate::knowledge::ontology::{Language, SourceRange, SymbolKind};

/// Why a single file could not be extracted.
///
/// Always a soft failure: the file is skipped and ingestion continues.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to load grammar: {0}")]
    Grammar(String),

    #[error("Parser produced no syntax tree")]
    NoTree,

    #[error("Syntax tree has errors and yields no definitions or references")]
    Erroneous,

    #[error("No extractor for file: {0}")]
    Unsupported(String),
}

/// Kind of a textual reference found in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// Module path named by an import statement
    Import,
    /// Name of a called function, method or constructor
    Call,
    /// Supertype named in a heritage clause
    Extends,
    /// Interface named in a heritage clause
    Implements,
}

/// A symbol definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub kind: SymbolKind,
    pub name: String,
    pub range: SourceRange,
    /// Index of the enclosing type-like definition in the same extraction.
    pub enclosing: Option<usize>,
}

/// A reference to something named elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub kind: ReferenceKind,
    /// Module path for imports, bare name otherwise.
    pub name: String,
    pub range: SourceRange,
    /// Index of the definition the reference occurs in; `None` means file scope.
    pub scope: Option<usize>,
}

/// Result of extracting a source file.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// File path that was parsed.
    pub file_path: String,

    pub language: Language,

    /// Declared module name (Java package, C# namespace).
    pub module: Option<String>,

    /// Definitions in source order.
    pub definitions: Vec<Definition>,

    /// References in source order.
    pub references: Vec<Reference>,

    /// Non-fatal issues.
    pub warnings: Vec<String>,
}

impl Extraction {
    pub fn new(file_path: impl Into<String>, language: Language) -> Self {
        Self {
            file_path: file_path.into(),
            language,
            module: None,
            definitions: Vec::new(),
            references: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add a parse warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty() && self.references.is_empty()
    }

    /// References of one kind.
    pub fn references_of(&self, kind: ReferenceKind) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(move |r| r.kind == kind)
    }

    /// Definitions named `name`.
    pub fn definitions_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Definition> + 'a {
        self.definitions.iter().filter(move |d| d.name == name)
    }
}
