//! Rust extractor using tree-sitter.

use super::result::{ExtractError, Extraction, ReferenceKind};
use super::traits::Extractor;
use super::treesitter::{
    CallPattern, DefinitionPattern, HeritagePattern, ImportPattern, LanguagePatterns,
    TreeSitterExtractor,
};
use crate::knowledge::ontology::{Language, SymbolKind};

static PATTERNS: LanguagePatterns = LanguagePatterns {
    definitions: &[
        DefinitionPattern {
            node_kind: "function_item",
            name_field: "name",
            kind: SymbolKind::Function,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "function_signature_item",
            name_field: "name",
            kind: SymbolKind::Method,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "struct_item",
            name_field: "name",
            kind: SymbolKind::Class,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "enum_item",
            name_field: "name",
            kind: SymbolKind::Class,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "trait_item",
            name_field: "name",
            kind: SymbolKind::Interface,
            guard: None,
        },
    ],
    containers: &["trait_item"],
    owners: &[("impl_item", "type")],
    calls: &[CallPattern { node_kind: "call_expression", callee_field: "function" }],
    imports: &[ImportPattern { node_kind: "use_declaration", field: Some("argument") }],
    heritage: &[
        HeritagePattern {
            node_kind: "impl_item",
            field: Some("trait"),
            kind: ReferenceKind::Implements,
            owner_field: Some("type"),
        },
        HeritagePattern {
            node_kind: "trait_item",
            field: Some("bounds"),
            kind: ReferenceKind::Extends,
            owner_field: None,
        },
    ],
    modules: &[],
};

/// Rust extractor using tree-sitter.
pub struct RustExtractor {
    base: TreeSitterExtractor,
}

impl RustExtractor {
    pub fn new() -> Self {
        Self {
            base: TreeSitterExtractor::new(
                tree_sitter_rust::LANGUAGE.into(),
                Language::Rust,
                &["rs"],
                &PATTERNS,
            ),
        }
    }
}

impl Default for RustExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for RustExtractor {
    fn extract(&self, path: &str, content: &str) -> Result<Extraction, ExtractError> {
        self.base.extract(path, content)
    }

    fn language(&self) -> Language {
        self.base.language()
    }

    fn supported_extensions(&self) -> &[&'static str] {
        self.base.extensions()
    }
}
