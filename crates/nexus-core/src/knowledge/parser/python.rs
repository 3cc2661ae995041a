//! Python extractor using tree-sitter.

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
            node_kind: "class_definition",
            name_field: "name",
            kind: SymbolKind::Class,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "function_definition",
            name_field: "name",
            kind: SymbolKind::Function,
            guard: None,
        },
    ],
    containers: &["class_definition"],
    owners: &[],
    calls: &[CallPattern { node_kind: "call", callee_field: "function" }],
    imports: &[
        ImportPattern { node_kind: "import_statement", field: Some("name") },
        ImportPattern { node_kind: "import_from_statement", field: Some("module_name") },
    ],
    heritage: &[HeritagePattern {
        node_kind: "class_definition",
        field: Some("superclasses"),
        kind: ReferenceKind::Extends,
        owner_field: None,
    }],
    modules: &[],
};

/// Python extractor using tree-sitter.
pub struct PythonExtractor {
    base: TreeSitterExtractor,
}

impl PythonExtractor {
    pub fn new() -> Self {
        Self {
            base: TreeSitterExtractor::new(
                tree_sitter_python::LANGUAGE.into(),
                Language::Python,
                &["py", "pyi"],
                &PATTERNS,
            ),
        }
    }
}

impl Default for PythonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for PythonExtractor {
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
