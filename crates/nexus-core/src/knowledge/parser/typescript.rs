//! TypeScript and JavaScript extractors using tree-sitter.

use super::result::{ExtractError, Extraction, ReferenceKind};
use super::traits::Extractor;
use super::treesitter::{
    CallPattern, DefinitionPattern, FieldGuard, HeritagePattern, ImportPattern, LanguagePatterns,
    TreeSitterExtractor,
};
use crate::knowledge::ontology::{Language, SymbolKind};

const FUNCTION_VALUES: FieldGuard = FieldGuard {
    field: "value",
    kinds: &["arrow_function", "function_expression", "function", "generator_function"],
};

const CALLS: &[CallPattern] = &[
    CallPattern { node_kind: "call_expression", callee_field: "function" },
    CallPattern { node_kind: "new_expression", callee_field: "constructor" },
];

const IMPORTS: &[ImportPattern] = &[
    ImportPattern { node_kind: "import_statement", field: Some("source") },
    ImportPattern { node_kind: "export_statement", field: Some("source") },
];

static TYPESCRIPT_PATTERNS: LanguagePatterns = LanguagePatterns {
    definitions: &[
        DefinitionPattern {
            node_kind: "class_declaration",
            name_field: "name",
            kind: SymbolKind::Class,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "abstract_class_declaration",
            name_field: "name",
            kind: SymbolKind::Class,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "interface_declaration",
            name_field: "name",
            kind: SymbolKind::Interface,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "function_declaration",
            name_field: "name",
            kind: SymbolKind::Function,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "generator_function_declaration",
            name_field: "name",
            kind: SymbolKind::Function,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "method_definition",
            name_field: "name",
            kind: SymbolKind::Method,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "abstract_method_signature",
            name_field: "name",
            kind: SymbolKind::Method,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "variable_declarator",
            name_field: "name",
            kind: SymbolKind::Function,
            guard: Some(FUNCTION_VALUES),
        },
    ],
    containers: &["class_body"],
    owners: &[],
    calls: CALLS,
    imports: IMPORTS,
    heritage: &[
        HeritagePattern {
            node_kind: "extends_clause",
            field: None,
            kind: ReferenceKind::Extends,
            owner_field: None,
        },
        HeritagePattern {
            node_kind: "implements_clause",
            field: None,
            kind: ReferenceKind::Implements,
            owner_field: None,
        },
        HeritagePattern {
            node_kind: "extends_type_clause",
            field: None,
            kind: ReferenceKind::Extends,
            owner_field: None,
        },
    ],
    modules: &[],
};

static JAVASCRIPT_PATTERNS: LanguagePatterns = LanguagePatterns {
    definitions: &[
        DefinitionPattern {
            node_kind: "class_declaration",
            name_field: "name",
            kind: SymbolKind::Class,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "function_declaration",
            name_field: "name",
            kind: SymbolKind::Function,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "generator_function_declaration",
            name_field: "name",
            kind: SymbolKind::Function,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "method_definition",
            name_field: "name",
            kind: SymbolKind::Method,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "variable_declarator",
            name_field: "name",
            kind: SymbolKind::Function,
            guard: Some(FUNCTION_VALUES),
        },
    ],
    containers: &["class_body"],
    owners: &[],
    calls: CALLS,
    imports: IMPORTS,
    heritage: &[HeritagePattern {
        node_kind: "class_heritage",
        field: None,
        kind: ReferenceKind::Extends,
        owner_field: None,
    }],
    modules: &[],
};

/// TypeScript / JavaScript extractor using tree-sitter.
pub struct TypeScriptExtractor {
    base: TreeSitterExtractor,
}

impl TypeScriptExtractor {
    /// Create a TypeScript extractor.
    pub fn typescript() -> Self {
        Self {
            base: TreeSitterExtractor::new(
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
                Language::TypeScript,
                &["ts"],
                &TYPESCRIPT_PATTERNS,
            ),
        }
    }

    /// Create a TSX extractor (TypeScript with JSX).
    pub fn tsx() -> Self {
        Self {
            base: TreeSitterExtractor::new(
                tree_sitter_typescript::LANGUAGE_TSX.into(),
                Language::TypeScript,
                &["tsx"],
                &TYPESCRIPT_PATTERNS,
            ),
        }
    }

    /// Create a JavaScript extractor.
    pub fn javascript() -> Self {
        Self {
            base: TreeSitterExtractor::new(
                tree_sitter_javascript::LANGUAGE.into(),
                Language::JavaScript,
                &["js", "jsx", "mjs", "cjs"],
                &JAVASCRIPT_PATTERNS,
            ),
        }
    }
}

impl Extractor for TypeScriptExtractor {
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
