//! Go extractor using tree-sitter.

use super::result::{ExtractError, Extraction};
use super::traits::Extractor;
use super::treesitter::{
    CallPattern, DefinitionPattern, FieldGuard, ImportPattern, LanguagePatterns,
    TreeSitterExtractor,
};
use crate::knowledge::ontology::{Language, SymbolKind};

static PATTERNS: LanguagePatterns = LanguagePatterns {
    definitions: &[
        DefinitionPattern {
            node_kind: "function_declaration",
            name_field: "name",
            kind: SymbolKind::Function,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "method_declaration",
            name_field: "name",
            kind: SymbolKind::Method,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "type_spec",
            name_field: "name",
            kind: SymbolKind::Class,
            guard: Some(FieldGuard { field: "type", kinds: &["struct_type"] }),
        },
        DefinitionPattern {
            node_kind: "type_spec",
            name_field: "name",
            kind: SymbolKind::Interface,
            guard: Some(FieldGuard { field: "type", kinds: &["interface_type"] }),
        },
    ],
    containers: &[],
    owners: &[],
    calls: &[CallPattern { node_kind: "call_expression", callee_field: "function" }],
    imports: &[ImportPattern { node_kind: "import_spec", field: Some("path") }],
    heritage: &[],
    modules: &[],
};

/// Go extractor using tree-sitter.
pub struct GoExtractor {
    base: TreeSitterExtractor,
}

impl GoExtractor {
    pub fn new() -> Self {
        Self {
            base: TreeSitterExtractor::new(
                tree_sitter_go::LANGUAGE.into(),
                Language::Go,
                &["go"],
                &PATTERNS,
            ),
        }
    }
}

impl Default for GoExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for GoExtractor {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::parser::ReferenceKind;

    #[test]
    fn test_go_extraction() {
        let src = r#"package server

import (
	"fmt"
	"example.com/app/store"
)

type Server struct {
	db *store.DB
}

type Handler interface {
	Serve()
}

func (s *Server) Serve() {
	fmt.Println("serving")
	s.db.Load()
}

func NewServer() *Server {
	return &Server{}
}
"#;
        let extraction = GoExtractor::new().extract("server/server.go", src).unwrap();

        let defs: Vec<_> = extraction
            .definitions
            .iter()
            .map(|d| (d.kind, d.name.as_str()))
            .collect();
        assert_eq!(
            defs,
            vec![
                (SymbolKind::Class, "Server"),
                (SymbolKind::Interface, "Handler"),
                (SymbolKind::Method, "Serve"),
                (SymbolKind::Function, "NewServer"),
            ]
        );

        let imports: Vec<_> = extraction
            .references_of(ReferenceKind::Import)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(imports, vec!["fmt", "example.com/app/store"]);

        let calls: Vec<_> = extraction
            .references_of(ReferenceKind::Call)
            .map(|r| (r.name.as_str(), r.scope))
            .collect();
        assert_eq!(calls, vec![("Println", Some(2)), ("Load", Some(2))]);
    }
}
