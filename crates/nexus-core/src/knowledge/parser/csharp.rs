//! C# extractor using tree-sitter.

use super::result::{ExtractError, Extraction, ReferenceKind};
use super::traits::Extractor;
use super::treesitter::{
    CallPattern, DefinitionPattern, HeritagePattern, ImportPattern, LanguagePatterns,
    ModulePattern, TreeSitterExtractor,
};
use crate::knowledge::ontology::{Language, SymbolKind};

static PATTERNS: LanguagePatterns = LanguagePatterns {
    definitions: &[
        DefinitionPattern {
            node_kind: "class_declaration",
            name_field: "name",
            kind: SymbolKind::Class,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "struct_declaration",
            name_field: "name",
            kind: SymbolKind::Class,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "record_declaration",
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
            node_kind: "method_declaration",
            name_field: "name",
            kind: SymbolKind::Method,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "constructor_declaration",
            name_field: "name",
            kind: SymbolKind::Method,
            guard: None,
        },
        DefinitionPattern {
            node_kind: "local_function_statement",
            name_field: "name",
            kind: SymbolKind::Function,
            guard: None,
        },
    ],
    containers: &[],
    owners: &[],
    calls: &[
        CallPattern { node_kind: "invocation_expression", callee_field: "function" },
        CallPattern { node_kind: "object_creation_expression", callee_field: "type" },
    ],
    imports: &[ImportPattern { node_kind: "using_directive", field: None }],
    heritage: &[HeritagePattern {
        node_kind: "base_list",
        field: None,
        kind: ReferenceKind::Extends,
        owner_field: None,
    }],
    modules: &[
        ModulePattern { node_kind: "namespace_declaration", field: Some("name") },
        ModulePattern { node_kind: "file_scoped_namespace_declaration", field: Some("name") },
    ],
};

/// C# extractor using tree-sitter.
pub struct CSharpExtractor {
    base: TreeSitterExtractor,
}

impl CSharpExtractor {
    pub fn new() -> Self {
        Self {
            base: TreeSitterExtractor::new(
                tree_sitter_c_sharp::LANGUAGE.into(),
                Language::CSharp,
                &["cs"],
                &PATTERNS,
            ),
        }
    }
}

impl Default for CSharpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for CSharpExtractor {
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

    #[test]
    fn test_csharp_extraction() {
        let src = r#"using System;
using Acme.Data;

namespace Acme.Orders
{
    public class OrderService : ServiceBase, IOrderService
    {
        public OrderService()
        {
            _repo = new OrderRepository();
        }

        public void Place(Order order)
        {
            Validate(order);
            _repo.Save(order);
        }
    }
}
"#;
        let extraction = CSharpExtractor::new().extract("Orders/OrderService.cs", src).unwrap();

        assert_eq!(extraction.module.as_deref(), Some("Acme.Orders"));

        let defs: Vec<_> = extraction
            .definitions
            .iter()
            .map(|d| (d.kind, d.name.as_str()))
            .collect();
        assert_eq!(
            defs,
            vec![
                (SymbolKind::Class, "OrderService"),
                (SymbolKind::Method, "OrderService"),
                (SymbolKind::Method, "Place"),
            ]
        );

        let imports: Vec<_> = extraction
            .references_of(ReferenceKind::Import)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(imports, vec!["System", "Acme.Data"]);

        let bases: Vec<_> = extraction
            .references_of(ReferenceKind::Extends)
            .map(|r| (r.name.as_str(), r.scope))
            .collect();
        assert_eq!(bases, vec![("ServiceBase", Some(0)), ("IOrderService", Some(0))]);

        let calls: Vec<_> = extraction
            .references_of(ReferenceKind::Call)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(calls, vec!["OrderRepository", "Validate", "Save"]);
    }
}
