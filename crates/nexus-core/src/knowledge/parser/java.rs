//! Java extractor using tree-sitter.

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
            node_kind: "enum_declaration",
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
    ],
    containers: &[],
    owners: &[],
    calls: &[
        CallPattern { node_kind: "method_invocation", callee_field: "name" },
        CallPattern { node_kind: "object_creation_expression", callee_field: "type" },
    ],
    imports: &[ImportPattern { node_kind: "import_declaration", field: None }],
    heritage: &[
        HeritagePattern {
            node_kind: "superclass",
            field: None,
            kind: ReferenceKind::Extends,
            owner_field: None,
        },
        HeritagePattern {
            node_kind: "super_interfaces",
            field: None,
            kind: ReferenceKind::Implements,
            owner_field: None,
        },
        HeritagePattern {
            node_kind: "extends_interfaces",
            field: None,
            kind: ReferenceKind::Extends,
            owner_field: None,
        },
    ],
    modules: &[ModulePattern { node_kind: "package_declaration", field: None }],
};

/// Java extractor using tree-sitter.
pub struct JavaExtractor {
    base: TreeSitterExtractor,
}

impl JavaExtractor {
    pub fn new() -> Self {
        Self {
            base: TreeSitterExtractor::new(
                tree_sitter_java::LANGUAGE.into(),
                Language::Java,
                &["java"],
                &PATTERNS,
            ),
        }
    }
}

impl Default for JavaExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for JavaExtractor {
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
    fn test_java_extraction() {
        let src = r#"package com.acme.billing;

import com.acme.core.Repository;
import com.acme.util.*;

public class InvoiceService extends BaseService<Invoice> implements Auditable, Closeable {
    public InvoiceService() {
        this.repo = new Repository<Invoice>();
    }

    public void issue(Invoice invoice) {
        validate(invoice);
        repo.save(invoice);
    }
}
"#;
        let extraction = JavaExtractor::new()
            .extract("src/main/java/com/acme/billing/InvoiceService.java", src)
            .unwrap();

        assert_eq!(extraction.module.as_deref(), Some("com.acme.billing"));

        let defs: Vec<_> = extraction
            .definitions
            .iter()
            .map(|d| (d.kind, d.name.as_str(), d.enclosing))
            .collect();
        assert_eq!(
            defs,
            vec![
                (SymbolKind::Class, "InvoiceService", None),
                (SymbolKind::Method, "InvoiceService", Some(0)),
                (SymbolKind::Method, "issue", Some(0)),
            ]
        );

        let imports: Vec<_> = extraction
            .references_of(ReferenceKind::Import)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(imports, vec!["com.acme.core.Repository", "com.acme.util.*"]);

        let extends: Vec<_> = extraction
            .references_of(ReferenceKind::Extends)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(extends, vec!["BaseService"]);

        let implements: Vec<_> = extraction
            .references_of(ReferenceKind::Implements)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(implements, vec!["Auditable", "Closeable"]);

        let calls: Vec<_> = extraction
            .references_of(ReferenceKind::Call)
            .map(|r| (r.name.as_str(), r.scope))
            .collect();
        assert_eq!(
            calls,
            vec![("Repository", Some(1)), ("validate", Some(2)), ("save", Some(2))]
        );
    }
}
