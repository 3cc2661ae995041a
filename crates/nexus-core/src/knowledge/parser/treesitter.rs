//! Tree-sitter based extraction shared across language extractors.
//!
//! Each language supplies a static [`LanguagePatterns`] table; the walker in
//! this module matches every node of the syntax tree against it.

use tree_sitter::{Language as Grammar, Node, Parser as TSParser, Tree};

use super::result::{Definition, ExtractError, Extraction, Reference, ReferenceKind};
use crate::knowledge::ontology::{Language, SourceRange, SymbolKind};

// =============================================================================
// PATTERN TABLES
// =============================================================================

/// Restricts a pattern to nodes whose `field` child has one of `kinds`.
#[derive(Debug, Clone, Copy)]
pub struct FieldGuard {
    pub field: &'static str,
    pub kinds: &'static [&'static str],
}

/// "A node of kind `node_kind` whose `name_field` yields X defines X as `kind`."
#[derive(Debug, Clone, Copy)]
pub struct DefinitionPattern {
    pub node_kind: &'static str,
    pub name_field: &'static str,
    pub kind: SymbolKind,
    pub guard: Option<FieldGuard>,
}

/// A call site; the callee name is read from `callee_field`.
#[derive(Debug, Clone, Copy)]
pub struct CallPattern {
    pub node_kind: &'static str,
    pub callee_field: &'static str,
}

/// An import statement. Without a field the last named child holds the path.
#[derive(Debug, Clone, Copy)]
pub struct ImportPattern {
    pub node_kind: &'static str,
    pub field: Option<&'static str>,
}

/// A heritage clause naming supertypes.
///
/// With `owner_field` set the clause belongs to the type named by that field
/// (Rust `impl Trait for Type`) instead of the enclosing definition.
#[derive(Debug, Clone, Copy)]
pub struct HeritagePattern {
    pub node_kind: &'static str,
    pub field: Option<&'static str>,
    pub kind: ReferenceKind,
    pub owner_field: Option<&'static str>,
}

/// A declaration naming the module a file belongs to.
#[derive(Debug, Clone, Copy)]
pub struct ModulePattern {
    pub node_kind: &'static str,
    pub field: Option<&'static str>,
}

/// All structural patterns for one language.
#[derive(Debug, Clone, Copy)]
pub struct LanguagePatterns {
    pub definitions: &'static [DefinitionPattern],
    /// Node kinds whose direct callables are methods.
    pub containers: &'static [&'static str],
    /// Node kinds that attach methods to a type named by a field: `(kind, field)`.
    pub owners: &'static [(&'static str, &'static str)],
    pub calls: &'static [CallPattern],
    pub imports: &'static [ImportPattern],
    pub heritage: &'static [HeritagePattern],
    pub modules: &'static [ModulePattern],
}

/// Node kinds that are a bare name.
const NAME_KINDS: &[&str] = &[
    "identifier",
    "type_identifier",
    "property_identifier",
    "field_identifier",
    "private_property_identifier",
    "shorthand_property_identifier",
    "name",
    "constant",
];

/// Node kinds that qualify a name; the last component is the name.
const QUALIFIED_KINDS: &[&str] = &[
    "member_expression",
    "attribute",
    "selector_expression",
    "field_expression",
    "field_access",
    "scoped_identifier",
    "scoped_type_identifier",
    "nested_type_identifier",
    "member_access_expression",
    "qualified_name",
    "dotted_name",
    "generic_type",
    "generic_name",
    "generic_function",
    "qualified_type",
];

/// Fields tried, in order, when looking for the last component of a qualified name.
const NAME_FIELDS: &[&str] = &["name", "property", "attribute", "field", "type", "function"];

/// Subtrees skipped when collecting type names from a heritage clause.
const HERITAGE_SKIP: &[&str] = &[
    "type_arguments",
    "type_argument_list",
    "type_parameters",
    "type_parameter_list",
    "keyword_argument",
    "lifetime",
    "comment",
];

// =============================================================================
// BASE EXTRACTOR
// =============================================================================

/// Base tree-sitter extractor driven by a pattern table.
pub struct TreeSitterExtractor {
    grammar: Grammar,
    language: Language,
    extensions: &'static [&'static str],
    patterns: &'static LanguagePatterns,
}

impl TreeSitterExtractor {
    pub fn new(
        grammar: Grammar,
        language: Language,
        extensions: &'static [&'static str],
        patterns: &'static LanguagePatterns,
    ) -> Self {
        Self { grammar, language, extensions, patterns }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        self.extensions
    }

    /// Parse source code into a tree-sitter tree.
    pub fn parse_tree(&self, content: &str) -> Result<Tree, ExtractError> {
        let mut parser = TSParser::new();
        parser
            .set_language(&self.grammar)
            .map_err(|e| ExtractError::Grammar(e.to_string()))?;

        parser.parse(content, None).ok_or(ExtractError::NoTree)
    }

    /// Extract definitions and references from a file.
    pub fn extract(&self, path: &str, content: &str) -> Result<Extraction, ExtractError> {
        let tree = self.parse_tree(content)?;
        let root = tree.root_node();

        let mut walker = Walker::new(self.patterns, content, Extraction::new(path, self.language));
        walker.walk(root);
        let mut extraction = walker.finish();

        if root.has_error() {
            if extraction.is_empty() {
                return Err(ExtractError::Erroneous);
            }
            extraction.warn("syntax tree contains errors; extraction may be partial");
        }

        Ok(extraction)
    }

    /// Get text for a node from source content.
    pub fn node_text<'a>(node: &Node, content: &'a str) -> &'a str {
        content.get(node.byte_range()).unwrap_or("")
    }

    /// Get line number (1-based) for a node.
    pub fn node_line(node: &Node) -> u32 {
        node.start_position().row as u32 + 1
    }

    /// Get end line number (1-based) for a node.
    pub fn node_end_line(node: &Node) -> u32 {
        node.end_position().row as u32 + 1
    }

    pub fn node_range(node: &Node) -> SourceRange {
        SourceRange {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: Self::node_line(node),
            end_line: Self::node_end_line(node),
        }
    }
}

/// Last name component of an expression or type node.
///
/// `a.b.c()` yields `c`, `pkg.Type[T]` yields `Type`.
pub fn base_name<'a>(node: Node, content: &'a str) -> Option<&'a str> {
    let mut current = node;
    loop {
        let kind = current.kind();
        if NAME_KINDS.contains(&kind) {
            let text = TreeSitterExtractor::node_text(&current, content);
            return (!text.is_empty()).then_some(text);
        }
        if !QUALIFIED_KINDS.contains(&kind) {
            return None;
        }
        let next = NAME_FIELDS
            .iter()
            .find_map(|field| current.child_by_field_name(field))
            .or_else(|| last_named_child(current))?;
        current = next;
    }
}

fn last_named_child(node: Node) -> Option<Node> {
    let count = node.named_child_count();
    (0..count).rev().find_map(|i| {
        node.named_child(i)
            .filter(|child| !HERITAGE_SKIP.contains(&child.kind()))
    })
}

/// Collect supertype names from a heritage clause, skipping type arguments.
fn collect_type_names(node: Node, content: &str, out: &mut Vec<(String, SourceRange)>) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        let kind = current.kind();
        if HERITAGE_SKIP.contains(&kind) {
            continue;
        }
        if NAME_KINDS.contains(&kind) || QUALIFIED_KINDS.contains(&kind) {
            if let Some(name) = base_name(current, content) {
                out.push((name.to_string(), TreeSitterExtractor::node_range(&current)));
            }
            continue;
        }
        let mut cursor = current.walk();
        let children: Vec<Node> = current.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

fn strip_quotes(text: &str) -> &str {
    text.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

// =============================================================================
// WALKER
// =============================================================================

enum Visit<'t> {
    Enter(Node<'t>),
    Leave(Restore),
}

struct Restore {
    pop_scope: bool,
    pop_owner: bool,
    in_container: bool,
}

/// Iterative pre-order walk tracking the enclosing definitions.
struct Walker<'a> {
    patterns: &'static LanguagePatterns,
    content: &'a str,
    out: Extraction,
    /// Definition indexes of the enclosing definitions, innermost last.
    scopes: Vec<usize>,
    /// Type names of enclosing owner blocks (`impl Type`).
    owners: Vec<String>,
    in_container: bool,
    /// Definitions whose enclosing type is known only by name.
    pending_enclosing: Vec<(usize, String)>,
    /// Heritage references whose owner is known only by name.
    pending_scopes: Vec<(usize, String)>,
}

impl<'a> Walker<'a> {
    fn new(patterns: &'static LanguagePatterns, content: &'a str, out: Extraction) -> Self {
        Self {
            patterns,
            content,
            out,
            scopes: Vec::new(),
            owners: Vec::new(),
            in_container: false,
            pending_enclosing: Vec::new(),
            pending_scopes: Vec::new(),
        }
    }

    fn walk(&mut self, root: Node) {
        let mut stack = vec![Visit::Enter(root)];
        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(node) => {
                    let restore = self.enter(node);
                    stack.push(Visit::Leave(restore));
                    let mut cursor = node.walk();
                    let children: Vec<Node> = node.children(&mut cursor).collect();
                    stack.extend(children.into_iter().rev().map(Visit::Enter));
                }
                Visit::Leave(restore) => {
                    if restore.pop_scope {
                        self.scopes.pop();
                    }
                    if restore.pop_owner {
                        self.owners.pop();
                    }
                    self.in_container = restore.in_container;
                }
            }
        }
    }

    fn enter(&mut self, node: Node) -> Restore {
        let mut restore = Restore {
            pop_scope: false,
            pop_owner: false,
            in_container: self.in_container,
        };

        if let Some(idx) = self.match_definition(node) {
            self.scopes.push(idx);
            restore.pop_scope = true;
            if self.out.definitions[idx].kind.is_callable() {
                self.in_container = false;
            }
        }

        let patterns = self.patterns;
        if patterns.containers.contains(&node.kind()) {
            self.in_container = true;
        }

        if let Some((_, field)) = patterns.owners.iter().find(|(kind, _)| *kind == node.kind()) {
            if let Some(owner) = node
                .child_by_field_name(field)
                .and_then(|n| base_name(n, self.content))
            {
                self.owners.push(owner.to_string());
                restore.pop_owner = true;
                self.in_container = true;
            }
        }

        self.match_calls(node);
        self.match_imports(node);
        self.match_heritage(node);
        self.match_module(node);

        restore
    }

    fn match_definition(&mut self, node: Node) -> Option<usize> {
        let patterns = self.patterns;
        let pattern = patterns.definitions.iter().find(|p| {
            p.node_kind == node.kind()
                && p.guard.map_or(true, |g| {
                    node.child_by_field_name(g.field)
                        .is_some_and(|child| g.kinds.contains(&child.kind()))
                })
        })?;

        let name_node = node.child_by_field_name(pattern.name_field)?;
        let name = base_name(name_node, self.content)?.to_string();

        let kind = if pattern.kind == SymbolKind::Function && self.in_container {
            SymbolKind::Method
        } else {
            pattern.kind
        };

        let enclosing = self.innermost(|k| k.is_type());
        let idx = self.out.definitions.len();
        if enclosing.is_none() && kind == SymbolKind::Method {
            if let Some(owner) = self.owners.last() {
                self.pending_enclosing.push((idx, owner.clone()));
            }
        }

        self.out.definitions.push(Definition {
            kind,
            name,
            range: TreeSitterExtractor::node_range(&node),
            enclosing,
        });
        Some(idx)
    }

    fn match_calls(&mut self, node: Node) {
        let patterns = self.patterns;
        let Some(pattern) = patterns.calls.iter().find(|p| p.node_kind == node.kind()) else {
            return;
        };
        let Some(callee) = node.child_by_field_name(pattern.callee_field) else {
            return;
        };
        if let Some(name) = base_name(callee, self.content) {
            let scope = self
                .innermost(|k| k.is_callable())
                .or_else(|| self.scopes.last().copied());
            self.out.references.push(Reference {
                kind: ReferenceKind::Call,
                name: name.to_string(),
                range: TreeSitterExtractor::node_range(&node),
                scope,
            });
        }
    }

    fn match_imports(&mut self, node: Node) {
        let patterns = self.patterns;
        let Some(pattern) = patterns.imports.iter().find(|p| p.node_kind == node.kind()) else {
            return;
        };

        let mut targets: Vec<Node> = Vec::new();
        let mut wildcard = false;
        match pattern.field {
            Some(field) => {
                let mut cursor = node.walk();
                targets.extend(node.children_by_field_name(field, &mut cursor));
            }
            None => {
                let mut last = None;
                for i in 0..node.named_child_count() {
                    if let Some(child) = node.named_child(i) {
                        match child.kind() {
                            "asterisk" => wildcard = true,
                            "comment" => {}
                            _ => last = Some(child),
                        }
                    }
                }
                targets.extend(last);
            }
        }

        for target in targets {
            let path_node = match target.kind() {
                "aliased_import" | "use_as_clause" => target
                    .child_by_field_name("name")
                    .or_else(|| target.child_by_field_name("path"))
                    .unwrap_or(target),
                _ => target,
            };
            let mut path = strip_quotes(TreeSitterExtractor::node_text(&path_node, self.content)).to_string();
            if path.is_empty() {
                continue;
            }
            if wildcard {
                path.push_str(".*");
            }
            self.out.references.push(Reference {
                kind: ReferenceKind::Import,
                name: path,
                range: TreeSitterExtractor::node_range(&node),
                scope: None,
            });
        }
    }

    fn match_heritage(&mut self, node: Node) {
        let patterns = self.patterns;
        for pattern in patterns.heritage.iter().filter(|p| p.node_kind == node.kind()) {
            let clause = match pattern.field {
                Some(field) => match node.child_by_field_name(field) {
                    Some(child) => child,
                    None => continue,
                },
                None => node,
            };

            let owner = pattern
                .owner_field
                .and_then(|f| node.child_by_field_name(f))
                .and_then(|n| base_name(n, self.content))
                .map(str::to_string);
            let scope = if pattern.owner_field.is_some() {
                None
            } else {
                self.innermost(|k| k.is_type())
            };

            let mut names = Vec::new();
            collect_type_names(clause, self.content, &mut names);
            for (name, range) in names {
                let idx = self.out.references.len();
                if let Some(owner) = &owner {
                    self.pending_scopes.push((idx, owner.clone()));
                }
                self.out.references.push(Reference {
                    kind: pattern.kind,
                    name,
                    range,
                    scope,
                });
            }
        }
    }

    fn match_module(&mut self, node: Node) {
        if self.out.module.is_some() {
            return;
        }
        let patterns = self.patterns;
        let Some(pattern) = patterns.modules.iter().find(|p| p.node_kind == node.kind()) else {
            return;
        };
        let name_node = match pattern.field {
            Some(field) => node.child_by_field_name(field),
            None => last_named_child(node),
        };
        if let Some(name_node) = name_node {
            let name = TreeSitterExtractor::node_text(&name_node, self.content).trim();
            if !name.is_empty() {
                self.out.module = Some(name.to_string());
            }
        }
    }

    /// Innermost enclosing definition whose kind satisfies `pred`.
    fn innermost(&self, pred: impl Fn(SymbolKind) -> bool) -> Option<usize> {
        self.scopes
            .iter()
            .rev()
            .copied()
            .find(|&idx| pred(self.out.definitions[idx].kind))
    }

    /// Same-file type definition named `name`.
    fn type_named(&self, name: &str) -> Option<usize> {
        self.out
            .definitions
            .iter()
            .position(|d| d.kind.is_type() && d.name == name)
    }

    fn finish(mut self) -> Extraction {
        for (idx, owner) in std::mem::take(&mut self.pending_enclosing) {
            self.out.definitions[idx].enclosing = self.type_named(&owner);
        }
        for (idx, owner) in std::mem::take(&mut self.pending_scopes) {
            self.out.references[idx].scope = self.type_named(&owner);
        }
        self.out
    }
}
