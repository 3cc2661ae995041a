//! Graph assembly: per-file extractions to one typed graph.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::resolve::{dir_of, path_distance, ImportResolver};
use super::GraphSnapshot;
use crate::knowledge::ontology::{
    CodeRelation, FileNode, NodeRef, RelationType, SymbolKind, SymbolNode,
};
use crate::knowledge::parser::{Extraction, ReferenceKind};

/// One ingested file with its extraction.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub file: FileNode,
    pub extraction: Extraction,
}

/// Resolution counters for one assembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyStats {
    pub resolved_imports: usize,
    pub unresolved_imports: usize,
    pub resolved_calls: usize,
    pub unresolved_calls: usize,
    pub resolved_heritage: usize,
    pub unresolved_heritage: usize,
}

/// Builds the base graph from extraction results.
///
/// Call resolution is by name only: same file first, then files the caller's
/// file imports. It is a heuristic, not type-based resolution.
pub struct GraphAssembler;

impl GraphAssembler {
    /// Assemble `units` (in a fixed file order) into a snapshot.
    pub fn assemble(units: Vec<SourceUnit>) -> (GraphSnapshot, AssemblyStats) {
        let mut stats = AssemblyStats::default();
        let mut snapshot = GraphSnapshot::default();

        let (files, extractions): (Vec<FileNode>, Vec<Extraction>) =
            units.into_iter().map(|u| (u.file, u.extraction)).unzip();

        // Files and symbols, with DEFINES.
        let mut first_symbol = Vec::with_capacity(files.len());
        for (file_idx, (file, extraction)) in files.iter().zip(&extractions).enumerate() {
            let base = snapshot.symbols.len();
            first_symbol.push(base);

            for def in &extraction.definitions {
                let enclosing = def.enclosing.and_then(|local| {
                    extraction.definitions.get(local).map(|parent| {
                        SymbolNode::id_for(parent.kind, &file.path, &parent.name, parent.range.start_byte)
                    })
                });
                let symbol_idx = snapshot.symbols.len();
                snapshot.symbols.push(SymbolNode {
                    id: SymbolNode::id_for(def.kind, &file.path, &def.name, def.range.start_byte),
                    name: def.name.clone(),
                    kind: def.kind,
                    file_path: file.path.clone(),
                    range: def.range,
                    enclosing,
                    snippet: file
                        .content
                        .get(def.range.start_byte..def.range.end_byte)
                        .unwrap_or_default()
                        .to_string(),
                });
                snapshot.symbol_files.push(file_idx);
                snapshot.relations.push(CodeRelation::new(
                    RelationType::Defines,
                    NodeRef::File(file_idx),
                    NodeRef::Symbol(symbol_idx),
                ));
            }
        }

        // Per-file name index.
        let mut names: Vec<HashMap<&str, Vec<usize>>> = vec![HashMap::new(); files.len()];
        for (idx, symbol) in snapshot.symbols.iter().enumerate() {
            names[snapshot.symbol_files[idx]]
                .entry(symbol.name.as_str())
                .or_default()
                .push(idx);
        }

        // IMPORTS.
        let modules: Vec<Option<String>> = extractions.iter().map(|e| e.module.clone()).collect();
        let resolver = ImportResolver::new(&files, &modules);
        let mut imported: Vec<Vec<usize>> = vec![Vec::new(); files.len()];
        let mut relations = Vec::new();
        let mut seen: HashSet<CodeRelation> = HashSet::new();

        for (file_idx, extraction) in extractions.iter().enumerate() {
            for reference in extraction.references_of(ReferenceKind::Import) {
                let targets = resolver.resolve(file_idx, &reference.name);
                if targets.is_empty() {
                    stats.unresolved_imports += 1;
                    debug!(file = %files[file_idx].path, import = %reference.name, "Unresolved import");
                    continue;
                }
                stats.resolved_imports += 1;
                for target in targets {
                    let relation = CodeRelation::new(
                        RelationType::Imports,
                        NodeRef::File(file_idx),
                        NodeRef::File(target),
                    );
                    if seen.insert(relation) {
                        imported[file_idx].push(target);
                        relations.push(relation);
                    }
                }
            }
        }

        // CALLS, EXTENDS, IMPLEMENTS.
        let lookup = NameLookup {
            files: &files,
            names: &names,
            symbols: &snapshot.symbols,
            imported: &imported,
        };
        for (file_idx, extraction) in extractions.iter().enumerate() {
            let base = first_symbol[file_idx];
            for reference in &extraction.references {
                let scope = reference.scope.map(|local| base + local);
                let kind = match reference.kind {
                    ReferenceKind::Import => continue,
                    ReferenceKind::Call => RelationType::Calls,
                    ReferenceKind::Extends => RelationType::Extends,
                    ReferenceKind::Implements => RelationType::Implements,
                };
                let accepts: fn(&SymbolKind) -> bool = if kind == RelationType::Calls {
                    SymbolKind::is_call_target
                } else {
                    SymbolKind::is_type
                };

                let source = match (kind, scope) {
                    (RelationType::Calls, Some(s)) => NodeRef::Symbol(s),
                    (RelationType::Calls, None) => NodeRef::File(file_idx),
                    (_, Some(s)) if lookup.symbols[s].kind.is_type() => NodeRef::Symbol(s),
                    _ => {
                        stats.unresolved_heritage += 1;
                        continue;
                    }
                };
                // A type never inherits from itself.
                let exclude = if kind == RelationType::Calls { None } else { scope };

                match lookup.resolve(file_idx, &reference.name, accepts, exclude) {
                    Some(target) => {
                        let relation = CodeRelation::new(kind, source, NodeRef::Symbol(target));
                        if seen.insert(relation) {
                            relations.push(relation);
                        }
                        if kind == RelationType::Calls {
                            stats.resolved_calls += 1;
                        } else {
                            stats.resolved_heritage += 1;
                        }
                    }
                    None => {
                        if kind == RelationType::Calls {
                            stats.unresolved_calls += 1;
                        } else {
                            stats.unresolved_heritage += 1;
                        }
                        debug!(
                            file = %files[file_idx].path,
                            name = %reference.name,
                            relation = %kind,
                            "Unresolved reference"
                        );
                    }
                }
            }
        }

        snapshot.relations.extend(relations);
        snapshot.files = files;
        (snapshot, stats)
    }
}

/// Name-based symbol lookup scoped by file and imports.
struct NameLookup<'a> {
    files: &'a [FileNode],
    names: &'a [HashMap<&'a str, Vec<usize>>],
    symbols: &'a [SymbolNode],
    imported: &'a [Vec<usize>],
}

impl NameLookup<'_> {
    fn resolve(
        &self,
        file_idx: usize,
        name: &str,
        accepts: fn(&SymbolKind) -> bool,
        exclude: Option<usize>,
    ) -> Option<usize> {
        let matching = |idx: &usize| accepts(&self.symbols[*idx].kind) && Some(*idx) != exclude;

        // Same file: first encountered.
        if let Some(found) = self.names[file_idx]
            .get(name)
            .and_then(|c| c.iter().copied().find(|i| matching(i)))
        {
            return Some(found);
        }

        // Imported files: lexically closest, then first encountered.
        let from_dir = dir_of(&self.files[file_idx].path);
        self.imported[file_idx]
            .iter()
            .filter_map(|&target| self.names[target].get(name))
            .flat_map(|c| c.iter().copied())
            .filter(|i| matching(i))
            .min_by_key(|&i| path_distance(from_dir, &self.symbols[i].file_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::ontology::Language;
    use crate::knowledge::parser::ExtractorRegistry;

    fn units(sources: &[(&str, &str)]) -> Vec<SourceUnit> {
        let registry = ExtractorRegistry::new();
        sources
            .iter()
            .map(|(path, content)| SourceUnit {
                file: FileNode::new(*path, Language::from_path(path).unwrap(), *content),
                extraction: registry.extract(path, content).unwrap(),
            })
            .collect()
    }

    fn calls(snapshot: &GraphSnapshot) -> Vec<(String, String)> {
        snapshot
            .symbol_calls()
            .map(|(a, b)| {
                (
                    format!("{}:{}", snapshot.symbols[a].file_path, snapshot.symbols[a].name),
                    format!("{}:{}", snapshot.symbols[b].file_path, snapshot.symbols[b].name),
                )
            })
            .collect()
    }

    #[test]
    fn test_defines_and_symbol_ids() {
        let (snapshot, _) = GraphAssembler::assemble(units(&[(
            "app.py",
            "class A:\n    def run(self):\n        pass\n",
        )]));
        assert_eq!(snapshot.files.len(), 1);
        assert_eq!(snapshot.symbols.len(), 2);
        assert_eq!(snapshot.symbols[0].id, "class:app.py:A:0");
        assert_eq!(snapshot.symbols[1].enclosing.as_deref(), Some("class:app.py:A:0"));
        assert!(snapshot.symbols[1].snippet.starts_with("def run"));
        assert_eq!(snapshot.relations_of(RelationType::Defines).count(), 2);
    }

    #[test]
    fn test_same_file_wins_over_unimported_file() {
        let (snapshot, stats) = GraphAssembler::assemble(units(&[
            ("a.py", "def foo():\n    pass\n\ndef main():\n    foo()\n"),
            ("b.py", "def foo():\n    pass\n"),
        ]));
        assert_eq!(calls(&snapshot), vec![("a.py:main".to_string(), "a.py:foo".to_string())]);
        assert_eq!(stats.resolved_calls, 1);
    }

    #[test]
    fn test_calls_resolve_through_imports() {
        let (snapshot, stats) = GraphAssembler::assemble(units(&[
            ("src/app.ts", "import { hash } from './crypto';\nexport function login() { hash(); missing(); }\n"),
            ("src/crypto.ts", "export function hash() {}\n"),
            ("lib/other.ts", "export function hash() {}\n"),
        ]));
        assert_eq!(
            calls(&snapshot),
            vec![("src/app.ts:login".to_string(), "src/crypto.ts:hash".to_string())]
        );
        assert_eq!(snapshot.relations_of(RelationType::Imports).count(), 1);
        assert_eq!(stats.resolved_imports, 1);
        assert_eq!(stats.unresolved_calls, 1);
    }

    #[test]
    fn test_closest_imported_definition_wins() {
        let (snapshot, stats) = GraphAssembler::assemble(units(&[
            (
                "src/app/main.ts",
                "import { helper } from '../../lib/far';\nimport { helper as near } from './util/near';\nexport function main() { helper(); }\n",
            ),
            ("lib/far.ts", "export function helper() {}\n"),
            ("src/app/util/near.ts", "export function helper() {}\n"),
        ]));
        assert_eq!(stats.resolved_imports, 2);
        assert_eq!(
            calls(&snapshot),
            vec![("src/app/main.ts:main".to_string(), "src/app/util/near.ts:helper".to_string())]
        );
    }

    #[test]
    fn test_unimported_symbol_is_unresolved() {
        let (snapshot, stats) = GraphAssembler::assemble(units(&[
            ("a.py", "def main():\n    helper()\n"),
            ("b.py", "def helper():\n    pass\n"),
        ]));
        assert_eq!(snapshot.symbol_calls().count(), 0);
        assert_eq!(stats.unresolved_calls, 1);
    }

    #[test]
    fn test_calls_and_imports_are_deduplicated() {
        let (snapshot, _) = GraphAssembler::assemble(units(&[
            ("a.py", "from .b import x\nfrom .b import y\n\ndef main():\n    go()\n    go()\n\ndef go():\n    pass\n"),
            ("b.py", "def x():\n    pass\n"),
        ]));
        assert_eq!(snapshot.relations_of(RelationType::Imports).count(), 1);
        assert_eq!(snapshot.symbol_calls().count(), 1);
    }

    #[test]
    fn test_heritage_targets_types_only() {
        let (snapshot, stats) = GraphAssembler::assemble(units(&[(
            "shapes.ts",
            "interface Shape {}\nfunction Base() {}\nclass Circle extends Base implements Shape {}\n",
        )]));
        let implements: Vec<_> = snapshot.relations_of(RelationType::Implements).collect();
        assert_eq!(implements.len(), 1);
        assert_eq!(implements[0].target, NodeRef::Symbol(0));
        assert_eq!(snapshot.relations_of(RelationType::Extends).count(), 0);
        assert_eq!(stats.unresolved_heritage, 1);
    }

    #[test]
    fn test_rust_impl_trait_for_type() {
        let (snapshot, _) = GraphAssembler::assemble(units(&[(
            "src/lib.rs",
            "pub trait Run { fn run(&self); }\npub struct Job;\nimpl Run for Job { fn run(&self) {} }\n",
        )]));
        let implements: Vec<_> = snapshot.relations_of(RelationType::Implements).collect();
        assert_eq!(implements.len(), 1);
        let source = implements[0].source.symbol().unwrap();
        let target = implements[0].target.symbol().unwrap();
        assert_eq!(snapshot.symbols[source].name, "Job");
        assert_eq!(snapshot.symbols[target].name, "Run");
    }

    #[test]
    fn test_top_level_calls_come_from_the_file() {
        let (snapshot, _) = GraphAssembler::assemble(units(&[(
            "main.py",
            "def start():\n    pass\n\nstart()\n",
        )]));
        let relation = snapshot.relations_of(RelationType::Calls).next().unwrap();
        assert_eq!(relation.source, NodeRef::File(0));
        assert_eq!(snapshot.symbol_calls().count(), 0);
    }
}
