//! CPU-bound ingestion: extraction, assembly, clustering, process tracing.
//!
//! Everything here is synchronous. Async callers run [`run_pipeline`]
//! inside `spawn_blocking`.

use std::fs;
use std::path::Path;

use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::community::CommunityDetector;
use super::error::KnowledgeError;
use super::graph::{AssemblyStats, GraphAssembler, GraphSnapshot, SourceUnit};
use super::ontology::{FileNode, Language};
use super::parser::ExtractorRegistry;
use super::process::ProcessExtractor;
use crate::config::{Config, IngestConfig};

/// A file left out of the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Output of one pipeline run.
#[derive(Debug)]
pub struct PipelineOutput {
    pub snapshot: GraphSnapshot,
    pub stats: AssemblyStats,
    pub skipped: Vec<SkippedFile>,
}

/// Source files read from a repository, plus the ones left out.
#[derive(Debug, Default)]
pub struct RepoFiles {
    /// `(relative path, content)`, sorted by path.
    pub files: Vec<(String, String)>,
    /// Files with an ingestible extension that could not be used.
    pub skipped: Vec<SkippedFile>,
}

/// Read the ingestible files under `root`.
///
/// Honours `.gitignore`, the configured extensions and excluded
/// directories, and the size cap. Paths use `/` separators. Oversized,
/// unreadable and non UTF-8 files are reported in [`RepoFiles::skipped`].
pub fn collect_repo_files(root: &Path, config: &IngestConfig) -> Result<RepoFiles, KnowledgeError> {
    if !root.is_dir() {
        return Err(KnowledgeError::Io {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }

    let exclude = config.exclude_dirs.clone();
    let walk_root = root.to_path_buf();
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            !(is_dir && is_excluded(&walk_root, entry.path(), &exclude))
        })
        .build();

    let mut repo = RepoFiles::default();
    for entry in walker.flatten() {
        let path = entry.path();
        if !path.is_file() || !has_extension(path, &config.include_extensions) {
            continue;
        }

        let relative = relative_path(root, path);
        let mut skip = |reason: String| {
            warn!(path = %relative, reason = %reason, "skipping file");
            repo.skipped.push(SkippedFile { path: relative.clone(), reason });
        };

        match entry.metadata() {
            Ok(meta) if meta.len() > config.max_file_size => {
                skip(format!("{} bytes exceeds the {} byte cap", meta.len(), config.max_file_size));
                continue;
            }
            Err(e) => {
                skip(format!("cannot stat: {}", e));
                continue;
            }
            Ok(_) => {}
        }

        match fs::read(path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(content) => repo.files.push((relative.clone(), content)),
                Err(_) => skip("not valid UTF-8".to_string()),
            },
            Err(e) => skip(format!("cannot read: {}", e)),
        }
    }

    repo.files.sort_by(|a, b| a.0.cmp(&b.0));
    repo.skipped.sort_by(|a, b| a.path.cmp(&b.path));
    info!(
        root = %root.display(),
        files = repo.files.len(),
        skipped = repo.skipped.len(),
        "collected repository files"
    );
    Ok(repo)
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Plain entries match a directory name at any depth; entries starting
/// with `/` match one path relative to the root.
fn is_excluded(root: &Path, dir: &Path, exclude: &[String]) -> bool {
    let name = dir.file_name().and_then(|n| n.to_str());
    let relative = relative_path(root, dir);
    exclude.iter().any(|pattern| match pattern.strip_prefix('/') {
        Some(anchored) => relative == anchored.trim_end_matches('/'),
        None => name == Some(pattern.as_str()),
    })
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Build the full snapshot for `files`.
///
/// Files are processed in path order so identical input gives an
/// identical graph. Fails only when no file could be extracted.
pub fn run_pipeline(
    mut files: Vec<(String, String)>,
    config: &Config,
) -> Result<PipelineOutput, KnowledgeError> {
    files.sort_by(|a, b| a.0.cmp(&b.0));
    files.dedup_by(|a, b| a.0 == b.0);

    let registry = ExtractorRegistry::new();
    let results: Vec<Result<SourceUnit, SkippedFile>> = files
        .into_par_iter()
        .map(|(path, content)| extract_unit(&registry, path, content))
        .collect();

    let mut units = Vec::with_capacity(results.len());
    let mut skipped = Vec::new();
    for result in results {
        match result {
            Ok(unit) => units.push(unit),
            Err(skip) => {
                warn!(path = %skip.path, reason = %skip.reason, "skipping file");
                skipped.push(skip);
            }
        }
    }

    if units.is_empty() {
        return Err(KnowledgeError::NothingExtracted { skipped: skipped.len() });
    }
    info!(files = units.len(), skipped = skipped.len(), "extracted source files");

    let (mut snapshot, stats) = GraphAssembler::assemble(units);
    info!(
        symbols = snapshot.symbols.len(),
        relations = snapshot.relations.len(),
        unresolved_calls = stats.unresolved_calls,
        unresolved_imports = stats.unresolved_imports,
        "assembled base graph"
    );

    let (communities, mut processes) = rayon::join(
        || CommunityDetector::new(&config.community).detect(&snapshot),
        || ProcessExtractor::new(&config.process).extract(&snapshot),
    );
    processes.count_communities(&communities);

    snapshot.relations.extend(communities.relations());
    snapshot.communities = communities.communities;
    snapshot.relations.extend(processes.steps);
    snapshot.processes = processes.processes;

    info!(
        communities = snapshot.communities.len(),
        processes = snapshot.processes.len(),
        "built overlays"
    );

    Ok(PipelineOutput { snapshot, stats, skipped })
}

fn extract_unit(registry: &ExtractorRegistry, path: String, content: String) -> Result<SourceUnit, SkippedFile> {
    let skip = |reason: String| SkippedFile { path: path.clone(), reason };

    let language = Language::from_path(&path).ok_or_else(|| skip("unsupported language".to_string()))?;
    let extraction = registry.extract(&path, &content).map_err(|e| skip(e.to_string()))?;
    for warning in &extraction.warnings {
        debug!(path = %path, warning = %warning, "extraction warning");
    }

    Ok(SourceUnit {
        file: FileNode::new(path, language, content),
        extraction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::ontology::RelationType;
    use tempfile::TempDir;

    fn source(path: &str, content: &str) -> (String, String) {
        (path.to_string(), content.to_string())
    }

    #[test]
    fn test_pipeline_builds_overlays() {
        let files = vec![
            source("app.py", "from .billing import charge\n\ndef main():\n    charge()\n"),
            source("billing.py", "def charge():\n    tax()\n\ndef tax():\n    pass\n"),
        ];
        let output = run_pipeline(files, &Config::default()).unwrap();

        assert_eq!(output.snapshot.files.len(), 2);
        assert!(output.skipped.is_empty());
        assert!(!output.snapshot.communities.is_empty());
        assert_eq!(output.snapshot.processes.len(), 1);
        assert_eq!(output.snapshot.processes[0].step_count, 3);
        assert_eq!(output.snapshot.relations_of(RelationType::StepInProcess).count(), 3);
        assert_eq!(
            output.snapshot.relations_of(RelationType::MemberOf).count(),
            output.snapshot.symbols.len()
        );
    }

    #[test]
    fn test_unsupported_files_are_skipped() {
        let files = vec![
            source("notes.txt", "hello"),
            source("main.go", "package main\n\nfunc main() {}\n"),
        ];
        let output = run_pipeline(files, &Config::default()).unwrap();
        assert_eq!(output.snapshot.files.len(), 1);
        assert_eq!(output.skipped.len(), 1);
        assert_eq!(output.skipped[0].path, "notes.txt");
    }

    #[test]
    fn test_nothing_extracted_is_fatal() {
        let result = run_pipeline(vec![source("a.txt", "x")], &Config::default());
        assert!(matches!(result, Err(KnowledgeError::NothingExtracted { skipped: 1 })));

        let result = run_pipeline(Vec::new(), &Config::default());
        assert!(matches!(result, Err(KnowledgeError::NothingExtracted { skipped: 0 })));
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let a = source("a.ts", "import { b } from './b';\nexport function a() { b(); }\n");
        let b = source("b.ts", "export function b() {}\n");

        let first = run_pipeline(vec![a.clone(), b.clone()], &Config::default()).unwrap();
        let second = run_pipeline(vec![b, a], &Config::default()).unwrap();
        assert_eq!(first.snapshot.symbols, second.snapshot.symbols);
        assert_eq!(first.snapshot.relations, second.snapshot.relations);
    }

    #[test]
    fn test_collect_repo_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(root.join("src/lib.py"), "def f():\n    pass\n").unwrap();
        fs::write(root.join("README.md"), "# readme\n").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "function x() {}\n").unwrap();
        fs::write(root.join("big.rs"), "x".repeat(64)).unwrap();

        let config = IngestConfig {
            max_file_size: 32,
            ..IngestConfig::default()
        };
        let repo = collect_repo_files(root, &config).unwrap();
        let paths: Vec<&str> = repo.files.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["src/lib.py", "src/main.rs"]);

        assert_eq!(repo.skipped.len(), 1);
        assert_eq!(repo.skipped[0].path, "big.rs");
        assert!(repo.skipped[0].reason.contains("cap"));
    }

    #[test]
    fn test_non_utf8_files_are_reported() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("ok.py"), "def ok():\n    pass\n").unwrap();
        // Latin-1 "caf\xe9" is not valid UTF-8.
        fs::write(root.join("latin1.py"), b"name = 'caf\xe9'\n").unwrap();

        let repo = collect_repo_files(root, &IngestConfig::default()).unwrap();
        assert_eq!(repo.files.len(), 1);
        assert_eq!(repo.files[0].0, "ok.py");
        assert_eq!(
            repo.skipped,
            vec![SkippedFile {
                path: "latin1.py".to_string(),
                reason: "not valid UTF-8".to_string(),
            }]
        );
    }

    #[test]
    fn test_build_dirs_excluded_only_at_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for sub in ["src/bin", "build/lib", "out", "tools/build", "pkg/out"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        fs::write(root.join("src/lib.rs"), "pub fn lib() {}\n").unwrap();
        fs::write(root.join("src/bin/tool.rs"), "fn main() {}\n").unwrap();
        fs::write(root.join("build/lib/copy.py"), "def f():\n    pass\n").unwrap();
        fs::write(root.join("out/gen.go"), "package out\n").unwrap();
        fs::write(root.join("tools/build/make.go"), "package build\n").unwrap();
        fs::write(root.join("pkg/out/writer.go"), "package out\n").unwrap();

        let repo = collect_repo_files(root, &IngestConfig::default()).unwrap();
        let paths: Vec<&str> = repo.files.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(
            paths,
            vec!["pkg/out/writer.go", "src/bin/tool.rs", "src/lib.rs", "tools/build/make.go"]
        );
    }

    #[test]
    fn test_csharp_files_are_extracted() {
        let files = vec![source(
            "Orders/OrderService.cs",
            "namespace Acme { public class OrderService { public void Place() { Save(); } public void Save() {} } }\n",
        )];
        let output = run_pipeline(files, &Config::default()).unwrap();
        assert!(output.skipped.is_empty());
        let names: Vec<&str> = output.snapshot.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["OrderService", "Place", "Save"]);
    }

    #[test]
    fn test_collect_rejects_missing_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(collect_repo_files(&missing, &IngestConfig::default()).is_err());
    }
}
