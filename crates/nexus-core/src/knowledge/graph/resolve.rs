//! Import resolution: module path strings to file indexes.
//!
//! Resolution is a heuristic over the ingested file set only. Anything that
//! does not land on an ingested file (standard library, third-party
//! packages) is unresolved.

use std::collections::HashMap;

use crate::knowledge::ontology::{FileNode, Language};

/// Module file names that stand for their directory.
const DIRECTORY_MODULES: &[&str] = &["index", "__init__", "mod"];

/// Number of path components in the relative path from `from_dir` to `target`.
///
/// Used as the "lexically closest" tie-break between candidates.
pub fn path_distance(from_dir: &str, target: &str) -> usize {
    let a: Vec<&str> = components(from_dir).collect();
    let b: Vec<&str> = components(target).collect();
    let common = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    (a.len() - common) + (b.len() - common)
}

/// Directory part of a slash-separated path (empty for top-level files).
pub fn dir_of(path: &str) -> &str {
    path.rfind('/').map_or("", |i| &path[..i])
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty() && *c != ".")
}

fn join(base: &str, rest: &str) -> String {
    match (base.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, rest),
    }
}

/// Collapse `.` and `..` components. `None` when `..` climbs above the root.
fn normalize(path: &str) -> Option<String> {
    let mut out: Vec<&str> = Vec::new();
    for comp in path.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                out.pop()?;
            }
            c => out.push(c),
        }
    }
    Some(out.join("/"))
}

fn strip_extension(path: &str) -> &str {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..name_start + dot],
        _ => path,
    }
}

/// Every component-boundary suffix of a path: `a/b/c`, `b/c`, `c`.
fn suffixes(path: &str) -> Vec<&str> {
    let mut out = vec![path];
    let mut rest = path;
    while let Some(i) = rest.find('/') {
        rest = &rest[i + 1..];
        if !rest.is_empty() {
            out.push(rest);
        }
    }
    out
}

/// Resolves import strings of one snapshot to file indexes.
pub struct ImportResolver<'a> {
    files: &'a [FileNode],
    by_path: HashMap<&'a str, usize>,
    /// Extension-less path suffix to files.
    stem_suffixes: HashMap<String, Vec<usize>>,
    /// Directory suffix to directories.
    dir_suffixes: HashMap<String, Vec<&'a str>>,
    /// Directory to the files directly inside it.
    dir_files: HashMap<&'a str, Vec<usize>>,
    /// Declared module (package, namespace) to files.
    modules: HashMap<String, Vec<usize>>,
}

impl<'a> ImportResolver<'a> {
    /// Index `files`; `modules[i]` is the module declared by `files[i]`.
    pub fn new(files: &'a [FileNode], modules: &[Option<String>]) -> Self {
        let mut resolver = Self {
            files,
            by_path: HashMap::new(),
            stem_suffixes: HashMap::new(),
            dir_suffixes: HashMap::new(),
            dir_files: HashMap::new(),
            modules: HashMap::new(),
        };

        for (idx, file) in files.iter().enumerate() {
            let path = file.path.as_str();
            resolver.by_path.insert(path, idx);

            let stem = strip_extension(path);
            for suffix in suffixes(stem) {
                resolver.stem_suffixes.entry(suffix.to_string()).or_default().push(idx);
            }

            let dir = dir_of(path);
            let dir_entry = resolver.dir_files.entry(dir).or_default();
            if dir_entry.is_empty() && !dir.is_empty() {
                for suffix in suffixes(dir) {
                    resolver.dir_suffixes.entry(suffix.to_string()).or_default().push(dir);
                }
            }
            resolver.dir_files.entry(dir).or_default().push(idx);

            if let Some(module) = modules.get(idx).and_then(|m| m.as_deref()) {
                resolver.modules.entry(module.to_string()).or_default().push(idx);
            }
        }

        // Directory modules answer for their directory, after real files of that name.
        for (idx, file) in files.iter().enumerate() {
            if DIRECTORY_MODULES.contains(&file.stem()) {
                let dir = dir_of(&file.path);
                if !dir.is_empty() {
                    for suffix in suffixes(dir) {
                        resolver.stem_suffixes.entry(suffix.to_string()).or_default().push(idx);
                    }
                }
            }
        }

        resolver
    }

    /// Resolve an import made by `files[from]`. Empty when unresolved.
    pub fn resolve(&self, from: usize, raw: &str) -> Vec<usize> {
        let Some(file) = self.files.get(from) else {
            return Vec::new();
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Vec::new();
        }

        let mut targets = match file.language {
            Language::TypeScript | Language::JavaScript => self.resolve_script(file, raw),
            Language::Python => self.resolve_python(file, raw),
            Language::Rust => self.resolve_rust(file, raw),
            Language::Go => self.resolve_go(file, raw),
            Language::Java => self.resolve_java(file, raw),
            Language::CSharp => self.resolve_csharp(file, raw),
        };

        targets.retain(|&t| t != from);
        let mut seen = std::collections::HashSet::new();
        targets.retain(|t| seen.insert(*t));
        targets
    }

    /// Exact file at `base`, then `base` plus each of the language's module suffixes.
    fn lookup_exact(&self, base: &str, language: Language) -> Option<usize> {
        if let Some(&idx) = self.by_path.get(base) {
            return Some(idx);
        }
        language
            .module_suffixes()
            .iter()
            .find_map(|suffix| self.by_path.get(format!("{}{}", base, suffix).as_str()).copied())
    }

    /// Closest file whose extension-less path ends with `suffix`.
    fn lookup_suffix(&self, from: &FileNode, suffix: &str) -> Option<usize> {
        let candidates = self.stem_suffixes.get(suffix)?;
        let from_dir = dir_of(&from.path);
        candidates
            .iter()
            .copied()
            .min_by_key(|&idx| path_distance(from_dir, &self.files[idx].path))
    }

    /// Files of the closest directory whose path ends with `suffix`.
    fn lookup_dir(&self, from: &FileNode, suffix: &str) -> Vec<usize> {
        let from_dir = dir_of(&from.path);
        self.dir_suffixes
            .get(suffix)
            .and_then(|dirs| dirs.iter().min_by_key(|dir| path_distance(from_dir, dir)))
            .and_then(|dir| self.dir_files.get(dir))
            .cloned()
            .unwrap_or_default()
    }

    fn resolve_script(&self, file: &FileNode, raw: &str) -> Vec<usize> {
        if raw.starts_with('.') {
            let Some(base) = normalize(&join(dir_of(&file.path), raw)) else {
                return Vec::new();
            };
            // `./util.js` may name `util.ts` in ESM-style TypeScript.
            return self
                .lookup_exact(&base, file.language)
                .or_else(|| self.lookup_exact(strip_extension(&base), file.language))
                .into_iter()
                .collect();
        }

        let aliased = raw
            .strip_prefix("@/")
            .or_else(|| raw.strip_prefix("~/"))
            .unwrap_or(raw);
        if !aliased.contains('/') {
            return Vec::new();
        }
        self.lookup_suffix(file, strip_extension(aliased)).into_iter().collect()
    }

    fn resolve_python(&self, file: &FileNode, raw: &str) -> Vec<usize> {
        let dots = raw.chars().take_while(|c| *c == '.').count();
        let module_path = raw[dots..].replace('.', "/");

        if dots == 0 {
            return self.lookup_suffix(file, &module_path).into_iter().collect();
        }

        let mut base: Vec<&str> = components(dir_of(&file.path)).collect();
        for _ in 1..dots {
            if base.pop().is_none() {
                return Vec::new();
            }
        }
        let target = join(&base.join("/"), &module_path);
        self.lookup_exact(&target, Language::Python).into_iter().collect()
    }

    fn resolve_rust(&self, file: &FileNode, raw: &str) -> Vec<usize> {
        let mut cleaned = raw;
        if let Some(pos) = cleaned.find("::{") {
            cleaned = &cleaned[..pos];
        }
        cleaned = cleaned.trim_end_matches("::*");
        let segments: Vec<&str> = cleaned.split("::").map(str::trim).filter(|s| !s.is_empty()).collect();

        let (base, rest) = match segments.first().copied() {
            Some("crate") => (crate_root(&file.path), &segments[1..]),
            Some("self") => (module_dir(&file.path), &segments[1..]),
            Some("super") => {
                let mut dir = module_dir(&file.path);
                let mut consumed = 0;
                while segments.get(consumed) == Some(&"super") {
                    dir = dir_of(&dir).to_string();
                    consumed += 1;
                }
                (dir, &segments[consumed..])
            }
            Some(_) => {
                // External crate or 2015-style path: match two or more trailing components.
                for n in (2..=segments.len()).rev() {
                    if let Some(idx) = self.lookup_suffix(file, &segments[..n].join("/")) {
                        return vec![idx];
                    }
                }
                return Vec::new();
            }
            None => return Vec::new(),
        };

        // The longest prefix naming a module file wins; the rest are items inside it.
        for n in (1..=rest.len()).rev() {
            let target = join(&base, &rest[..n].join("/"));
            if let Some(idx) = self.lookup_exact(&target, Language::Rust) {
                return vec![idx];
            }
        }

        self.lookup_exact(&base, Language::Rust)
            .or_else(|| self.by_path.get(join(&base, "lib.rs").as_str()).copied())
            .or_else(|| self.by_path.get(join(&base, "main.rs").as_str()).copied())
            .into_iter()
            .collect()
    }

    fn resolve_go(&self, file: &FileNode, raw: &str) -> Vec<usize> {
        // Standard library packages have no slash.
        if !raw.contains('/') {
            return Vec::new();
        }
        let comps: Vec<&str> = raw.split('/').collect();
        for start in 0..comps.len() {
            let files = self.lookup_dir(file, &comps[start..].join("/"));
            if !files.is_empty() {
                return files;
            }
        }
        Vec::new()
    }

    fn resolve_java(&self, file: &FileNode, raw: &str) -> Vec<usize> {
        if let Some(package) = raw.strip_suffix(".*") {
            if let Some(files) = self.modules.get(package) {
                return files.clone();
            }
            return self.lookup_dir(file, &package.replace('.', "/"));
        }

        let segments: Vec<&str> = raw.split('.').collect();
        // `import a.b.C` and, for static imports, `import static a.b.C.member`.
        for cut in (segments.len().saturating_sub(1)..=segments.len()).rev() {
            if cut == 0 {
                continue;
            }
            let package = segments[..cut - 1].join(".");
            let class = segments[cut - 1];
            if let Some(files) = self.modules.get(&package) {
                if let Some(&idx) = files.iter().find(|&&idx| self.files[idx].stem() == class) {
                    return vec![idx];
                }
            }
            if let Some(idx) = self.lookup_suffix(file, &segments[..cut].join("/")) {
                return vec![idx];
            }
        }
        Vec::new()
    }

    fn resolve_csharp(&self, file: &FileNode, raw: &str) -> Vec<usize> {
        if let Some(files) = self.modules.get(raw) {
            return files.clone();
        }
        self.lookup_dir(file, &raw.replace('.', "/"))
    }
}

/// Directory holding the crate root (`.../src`), or the repository root.
fn crate_root(path: &str) -> String {
    let comps: Vec<&str> = components(path).collect();
    match comps[..comps.len().saturating_sub(1)].iter().rposition(|c| *c == "src") {
        Some(pos) => comps[..=pos].join("/"),
        None => String::new(),
    }
}

/// Directory a Rust file's child modules live in.
fn module_dir(path: &str) -> String {
    let dir = dir_of(path);
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name {
        "mod.rs" | "lib.rs" | "main.rs" => dir.to_string(),
        _ => join(dir, strip_extension(file_name)),
    }
}
