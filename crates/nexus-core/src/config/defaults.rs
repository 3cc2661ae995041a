//! Default values for Nexus configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Ingestion Defaults
// ============================================================================

/// Maximum size of a single source file to ingest (512 KB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 512 * 1024;

/// Source file extensions picked up when walking a repository.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    // TypeScript / JavaScript
    "ts", "tsx", "js", "jsx", "mjs", "cjs",
    // Python
    "py", "pyi",
    // Go
    "go",
    // Java
    "java",
    // C#
    "cs",
    // Rust
    "rs",
];

/// Default directories to skip while walking a repository.
///
/// Plain names match at any depth; a leading `/` anchors the entry to the
/// repository root, so `src/bin` or a Go `build` package stay indexed.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    // Version control
    ".git",
    ".svn",
    ".hg",
    // Dependencies
    "node_modules",
    "vendor",
    "venv",
    ".venv",
    "__pycache__",
    // Build outputs
    "target",
    "dist",
    "obj",
    "/build",
    "/out",
    // Nexus's own data
    ".nexus",
    // Other common excludes
    "coverage",
    ".next",
    ".cache",
];

// ============================================================================
// Community Detection Defaults
// ============================================================================

/// Maximum local-moving passes per aggregation level.
pub const DEFAULT_MAX_PASSES: usize = 32;

/// Maximum number of aggregation levels.
pub const DEFAULT_MAX_LEVELS: usize = 16;

/// Modularity resolution (higher = more, smaller communities).
pub const DEFAULT_RESOLUTION: f64 = 1.0;

/// Smallest modularity gain that keeps the detector aggregating.
pub const DEFAULT_MIN_MODULARITY_GAIN: f64 = 1e-7;

/// Extra affinity a connected symbol gains towards symbols in its own file.
pub const DEFAULT_SAME_FILE_AFFINITY: f64 = 0.5;

// ============================================================================
// Process Extraction Defaults
// ============================================================================

/// Maximum call depth followed from an entry point.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Maximum steps recorded in one process.
pub const DEFAULT_MAX_STEPS: usize = 50;

/// Minimum steps for a flow to be kept.
pub const DEFAULT_MIN_STEPS: usize = 1;

/// Maximum number of processes emitted per run.
pub const DEFAULT_MAX_PROCESSES: usize = 500;

// ============================================================================
// Search Defaults
// ============================================================================

/// Default number of search results.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Per-index query timeout in milliseconds.
pub const DEFAULT_INDEX_TIMEOUT_MS: u64 = 5_000;

/// Weight of the keyword ranking during fusion.
pub const DEFAULT_KEYWORD_WEIGHT: f64 = 0.5;

/// Weight of the semantic ranking during fusion.
pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 0.5;

/// Reciprocal rank fusion constant.
pub const DEFAULT_RRF_K: f64 = 60.0;

// ============================================================================
// Storage Defaults
// ============================================================================

/// Default data directory, relative to the repository root.
pub const DEFAULT_DATA_DIR: &str = ".nexus";

/// Database directory inside the data directory.
pub const DEFAULT_DB_DIR: &str = "graph.db";

/// Embedding model cache directory inside `~/.nexus`.
pub const DEFAULT_MODEL_CACHE_DIR: &str = "cache";
