//! Structure nodes: source files and their languages.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// =============================================================================
// FILE NODE
// =============================================================================

/// A source file in the codebase.
///
/// Created once per ingested file and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    /// Unique identifier (`file:<path>`)
    pub id: String,

    /// Relative path from project root
    pub path: String,

    /// File name without path
    pub name: String,

    /// Programming language
    pub language: Language,

    /// Raw content, kept for keyword search
    pub content: String,

    /// File size in bytes
    pub size: u64,

    /// SHA256 hash of contents
    pub hash: String,
}

impl FileNode {
    /// Create a file node from its path and content.
    pub fn new(path: impl Into<String>, language: Language, content: impl Into<String>) -> Self {
        let path = path.into();
        let content = content.into();
        let name = std::path::Path::new(&path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();

        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());

        Self {
            id: Self::id_for(&path),
            name,
            language,
            size: content.len() as u64,
            hash: hex::encode(hasher.finalize()),
            path,
            content,
        }
    }

    /// Node id for a file path.
    pub fn id_for(path: &str) -> String {
        format!("file:{}", path)
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        std::path::Path::new(&self.path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

/// Programming language of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Go,
    Java,
    CSharp,
    Rust,
}

impl Language {
    /// All supported languages.
    pub const ALL: [Language; 7] = [
        Self::TypeScript,
        Self::JavaScript,
        Self::Python,
        Self::Go,
        Self::Java,
        Self::CSharp,
        Self::Rust,
    ];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "ts" | "tsx" => Some(Self::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "py" | "pyi" => Some(Self::Python),
            "go" => Some(Self::Go),
            "java" => Some(Self::Java),
            "cs" => Some(Self::CSharp),
            "rs" => Some(Self::Rust),
            _ => None,
        }
    }

    /// Language of a path, judged by its extension.
    pub fn from_path(path: &str) -> Option<Self> {
        std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Go => "go",
            Self::Java => "java",
            Self::CSharp => "csharp",
            Self::Rust => "rust",
        }
    }

    /// Suffixes tried, in order, when an import names a file without its extension.
    pub fn module_suffixes(&self) -> &'static [&'static str] {
        match self {
            Self::TypeScript | Self::JavaScript => &[
                ".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs",
                "/index.ts", "/index.tsx", "/index.js", "/index.jsx",
            ],
            Self::Python => &[".py", ".pyi", "/__init__.py"],
            Self::Go => &[".go"],
            Self::Java => &[".java"],
            Self::CSharp => &[".cs"],
            Self::Rust => &[".rs", "/mod.rs"],
        }
    }

    /// Whether imports of this language name whole directories (packages).
    pub fn imports_directories(&self) -> bool {
        matches!(self, Self::Go | Self::CSharp | Self::Java)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
