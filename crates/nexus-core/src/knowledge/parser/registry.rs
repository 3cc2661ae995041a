//! Extractor registry for managing language-specific extractors.

use std::collections::HashMap;
use std::sync::Arc;

use super::csharp::CSharpExtractor;
use super::go::GoExtractor;
use super::java::JavaExtractor;
use super::python::PythonExtractor;
use super::result::{ExtractError, Extraction};
use super::rust::RustExtractor;
use super::traits::Extractor;
use super::typescript::TypeScriptExtractor;

/// Registry of language extractors.
///
/// Maps file extensions to their respective extractors.
/// Automatically registers all built-in extractors on creation.
pub struct ExtractorRegistry {
    /// Extension to extractor mapping.
    extractors: HashMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Create a new registry with all built-in extractors.
    pub fn new() -> Self {
        let mut registry = Self {
            extractors: HashMap::new(),
        };

        registry.register(Arc::new(RustExtractor::new()));
        registry.register(Arc::new(TypeScriptExtractor::typescript()));
        registry.register(Arc::new(TypeScriptExtractor::tsx()));
        registry.register(Arc::new(TypeScriptExtractor::javascript()));
        registry.register(Arc::new(PythonExtractor::new()));
        registry.register(Arc::new(GoExtractor::new()));
        registry.register(Arc::new(JavaExtractor::new()));
        registry.register(Arc::new(CSharpExtractor::new()));

        registry
    }

    /// Register an extractor for its supported extensions.
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        for ext in extractor.supported_extensions() {
            self.extractors.insert(ext.to_lowercase(), Arc::clone(&extractor));
        }
    }

    /// Get an extractor for the given file extension.
    pub fn extractor_for_extension(&self, extension: &str) -> Option<Arc<dyn Extractor>> {
        self.extractors.get(&extension.to_lowercase()).cloned()
    }

    /// Get an extractor for the given file path.
    pub fn extractor_for_path(&self, path: &str) -> Option<Arc<dyn Extractor>> {
        std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| self.extractor_for_extension(ext))
    }

    /// Extract a file with the extractor registered for its extension.
    pub fn extract(&self, path: &str, content: &str) -> Result<Extraction, ExtractError> {
        let extractor = self
            .extractor_for_path(path)
            .ok_or_else(|| ExtractError::Unsupported(path.to_string()))?;
        extractor.extract(path, content)
    }

    /// Check if any extractor can handle the given extension.
    pub fn can_parse(&self, extension: &str) -> bool {
        self.extractors.contains_key(&extension.to_lowercase())
    }

    /// List all supported extensions.
    pub fn supported_extensions(&self) -> Vec<&str> {
        self.extractors.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
