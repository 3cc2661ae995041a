//! Core extractor trait for language-agnostic code extraction.

use super::result::{ExtractError, Extraction};
use crate::knowledge::ontology::Language;

/// Language-agnostic extractor trait.
///
/// Implement this trait for each language to turn source text into
/// definitions and references. Extraction is pure: the same input always
/// yields the same output and no state is shared between calls.
///
/// # Example Implementation
///
/// ```ignore
/// impl Extractor for PythonExtractor {
///     fn extract(&self, path: &str, content: &str) -> Result<Extraction, ExtractError> {
///         self.base.extract(path, content)
///     }
///
///     fn language(&self) -> Language { Language::Python }
///     fn supported_extensions(&self) -> &[&'static str] { &["py", "pyi"] }
/// }
/// ```
pub trait Extractor: Send + Sync {
    /// Extract definitions and references from a source file.
    ///
    /// # Arguments
    /// * `path` - Relative path to the file (used for identities)
    /// * `content` - Source code content
    fn extract(&self, path: &str, content: &str) -> Result<Extraction, ExtractError>;

    /// Language handled by this extractor.
    fn language(&self) -> Language;

    /// File extensions this extractor handles.
    fn supported_extensions(&self) -> &[&'static str];

    /// Check if this extractor can handle the given file extension.
    fn can_parse(&self, extension: &str) -> bool {
        self.supported_extensions()
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}
