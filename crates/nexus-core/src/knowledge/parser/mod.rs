//! Language-agnostic extraction infrastructure.
//!
//! Provides an `Extractor` trait that turns source text into definitions and
//! references, with tree-sitter implementations driven by per-language
//! pattern tables.
//!
//! ## Components
//!
//! - `Extractor` trait - Common interface for all language extractors
//! - `ExtractorRegistry` - Maps file extensions to appropriate extractors
//! - `Extraction` - Definitions, references and warnings for one file
//!
//! ## Supported Languages
//!
//! TypeScript/TSX, JavaScript, Python, Go, Java, C# and Rust.
//!
//! Call references carry only the callee's name; resolving them to symbols is
//! a name-based heuristic done by the graph assembler.

mod csharp;
mod go;
mod java;
mod python;
mod registry;
mod result;
mod rust;
mod traits;
mod treesitter;
mod typescript;

pub use csharp::CSharpExtractor;
pub use go::GoExtractor;
pub use java::JavaExtractor;
pub use python::PythonExtractor;
pub use registry::ExtractorRegistry;
pub use result::{Definition, ExtractError, Extraction, Reference, ReferenceKind};
pub use rust::RustExtractor;
pub use traits::Extractor;
pub use typescript::TypeScriptExtractor;
