//! Configuration management for Nexus.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `nexus.toml` file
//! 3. User config `~/.config/nexus/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Repository walking and extraction.
    pub ingest: IngestConfig,

    /// Community detection.
    pub community: CommunityConfig,

    /// Execution flow extraction.
    pub process: ProcessConfig,

    /// Hybrid search.
    pub search: SearchConfig,

    /// Storage locations.
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./nexus.toml` (project local)
    /// 2. `~/.config/nexus/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new("nexus.toml").exists() {
            return Self::from_file("nexus.toml");
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("nexus").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(size) = std::env::var("NEXUS_MAX_FILE_SIZE") {
            if let Ok(n) = size.parse() {
                self.ingest.max_file_size = n;
            }
        }
        if let Ok(flag) = std::env::var("NEXUS_SKIP_EMBEDDINGS") {
            self.ingest.skip_embeddings = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        if let Ok(steps) = std::env::var("NEXUS_MAX_PROCESS_STEPS") {
            if let Ok(n) = steps.parse() {
                self.process.max_steps = n;
            }
        }

        if let Ok(strategy) = std::env::var("NEXUS_FUSION") {
            match strategy.as_str() {
                "rrf" => self.search.fusion = FusionStrategy::Rrf,
                "weighted" => self.search.fusion = FusionStrategy::Weighted,
                _ => {}
            }
        }
        if let Ok(weight) = std::env::var("NEXUS_KEYWORD_WEIGHT") {
            if let Ok(w) = weight.parse() {
                self.search.keyword_weight = w;
            }
        }
        if let Ok(weight) = std::env::var("NEXUS_SEMANTIC_WEIGHT") {
            if let Ok(w) = weight.parse() {
                self.search.semantic_weight = w;
            }
        }
        if let Ok(timeout) = std::env::var("NEXUS_INDEX_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.search.index_timeout_ms = ms;
            }
        }

        if let Ok(dir) = std::env::var("NEXUS_DATA_DIR") {
            self.storage.data_dir = dir;
        }
    }

    /// Reject values the algorithms cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.community.resolution <= 0.0 {
            return Err(ConfigError::Invalid(
                "community.resolution must be positive".to_string(),
            ));
        }
        if self.community.same_file_affinity < 0.0 {
            return Err(ConfigError::Invalid(
                "community.same_file_affinity must not be negative".to_string(),
            ));
        }
        if self.process.max_steps == 0 {
            return Err(ConfigError::Invalid(
                "process.max_steps must be at least 1".to_string(),
            ));
        }
        if self.search.keyword_weight < 0.0 || self.search.semantic_weight < 0.0 {
            return Err(ConfigError::Invalid(
                "search weights must not be negative".to_string(),
            ));
        }
        if self.search.rrf_k < 0.0 {
            return Err(ConfigError::Invalid(
                "search.rrf_k must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Repository walking and extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum size of a single file to ingest (in bytes).
    pub max_file_size: u64,

    /// File extensions to ingest (without leading dot).
    pub include_extensions: Vec<String>,

    /// Directories to skip.
    pub exclude_dirs: Vec<String>,

    /// Skip embedding generation for the semantic index.
    pub skip_embeddings: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            include_extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
            skip_embeddings: false,
        }
    }
}

/// Community detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunityConfig {
    /// Maximum local-moving passes per level.
    pub max_passes: usize,

    /// Maximum aggregation levels.
    pub max_levels: usize,

    /// Modularity resolution parameter.
    pub resolution: f64,

    /// Minimum modularity improvement to keep aggregating.
    pub min_modularity_gain: f64,

    /// Affinity added between connected symbols of the same file.
    pub same_file_affinity: f64,

    /// Give isolated symbols their own singleton community.
    pub include_singletons: bool,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            max_levels: DEFAULT_MAX_LEVELS,
            resolution: DEFAULT_RESOLUTION,
            min_modularity_gain: DEFAULT_MIN_MODULARITY_GAIN,
            same_file_affinity: DEFAULT_SAME_FILE_AFFINITY,
            include_singletons: true,
        }
    }
}

/// Execution flow extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Maximum call depth followed from an entry point.
    pub max_depth: usize,

    /// Maximum steps per process.
    pub max_steps: usize,

    /// Flows with fewer steps are dropped.
    pub min_steps: usize,

    /// Upper bound on processes per run.
    pub max_processes: usize,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_steps: DEFAULT_MAX_STEPS,
            min_steps: DEFAULT_MIN_STEPS,
            max_processes: DEFAULT_MAX_PROCESSES,
        }
    }
}

/// How keyword and semantic rankings are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    /// Reciprocal rank fusion: `Σ weight / (k + rank)`.
    Rrf,
    /// Min-max normalised scores, weighted and summed.
    Weighted,
}

/// Hybrid search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Default result limit.
    pub default_limit: usize,

    /// Per-index timeout (milliseconds).
    pub index_timeout_ms: u64,

    /// Fusion strategy.
    pub fusion: FusionStrategy,

    /// Keyword ranking weight.
    pub keyword_weight: f64,

    /// Semantic ranking weight.
    pub semantic_weight: f64,

    /// RRF constant `k`.
    pub rrf_k: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_SEARCH_LIMIT,
            index_timeout_ms: DEFAULT_INDEX_TIMEOUT_MS,
            fusion: FusionStrategy::Rrf,
            keyword_weight: DEFAULT_KEYWORD_WEIGHT,
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
            rrf_k: DEFAULT_RRF_K,
        }
    }
}

impl SearchConfig {
    /// Timeout applied to each index query.
    pub fn index_timeout(&self) -> Duration {
        Duration::from_millis(self.index_timeout_ms)
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for nexus data (default: ".nexus").
    pub data_dir: String,

    /// Database directory name inside `data_dir`.
    pub db_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
            db_dir: DEFAULT_DB_DIR.to_string(),
        }
    }
}

impl StorageConfig {
    /// Full path to the graph database for a repository root.
    pub fn db_path(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.data_dir).join(&self.db_dir)
    }

    /// Embedding model cache directory: `~/.nexus/cache/`.
    pub fn model_cache_dir(&self) -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DATA_DIR)
            .join(DEFAULT_MODEL_CACHE_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ingest.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.search.fusion, FusionStrategy::Rrf);
        assert_eq!(config.storage.data_dir, DEFAULT_DATA_DIR);
        assert!(config.community.include_singletons);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[ingest]"));
        assert!(toml_str.contains("[community]"));
        assert!(toml_str.contains("[process]"));
        assert!(toml_str.contains("[search]"));
        assert!(toml_str.contains("[storage]"));
    }

    #[test]
    fn test_invalid_resolution_rejected() {
        let mut config = Config::default();
        config.community.resolution = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_db_path() {
        let storage = StorageConfig::default();
        let path = storage.db_path(Path::new("/repo"));
        assert_eq!(path, PathBuf::from("/repo/.nexus/graph.db"));
    }
}
