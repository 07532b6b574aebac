//! Configuration management for DocQA.
//!
//! Configuration is assembled in layers:
//! - Built-in defaults
//! - Config file (`.docqa/config.yaml` or `DOCQA_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric; the vector store lives in `.docqa/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the LLM factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["openai", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docqa/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Generation provider (e.g., "ollama", "openai")
    pub provider: String,

    /// Generation model identifier
    pub model: String,

    /// API key for the generation provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Retrieval gate and quote verification defaults
    pub chat: ChatSettings,

    /// Page chunking parameters used at ingest time
    pub chunking: ChunkSettings,

    /// Embedding backend used by the vector store
    pub embedding: EmbeddingSettings,

    /// Text extraction strategy for `ingest`
    pub extractor: ExtractorKind,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        #[serde(rename = "embeddingModel")]
        embedding_model: Option<String>,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            Self::OpenAI { model, .. } | Self::Ollama { model, .. } => model,
        }
    }

    /// Endpoint override, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::OpenAI { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }
}

/// Defaults for a chat invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Number of chunks requested from retrieval
    pub n_sources: usize,

    /// Minimum similarity score a chunk needs to ground an answer
    pub min_relevance: f32,

    /// Whether quoted spans in answers are verified against sources
    pub verify_quotes: bool,

    /// Fuzzy-match acceptance bound for quote verification
    pub threshold: f64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            n_sources: 5,
            min_relevance: 0.3,
            verify_quotes: true,
            threshold: 0.85,
        }
    }
}

/// Chunking parameters, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkSettings {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

impl ChunkSettings {
    /// Reject configurations that would stall the chunking cursor.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be > 0".to_string()));
        }
        if self.overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "overlap must be < chunk_size (overlap: {}, chunk_size: {})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Embedding backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Provider name: "trigram" or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Endpoint override for remote providers
    pub endpoint: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
        }
    }
}

/// Text extraction backend, chosen once at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractorKind {
    /// Pre-computed OCR results persisted as `<stem>_ocr.json`
    #[default]
    OcrJson,
    /// UTF-8 text files, pages separated by form feeds
    PlainText,
}

impl ExtractorKind {
    /// File extension this extractor consumes.
    pub fn extension(&self) -> &'static str {
        match self {
            ExtractorKind::OcrJson => "json",
            ExtractorKind::PlainText => "txt",
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    chat: Option<ChatSettings>,
    chunking: Option<ChunkSettings>,
    embedding: Option<EmbeddingSettings>,
    extractor: Option<ExtractorKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
            chat: ChatSettings::default(),
            chunking: ChunkSettings::default(),
            embedding: EmbeddingSettings::default(),
            extractor: ExtractorKind::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, config file and defaults.
    ///
    /// Environment variables:
    /// - `DOCQA_WORKSPACE`: Override workspace path
    /// - `DOCQA_CONFIG`: Path to config file
    /// - `DOCQA_PROVIDER`: Generation provider
    /// - `DOCQA_MODEL`: Generation model
    /// - `DOCQA_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Like [`AppConfig::load`], with a workspace and config file given on the
    /// command line. Either one, when present, wins over its environment
    /// variable and decides which YAML file is merged.
    ///
    /// An explicitly named config file (flag or `DOCQA_CONFIG`) must exist;
    /// the workspace default `.docqa/config.yaml` is optional.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace
            .or_else(|| std::env::var("DOCQA_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("DOCQA_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        match config.config_file.clone() {
            Some(path) => {
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Config file does not exist: {:?}",
                        path
                    )));
                }
                config = config.merge_yaml(&path)?;
            }
            None => {
                let default_path = config.docqa_dir().join("config.yaml");
                if default_path.exists() {
                    config = config.merge_yaml(&default_path)?;
                }
            }
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("DOCQA_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("DOCQA_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("DOCQA_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> Result<Self, serde_yaml::Error> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;
        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();
            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }
            result.llm = Some(llm);
        }

        if let Some(chat) = config_file.chat {
            result.chat = chat;
        }
        if let Some(chunking) = config_file.chunking {
            result.chunking = chunking;
        }
        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(extractor) = config_file.extractor {
            result.extractor = extractor;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Path to the .docqa directory.
    pub fn docqa_dir(&self) -> PathBuf {
        self.workspace.join(".docqa")
    }

    /// Path to the SQLite vector store.
    pub fn index_path(&self) -> PathBuf {
        self.docqa_dir().join("index.sqlite")
    }

    /// Ensure the .docqa directory exists.
    pub fn ensure_docqa_dir(&self) -> AppResult<()> {
        let dir = self.docqa_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .docqa directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Configuration of a named provider, if the config file declared one.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Resolve the API key for a provider.
    ///
    /// `DOCQA_API_KEY` wins; otherwise the provider's `apiKeyEnv` is consulted.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::OpenAI { api_key_env, .. }) => std::env::var(api_key_env).ok(),
            _ if provider == "openai" => std::env::var("OPENAI_API_KEY").ok(),
            _ => None,
        }
    }

    /// Validate the assembled configuration.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.as_str();
        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider == "openai" && self.resolve_api_key(provider).is_none() {
            return Err(AppError::Config(
                "OpenAI provider requires an API key (DOCQA_API_KEY or apiKeyEnv)".to_string(),
            ));
        }

        self.chunking.validate()?;

        if self.chat.n_sources == 0 {
            return Err(AppError::Config("n_sources must be > 0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.chat.threshold) {
            return Err(AppError::Config(format!(
                "threshold must be within [0, 1], got {}",
                self.chat.threshold
            )));
        }
        if !self.chat.min_relevance.is_finite() {
            return Err(AppError::Config("min_relevance must be finite".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.chat.n_sources, 5);
        assert_eq!(config.chat.min_relevance, 0.3);
        assert!(config.chat.verify_quotes);
        assert_eq!(config.chat.threshold, 0.85);
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.extractor, ExtractorKind::OcrJson);
    }

    #[test]
    fn test_index_path() {
        let config = AppConfig::default();
        assert!(config.index_path().ends_with(".docqa/index.sqlite"));
    }

    #[test]
    fn test_with_overrides() {
        let overridden = AppConfig::default().with_overrides(
            None,
            None,
            Some("openai".to_string()),
            Some("gpt-4o-mini".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "openai");
        assert_eq!(overridden.model, "gpt-4o-mini");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_ollama() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overlap_not_below_chunk_size() {
        let mut config = AppConfig::default();
        config.chunking = ChunkSettings {
            chunk_size: 100,
            overlap: 100,
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overlap must be < chunk_size"));
    }

    #[test]
    fn test_validate_rejects_threshold_out_of_range() {
        let mut config = AppConfig::default();
        config.chat.threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_yaml_sections() {
        let yaml = r#"
llm:
  activeProvider: openai
  providers:
    openai:
      apiKeyEnv: MY_OPENAI_KEY
      model: gpt-4o-mini
chat:
  n_sources: 8
  min_relevance: 0.5
chunking:
  chunk_size: 800
  overlap: 80
extractor:
  kind: plain_text
logging:
  color: false
"#;
        let merged = AppConfig::default().merge_yaml_str(yaml).unwrap();
        assert_eq!(merged.provider, "openai");
        assert_eq!(merged.model, "gpt-4o-mini");
        assert_eq!(merged.chat.n_sources, 8);
        assert_eq!(merged.chat.min_relevance, 0.5);
        // Unspecified fields keep their defaults.
        assert!(merged.chat.verify_quotes);
        assert_eq!(merged.chat.threshold, 0.85);
        assert_eq!(merged.chunking.chunk_size, 800);
        assert_eq!(merged.extractor, ExtractorKind::PlainText);
        assert!(merged.no_color);
    }

    #[test]
    fn test_load_yaml_file_from_disk() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "chunking:\n  chunk_size: 300\n  overlap: 30\n").unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.chunking.chunk_size, 300);
        assert_eq!(merged.chunking.overlap, 30);
    }

    #[test]
    fn test_load_with_merges_explicit_config_file() {
        let workspace = tempfile::TempDir::new().unwrap();
        let elsewhere = tempfile::TempDir::new().unwrap();
        let path = elsewhere.path().join("my.yaml");
        std::fs::write(&path, "chat:\n  n_sources: 9\n  min_relevance: 0.4\n").unwrap();

        let config =
            AppConfig::load_with(Some(workspace.path().to_path_buf()), Some(path.clone())).unwrap();
        assert_eq!(config.workspace, workspace.path());
        assert_eq!(config.config_file.as_deref(), Some(path.as_path()));
        assert_eq!(config.chat.n_sources, 9);
        assert_eq!(config.chat.min_relevance, 0.4);
    }

    #[test]
    fn test_load_with_reads_the_given_workspace_config() {
        let workspace = tempfile::TempDir::new().unwrap();
        let docqa_dir = workspace.path().join(".docqa");
        std::fs::create_dir_all(&docqa_dir).unwrap();
        std::fs::write(
            docqa_dir.join("config.yaml"),
            "chunking:\n  chunk_size: 640\n  overlap: 40\n",
        )
        .unwrap();

        let config = AppConfig::load_with(Some(workspace.path().to_path_buf()), None).unwrap();
        assert_eq!(config.chunking.chunk_size, 640);
        assert_eq!(config.index_path(), docqa_dir.join("index.sqlite"));
    }

    #[test]
    fn test_load_with_missing_explicit_config_is_config_error() {
        let workspace = tempfile::TempDir::new().unwrap();
        let missing = workspace.path().join("absent.yaml");
        let err = AppConfig::load_with(Some(workspace.path().to_path_buf()), Some(missing))
            .unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_malformed_yaml_is_config_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "chat: [unclosed").unwrap();
        assert!(matches!(
            AppConfig::default().merge_yaml(&path),
            Err(AppError::Config(_))
        ));
    }
}
