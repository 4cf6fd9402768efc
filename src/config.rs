use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Root directory of the photo library.
    #[serde(default = "default_source_root")]
    pub root: PathBuf,

    /// Items fetched per pagination call during the metadata scan.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// PENDING photos pulled per embedding batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Concurrent embedding workers. Inference is memory and CPU heavy, so
    /// keep this small.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Cooperative pause between scan pages, in milliseconds.
    #[serde(default = "default_page_pause_ms")]
    pub page_pause_ms: u64,
}

impl IndexingConfig {
    pub fn page_pause(&self) -> Duration {
        Duration::from_millis(self.page_pause_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Tag stored with every embedding, identifying the producing model.
    #[serde(default = "default_model_version")]
    pub version: String,

    #[serde(default = "default_model_file")]
    pub file_name: String,

    /// Where to fetch the model on first use if it is not on disk.
    #[serde(default = "default_model_url")]
    pub download_url: String,

    /// Override for the models directory; defaults to the local data dir.
    #[serde(default)]
    pub models_dir: Option<PathBuf>,
}

impl ModelConfig {
    pub fn models_dir(&self) -> crate::error::Result<PathBuf> {
        if let Some(ref dir) = self.models_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_local_dir().ok_or_else(|| {
            PipelineError::ModelLoad("could not find local data directory".to_string())
        })?;
        Ok(data_dir.join("photodex").join("models"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Poll interval between background cycles, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photodex")
        .join("photodex.db")
}

fn default_source_root() -> PathBuf {
    dirs::picture_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_page_size() -> usize {
    100
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "gif".to_string(),
        "webp".to_string(),
        "heic".to_string(),
        "heif".to_string(),
    ]
}

fn default_batch_size() -> usize {
    25
}

fn default_workers() -> usize {
    2
}

fn default_page_pause_ms() -> u64 {
    25
}

fn default_model_version() -> String {
    "clip-vit-b32".to_string()
}

fn default_model_file() -> String {
    "clip-vit-b32-vision.onnx".to_string()
}

fn default_model_url() -> String {
    "https://huggingface.co/Qdrant/clip-ViT-B-32-vision/resolve/main/model.onnx".to_string()
}

fn default_poll_interval() -> u64 {
    60
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: default_source_root(),
            page_size: default_page_size(),
            image_extensions: default_image_extensions(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            workers: default_workers(),
            page_pause_ms: default_page_pause_ms(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            version: default_model_version(),
            file_name: default_model_file(),
            download_url: default_model_url(),
            models_dir: None,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { poll_interval: default_poll_interval() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            source: SourceConfig::default(),
            indexing: IndexingConfig::default(),
            model: ModelConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Create default config on first run
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("photodex")
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PHOTODEX_CONFIG") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.source.page_size, 100);
        assert_eq!(config.indexing.batch_size, 25);
        assert_eq!(config.indexing.workers, 2);
        assert_eq!(config.daemon.poll_interval, 60);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            db_path = "/tmp/test.db"

            [indexing]
            batch_size = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/test.db"));
        assert_eq!(config.indexing.batch_size, 5);
        assert_eq!(config.indexing.workers, 2);
        assert_eq!(config.source.page_size, 100);
    }
}
