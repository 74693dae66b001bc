use expensa_ocr::ExtractionConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_ENV: &str = "EXPENSA_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "expensa.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract language pack, e.g. `eng`.
    pub language: String,
    pub tessdata_path: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self { language: "eng".to_string(), tessdata_path: None }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub database_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub extraction: ExtractionConfig,
    pub ocr: OcrConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            database_path: PathBuf::from("expensa.db"),
            uploads_dir: PathBuf::from("uploads"),
            max_upload_bytes: 10 * 1024 * 1024,
            extraction: ExtractionConfig::default(),
            ocr: OcrConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read the file named by `EXPENSA_CONFIG` (or `expensa.toml`), then apply env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let config = Self::from_path(Path::new(&path))?;
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    /// A missing file yields the defaults; a malformed one is an error.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path: path.to_path_buf(), source }),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(bind) = lookup("EXPENSA_BIND") {
            self.bind = bind;
        }
        if let Some(db) = lookup("EXPENSA_DATABASE") {
            self.database_path = PathBuf::from(db);
        }
        if let Some(uploads) = lookup("EXPENSA_UPLOADS") {
            self.uploads_dir = PathBuf::from(uploads);
        }
        self
    }
}
