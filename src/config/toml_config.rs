use crate::core::assembler::StrategyChoice;
use crate::utils::error::{GuardError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_one_of, validate_path, validate_positive_number,
    validate_range, Validate,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "phishguard.toml";

static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern must compile"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub phishing: PhishingConfig,
    pub deepfake: DeepfakeConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 上傳大小上限（multipart body）
    pub max_upload_mb: u64,
    /// "compact" 或 "json"
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5050,
            max_upload_mb: 50,
            log_format: "compact".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhishingConfig {
    pub model_path: String,
    pub denylist_path: String,
    pub phishing_class: i64,
    /// auto | fast | content-aware
    pub strategy: String,
    pub fetch_timeout_secs: u64,
    /// 外部的 public_suffix_list.dat；未設定時使用內建的完整清單
    pub public_suffix_list: Option<String>,
}

impl Default for PhishingConfig {
    fn default() -> Self {
        Self {
            model_path: "models/phishing_forest.json".to_string(),
            denylist_path: "phishing_urls.txt".to_string(),
            phishing_class: 1,
            strategy: "auto".to_string(),
            fetch_timeout_secs: 3,
            public_suffix_list: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepfakeConfig {
    pub model_path: String,
    /// HF config.json 或 JSON 陣列；未設定時找模型旁邊的 config.json
    pub labels_path: Option<String>,
    pub ffmpeg_path: String,
    pub media_timeout_secs: u64,
    pub max_media_mb: u64,
    pub max_media_per_scan: usize,
    /// 每個請求的暫存目錄建在這裡；未設定時用系統暫存目錄
    pub temp_dir: Option<String>,
}

impl Default for DeepfakeConfig {
    fn default() -> Self {
        Self {
            model_path: "models/deepfake/model.onnx".to_string(),
            labels_path: None,
            ffmpeg_path: "ffmpeg".to_string(),
            media_timeout_secs: 30,
            max_media_mb: 50,
            max_media_per_scan: 5,
            temp_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// 記錄啟動與模型載入後的 CPU / 記憶體用量
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(GuardError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| GuardError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 指定的檔案必須存在；沒指定時預設檔存在才讀，否則用預設值
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// 替換環境變數 (例如 ${MODEL_DIR})
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_PATTERN
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    pub fn strategy_choice(&self) -> Result<StrategyChoice> {
        self.phishing.strategy.parse()
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.phishing.fetch_timeout_secs)
    }

    pub fn media_timeout(&self) -> Duration {
        Duration::from_secs(self.deepfake.media_timeout_secs)
    }

    pub fn max_upload_bytes(&self) -> usize {
        (self.server.max_upload_mb * 1024 * 1024) as usize
    }

    pub fn max_media_bytes(&self) -> usize {
        (self.deepfake.max_media_mb * 1024 * 1024) as usize
    }

    /// 標籤檔：明確設定的路徑，否則模型同目錄的 config.json
    pub fn labels_path(&self) -> PathBuf {
        match &self.deepfake.labels_path {
            Some(path) => PathBuf::from(path),
            None => Path::new(&self.deepfake.model_path)
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("config.json"),
        }
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.enabled
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("server.host", &self.server.host)?;
        validate_positive_number("server.port", u64::from(self.server.port), 1)?;
        validate_range("server.max_upload_mb", self.server.max_upload_mb, 1, 1024)?;
        validate_one_of("server.log_format", &self.server.log_format, &["compact", "json"])?;

        validate_path("phishing.model_path", &self.phishing.model_path)?;
        validate_path("phishing.denylist_path", &self.phishing.denylist_path)?;
        if let Some(psl) = &self.phishing.public_suffix_list {
            validate_path("phishing.public_suffix_list", psl)?;
        }
        self.strategy_choice()?;
        validate_range("phishing.fetch_timeout_secs", self.phishing.fetch_timeout_secs, 1, 60)?;

        validate_path("deepfake.model_path", &self.deepfake.model_path)?;
        if let Some(labels) = &self.deepfake.labels_path {
            validate_path("deepfake.labels_path", labels)?;
        }
        validate_non_empty_string("deepfake.ffmpeg_path", &self.deepfake.ffmpeg_path)?;
        validate_range("deepfake.media_timeout_secs", self.deepfake.media_timeout_secs, 1, 600)?;
        validate_range("deepfake.max_media_mb", self.deepfake.max_media_mb, 1, 1024)?;
        if let Some(dir) = &self.deepfake.temp_dir {
            validate_path("deepfake.temp_dir", dir)?;
        }
        validate_positive_number(
            "deepfake.max_media_per_scan",
            self.deepfake.max_media_per_scan as u64,
            1,
        )?;

        Ok(())
    }
}
