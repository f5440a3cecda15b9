pub mod toml_config;

pub use toml_config::TomlConfig;

#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::Validate;
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "phishguard")]
#[command(about = "Phishing URL and deepfake audio detection server")]
pub struct CliArgs {
    #[arg(short, long, help = "TOML configuration file (defaults to ./phishguard.toml when present)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Bind address override")]
    pub host: Option<String>,

    #[arg(short, long, help = "Port override")]
    pub port: Option<u16>,

    #[arg(long, help = "Feature extraction strategy: auto, fast or content-aware")]
    pub strategy: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit JSON logs")]
    pub json_logs: bool,

    #[arg(long, help = "Log CPU / memory usage")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl CliArgs {
    /// 命令列參數覆蓋檔案設定
    pub fn apply_overrides(&self, config: &mut TomlConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(strategy) = &self.strategy {
            config.phishing.strategy = strategy.clone();
        }
        if self.json_logs {
            config.server.log_format = "json".to_string();
        }
        if self.monitor {
            config.monitoring.enabled = true;
        }
    }

    pub fn use_json_logs(&self) -> bool {
        self.json_logs
    }

    /// 讀檔、套用覆蓋、驗證
    pub fn resolve_config(&self) -> Result<TomlConfig> {
        let mut config = TomlConfig::load(self.config.as_deref())?;
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }
}
