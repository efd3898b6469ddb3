//! 配置管理模块
//!
//! 负责加载和管理应用程序配置

use crate::nat::NatConfig;
use crate::selector::PlayerStrategy;
use crate::webseed::WebseedConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 应用程序配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// NAT 分类配置
    #[serde(default)]
    pub nat: NatConfig,
    /// 播放器选择配置
    #[serde(default)]
    pub selector: SelectorConfig,
    /// Web seed 回退配置
    #[serde(default)]
    pub webseed: WebseedConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 播放器选择配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SelectorConfig {
    /// 自动选择时 NAT 分类的超时 (毫秒)
    #[serde(default = "default_nat_timeout_ms")]
    pub nat_timeout_ms: u64,
    /// 各播放策略的入口资源
    #[serde(default)]
    pub entries: EntryConfig,
}

/// 播放策略入口资源
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EntryConfig {
    #[serde(default = "default_webtorrent_entry")]
    pub webtorrent: String,
    #[serde(default = "default_desktop_entry")]
    pub desktop: String,
    #[serde(default = "default_mobile_entry")]
    pub mobile: String,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl SelectorConfig {
    pub fn nat_timeout(&self) -> Duration {
        Duration::from_millis(self.nat_timeout_ms)
    }
}

impl EntryConfig {
    pub fn entry_for(&self, strategy: PlayerStrategy) -> &str {
        match strategy {
            PlayerStrategy::Webtorrent => &self.webtorrent,
            PlayerStrategy::Desktop => &self.desktop,
            PlayerStrategy::Mobile => &self.mobile,
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        SelectorConfig {
            nat_timeout_ms: default_nat_timeout_ms(),
            entries: EntryConfig::default(),
        }
    }
}

impl Default for EntryConfig {
    fn default() -> Self {
        EntryConfig {
            webtorrent: default_webtorrent_entry(),
            desktop: default_desktop_entry(),
            mobile: default_mobile_entry(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

fn default_nat_timeout_ms() -> u64 {
    3000
}

fn default_webtorrent_entry() -> String {
    "webtorrent/index.html".to_string()
}

fn default_desktop_entry() -> String {
    "desktop/index.html".to_string()
}

fn default_mobile_entry() -> String {
    "mobile/index.html".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// 从文件加载配置
    ///
    /// 如果文件不存在，返回默认配置
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let loaded = Self::read(path)?;
        Self::log_source(path, loaded.is_some());
        Ok(loaded.unwrap_or_default())
    }

    /// 读取配置文件，文件不存在时返回 None，不输出日志
    ///
    /// 日志系统依赖配置中的级别，初始化前使用这个函数
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("配置文件解析失败: {}", e))?;
        Ok(Some(config))
    }

    /// 记录配置来源
    pub fn log_source(path: &Path, found: bool) {
        if found {
            tracing::info!("配置加载成功: {:?}", path);
        } else {
            tracing::warn!("配置文件不存在: {:?}, 使用默认配置", path);
        }
    }

    /// 保存配置到文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// 获取配置文件路径
    ///
    /// 优先级: 命令行指定 > 当前目录 > 用户主目录
    pub fn get_config_path(cli_path: Option<&str>) -> String {
        if let Some(p) = cli_path {
            return p.to_string();
        }

        if Path::new("config.toml").exists() {
            return "config.toml".to_string();
        }

        if let Ok(home) = std::env::var("HOME") {
            let config_path = format!("{}/.config/player-select/config.toml", home);
            if Path::new(&config_path).exists() {
                return config_path;
            }
        }

        "config.toml".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.selector.nat_timeout(), Duration::from_secs(3));
        assert_eq!(config.logging.level, "info");
        assert_eq!(
            config.selector.entries.entry_for(PlayerStrategy::Mobile),
            "mobile/index.html"
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config() {
        let config: Config = toml::from_str(
            r#"
            [nat]
            ice_servers = ["stun:stun.example.org:3478"]

            [selector.entries]
            desktop = "plyr/index.html"
            "#,
        )
        .unwrap();
        assert_eq!(config.nat.ice_servers, vec!["stun:stun.example.org:3478"]);
        assert_eq!(config.nat.timeout_ms, 0);
        assert_eq!(config.selector.nat_timeout_ms, 3000);
        assert_eq!(config.selector.entries.desktop, "plyr/index.html");
        assert_eq!(config.selector.entries.webtorrent, "webtorrent/index.html");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/player-select/config.toml").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_read_is_silent_and_reports_presence() {
        assert_eq!(Config::read("/nonexistent/player-select/config.toml").unwrap(), None);

        let path = std::env::temp_dir().join(format!("player-select-config-{}.toml", std::process::id()));
        Config::default().save(&path).unwrap();
        let read = Config::read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(read, Some(Config::default()));
    }

    #[derive(Clone, Default)]
    struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_missing_file_is_reported_after_subscriber_installed() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let path = Path::new("/nonexistent/player-select/config.toml");
        tracing::subscriber::with_default(subscriber, || {
            let found = Config::read(path).unwrap().is_some();
            Config::log_source(path, found);
        });

        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"));
        assert!(output.contains("配置文件不存在"));
    }
}
