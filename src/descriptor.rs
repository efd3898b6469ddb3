//! 视频描述文件
//!
//! 描述文件是一个 JSON 文档，由播放页面的 `d` 参数指定:
//!
//! ```json
//! {
//!   "videos": [{"file_url": "movie.mp4", "torrent_url": "movie.mp4.torrent", "height": 720}],
//!   "subtitles": [{"label": "English", "srclang": "en", "file": "en.vtt"}],
//!   "poster": "poster.jpg",
//!   "webtorrent": {"enabled": true, "eager_webseed": false}
//! }
//! ```
//!
//! 其余字段 (name、urlslug、domain 等) 会被忽略。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// 描述文件错误
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Failed to fetch {location}: {message}")]
    Fetch { location: String, message: String },

    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid descriptor JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported descriptor location: {0}")]
    UnsupportedLocation(String),
}

/// 视频描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    pub videos: Vec<VideoVariant>,
    #[serde(default)]
    pub subtitles: Vec<SubtitleTrack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default)]
    pub webtorrent: WebtorrentOptions,
}

/// 一个可播放的视频版本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoVariant {
    pub file_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torrent_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// 字幕轨道
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub label: String,
    pub srclang: String,
    pub file: String,
}

/// WebTorrent 能力开关
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebtorrentOptions {
    #[serde(default)]
    pub enabled: bool,
    /// 种子就绪后立即添加 HTTP web seed
    #[serde(default)]
    pub eager_webseed: bool,
}

impl VideoDescriptor {
    /// 从 JSON 文本解析
    pub fn from_json(json: &str) -> Result<Self, DescriptorError> {
        Ok(serde_json::from_str(json)?)
    }

    /// 默认播放的版本 (第一个)
    pub fn primary_variant(&self) -> Option<&VideoVariant> {
        self.videos.first()
    }

    /// 海报地址，空字符串视为未设置
    pub fn poster(&self) -> Option<&str> {
        self.poster.as_deref().filter(|p| !p.is_empty())
    }
}

/// 描述文件加载器
#[async_trait]
pub trait DescriptorLoader: Send + Sync {
    async fn load(&self, location: &str) -> Result<VideoDescriptor, DescriptorError>;
}

/// 描述文件位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorLocation {
    Http(Url),
    File(PathBuf),
}

impl DescriptorLocation {
    /// 解析位置字符串
    ///
    /// 支持 http(s) URL、file URL 和文件路径。相对位置在设置了 `base` 时
    /// 基于 `base` 解析，否则按本地路径处理。
    pub fn resolve(location: &str, base: Option<&Url>) -> Result<Self, DescriptorError> {
        let url = match Url::parse(location) {
            // 单字母 scheme 是 Windows 盘符
            Ok(url) if url.scheme().len() > 1 => url,
            Ok(_) => return Ok(DescriptorLocation::File(PathBuf::from(location))),
            Err(url::ParseError::RelativeUrlWithoutBase) => match base {
                Some(base) => base
                    .join(location)
                    .map_err(|_| DescriptorError::UnsupportedLocation(location.to_string()))?,
                None => return Ok(DescriptorLocation::File(PathBuf::from(location))),
            },
            Err(_) => return Err(DescriptorError::UnsupportedLocation(location.to_string())),
        };

        match url.scheme() {
            "http" | "https" => Ok(DescriptorLocation::Http(url)),
            "file" => url
                .to_file_path()
                .map(DescriptorLocation::File)
                .map_err(|_| DescriptorError::UnsupportedLocation(location.to_string())),
            _ => Err(DescriptorError::UnsupportedLocation(location.to_string())),
        }
    }
}

/// 默认加载器: 本地文件使用 tokio::fs，HTTP 需要 `http` feature
#[derive(Debug, Clone, Default)]
pub struct DefaultDescriptorLoader {
    base: Option<Url>,
    #[cfg(feature = "http")]
    client: reqwest::Client,
}

impl DefaultDescriptorLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置相对位置的基础 URL (通常是播放页面地址)
    pub fn with_base(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    async fn read_file(&self, path: PathBuf) -> Result<String, DescriptorError> {
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| DescriptorError::Io { path, source })
    }

    #[cfg(feature = "http")]
    async fn fetch(&self, url: Url) -> Result<String, DescriptorError> {
        let location = url.to_string();
        let fetch_err = |e: reqwest::Error| DescriptorError::Fetch {
            location: location.clone(),
            message: e.to_string(),
        };

        self.client
            .get(url.clone())
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(fetch_err)?
            .text()
            .await
            .map_err(fetch_err)
    }

    #[cfg(not(feature = "http"))]
    async fn fetch(&self, url: Url) -> Result<String, DescriptorError> {
        Err(DescriptorError::UnsupportedLocation(format!(
            "{} (HTTP feature 未启用)",
            url
        )))
    }
}

#[async_trait]
impl DescriptorLoader for DefaultDescriptorLoader {
    async fn load(&self, location: &str) -> Result<VideoDescriptor, DescriptorError> {
        let text = match DescriptorLocation::resolve(location, self.base.as_ref())? {
            DescriptorLocation::Http(url) => self.fetch(url).await?,
            DescriptorLocation::File(path) => self.read_file(path).await?,
        };

        let descriptor = VideoDescriptor::from_json(&text)?;
        tracing::debug!(
            "描述文件加载成功: {} ({} 个视频, {} 条字幕)",
            location,
            descriptor.videos.len(),
            descriptor.subtitles.len()
        );
        Ok(descriptor)
    }
}
