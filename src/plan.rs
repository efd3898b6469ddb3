//! 播放计划
//!
//! 将选择结果和描述文件整理成渲染端需要的数据:
//! 视频源、字幕轨道、海报以及 WebTorrent 相关参数。

use crate::descriptor::{VideoDescriptor, VideoVariant};
use crate::selector::{PlayerSelection, PlayerStrategy};
use crate::webseed::{WebseedConfig, WebseedScheduler};
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;

/// 所有视频源都按 MP4 声明
const VIDEO_MIME_TYPE: &str = "video/mp4";

/// 播放计划错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("Descriptor has no videos")]
    EmptyDescriptor,

    #[error("First video has no torrent_url")]
    MissingTorrent,
}

/// 视频源
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaSource {
    pub src: String,
    pub mime_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// 字幕轨道
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextTrack {
    pub label: String,
    pub srclang: String,
    pub src: String,
    pub kind: &'static str,
    pub default: bool,
}

/// WebTorrent 播放参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TorrentSource {
    pub torrent_url: String,
    /// HTTP 回退地址
    pub webseed_url: String,
    pub eager_webseed: bool,
    /// web seed 回退时机
    pub webseed: WebseedConfig,
}

impl TorrentSource {
    /// 为本次会话创建 web seed 调度器
    pub fn scheduler(&self, now: Instant) -> WebseedScheduler {
        WebseedScheduler::new(self.webseed.clone(), self.eager_webseed, now)
    }
}

/// 播放计划
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackPlan {
    pub strategy: PlayerStrategy,
    pub entry: String,
    pub sources: Vec<MediaSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torrent: Option<TorrentSource>,
    pub subtitles: Vec<TextTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    pub autoplay: bool,
    /// 自动播放被浏览器阻止时显示播放按钮
    pub play_button_fallback: bool,
}

impl PlaybackPlan {
    pub fn build(selection: &PlayerSelection, descriptor: &VideoDescriptor) -> Result<Self, PlanError> {
        let primary = descriptor
            .primary_variant()
            .ok_or(PlanError::EmptyDescriptor)?;

        let strategy = selection.strategy;
        let sources = match strategy {
            PlayerStrategy::Desktop => descriptor.videos.iter().map(media_source).collect(),
            PlayerStrategy::Mobile | PlayerStrategy::Webtorrent => vec![media_source(primary)],
        };

        let torrent = match strategy {
            PlayerStrategy::Webtorrent => Some(TorrentSource {
                torrent_url: primary
                    .torrent_url
                    .clone()
                    .filter(|url| !url.is_empty())
                    .ok_or(PlanError::MissingTorrent)?,
                webseed_url: primary.file_url.clone(),
                eager_webseed: descriptor.webtorrent.eager_webseed,
                webseed: WebseedConfig::default(),
            }),
            _ => None,
        };

        let poster = match (strategy, descriptor.poster()) {
            (PlayerStrategy::Webtorrent, Some(_)) => {
                tracing::warn!("WebTorrent 播放器不支持海报，已忽略");
                None
            }
            (_, poster) => poster.map(str::to_string),
        };

        let subtitles = descriptor
            .subtitles
            .iter()
            .enumerate()
            .map(|(i, track)| TextTrack {
                label: track.label.clone(),
                srclang: track.srclang.clone(),
                src: track.file.clone(),
                kind: "subtitles",
                default: i == 0,
            })
            .collect();

        Ok(PlaybackPlan {
            strategy,
            entry: selection.entry.clone(),
            sources,
            torrent,
            subtitles,
            poster,
            autoplay: strategy != PlayerStrategy::Desktop,
            play_button_fallback: strategy == PlayerStrategy::Mobile,
        })
    }

    /// 使用配置中的 web seed 回退时机，非 WebTorrent 计划不受影响
    pub fn with_webseed(mut self, config: WebseedConfig) -> Self {
        if let Some(torrent) = self.torrent.as_mut() {
            torrent.webseed = config;
        }
        self
    }
}

fn media_source(variant: &VideoVariant) -> MediaSource {
    MediaSource {
        src: variant.file_url.clone(),
        mime_type: VIDEO_MIME_TYPE,
        height: variant.height,
    }
}
