//! 播放器选择
//!
//! 决策顺序:
//! 1. 请求中带有播放器索引 (`p`) 时直接映射: 0 => WebTorrent, 1 => 桌面, 2 => 移动
//! 2. 否则加载描述文件 (`d`)
//! 3. 移动设备 => 移动播放器
//! 4. 非移动设备执行 NAT 分类: 宽松型 NAT 且描述文件启用了 WebTorrent
//!    => WebTorrent，其余情况 => 桌面播放器

use crate::config::SelectorConfig;
use crate::descriptor::{DescriptorError, DescriptorLoader, VideoDescriptor};
use crate::device::DeviceSignals;
use crate::nat::{NatClassification, NatProbe};
use crate::resolution::{self, Resolution};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

/// 播放器索引参数名
pub const PLAYER_PARAM: &str = "p";

/// 描述文件参数名
pub const DESCRIPTOR_PARAM: &str = "d";

/// 播放器选择错误
#[derive(Debug, Error)]
pub enum SelectError {
    #[error("Unknown player index: {0}")]
    UnknownOverrideIndex(String),

    #[error("No descriptor location in request")]
    MissingDescriptorLocator,

    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),
}

/// 播放策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStrategy {
    /// 点对点辅助分发
    Webtorrent,
    /// 直接文件播放
    Desktop,
    /// 移动端优化播放
    Mobile,
}

impl PlayerStrategy {
    /// 根据请求中的播放器索引映射
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(PlayerStrategy::Webtorrent),
            1 => Some(PlayerStrategy::Desktop),
            2 => Some(PlayerStrategy::Mobile),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            PlayerStrategy::Webtorrent => "webtorrent",
            PlayerStrategy::Desktop => "desktop",
            PlayerStrategy::Mobile => "mobile",
        }
    }
}

impl fmt::Display for PlayerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for PlayerStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webtorrent" => Ok(PlayerStrategy::Webtorrent),
            "desktop" => Ok(PlayerStrategy::Desktop),
            "mobile" => Ok(PlayerStrategy::Mobile),
            other => Err(format!("未知的播放策略: {}", other)),
        }
    }
}

/// 选择结果: 策略和对应的入口资源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSelection {
    pub strategy: PlayerStrategy,
    pub entry: String,
}

/// 选择请求 (通常来自播放页面的查询参数)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectRequest {
    /// 显式指定的播放器索引
    pub player_override: Option<String>,
    /// 描述文件位置
    pub descriptor: Option<String>,
}

impl SelectRequest {
    /// 从查询字符串解析，允许带前导 `?`，重复参数取第一个
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut request = SelectRequest::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                PLAYER_PARAM if request.player_override.is_none() => {
                    request.player_override = Some(value.into_owned())
                }
                DESCRIPTOR_PARAM if request.descriptor.is_none() => {
                    request.descriptor = Some(value.into_owned())
                }
                _ => {}
            }
        }
        request
    }

    /// 从播放页面 URL 解析
    pub fn from_url(url: &Url) -> Self {
        Self::from_query(url.query().unwrap_or_default())
    }

    /// 解析显式播放器索引
    ///
    /// 空值视为未指定；取开头的整数部分 (`1abc`、`1.5` 都是 1)，
    /// 无法识别的值返回错误，不会回退到自动选择
    pub fn override_strategy(&self) -> Result<Option<PlayerStrategy>, SelectError> {
        let raw = match self.player_override.as_deref().map(str::trim) {
            None | Some("") => return Ok(None),
            Some(raw) => raw,
        };

        leading_integer(raw)
            .and_then(PlayerStrategy::from_index)
            .map(Some)
            .ok_or_else(|| SelectError::UnknownOverrideIndex(raw.to_string()))
    }
}

/// 解析字符串开头的整数 (可带符号)，没有数字时返回 None
fn leading_integer(raw: &str) -> Option<i64> {
    let digits_start = usize::from(raw.starts_with(['+', '-']));
    let digits_end = raw[digits_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(raw.len(), |i| digits_start + i);
    if digits_end == digits_start {
        return None;
    }
    raw[..digits_end].parse().ok()
}

/// 播放器选择器
///
/// 描述文件加载器、NAT 探测和设备信号都由调用方注入
pub struct PlayerSelector<L, P> {
    loader: L,
    probe: P,
    device: DeviceSignals,
    config: SelectorConfig,
}

impl<L: DescriptorLoader, P: NatProbe> PlayerSelector<L, P> {
    pub fn new(loader: L, probe: P, device: DeviceSignals, config: SelectorConfig) -> Self {
        Self {
            loader,
            probe,
            device,
            config,
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// 策略对应的入口资源
    pub fn selection_for(&self, strategy: PlayerStrategy) -> PlayerSelection {
        PlayerSelection {
            strategy,
            entry: self.config.entries.entry_for(strategy).to_string(),
        }
    }

    /// 执行选择
    pub async fn select(&self, request: &SelectRequest) -> Result<PlayerSelection, SelectError> {
        self.select_with_descriptor(request)
            .await
            .map(|(selection, _)| selection)
    }

    /// 执行选择，同时返回自动选择时加载的描述文件
    ///
    /// 显式指定播放器时不会加载描述文件，也不会进行 NAT 分类
    pub async fn select_with_descriptor(
        &self,
        request: &SelectRequest,
    ) -> Result<(PlayerSelection, Option<VideoDescriptor>), SelectError> {
        match request.override_strategy() {
            Ok(Some(strategy)) => {
                info!("使用指定的播放器: {}", strategy);
                return Ok((self.selection_for(strategy), None));
            }
            Ok(None) => {}
            Err(e) => {
                warn!("{}", e);
                return Err(e);
            }
        }

        let location = request.descriptor.as_deref().ok_or_else(|| {
            error!("请求中没有描述文件位置");
            SelectError::MissingDescriptorLocator
        })?;

        let descriptor = self.loader.load(location).await.map_err(|e| {
            error!("加载描述文件失败: {}", e);
            SelectError::from(e)
        })?;

        let strategy = self.decide(&descriptor).await;
        info!("自动选择播放器: {}", strategy);
        Ok((self.selection_for(strategy), Some(descriptor)))
    }

    async fn decide(&self, descriptor: &VideoDescriptor) -> PlayerStrategy {
        if self.device.is_mobile() {
            debug!("检测到移动设备");
            return PlayerStrategy::Mobile;
        }

        let nat = self.probe.probe(Some(self.config.nat_timeout())).await;
        debug!(
            "NAT 类型: {}, WebTorrent 启用: {}",
            nat, descriptor.webtorrent.enabled
        );

        if nat == NatClassification::Permissive && descriptor.webtorrent.enabled {
            PlayerStrategy::Webtorrent
        } else {
            PlayerStrategy::Desktop
        }
    }
}

impl<L, P> PlayerSelector<L, P>
where
    L: DescriptorLoader + 'static,
    P: NatProbe + 'static,
{
    /// 在后台执行选择，返回单次解析结果
    ///
    /// 选择失败时错误已被记录，结果变为 Cancelled
    pub fn spawn_select(self: Arc<Self>, request: SelectRequest) -> Resolution<PlayerSelection> {
        let (mut resolver, resolution) = resolution::channel();
        tokio::spawn(async move {
            match self.select(&request).await {
                Ok(selection) => {
                    resolver.resolve(selection);
                }
                Err(_) => resolver.cancel(),
            }
        });
        resolution
    }
}
