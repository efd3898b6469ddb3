//! NAT 分类模块
//!
//! 通过 STUN 服务器反射回来的 ICE 候选，判断本地网络属于
//! 宽松型 NAT (一个本地端口只映射到一个外部端口) 还是对称型 NAT。

pub mod candidate;
pub mod classifier;

pub use candidate::{CandidateError, IceCandidateRecord};
pub use classifier::{
    CandidateTally, GatheringEvent, NatClassifier, NatError, NatProbe, NegotiatorFactory,
    StunNegotiator,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// 默认 STUN 服务器
///
/// Google 的公共 STUN 服务器响应较慢，默认只使用 Twilio 的全局节点
pub const DEFAULT_STUN_SERVER: &str = "stun:global.stun.twilio.com:3478";

/// NAT 分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NatClassification {
    /// 宽松型 NAT (cone NAT)
    Permissive,
    /// 对称型 NAT，端口预测无法穿透
    Symmetric,
    /// 在超时前没有得到结果
    TimedOut,
    /// 候选收集结束，但相关端口分组数量不是 1
    Unknown,
}

impl NatClassification {
    /// 是否允许点对点直连
    pub fn allows_peer_assist(&self) -> bool {
        matches!(self, NatClassification::Permissive)
    }
}

impl fmt::Display for NatClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NatClassification::Permissive => "Permissive NAT",
            NatClassification::Symmetric => "Symmetric NAT",
            NatClassification::TimedOut => "timed out",
            NatClassification::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// NAT 分类配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatConfig {
    /// STUN 服务器列表
    #[serde(default = "default_ice_servers")]
    pub ice_servers: Vec<String>,
    /// 分类超时 (毫秒)，0 表示不限时
    #[serde(default)]
    pub timeout_ms: u64,
}

impl NatConfig {
    /// 超时时间，未设置时返回 None
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

impl Default for NatConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
            timeout_ms: 0,
        }
    }
}

fn default_ice_servers() -> Vec<String> {
    vec![DEFAULT_STUN_SERVER.to_string()]
}
