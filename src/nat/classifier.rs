//! NAT 分类器
//!
//! 在本地发起一次 WebRTC 协商，收集 STUN 服务器反射回来的候选，
//! 按相关端口 (转换前的本地端口) 分组后判断 NAT 行为:
//! - 只有一个分组且只映射到一个外部端口 => 宽松型
//! - 只有一个分组但映射到多个外部端口 => 对称型
//!
//! 协商原语通过 [`NegotiatorFactory`] 注入，测试时可替换为脚本化实现。

use super::candidate::IceCandidateRecord;
use super::{NatClassification, NatConfig};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// 仅用于触发 ICE 收集的数据通道标签，不会发送任何数据
pub const PROBE_CHANNEL_LABEL: &str = "nat-probe";

/// NAT 分类错误
#[derive(Debug, Error)]
pub enum NatError {
    /// 协商原语创建或使用失败
    #[error("Negotiator error: {0}")]
    Negotiator(String),

    /// Offer/Answer 协商失败 (分类器内部忽略)
    #[error("Negotiation error: {0}")]
    Negotiation(String),
}

/// ICE 收集事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatheringEvent {
    /// 一条本地候选 (候选行文本)
    Candidate(String),
    /// 不会再有新的候选
    Complete,
}

/// 具备 STUN 能力的协商原语 (一个 PeerConnection)
#[async_trait]
pub trait StunNegotiator: Send {
    /// 创建数据通道
    async fn create_data_channel(&mut self, label: &str) -> Result<(), NatError>;

    /// 创建 Offer 并设置为本地描述，开始候选收集
    async fn start_negotiation(&mut self) -> Result<(), NatError>;

    /// 等待下一个收集事件，返回 None 表示事件源已关闭
    async fn next_event(&mut self) -> Option<GatheringEvent>;

    /// 释放底层连接
    async fn close(&mut self) -> Result<(), NatError>;
}

/// 协商原语工厂
#[async_trait]
pub trait NegotiatorFactory: Send + Sync {
    /// 使用给定的 STUN 服务器列表创建协商原语
    async fn open(&self, ice_servers: &[String]) -> Result<Box<dyn StunNegotiator>, NatError>;
}

/// 播放器选择所依赖的 NAT 探测能力
#[async_trait]
pub trait NatProbe: Send + Sync {
    /// 执行一次 NAT 分类，`timeout` 为 None 时不限时
    async fn probe(&self, timeout: Option<Duration>) -> NatClassification;
}

/// 服务器反射候选的分组统计
///
/// key 为相关端口，value 为观察到的外部端口集合
#[derive(Debug, Default, Clone)]
pub struct CandidateTally {
    groups: BTreeMap<Option<u16>, BTreeSet<u16>>,
}

impl CandidateTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个候选，只保留服务器反射候选
    pub fn record(&mut self, candidate: &IceCandidateRecord) -> bool {
        if !candidate.is_server_reflexive() {
            return false;
        }
        self.groups
            .entry(candidate.related_port)
            .or_default()
            .insert(candidate.port);
        true
    }

    /// 解析并记录一条候选行，解析失败的行被跳过
    pub fn record_line(&mut self, line: &str) -> bool {
        match IceCandidateRecord::parse(line) {
            Ok(candidate) => {
                let kept = self.record(&candidate);
                debug!("ICE 候选 ({}): {}", if kept { "保留" } else { "忽略" }, line);
                kept
            }
            Err(e) => {
                debug!("跳过无法解析的候选 {:?}: {}", line, e);
                false
            }
        }
    }

    /// 相关端口分组数量
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// 根据当前分组得出分类
    pub fn classify(&self) -> NatClassification {
        let mut groups = self.groups.values();
        match (groups.next(), groups.next()) {
            (Some(ports), None) if ports.len() == 1 => NatClassification::Permissive,
            (Some(_), None) => NatClassification::Symmetric,
            _ => NatClassification::Unknown,
        }
    }
}

/// NAT 分类器
pub struct NatClassifier<F> {
    factory: F,
    config: NatConfig,
}

impl<F: NegotiatorFactory> NatClassifier<F> {
    /// 创建新的分类器
    pub fn new(factory: F, config: NatConfig) -> Self {
        Self { factory, config }
    }

    pub fn config(&self) -> &NatConfig {
        &self.config
    }

    /// 使用配置中的超时执行分类
    pub async fn classify(&self) -> Result<NatClassification, NatError> {
        self.classify_with_timeout(self.config.timeout()).await
    }

    /// 执行分类
    ///
    /// 超时覆盖协商原语的创建和整个收集过程。
    /// 无论结果如何 (完成、超时、出错)，已创建的协商原语都会被关闭，
    /// 超时后收集过程被丢弃，之后到达的事件不会再被处理。
    pub async fn classify_with_timeout(
        &self,
        timeout: Option<Duration>,
    ) -> Result<NatClassification, NatError> {
        info!("开始 NAT 分类, STUN 服务器: {:?}", self.config.ice_servers);

        let mut opened = None;
        let run = open_and_gather(&self.factory, &self.config.ice_servers, &mut opened);

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    info!("NAT 分类超时 ({:?})", limit);
                    Ok(NatClassification::TimedOut)
                }
            },
            None => run.await,
        };

        if let Some(mut negotiator) = opened {
            if let Err(e) = negotiator.close().await {
                warn!("关闭协商连接失败: {}", e);
            }
        }

        if let Ok(classification) = &outcome {
            info!("NAT 分类完成: {}", classification);
        }
        outcome
    }
}

#[async_trait]
impl<F: NegotiatorFactory> NatProbe for NatClassifier<F> {
    async fn probe(&self, timeout: Option<Duration>) -> NatClassification {
        match self.classify_with_timeout(timeout).await {
            Ok(classification) => classification,
            Err(e) => {
                warn!("NAT 分类失败: {}", e);
                NatClassification::Unknown
            }
        }
    }
}

async fn open_and_gather<F: NegotiatorFactory>(
    factory: &F,
    ice_servers: &[String],
    opened: &mut Option<Box<dyn StunNegotiator>>,
) -> Result<NatClassification, NatError> {
    let negotiator = opened.insert(factory.open(ice_servers).await?);
    gather(negotiator.as_mut()).await
}

async fn gather(negotiator: &mut dyn StunNegotiator) -> Result<NatClassification, NatError> {
    negotiator.create_data_channel(PROBE_CHANNEL_LABEL).await?;

    // 协商失败不影响候选收集
    if let Err(e) = negotiator.start_negotiation().await {
        warn!("创建 Offer 失败，继续等待候选: {}", e);
    }

    let mut tally = CandidateTally::new();
    while let Some(event) = negotiator.next_event().await {
        match event {
            GatheringEvent::Candidate(line) => {
                tally.record_line(&line);
            }
            GatheringEvent::Complete => {
                debug!("候选收集完成, 相关端口分组: {}", tally.group_count());
                return Ok(tally.classify());
            }
        }
    }

    warn!("候选事件源已关闭，但未收到收集完成通知");
    Ok(NatClassification::Unknown)
}
