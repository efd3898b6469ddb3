//! WebRTC PeerConnection 实现
//!
//! 使用 webrtc-rs 库实现 NAT 分类所需的协商原语:
//! 只创建数据通道和本地 Offer，收集到的候选通过通道转交给分类器。

use crate::nat::{GatheringEvent, NatError, NegotiatorFactory, StunNegotiator};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use ::webrtc::{
    api::APIBuilder,
    data_channel::RTCDataChannel,
    ice_transport::{ice_candidate::RTCIceCandidate, ice_server::RTCIceServer},
    peer_connection::{configuration::RTCConfiguration, RTCPeerConnection},
};

/// 基于 webrtc-rs 的协商原语
pub struct WebRtcNegotiator {
    pc: Arc<RTCPeerConnection>,
    events: mpsc::UnboundedReceiver<GatheringEvent>,
    data_channel: Option<Arc<RTCDataChannel>>,
    closed: bool,
}

impl WebRtcNegotiator {
    /// 创建新的 PeerConnection
    pub async fn new(ice_servers: &[String]) -> Result<Self, NatError> {
        // 构建 ICE 服务器配置
        let ice_servers = ice_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let api = APIBuilder::new().build();

        let pc = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(|e| NatError::Negotiator(format!("创建 PeerConnection 失败: {:?}", e)))?,
        );

        // 候选回调: Some => 候选行, None => 收集结束
        let (tx, events) = mpsc::unbounded_channel();
        pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let event = match c {
                Some(cand) => match cand.to_json() {
                    Ok(init) => Some(GatheringEvent::Candidate(init.candidate)),
                    Err(e) => {
                        tracing::debug!("候选序列化失败: {:?}", e);
                        None
                    }
                },
                None => Some(GatheringEvent::Complete),
            };
            if let Some(event) = event {
                let _ = tx.send(event);
            }
            Box::pin(async {})
        }));

        tracing::debug!("创建 WebRtcNegotiator");

        Ok(Self {
            pc,
            events,
            data_channel: None,
            closed: false,
        })
    }
}

#[async_trait]
impl StunNegotiator for WebRtcNegotiator {
    async fn create_data_channel(&mut self, label: &str) -> Result<(), NatError> {
        let dc = self
            .pc
            .create_data_channel(label, None)
            .await
            .map_err(|e| NatError::Negotiator(format!("创建数据通道失败: {:?}", e)))?;

        self.data_channel = Some(dc);
        Ok(())
    }

    async fn start_negotiation(&mut self) -> Result<(), NatError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| NatError::Negotiation(format!("创建 Offer 失败: {:?}", e)))?;

        self.pc
            .set_local_description(offer)
            .await
            .map_err(|e| NatError::Negotiation(format!("设置本地描述失败: {:?}", e)))?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<GatheringEvent> {
        self.events.recv().await
    }

    async fn close(&mut self) -> Result<(), NatError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.data_channel = None;
        self.pc
            .close()
            .await
            .map_err(|e| NatError::Negotiator(format!("关闭 PeerConnection 失败: {:?}", e)))
    }
}

/// 创建 [`WebRtcNegotiator`] 的工厂
#[derive(Debug, Clone, Copy, Default)]
pub struct WebRtcNegotiatorFactory;

#[async_trait]
impl NegotiatorFactory for WebRtcNegotiatorFactory {
    async fn open(&self, ice_servers: &[String]) -> Result<Box<dyn StunNegotiator>, NatError> {
        let negotiator = WebRtcNegotiator::new(ice_servers).await?;
        Ok(Box::new(negotiator))
    }
}
