//! WebRTC 模块
//!
//! 使用 webrtc-rs 提供 NAT 分类所需的真实协商原语

pub mod peer_connection;

pub use peer_connection::{WebRtcNegotiator, WebRtcNegotiatorFactory};
