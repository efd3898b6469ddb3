//! player-select - 视频播放器策略选择库
//!
//! 根据视频描述文件、设备类型和 NAT 类型，在 WebTorrent、桌面和移动
//! 三种播放器之间做出选择，并整理出渲染端需要的播放计划。

pub mod config;
pub mod descriptor;
pub mod device;
pub mod plan;
pub mod resolution;
pub mod selector;
pub mod webseed;

// NAT 分类模块
pub mod nat;

// WebRTC 协商原语 (使用 webrtc-rs)
#[cfg(feature = "webrtc")]
pub mod webrtc;

pub use config::Config;
pub use descriptor::{DefaultDescriptorLoader, DescriptorLoader, VideoDescriptor};
pub use device::DeviceSignals;
pub use nat::{NatClassification, NatClassifier, NatConfig, NatProbe};
pub use plan::PlaybackPlan;
pub use resolution::{Resolution, ResolutionState};
pub use selector::{PlayerSelection, PlayerSelector, PlayerStrategy, SelectError, SelectRequest};
