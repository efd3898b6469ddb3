//! Web seed 回退调度
//!
//! WebTorrent 播放器优先从对等端下载，在以下情况下添加 HTTP web seed (只添加一次):
//! - 描述文件要求立即添加 (eager)
//! - 种子就绪时 tracker 报告的对等端数量过少
//! - 就绪后一段时间内没有下载到任何数据，或下载量过低
//! - 延迟计时器到期 (初始 10 秒，每次收到数据后重置为 5 秒)
//!
//! 调度器本身不持有计时器，时间由调用方传入。

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Web seed 回退配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebseedConfig {
    /// 初始延迟 (毫秒)
    #[serde(default = "default_initial_defer_ms")]
    pub initial_defer_ms: u64,
    /// 收到数据后重新计时的延迟 (毫秒)
    #[serde(default = "default_progress_defer_ms")]
    pub progress_defer_ms: u64,
    /// 对等端少于该数量时立即添加
    #[serde(default = "default_min_swarm_peers")]
    pub min_swarm_peers: u32,
    /// 就绪后多久仍无数据视为卡住 (毫秒)
    #[serde(default = "default_stall_check_ms")]
    pub stall_check_ms: u64,
    /// 就绪后多久检查下载量 (毫秒)
    #[serde(default = "default_slow_check_ms")]
    pub slow_check_ms: u64,
    /// 下载量低于该值视为过慢 (字节)
    #[serde(default = "default_slow_threshold_bytes")]
    pub slow_threshold_bytes: u64,
}

impl Default for WebseedConfig {
    fn default() -> Self {
        Self {
            initial_defer_ms: default_initial_defer_ms(),
            progress_defer_ms: default_progress_defer_ms(),
            min_swarm_peers: default_min_swarm_peers(),
            stall_check_ms: default_stall_check_ms(),
            slow_check_ms: default_slow_check_ms(),
            slow_threshold_bytes: default_slow_threshold_bytes(),
        }
    }
}

fn default_initial_defer_ms() -> u64 {
    10_000
}

fn default_progress_defer_ms() -> u64 {
    5_000
}

fn default_min_swarm_peers() -> u32 {
    5
}

fn default_stall_check_ms() -> u64 {
    7_000
}

fn default_slow_check_ms() -> u64 {
    12_000
}

fn default_slow_threshold_bytes() -> u64 {
    512 * 1024
}

/// 添加 web seed 的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebseedReason {
    Eager,
    FewPeers,
    Stalled,
    Slow,
    Deferred,
}

/// 会话级调度状态
#[derive(Debug, Clone)]
pub struct WebseedScheduler {
    config: WebseedConfig,
    eager: bool,
    added: Option<WebseedReason>,
    downloaded: u64,
    defer_deadline: Instant,
    ready_at: Option<Instant>,
}

impl WebseedScheduler {
    /// 种子添加时创建，同时启动初始延迟计时
    pub fn new(config: WebseedConfig, eager: bool, now: Instant) -> Self {
        let defer_deadline = now + Duration::from_millis(config.initial_defer_ms);
        Self {
            config,
            eager,
            added: None,
            downloaded: 0,
            defer_deadline,
            ready_at: None,
        }
    }

    /// 收到对等端数据
    pub fn on_download(&mut self, now: Instant, bytes: u64) {
        if self.downloaded == 0 && bytes > 0 {
            tracing::debug!("收到第一个数据块");
        }
        self.downloaded = self.downloaded.saturating_add(bytes);
        if self.added.is_none() {
            self.defer_deadline = now + Duration::from_millis(self.config.progress_defer_ms);
        }
    }

    /// 种子就绪
    ///
    /// `swarm_peers` 为 tracker scrape 得到的对等端总数，scrape 失败时为 None
    pub fn on_ready(&mut self, now: Instant, swarm_peers: Option<u32>) -> Option<WebseedReason> {
        if self.ready_at.is_none() {
            self.ready_at = Some(now);
        }

        if self.eager {
            return self.add(WebseedReason::Eager);
        }
        match swarm_peers {
            Some(peers) if peers < self.config.min_swarm_peers => {
                tracing::info!(
                    "对等端数量 {} 少于 {}，添加 web seed",
                    peers,
                    self.config.min_swarm_peers
                );
                self.add(WebseedReason::FewPeers)
            }
            _ => None,
        }
    }

    /// 检查计时条件
    pub fn poll(&mut self, now: Instant) -> Option<WebseedReason> {
        if self.added.is_some() {
            return None;
        }

        if now >= self.defer_deadline {
            return self.add(WebseedReason::Deferred);
        }

        let ready_at = self.ready_at?;
        if self.eager {
            return None;
        }
        let elapsed = now.saturating_duration_since(ready_at);

        if self.downloaded == 0 && elapsed >= Duration::from_millis(self.config.stall_check_ms) {
            return self.add(WebseedReason::Stalled);
        }
        if self.downloaded < self.config.slow_threshold_bytes
            && elapsed >= Duration::from_millis(self.config.slow_check_ms)
        {
            return self.add(WebseedReason::Slow);
        }
        None
    }

    /// 下一次需要调用 [`poll`](Self::poll) 的时间
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.added.is_some() {
            return None;
        }
        let mut deadline = self.defer_deadline;
        if let (Some(ready_at), false) = (self.ready_at, self.eager) {
            // 只考虑仍可能触发的检查，避免返回已失效的时间点
            if self.downloaded == 0 {
                deadline = deadline.min(ready_at + Duration::from_millis(self.config.stall_check_ms));
            }
            if self.downloaded < self.config.slow_threshold_bytes {
                deadline = deadline.min(ready_at + Duration::from_millis(self.config.slow_check_ms));
            }
        }
        Some(deadline)
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded
    }

    /// 已添加时返回原因
    pub fn added(&self) -> Option<WebseedReason> {
        self.added
    }

    fn add(&mut self, reason: WebseedReason) -> Option<WebseedReason> {
        if self.added.is_some() {
            return None;
        }
        tracing::info!("添加 web seed: {:?}", reason);
        self.added = Some(reason);
        Some(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_eager_adds_on_ready() {
        let t0 = Instant::now();
        let mut s = WebseedScheduler::new(WebseedConfig::default(), true, t0);
        assert_eq!(s.on_ready(t0 + secs(1), Some(100)), Some(WebseedReason::Eager));
        assert_eq!(s.poll(t0 + secs(30)), None);
        assert_eq!(s.next_deadline(), None);
    }

    #[test]
    fn test_few_peers() {
        let t0 = Instant::now();
        let mut s = WebseedScheduler::new(WebseedConfig::default(), false, t0);
        assert_eq!(s.on_ready(t0, Some(4)), Some(WebseedReason::FewPeers));
        assert_eq!(s.added(), Some(WebseedReason::FewPeers));
    }

    #[test]
    fn test_failed_scrape_does_not_add() {
        let t0 = Instant::now();
        let mut s = WebseedScheduler::new(WebseedConfig::default(), false, t0);
        assert_eq!(s.on_ready(t0, None), None);
        assert_eq!(s.on_ready(t0, Some(5)), None);
    }

    #[test]
    fn test_initial_deferral() {
        let t0 = Instant::now();
        let mut s = WebseedScheduler::new(WebseedConfig::default(), false, t0);
        assert_eq!(s.next_deadline(), Some(t0 + secs(10)));
        assert_eq!(s.poll(t0 + secs(9)), None);
        assert_eq!(s.poll(t0 + secs(10)), Some(WebseedReason::Deferred));
        assert_eq!(s.poll(t0 + secs(11)), None);
    }

    #[test]
    fn test_download_rearms_deferral() {
        let t0 = Instant::now();
        let mut s = WebseedScheduler::new(WebseedConfig::default(), false, t0);
        s.on_download(t0 + secs(8), 16 * 1024);
        assert_eq!(s.poll(t0 + secs(12)), None);
        assert_eq!(s.next_deadline(), Some(t0 + secs(13)));
        assert_eq!(s.poll(t0 + secs(13)), Some(WebseedReason::Deferred));
    }

    #[test]
    fn test_stalled_after_ready() {
        let mut config = WebseedConfig::default();
        config.initial_defer_ms = 60_000;
        let t0 = Instant::now();
        let mut s = WebseedScheduler::new(config, false, t0);
        assert_eq!(s.on_ready(t0 + secs(1), Some(20)), None);
        assert_eq!(s.next_deadline(), Some(t0 + secs(8)));
        assert_eq!(s.poll(t0 + secs(7)), None);
        assert_eq!(s.poll(t0 + secs(8)), Some(WebseedReason::Stalled));
    }

    #[test]
    fn test_slow_after_ready() {
        let mut config = WebseedConfig::default();
        config.initial_defer_ms = 60_000;
        config.progress_defer_ms = 60_000;
        let t0 = Instant::now();
        let mut s = WebseedScheduler::new(config, false, t0);
        s.on_ready(t0, Some(20));
        s.on_download(t0 + secs(2), 100 * 1024);
        assert_eq!(s.poll(t0 + secs(8)), None);
        assert_eq!(s.poll(t0 + secs(12)), Some(WebseedReason::Slow));
        assert_eq!(s.downloaded(), 100 * 1024);
    }

    #[test]
    fn test_fast_download_never_falls_back_early() {
        let mut config = WebseedConfig::default();
        config.progress_defer_ms = 60_000;
        let t0 = Instant::now();
        let mut s = WebseedScheduler::new(config, false, t0);
        s.on_ready(t0, Some(20));
        s.on_download(t0 + secs(1), 4 * 1024 * 1024);
        assert_eq!(s.poll(t0 + secs(20)), None);
        assert_eq!(s.added(), None);
    }
}
