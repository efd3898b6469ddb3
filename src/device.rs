//! 设备类型检测
//!
//! 根据宿主环境提供的 user agent、platform 和触摸支持判断是否为移动设备

use serde::{Deserialize, Serialize};

/// user agent 中的移动平台标识 (忽略大小写)
const MOBILE_UA_TOKENS: &[&str] = &["iphone", "ipad", "ipod", "android"];

/// 旧版设备和模拟器的 platform 字符串 (精确匹配)
const MOBILE_PLATFORMS: &[&str] = &[
    "iPad Simulator",
    "iPhone Simulator",
    "iPod Simulator",
    "iPad",
    "iPhone",
    "iPod",
];

/// 宿主环境提供的设备信号
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSignals {
    pub user_agent: String,
    #[serde(default)]
    pub platform: String,
    /// 是否支持触摸事件
    #[serde(default)]
    pub touch_support: bool,
}

impl DeviceSignals {
    pub fn new(user_agent: impl Into<String>, platform: impl Into<String>, touch_support: bool) -> Self {
        Self {
            user_agent: user_agent.into(),
            platform: platform.into(),
            touch_support,
        }
    }

    /// 任一信号成立即视为移动设备
    pub fn is_mobile(&self) -> bool {
        self.has_mobile_user_agent() || self.has_mobile_platform() || self.is_desktop_class_ipad()
    }

    fn has_mobile_user_agent(&self) -> bool {
        let ua = self.user_agent.to_lowercase();
        MOBILE_UA_TOKENS.iter().any(|token| ua.contains(token))
    }

    fn has_mobile_platform(&self) -> bool {
        MOBILE_PLATFORMS.contains(&self.platform.as_str())
    }

    /// iPadOS 13+ 默认伪装成桌面 Safari，只能通过触摸支持区分
    fn is_desktop_class_ipad(&self) -> bool {
        self.user_agent.contains("Mac") && self.touch_support
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESKTOP_CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
    const MAC_SAFARI: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15";

    #[test]
    fn test_android_is_mobile_regardless_of_other_signals() {
        let ua = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 Chrome/120.0 Mobile Safari/537.36";
        assert!(DeviceSignals::new(ua, "Linux armv8l", false).is_mobile());
        assert!(DeviceSignals::new(ua, "Win32", true).is_mobile());
    }

    #[test]
    fn test_user_agent_match_is_case_insensitive() {
        assert!(DeviceSignals::new("something IPHONE something", "", false).is_mobile());
    }

    #[test]
    fn test_platform_match_is_exact() {
        assert!(DeviceSignals::new(DESKTOP_CHROME, "iPhone Simulator", false).is_mobile());
        assert!(!DeviceSignals::new(DESKTOP_CHROME, "iphone", false).is_mobile());
    }

    #[test]
    fn test_desktop_class_ipad() {
        assert!(!DeviceSignals::new(MAC_SAFARI, "MacIntel", false).is_mobile());
        assert!(DeviceSignals::new(MAC_SAFARI, "MacIntel", true).is_mobile());
    }

    #[test]
    fn test_desktop() {
        assert!(!DeviceSignals::new(DESKTOP_CHROME, "Win32", false).is_mobile());
        // 触摸屏 Windows 笔记本不算移动设备
        assert!(!DeviceSignals::new(DESKTOP_CHROME, "Win32", true).is_mobile());
        assert!(!DeviceSignals::default().is_mobile());
    }
}
