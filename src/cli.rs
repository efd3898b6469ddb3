//! CLI argument definitions for player-select
//!
//! This module contains all command-line argument parsing logic.

use clap::{ArgAction, Parser, Subcommand};
use player_select::PlayerStrategy;

/// player-select - 命令行参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// 日志详细程度 (-v=debug, -vv=trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// 子命令
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 选择播放器
    Select {
        /// 播放页面 URL 或查询字符串 (例如 "p=1&d=video.json")
        query: String,

        /// 浏览器 user agent
        #[arg(long, env = "PLAYER_SELECT_USER_AGENT", default_value = "")]
        user_agent: String,

        /// 浏览器 platform 字符串
        #[arg(long, default_value = "")]
        platform: String,

        /// 设备支持触摸事件
        #[arg(long)]
        touch: bool,

        /// 同时输出播放计划 (JSON)
        #[arg(long)]
        plan: bool,
    },

    /// NAT 类型检测
    Nat {
        /// 超时时间 (毫秒)，默认使用配置文件
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// STUN 服务器 (可重复)，默认使用配置文件
        #[arg(long = "stun")]
        stun: Vec<String>,
    },

    /// 为指定播放策略生成播放计划
    Plan {
        /// 描述文件位置 (URL 或路径)
        #[arg(short, long)]
        descriptor: String,

        /// 播放策略: webtorrent, desktop, mobile
        #[arg(short, long)]
        strategy: PlayerStrategy,
    },

    /// 生成配置文件
    Config {
        /// 配置文件路径
        #[arg(short, long)]
        path: Option<String>,
    },
}
