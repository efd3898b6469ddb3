//! player-select - 视频播放器策略选择
//!
//! 主入口程序

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use cli::{Args, Commands};
use player_select::descriptor::DescriptorLoader;
use player_select::{
    Config, DefaultDescriptorLoader, DeviceSignals, NatConfig, NatProbe, PlaybackPlan,
    PlayerSelection, PlayerSelector, PlayerStrategy, SelectRequest,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = Config::get_config_path(args.config.as_deref());
    let loaded = Config::read(&config_path)?;
    let found = loaded.is_some();
    let config = loaded.unwrap_or_default();

    init_logging(args.verbose, &config.logging.level);
    Config::log_source(Path::new(&config_path), found);

    match args.command {
        Commands::Select {
            query,
            user_agent,
            platform,
            touch,
            plan,
        } => {
            let device = DeviceSignals::new(user_agent, platform, touch);
            run_select(&config, &query, device, plan).await
        }
        Commands::Nat { timeout_ms, stun } => {
            let mut nat = config.nat.clone();
            if let Some(timeout_ms) = timeout_ms {
                nat.timeout_ms = timeout_ms;
            }
            if !stun.is_empty() {
                nat.ice_servers = stun;
            }
            run_nat(nat).await
        }
        Commands::Plan {
            descriptor,
            strategy,
        } => run_plan(&config, &descriptor, strategy).await,
        Commands::Config { path } => {
            let path = path.unwrap_or_else(|| "config.toml".to_string());
            Config::default().save(&path)?;
            println!("配置文件已生成: {}", path);
            Ok(())
        }
    }
}

/// 初始化日志
///
/// RUST_LOG 优先，其次是 -v 参数，最后是配置文件
fn init_logging(verbose: u8, config_level: &str) {
    let level = match verbose {
        0 => config_level,
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter)
        .init();
}

async fn run_select(config: &Config, query: &str, device: DeviceSignals, plan: bool) -> Result<()> {
    // 完整的页面 URL 同时作为描述文件相对路径的基础
    let (request, loader) = match Url::parse(query) {
        Ok(url) if matches!(url.scheme(), "http" | "https" | "file") => (
            SelectRequest::from_url(&url),
            DefaultDescriptorLoader::new().with_base(url),
        ),
        _ => (SelectRequest::from_query(query), DefaultDescriptorLoader::new()),
    };

    let selector = PlayerSelector::new(
        loader,
        nat_probe(&config.nat),
        device,
        config.selector.clone(),
    );

    let (selection, descriptor) = selector
        .select_with_descriptor(&request)
        .await
        .context("未选择播放器")?;

    println!("播放器: {}", selection.strategy);
    println!("入口: {}", selection.entry);

    if plan {
        let location = request
            .descriptor
            .as_deref()
            .context("生成播放计划需要描述文件 (d 参数)")?;
        let descriptor = match descriptor {
            Some(descriptor) => descriptor,
            None => selector.loader().load(location).await?,
        };
        print_plan(config, &selection, &descriptor)?;
    }
    Ok(())
}

async fn run_plan(config: &Config, location: &str, strategy: PlayerStrategy) -> Result<()> {
    let descriptor = DefaultDescriptorLoader::new()
        .load(location)
        .await
        .with_context(|| format!("加载描述文件失败: {}", location))?;

    let selection = PlayerSelection {
        strategy,
        entry: config.selector.entries.entry_for(strategy).to_string(),
    };
    print_plan(config, &selection, &descriptor)
}

fn print_plan(
    config: &Config,
    selection: &PlayerSelection,
    descriptor: &player_select::VideoDescriptor,
) -> Result<()> {
    let plan = PlaybackPlan::build(selection, descriptor)?.with_webseed(config.webseed.clone());
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

#[cfg(feature = "webrtc")]
fn nat_probe(config: &NatConfig) -> impl NatProbe + 'static {
    use player_select::nat::NatClassifier;
    use player_select::webrtc::WebRtcNegotiatorFactory;

    NatClassifier::new(WebRtcNegotiatorFactory, config.clone())
}

#[cfg(not(feature = "webrtc"))]
fn nat_probe(_config: &NatConfig) -> impl NatProbe + 'static {
    DisabledNatProbe
}

/// 未启用 webrtc feature 时的 NAT 探测，总是返回 Unknown
#[cfg(not(feature = "webrtc"))]
struct DisabledNatProbe;

#[cfg(not(feature = "webrtc"))]
#[async_trait::async_trait]
impl NatProbe for DisabledNatProbe {
    async fn probe(&self, _timeout: Option<std::time::Duration>) -> player_select::NatClassification {
        tracing::warn!("WebRTC feature 未启用，跳过 NAT 分类");
        player_select::NatClassification::Unknown
    }
}

#[cfg(feature = "webrtc")]
async fn run_nat(config: NatConfig) -> Result<()> {
    use player_select::nat::NatClassifier;
    use player_select::webrtc::WebRtcNegotiatorFactory;

    let classifier = NatClassifier::new(WebRtcNegotiatorFactory, config);
    let classification = classifier.classify().await?;
    info!("NAT 检测完成");
    println!("NAT 类型: {}", classification);
    Ok(())
}

#[cfg(not(feature = "webrtc"))]
async fn run_nat(_config: NatConfig) -> Result<()> {
    info!("NAT 检测需要 WebRTC 支持");
    anyhow::bail!("WebRTC feature 未启用，请使用 --features webrtc 编译")
}
