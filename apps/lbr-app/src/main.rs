//! # LBR App
//!
//! 承载一个 `AppNode`：通过 UDP 连接控制器，直到 Ctrl+C。
//!
//! ```bash
//! # 使用配置文件
//! lbr-app --config config/node.toml
//!
//! # 命令行覆盖
//! lbr-app --description config/iiwa7.toml --port 30200 --remote-host 172.31.1.147
//! ```
//!
//! 日志级别由 `RUST_LOG` 控制（默认 `info`）。

mod publisher;

use anyhow::{Context, Result};
use clap::Parser;
use lbr_driver::{AppNode, AppNodeConfig};
use lbr_transport::{FriApplication, UdpConnection};
use publisher::LoggingPublisher;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::info;

/// 状态汇总日志间隔
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// LBR FRI 应用桥接
#[derive(Parser, Debug)]
#[command(name = "lbr-app")]
#[command(about = "Real-time bridge between a command source and a KUKA LBR over FRI")]
#[command(long_about = None)]
#[command(version)]
struct Args {
    /// 节点配置文件（TOML）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 本地端口 [30200, 30209]（覆盖配置文件）
    #[arg(long)]
    port: Option<i32>,

    /// 控制器地址（覆盖配置文件）
    #[arg(long)]
    remote_host: Option<String>,

    /// 机器人描述文件（覆盖配置文件）
    #[arg(long)]
    description: Option<PathBuf>,

    /// 断开时限（毫秒）
    #[arg(long)]
    join_timeout_ms: Option<u64>,

    /// 每 N 个状态样本打印一次（0 = 只打印阶段变化）
    #[arg(long, default_value_t = 1000)]
    log_every: u64,
}

impl Args {
    /// 合并配置文件与命令行参数
    fn node_config(&self) -> Result<AppNodeConfig> {
        let mut config = match &self.config {
            Some(path) => AppNodeConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => AppNodeConfig::default(),
        };

        if let Some(port) = self.port {
            config.port_id = port;
        }
        if let Some(host) = &self.remote_host {
            config.remote_host = Some(host.clone());
        }
        if let Some(path) = &self.description {
            config.robot_description = None;
            config.robot_description_path = Some(path.clone());
        }
        if let Some(ms) = self.join_timeout_ms {
            config.join_timeout_ms = ms;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .init();

    let args = Args::parse();
    let config = args.node_config()?;

    info!(
        "Starting LBR app (port: {}, remote host: {})",
        config.port_id,
        config.remote_host().unwrap_or("any")
    );

    let app = FriApplication::new(UdpConnection::new());
    let node = AppNode::new(app, &config, LoggingPublisher::new(args.log_every))
        .context("failed to start app node")?;

    // Ctrl+C：置位停止标志，步进线程和主循环随之退出
    let shutdown = node.shutdown_handle();
    let shutdown_for_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_for_signal.store(true, Ordering::SeqCst);
    })
    .context("failed to set signal handler")?;

    info!("LBR app running. Press Ctrl+C to stop.");
    let mut last_status = Instant::now();
    while !shutdown.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));

        if last_status.elapsed() >= STATUS_INTERVAL {
            last_status = Instant::now();
            let metrics = node.metrics();
            info!(
                "Status: {:?}, cycles={}, idle={}, failures={}, publish_skips={}, stale_resets={}",
                node.phase(),
                metrics.cycles,
                metrics.idle_cycles,
                metrics.failures(),
                metrics.publish_skips,
                metrics.stale_command_resets
            );
        }
    }

    info!("Received interrupt signal. Shutting down...");
    drop(node);
    Ok(())
}
