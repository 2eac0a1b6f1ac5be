//! 应用节点（生命周期控制）
//!
//! 构造顺序：
//! 1. 校验初始端口
//! 2. 创建命令收件箱、状态发件箱（绑定发布者）
//! 3. 读取机器人描述并构造命令守卫
//! 4. 创建会话中间层、连接管理器
//! 5. 尝试初始连接（失败只记录日志，节点照常构造）
//!
//! 析构时断开连接。

use crate::config::AppNodeConfig;
use crate::connection::{ConnectionDescriptor, ConnectionManager, ConnectionPhase, valid_port};
use crate::error::DriverError;
use crate::inbox::{CommandInbox, CommandWriter};
use crate::intermediary::SessionIntermediary;
use crate::metrics::{MetricsSnapshot, StepMetrics};
use crate::outbox::{StatePublisher, StateOutbox};
use crate::pipeline::StepEndpoints;
use crate::service::{
    AppConnectRequest, AppConnectResponse, AppDisconnectRequest, AppDisconnectResponse,
};
use lbr_protocol::{CommandGuard, LbrCommand, LbrState};
use lbr_transport::ClientApplication;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::{error, info};

/// 应用节点
pub struct AppNode<A: ClientApplication> {
    manager: ConnectionManager<A>,
    inbox: Arc<CommandInbox>,
    outbox: Arc<StateOutbox>,
    metrics: Arc<StepMetrics>,
    shutdown: Arc<AtomicBool>,
}

impl<A: ClientApplication> AppNode<A> {
    /// 构造节点并尝试初始连接
    ///
    /// # 参数
    /// - `app`: 协议引擎
    /// - `config`: 节点配置
    /// - `publisher`: 状态发布者（在发布线程中调用）
    ///
    /// # 错误
    /// - `DriverError::InvalidPort`: 初始端口越界
    /// - `DriverError::Configuration`: 机器人描述缺失或无效
    /// - `DriverError::Io`: 发布线程创建失败
    pub fn new(
        app: A,
        config: &AppNodeConfig,
        publisher: impl StatePublisher,
    ) -> Result<Self, DriverError> {
        if !valid_port(config.port_id) {
            return Err(DriverError::InvalidPort(config.port_id));
        }

        let metrics = Arc::new(StepMetrics::new());
        let inbox = Arc::new(CommandInbox::with_metrics(metrics.clone()));
        let outbox = Arc::new(StateOutbox::new(publisher)?);

        let description = config.robot_description()?;
        let guard = CommandGuard::from_description(&description).map_err(|e| {
            DriverError::Configuration(format!("invalid robot description: {}", e))
        })?;
        let intermediary = SessionIntermediary::new(guard);

        let shutdown = Arc::new(AtomicBool::new(false));
        let endpoints = StepEndpoints {
            inbox: inbox.clone(),
            outbox: outbox.clone(),
            metrics: metrics.clone(),
            shutdown: shutdown.clone(),
        };
        let manager = ConnectionManager::new(app, intermediary, endpoints)
            .with_join_timeout(config.join_timeout());

        let node = Self {
            manager,
            inbox,
            outbox,
            metrics,
            shutdown,
        };

        match node.manager.connect(config.port_id, config.remote_host()) {
            Ok(true) => {},
            Ok(false) => error!("Initial connection on port {} failed", config.port_id),
            Err(e) => error!("Initial connection on port {} failed: {}", config.port_id, e),
        }

        info!("LBR app node started");
        Ok(node)
    }

    /// 连接服务
    ///
    /// 错误不会向外传播，而是转换为 `connected = false` 和错误描述。
    pub fn app_connect(&self, request: AppConnectRequest) -> AppConnectResponse {
        match self.manager.connect(request.port_id, request.remote_host()) {
            Ok(true) => AppConnectResponse {
                connected: true,
                message: String::new(),
            },
            Ok(false) => {
                let message = format!("Failed to open connection on port {}", request.port_id);
                error!("{}", message);
                AppConnectResponse {
                    connected: false,
                    message,
                }
            },
            Err(e) => {
                error!("Connect request failed: {}", e);
                AppConnectResponse {
                    connected: self.manager.is_connected(),
                    message: e.to_string(),
                }
            },
        }
    }

    /// 断开服务
    pub fn app_disconnect(&self, _request: AppDisconnectRequest) -> AppDisconnectResponse {
        match self.manager.disconnect() {
            Ok(disconnected) => AppDisconnectResponse {
                disconnected,
                message: String::new(),
            },
            Err(e) => {
                error!("Disconnect request failed: {}", e);
                AppDisconnectResponse {
                    disconnected: false,
                    message: e.to_string(),
                }
            },
        }
    }

    /// 命令订阅回调（非阻塞，后写覆盖）
    pub fn on_command(&self, command: Arc<LbrCommand>) {
        self.inbox.write(command);
    }

    /// 交给订阅方的命令写入句柄
    pub fn command_writer(&self) -> CommandWriter {
        CommandWriter::new(self.inbox.clone())
    }

    /// 最近一次发布的状态
    pub fn latest_state(&self) -> Option<LbrState> {
        self.outbox.latest()
    }

    /// 已发布的状态数量
    pub fn state_sequence(&self) -> u64 {
        self.outbox.sequence()
    }

    /// 进程级停止标志（置位后步进线程退出）
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.manager.phase()
    }

    pub fn descriptor(&self) -> Option<ConnectionDescriptor> {
        self.manager.descriptor()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl<A: ClientApplication> Drop for AppNode<A> {
    fn drop(&mut self) {
        info!("Shutting down LBR app node");
        if let Err(e) = self.manager.disconnect() {
            error!("Failed to disconnect on shutdown: {}", e);
        }
    }
}
