//! # LBR Driver
//!
//! 非实时命令源与周期性 FRI 会话之间的实时桥接。
//!
//! ## 组件
//!
//! - `inbox`: 命令收件箱（无锁单槽，后写覆盖）
//! - `outbox`: 状态发件箱（`try_lock` 单槽 + 发布线程）
//! - `intermediary`: 会话中间层（引擎回调 ↔ 命令/状态，命令守卫）
//! - `connection`: 连接管理器（端口校验、connect/disconnect、步进线程生命周期）
//! - `pipeline`: 实时步进循环
//! - `node`: 应用节点（构造顺序、服务处理、析构）
//!
//! ## 线程模型
//!
//! - 步进线程：每个活动连接一个，稳态周期内不阻塞、不分配
//! - 发布线程：每个发件箱一个，在锁外调用 `StatePublisher`
//! - 调用方线程：服务请求、命令回调，只通过收件箱/发件箱与步进线程交互
//!
//! ## 示例
//!
//! ```no_run
//! use lbr_driver::{AppNode, AppNodeConfig, AppConnectRequest};
//! use lbr_protocol::LbrState;
//! use lbr_transport::{FriApplication, UdpConnection};
//!
//! let config = AppNodeConfig::load("config/node.toml")?;
//! let app = FriApplication::new(UdpConnection::new());
//! let node = AppNode::new(app, &config, |state: &LbrState| {
//!     println!("{:?}", state.session_state);
//! })?;
//!
//! let response = node.app_connect(AppConnectRequest::new(30200, ""));
//! println!("connected: {}", response.connected);
//! # Ok::<(), lbr_driver::DriverError>(())
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod inbox;
pub mod intermediary;
mod join;
pub mod metrics;
pub mod node;
pub mod outbox;
pub mod pipeline;
pub mod service;

pub use config::AppNodeConfig;
pub use connection::{
    ConnectionDescriptor, ConnectionManager, ConnectionPhase, DEFAULT_JOIN_TIMEOUT, PORT_ID_MAX,
    PORT_ID_MIN, valid_port,
};
pub use error::DriverError;
pub use inbox::{CommandInbox, CommandWriter};
pub use intermediary::SessionIntermediary;
pub use metrics::{MetricsSnapshot, StepMetrics};
pub use node::AppNode;
pub use outbox::{ChannelPublisher, PublishGuard, StateOutbox, StatePublisher};
pub use pipeline::{STEP_THREAD_NAME, StepEndpoints};
pub use service::{
    AppConnectRequest, AppConnectResponse, AppDisconnectRequest, AppDisconnectResponse,
};
