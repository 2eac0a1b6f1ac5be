//! # LBR Protocol
//!
//! FRI 会话的值类型定义（无线程、无 socket 依赖）
//!
//! ## 模块
//!
//! - `session`: 会话阶段及控制器状态枚举
//! - `message`: `LbrCommand` / `LbrState` 值对象
//! - `description`: 机器人描述（TOML）解析
//! - `guard`: 命令有效性守卫
//! - `codec`: 定长数据报编解码
//!
//! ## 字节序
//!
//! 数据报使用小端字节序（与控制器侧仿真器保持一致）。

pub mod codec;
pub mod description;
pub mod guard;
pub mod message;
pub mod session;

// 重新导出常用类型
pub use codec::{CommandMessage, MessageHeader, MessageType, MonitorMessage};
pub use description::{JointDescription, RobotDescription};
pub use guard::{CommandGuard, GuardError};
pub use message::{LbrCommand, LbrState};
pub use session::*;

/// LBR 关节数量
pub const N_JOINTS: usize = 7;

/// 笛卡尔力/力矩分量数量（Fx, Fy, Fz, Tx, Ty, Tz）
pub const N_WRENCH: usize = 6;

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Message too short: expected {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("Invalid message type: 0x{0:02X}")]
    InvalidMessageType(u8),

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: &'static str, value: u8 },

    #[error("Invalid robot description: {0}")]
    InvalidDescription(String),

    #[error("Failed to parse robot description: {0}")]
    Toml(#[from] toml::de::Error),
}
