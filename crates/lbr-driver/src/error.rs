//! 驱动层错误类型定义

use lbr_protocol::GuardError;
use std::time::Duration;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 配置缺失或无效（构造期致命错误）
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 端口不在 [30200, 30209] 范围内
    #[error("Invalid port_id {0}, must be in range [30200, 30209]")]
    InvalidPort(i32),

    /// 命令被守卫拒绝（结束步进循环）
    #[error("Command rejected: {0}")]
    Validation(#[from] GuardError),

    /// 协议引擎单步失败（结束步进循环）
    #[error("Protocol step failed")]
    StepFailed,

    /// 步进线程未能在时限内退出
    #[error("Step thread did not terminate within {0:?}")]
    JoinTimeout(Duration),

    /// 线程创建、配置文件读取等 IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
