//! 会话阶段与控制器状态枚举
//!
//! 所有枚举都是 `#[repr(u8)]`，通过 `num_enum` 与线上字节互相转换。

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// FRI 会话阶段
///
/// 控制器报告的会话状态。步进线程根据此值决定是否丢弃缓存的命令：
/// 处于 `CommandingWait` 时，任何旧命令都必须被清除。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SessionState {
    /// 无会话
    Idle = 0,
    /// 监控中，等待连接质量达标
    MonitoringWait = 1,
    /// 监控中，可以切换到命令模式
    MonitoringReady = 2,
    /// 命令模式过渡阶段（控制器等待第一条有效命令）
    CommandingWait = 3,
    /// 命令模式，控制器执行客户端命令
    CommandingActive = 4,
    /// 会话出错
    Error = 5,
}

impl SessionState {
    /// 是否处于命令模式（等待或激活）
    pub fn is_commanding(self) -> bool {
        matches!(self, Self::CommandingWait | Self::CommandingActive)
    }

    /// 是否处于监控模式
    pub fn is_monitoring(self) -> bool {
        matches!(self, Self::MonitoringWait | Self::MonitoringReady)
    }
}

/// 连接质量
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ConnectionQuality {
    Poor = 0,
    Fair = 1,
    Good = 2,
    Excellent = 3,
}

/// 安全状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SafetyState {
    Normal = 0,
    SafetyStopLevel0 = 1,
    SafetyStopLevel1 = 2,
    SafetyStopLevel2 = 3,
}

/// 操作模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OperationMode {
    Test1 = 0,
    Test2 = 1,
    Automatic = 2,
}

/// 驱动器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum DriveState {
    Off = 0,
    Transitioning = 1,
    Active = 2,
}

/// 客户端命令模式
///
/// 决定守卫需要检查 `LbrCommand` 的哪些字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ClientCommandMode {
    NoCommandMode = 0,
    Position = 1,
    Wrench = 2,
    Torque = 3,
}

macro_rules! impl_default {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl Default for $ty {
                fn default() -> Self {
                    Self::$variant
                }
            }
        )*
    };
}

// 不使用 `#[default]`：num_enum 会把它当作未知值的兜底分支
impl_default! {
    SessionState => Idle,
    ConnectionQuality => Poor,
    SafetyState => Normal,
    OperationMode => Test1,
    DriveState => Off,
    ClientCommandMode => NoCommandMode,
}

/// 把线上字节解码为枚举，失败时带上字段名
pub(crate) fn decode_enum<T>(field: &'static str, value: u8) -> Result<T, ProtocolError>
where
    T: TryFromPrimitive<Primitive = u8>,
{
    T::try_from_primitive(value).map_err(|_| ProtocolError::InvalidValue { field, value })
}
