//! 命令与状态值对象
//!
//! 两者都是 `Copy` 的定长结构（无堆分配），可以在实时线程中按值拷贝。

use crate::session::*;
use crate::{N_JOINTS, N_WRENCH};

/// 单个控制周期的执行输入
///
/// 由外部（非实时）生产者创建，通过 `Arc<LbrCommand>` 交给实时线程，
/// 实时线程只读取共享快照，从不修改。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LbrCommand {
    /// 目标关节位置（rad）
    pub joint_position: [f64; N_JOINTS],
    /// 末端力/力矩（N, Nm），仅 `Wrench` 模式使用
    pub wrench: [f64; N_WRENCH],
    /// 关节力矩（Nm），仅 `Torque` 模式使用
    pub torque: [f64; N_JOINTS],
}

impl LbrCommand {
    /// 创建位置命令（wrench/torque 为 0）
    pub fn position(joint_position: [f64; N_JOINTS]) -> Self {
        Self {
            joint_position,
            ..Default::default()
        }
    }

    /// 创建力矩命令
    pub fn torque(joint_position: [f64; N_JOINTS], torque: [f64; N_JOINTS]) -> Self {
        Self {
            joint_position,
            torque,
            ..Default::default()
        }
    }

    /// 创建末端力命令
    pub fn wrench(joint_position: [f64; N_JOINTS], wrench: [f64; N_WRENCH]) -> Self {
        Self {
            joint_position,
            wrench,
            ..Default::default()
        }
    }

    /// 以当前插补位置保持不动的命令
    pub fn hold(state: &LbrState) -> Self {
        Self::position(state.ipo_joint_position)
    }
}

/// 单个控制周期的测量/上报输出
///
/// 由协议引擎每周期产生一次，经会话中间层写入状态发件箱。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LbrState {
    /// 会话阶段
    pub session_state: SessionState,
    pub connection_quality: ConnectionQuality,
    pub safety_state: SafetyState,
    pub operation_mode: OperationMode,
    pub drive_state: DriveState,
    pub client_command_mode: ClientCommandMode,
    /// 控制周期（秒）
    pub sample_time: f64,
    pub time_stamp_sec: u32,
    pub time_stamp_nano_sec: u32,
    pub measured_joint_position: [f64; N_JOINTS],
    pub commanded_joint_position: [f64; N_JOINTS],
    pub measured_torque: [f64; N_JOINTS],
    pub commanded_torque: [f64; N_JOINTS],
    pub external_torque: [f64; N_JOINTS],
    /// 控制器插补器位置（rad）
    pub ipo_joint_position: [f64; N_JOINTS],
    pub tracking_performance: f64,
}

impl LbrState {
    /// 控制器时间戳（秒，浮点）
    pub fn timestamp(&self) -> f64 {
        self.time_stamp_sec as f64 + self.time_stamp_nano_sec as f64 * 1e-9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_constructors() {
        let q = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7];
        let cmd = LbrCommand::position(q);
        assert_eq!(cmd.joint_position, q);
        assert_eq!(cmd.torque, [0.0; N_JOINTS]);
        assert_eq!(cmd.wrench, [0.0; N_WRENCH]);

        let cmd = LbrCommand::torque(q, [1.0; N_JOINTS]);
        assert_eq!(cmd.torque, [1.0; N_JOINTS]);

        let cmd = LbrCommand::wrench(q, [2.0; N_WRENCH]);
        assert_eq!(cmd.wrench, [2.0; N_WRENCH]);
    }

    #[test]
    fn test_hold_uses_ipo_position() {
        let state = LbrState {
            ipo_joint_position: [0.5; N_JOINTS],
            measured_joint_position: [0.4; N_JOINTS],
            ..Default::default()
        };
        assert_eq!(LbrCommand::hold(&state).joint_position, [0.5; N_JOINTS]);
    }

    #[test]
    fn test_state_default_is_idle() {
        let state = LbrState::default();
        assert_eq!(state.session_state, SessionState::Idle);
        assert_eq!(state.sample_time, 0.0);
    }

    #[test]
    fn test_timestamp() {
        let state = LbrState {
            time_stamp_sec: 2,
            time_stamp_nano_sec: 500_000_000,
            ..Default::default()
        };
        assert!((state.timestamp() - 2.5).abs() < 1e-9);
    }
}
