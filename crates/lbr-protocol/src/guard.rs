//! 命令有效性守卫
//!
//! 在命令进入协议引擎之前拒绝结构或语义上无效的命令：
//! - 非有限值（NaN/Inf）
//! - 关节位置越限
//! - 隐含关节速度越限（相对测量位置，按 `sample_time` 计算）
//! - 力矩越限（仅 `Torque` 模式）
//!
//! 检查只涉及定长数组，无分配，可在实时线程中调用。

use crate::description::RobotDescription;
use crate::message::{LbrCommand, LbrState};
use crate::session::ClientCommandMode;
use crate::{N_JOINTS, ProtocolError};
use thiserror::Error;

/// 命令被守卫拒绝的原因
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    #[error("Command field {field}[{index}] is not finite")]
    NotFinite { field: &'static str, index: usize },

    #[error("Joint {joint} position {value:.4} rad outside limits [{min:.4}, {max:.4}]")]
    PositionLimit {
        joint: usize,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Joint {joint} velocity {value:.4} rad/s exceeds limit {max:.4}")]
    VelocityLimit { joint: usize, value: f64, max: f64 },

    #[error("Joint {joint} torque {value:.4} Nm exceeds limit {max:.4}")]
    TorqueLimit { joint: usize, value: f64, max: f64 },
}

/// 命令有效性守卫
///
/// 由机器人描述构造；构造后只读。
#[derive(Debug, Clone, PartialEq)]
pub struct CommandGuard {
    min_position: [f64; N_JOINTS],
    max_position: [f64; N_JOINTS],
    max_velocity: [f64; N_JOINTS],
    max_torque: [f64; N_JOINTS],
}

impl CommandGuard {
    /// 从已校验的描述构造
    pub fn new(description: &RobotDescription) -> Self {
        let mut guard = Self {
            min_position: [0.0; N_JOINTS],
            max_position: [0.0; N_JOINTS],
            max_velocity: [0.0; N_JOINTS],
            max_torque: [0.0; N_JOINTS],
        };
        for (i, joint) in description.joints.iter().take(N_JOINTS).enumerate() {
            guard.min_position[i] = joint.lower;
            guard.max_position[i] = joint.upper;
            guard.max_velocity[i] = joint.velocity;
            guard.max_torque[i] = joint.effort;
        }
        guard
    }

    /// 直接从 TOML 描述字符串构造
    pub fn from_description(content: &str) -> Result<Self, ProtocolError> {
        RobotDescription::from_toml_str(content).map(|d| Self::new(&d))
    }

    pub fn min_position(&self) -> &[f64; N_JOINTS] {
        &self.min_position
    }

    pub fn max_position(&self) -> &[f64; N_JOINTS] {
        &self.max_position
    }

    /// 校验命令
    ///
    /// `state` 是最近一次已知的控制器状态，用于速度检查和确定命令模式。
    pub fn validate(&self, command: &LbrCommand, state: &LbrState) -> Result<(), GuardError> {
        self.check_position(command, state)?;

        match state.client_command_mode {
            ClientCommandMode::Torque => self.check_torque(command),
            ClientCommandMode::Wrench => {
                check_finite("wrench", &command.wrench)
            },
            ClientCommandMode::Position | ClientCommandMode::NoCommandMode => Ok(()),
        }
    }

    /// 位置 + 速度检查
    fn check_position(&self, command: &LbrCommand, state: &LbrState) -> Result<(), GuardError> {
        check_finite("joint_position", &command.joint_position)?;

        for i in 0..N_JOINTS {
            let value = command.joint_position[i];
            if value < self.min_position[i] || value > self.max_position[i] {
                return Err(GuardError::PositionLimit {
                    joint: i,
                    value,
                    min: self.min_position[i],
                    max: self.max_position[i],
                });
            }
        }

        // sample_time 为 0 表示尚未收到控制器状态，跳过速度检查
        if state.sample_time > 0.0 {
            for i in 0..N_JOINTS {
                let velocity = (command.joint_position[i] - state.measured_joint_position[i]).abs()
                    / state.sample_time;
                if velocity > self.max_velocity[i] {
                    return Err(GuardError::VelocityLimit {
                        joint: i,
                        value: velocity,
                        max: self.max_velocity[i],
                    });
                }
            }
        }

        Ok(())
    }

    fn check_torque(&self, command: &LbrCommand) -> Result<(), GuardError> {
        check_finite("torque", &command.torque)?;
        for i in 0..N_JOINTS {
            if command.torque[i].abs() > self.max_torque[i] {
                return Err(GuardError::TorqueLimit {
                    joint: i,
                    value: command.torque[i],
                    max: self.max_torque[i],
                });
            }
        }
        Ok(())
    }
}

fn check_finite(field: &'static str, values: &[f64]) -> Result<(), GuardError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(GuardError::NotFinite { field, index }),
        None => Ok(()),
    }
}
