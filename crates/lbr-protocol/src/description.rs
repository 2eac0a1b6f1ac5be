//! 机器人描述
//!
//! 节点构造时必须提供的机器人/会话描述，使用 TOML 格式：
//!
//! ```toml
//! name = "iiwa7"
//!
//! [[joints]]
//! name = "A1"
//! lower = -2.9671
//! upper = 2.9671
//! velocity = 1.7104
//! effort = 176.0
//! # ... 共 7 个关节
//! ```
//!
//! 描述只用于构造 [`CommandGuard`](crate::guard::CommandGuard)。

use crate::{N_JOINTS, ProtocolError};
use serde::Deserialize;

/// 单个关节的限位描述
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JointDescription {
    /// 关节名称
    pub name: String,
    /// 位置下限（rad）
    pub lower: f64,
    /// 位置上限（rad）
    pub upper: f64,
    /// 最大速度（rad/s）
    pub velocity: f64,
    /// 最大力矩（Nm）
    pub effort: f64,
}

/// 机器人描述
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RobotDescription {
    /// 机器人型号名称
    pub name: String,
    /// 关节列表（按 A1..A7 顺序）
    pub joints: Vec<JointDescription>,
}

impl RobotDescription {
    /// 从 TOML 字符串解析并校验
    ///
    /// # 错误
    /// - `ProtocolError::Toml`: TOML 语法或字段错误
    /// - `ProtocolError::InvalidDescription`: 关节数量不是 7，或限位不合法
    pub fn from_toml_str(content: &str) -> Result<Self, ProtocolError> {
        let description: RobotDescription = toml::from_str(content)?;
        description.validate()?;
        Ok(description)
    }

    /// 校验关节数量和限位
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.joints.len() != N_JOINTS {
            return Err(ProtocolError::InvalidDescription(format!(
                "expected {} joints, got {}",
                N_JOINTS,
                self.joints.len()
            )));
        }

        for joint in &self.joints {
            if !(joint.lower.is_finite() && joint.upper.is_finite()) || joint.lower >= joint.upper
            {
                return Err(ProtocolError::InvalidDescription(format!(
                    "joint '{}' has invalid position limits [{}, {}]",
                    joint.name, joint.lower, joint.upper
                )));
            }
            if !(joint.velocity.is_finite() && joint.velocity > 0.0) {
                return Err(ProtocolError::InvalidDescription(format!(
                    "joint '{}' has invalid velocity limit {}",
                    joint.name, joint.velocity
                )));
            }
            if !(joint.effort.is_finite() && joint.effort > 0.0) {
                return Err(ProtocolError::InvalidDescription(format!(
                    "joint '{}' has invalid effort limit {}",
                    joint.name, joint.effort
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 7 关节测试描述（限位取 iiwa7 数据表）
    pub(crate) fn iiwa7_toml() -> String {
        let limits = [
            (2.9671, 1.7104, 176.0),
            (2.0944, 1.7104, 176.0),
            (2.9671, 1.7453, 110.0),
            (2.0944, 2.2689, 110.0),
            (2.9671, 2.4435, 110.0),
            (2.0944, 3.1416, 40.0),
            (3.0543, 3.1416, 40.0),
        ];
        let mut content = String::from("name = \"iiwa7\"\n");
        for (i, (limit, velocity, effort)) in limits.iter().enumerate() {
            content.push_str(&format!(
                "\n[[joints]]\nname = \"A{}\"\nlower = {}\nupper = {}\nvelocity = {}\neffort = {}\n",
                i + 1,
                -limit,
                limit,
                velocity,
                effort
            ));
        }
        content
    }

    #[test]
    fn test_parse_valid_description() {
        let description = RobotDescription::from_toml_str(&iiwa7_toml()).unwrap();
        assert_eq!(description.name, "iiwa7");
        assert_eq!(description.joints.len(), N_JOINTS);
        assert_eq!(description.joints[0].name, "A1");
        assert_eq!(description.joints[6].effort, 40.0);
    }

    #[test]
    fn test_reject_wrong_joint_count() {
        let content = "name = \"stub\"\n\n[[joints]]\nname = \"A1\"\nlower = -1.0\nupper = 1.0\nvelocity = 1.0\neffort = 1.0\n";
        let err = RobotDescription::from_toml_str(content).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidDescription(_)));
        assert!(err.to_string().contains("expected 7 joints"));
    }

    #[test]
    fn test_reject_inverted_limits() {
        let content = iiwa7_toml().replacen("lower = -2.9671", "lower = 3.5", 1);
        let err = RobotDescription::from_toml_str(&content).unwrap_err();
        assert!(err.to_string().contains("A1"));
    }

    #[test]
    fn test_reject_invalid_toml() {
        let err = RobotDescription::from_toml_str("name = ").unwrap_err();
        assert!(matches!(err, ProtocolError::Toml(_)));
    }

    #[test]
    fn test_reject_empty_string() {
        assert!(RobotDescription::from_toml_str("").is_err());
    }
}
