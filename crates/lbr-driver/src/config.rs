//! 节点配置
//!
//! TOML 格式，所有字段都有默认值（机器人描述除外，缺失时构造失败）：
//!
//! ```toml
//! port_id = 30200
//! remote_host = "172.31.1.147"
//! robot_description_path = "config/iiwa7.toml"
//! join_timeout_ms = 1000
//! ```

use crate::connection::{DEFAULT_JOIN_TIMEOUT, PORT_ID_MIN};
use crate::error::DriverError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 应用节点配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppNodeConfig {
    /// 初始连接端口
    pub port_id: i32,
    /// 控制器地址（`None` 或空字符串表示任意）
    pub remote_host: Option<String>,
    /// 内联机器人描述（优先于 `robot_description_path`）
    pub robot_description: Option<String>,
    /// 机器人描述文件路径
    pub robot_description_path: Option<PathBuf>,
    /// 断开时限（毫秒）
    pub join_timeout_ms: u64,
}

impl Default for AppNodeConfig {
    fn default() -> Self {
        Self {
            port_id: PORT_ID_MIN,
            remote_host: None,
            robot_description: None,
            robot_description_path: None,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT.as_millis() as u64,
        }
    }
}

impl AppNodeConfig {
    /// 从 TOML 字符串解析
    pub fn from_toml_str(content: &str) -> Result<Self, DriverError> {
        toml::from_str(content)
            .map_err(|e| DriverError::Configuration(format!("invalid node config: {}", e)))
    }

    /// 从文件加载
    ///
    /// # 错误
    /// - `DriverError::Io`: 文件读取失败
    /// - `DriverError::Configuration`: TOML 格式或字段错误
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DriverError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// 控制器地址（空字符串视为未设置）
    pub fn remote_host(&self) -> Option<&str> {
        self.remote_host.as_deref().filter(|h| !h.is_empty())
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// 读取机器人描述内容
    ///
    /// # 错误
    /// - `DriverError::Configuration`: 未提供描述，或描述为空
    /// - `DriverError::Io`: 描述文件读取失败
    pub fn robot_description(&self) -> Result<String, DriverError> {
        let content = match (&self.robot_description, &self.robot_description_path) {
            (Some(inline), _) => inline.clone(),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                DriverError::Configuration(format!(
                    "failed to read robot description {}: {}",
                    path.display(),
                    e
                ))
            })?,
            (None, None) => {
                return Err(DriverError::Configuration(
                    "robot_description is not set".into(),
                ));
            },
        };

        if content.trim().is_empty() {
            return Err(DriverError::Configuration(
                "robot_description is empty".into(),
            ));
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppNodeConfig::from_toml_str("").unwrap();
        assert_eq!(config.port_id, 30200);
        assert_eq!(config.join_timeout(), Duration::from_secs(1));
        assert!(config.remote_host().is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let config = AppNodeConfig::from_toml_str(
            r#"
port_id = 30203
remote_host = "172.31.1.147"
robot_description = "name = \"x\""
join_timeout_ms = 250
"#,
        )
        .unwrap();
        assert_eq!(config.port_id, 30203);
        assert_eq!(config.remote_host(), Some("172.31.1.147"));
        assert_eq!(config.join_timeout(), Duration::from_millis(250));
        assert_eq!(config.robot_description().unwrap(), "name = \"x\"");
    }

    #[test]
    fn test_empty_remote_host_means_any() {
        let config = AppNodeConfig::from_toml_str("remote_host = \"\"").unwrap();
        assert!(config.remote_host().is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = AppNodeConfig::from_toml_str("port = 30200").unwrap_err();
        assert!(matches!(err, DriverError::Configuration(_)));
    }

    #[test]
    fn test_missing_description() {
        let config = AppNodeConfig::default();
        let err = config.robot_description().unwrap_err();
        assert!(err.to_string().contains("robot_description is not set"));

        let config = AppNodeConfig {
            robot_description: Some("   \n".into()),
            ..Default::default()
        };
        assert!(config.robot_description().is_err());
    }

    #[test]
    fn test_description_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"from-file\"").unwrap();

        let config = AppNodeConfig {
            robot_description_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(config.robot_description().unwrap().contains("from-file"));
    }

    #[test]
    fn test_description_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppNodeConfig {
            robot_description_path: Some(dir.path().join("missing.toml")),
            ..Default::default()
        };
        let err = config.robot_description().unwrap_err();
        assert!(matches!(err, DriverError::Configuration(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(&path, "port_id = 30201\njoin_timeout_ms = 500\n").unwrap();

        let config = AppNodeConfig::load(&path).unwrap();
        assert_eq!(config.port_id, 30201);
        assert_eq!(config.join_timeout_ms, 500);

        assert!(matches!(
            AppNodeConfig::load(dir.path().join("nope.toml")),
            Err(DriverError::Io(_))
        ));
    }
}
