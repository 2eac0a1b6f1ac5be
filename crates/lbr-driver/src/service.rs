//! 连接服务的请求/应答类型

/// 连接请求
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConnectRequest {
    /// 本地端口，必须在 [30200, 30209] 内
    pub port_id: i32,
    /// 控制器地址，空字符串表示任意
    pub remote_host: String,
}

impl AppConnectRequest {
    pub fn new(port_id: i32, remote_host: impl Into<String>) -> Self {
        Self {
            port_id,
            remote_host: remote_host.into(),
        }
    }

    pub(crate) fn remote_host(&self) -> Option<&str> {
        Some(self.remote_host.as_str()).filter(|h| !h.is_empty())
    }
}

/// 连接应答
///
/// 失败时 `message` 描述原因；成功时为空。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConnectResponse {
    pub connected: bool,
    pub message: String,
}

/// 断开请求
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppDisconnectRequest {}

/// 断开应答
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppDisconnectResponse {
    pub disconnected: bool,
    pub message: String,
}
