//! 传输层错误类型

use lbr_protocol::ProtocolError;
use thiserror::Error;

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Receive timeout")]
    Timeout,

    #[error("Connection not open")]
    NotOpen,

    /// 尚未收到控制器的数据报，无法确定应答地址
    #[error("No controller address known yet")]
    NoController,

    #[error("Invalid remote host: {0}")]
    InvalidHost(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        assert_eq!(TransportError::Timeout.to_string(), "Receive timeout");
        assert_eq!(
            TransportError::InvalidHost("foo".into()).to_string(),
            "Invalid remote host: foo"
        );

        let err: TransportError = ProtocolError::InvalidMessageType(0x42).into();
        assert!(err.to_string().contains("0x42"));
    }
}
