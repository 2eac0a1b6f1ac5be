//! 数据报连接
//!
//! 协议引擎通过 [`Connection`] 收发定长数据报。控制器主动向客户端端口发送
//! 监控消息，客户端把命令消息回送到最后一次收到数据报的源地址。

use crate::TransportError;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use tracing::{info, trace, warn};

/// 默认接收超时（控制器周期通常为 1~5ms）
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);

/// 数据报连接抽象
pub trait Connection: Send {
    /// 打开连接（绑定本地端口）
    ///
    /// `remote_host` 为 `None` 时接受任意来源的数据报。
    fn open(&mut self, port: u16, remote_host: Option<&str>) -> Result<(), TransportError>;

    /// 关闭连接（幂等）
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// 接收一个数据报，返回长度
    ///
    /// # 错误
    /// - `TransportError::Timeout`: 超时内未收到数据报
    /// - `TransportError::NotOpen`: 连接未打开
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// 向控制器发送一个数据报
    fn send(&mut self, buf: &[u8]) -> Result<(), TransportError>;
}

/// 基于 UDP 的连接
pub struct UdpConnection {
    socket: Option<UdpSocket>,
    receive_timeout: Duration,
    /// 只接受此地址的数据报
    remote_filter: Option<IpAddr>,
    /// 最近一次收到数据报的源地址（命令的应答目标）
    controller: Option<SocketAddr>,
}

impl UdpConnection {
    pub fn new() -> Self {
        Self::with_receive_timeout(DEFAULT_RECEIVE_TIMEOUT)
    }

    pub fn with_receive_timeout(receive_timeout: Duration) -> Self {
        Self {
            socket: None,
            receive_timeout,
            remote_filter: None,
            controller: None,
        }
    }

    /// 已绑定的本地地址
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// 当前控制器地址
    pub fn controller_addr(&self) -> Option<SocketAddr> {
        self.controller
    }
}

impl Default for UdpConnection {
    fn default() -> Self {
        Self::new()
    }
}

/// 解析远端主机（IP 字面量或主机名）
fn resolve_host(host: &str) -> Result<IpAddr, TransportError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    (host, 0)
        .to_socket_addrs()
        .map_err(|_| TransportError::InvalidHost(host.to_string()))?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| TransportError::InvalidHost(host.to_string()))
}

impl Connection for UdpConnection {
    fn open(&mut self, port: u16, remote_host: Option<&str>) -> Result<(), TransportError> {
        if self.socket.is_some() {
            warn!("UDP connection already open, reopening on port {}", port);
            self.close();
        }

        let remote_filter = match remote_host {
            Some(host) if !host.is_empty() => Some(resolve_host(host)?),
            _ => None,
        };

        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        socket.set_read_timeout(Some(self.receive_timeout))?;

        info!(
            "UDP connection bound to {:?} (remote filter: {:?})",
            socket.local_addr().ok(),
            remote_filter
        );

        self.socket = Some(socket);
        self.remote_filter = remote_filter;
        self.controller = None;
        Ok(())
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            info!("UDP connection closed");
        }
        self.controller = None;
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotOpen)?;

        loop {
            let (len, from) = socket.recv_from(buf).map_err(|e| match e.kind() {
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
                    TransportError::Timeout
                },
                _ => TransportError::Io(e),
            })?;

            if let Some(filter) = self.remote_filter
                && from.ip() != filter
            {
                trace!("Dropping datagram from unexpected host {}", from);
                continue;
            }

            self.controller = Some(from);
            return Ok(len);
        }
    }

    fn send(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotOpen)?;
        let controller = self.controller.ok_or(TransportError::NoController)?;
        socket.send_to(buf, controller)?;
        Ok(())
    }
}
