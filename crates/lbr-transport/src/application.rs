//! 协议引擎边界
//!
//! - [`SessionClient`]: 引擎每周期回调的客户端（由会话中间层实现）
//! - [`ClientApplication`]: 引擎本身（connect / step / disconnect）
//! - [`FriApplication`]: 基于 [`Connection`] 的数据报引擎
//!
//! 引擎每次 `step` 完成一个完整的请求/应答周期：接收监控消息、回调客户端、
//! 发送命令消息。接收超时（控制器尚未发送或暂停发送）是空闲周期，不是失败。

use crate::connection::Connection;
use crate::error::TransportError;
use lbr_protocol::codec::MAX_DATAGRAM_LEN;
use lbr_protocol::{CommandMessage, LbrCommand, LbrState, MonitorMessage, SessionState};
use tracing::{error, info, trace, warn};

/// 会话客户端回调
///
/// 所有回调都在步进线程中调用，实现不得阻塞或分配。
pub trait SessionClient {
    /// 会话阶段发生变化
    fn on_state_change(&mut self, old: SessionState, new: SessionState);

    /// 监控阶段（无命令输出）
    fn monitor(&mut self, state: &LbrState);

    /// 命令等待阶段，返回要发送的命令
    fn wait_for_command(&mut self, state: &LbrState) -> LbrCommand;

    /// 命令激活阶段，返回要发送的命令
    fn command(&mut self, state: &LbrState) -> LbrCommand;
}

/// 单个协议周期的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// 收到监控消息并已应答
    Stepped,
    /// 接收超时，没有回调客户端
    Idle,
    /// 连接关闭或收发/解码失败，调用方应结束步进循环
    Failed,
}

/// 协议引擎
///
/// 引擎拥有底层连接。
pub trait ClientApplication: Send + 'static {
    /// 打开连接，成功返回 `true`
    fn connect(&mut self, port: u16, remote_host: Option<&str>) -> bool;

    /// 关闭连接（幂等）
    fn disconnect(&mut self);

    /// 执行一个协议周期
    ///
    /// 无数据时最多阻塞一个接收超时，以便调用方检查停止标志。
    fn step(&mut self, client: &mut dyn SessionClient) -> StepOutcome;
}

/// 按会话阶段分派回调
///
/// `previous` 记录上一次的会话阶段，阶段变化时先调用 `on_state_change`。
/// 返回 `Some(command)` 表示处于命令模式。
pub fn dispatch(
    client: &mut dyn SessionClient,
    previous: &mut SessionState,
    state: &LbrState,
) -> Option<LbrCommand> {
    if state.session_state != *previous {
        client.on_state_change(*previous, state.session_state);
        *previous = state.session_state;
    }

    match state.session_state {
        SessionState::CommandingWait => Some(client.wait_for_command(state)),
        SessionState::CommandingActive => Some(client.command(state)),
        SessionState::Idle
        | SessionState::MonitoringWait
        | SessionState::MonitoringReady
        | SessionState::Error => {
            client.monitor(state);
            None
        },
    }
}

/// 基于数据报连接的 FRI 客户端引擎
///
/// 收发缓冲区在构造时分配，`step` 期间不做堆分配。
pub struct FriApplication<C: Connection> {
    connection: C,
    rx_buffer: [u8; MAX_DATAGRAM_LEN],
    tx_buffer: [u8; MAX_DATAGRAM_LEN],
    last_session_state: SessionState,
}

impl<C: Connection> FriApplication<C> {
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            rx_buffer: [0u8; MAX_DATAGRAM_LEN],
            tx_buffer: [0u8; MAX_DATAGRAM_LEN],
            last_session_state: SessionState::Idle,
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }
}

impl<C: Connection + 'static> ClientApplication for FriApplication<C> {
    fn connect(&mut self, port: u16, remote_host: Option<&str>) -> bool {
        match self.connection.open(port, remote_host) {
            Ok(()) => {
                self.last_session_state = SessionState::Idle;
                info!("FRI application connected on port {}", port);
                true
            },
            Err(e) => {
                warn!("FRI application failed to open port {}: {}", port, e);
                false
            },
        }
    }

    fn disconnect(&mut self) {
        self.connection.close();
        self.last_session_state = SessionState::Idle;
    }

    fn step(&mut self, client: &mut dyn SessionClient) -> StepOutcome {
        if !self.connection.is_open() {
            error!("FRI step on closed connection");
            return StepOutcome::Failed;
        }

        let len = match self.connection.receive(&mut self.rx_buffer) {
            Ok(len) => len,
            Err(TransportError::Timeout) => {
                trace!("No monitor message within receive timeout");
                return StepOutcome::Idle;
            },
            Err(e) => {
                error!("Failed to receive monitor message: {}", e);
                return StepOutcome::Failed;
            },
        };

        let monitor = match MonitorMessage::decode(&self.rx_buffer[..len]) {
            Ok(msg) => msg,
            Err(e) => {
                error!("Failed to decode monitor message: {}", e);
                return StepOutcome::Failed;
            },
        };

        let command = dispatch(client, &mut self.last_session_state, &monitor.state);

        // 监控阶段也要应答，命令标志未置位时控制器忽略命令内容
        let reply = CommandMessage {
            sequence: monitor.sequence,
            active: command.is_some(),
            command: command.unwrap_or_else(|| LbrCommand::hold(&monitor.state)),
        };

        let len = match reply.encode(&mut self.tx_buffer) {
            Ok(len) => len,
            Err(e) => {
                error!("Failed to encode command message: {}", e);
                return StepOutcome::Failed;
            },
        };

        if let Err(e) = self.connection.send(&self.tx_buffer[..len]) {
            error!("Failed to send command message: {}", e);
            return StepOutcome::Failed;
        }

        StepOutcome::Stepped
    }
}
