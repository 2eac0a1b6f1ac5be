//! # LBR Transport
//!
//! 协议引擎边界：数据报连接、会话回调与客户端引擎。
//!
//! 核心驱动只通过 [`ClientApplication`] / [`SessionClient`] 与引擎交互，
//! 因此可以替换为真实的 UDP 引擎（[`FriApplication`] + [`UdpConnection`]）
//! 或测试用的 [`mock::MockApplication`]（`mock` feature）。

pub mod application;
pub mod connection;
pub mod error;

#[cfg(feature = "mock")]
pub mod mock;

pub use application::{
    ClientApplication, FriApplication, SessionClient, StepOutcome, dispatch,
};
pub use connection::{Connection, UdpConnection};
pub use error::TransportError;

#[cfg(feature = "mock")]
pub use mock::{MockApplication, MockHandle, RecordedCommand};
