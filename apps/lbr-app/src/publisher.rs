//! 日志发布者
//!
//! 没有下游订阅方时，把状态按固定间隔写入日志。

use lbr_driver::StatePublisher;
use lbr_protocol::{LbrState, SessionState};
use tracing::info;

pub struct LoggingPublisher {
    every: u64,
    count: u64,
    last_session_state: SessionState,
}

impl LoggingPublisher {
    /// `every == 0` 时只记录会话阶段变化
    pub fn new(every: u64) -> Self {
        Self {
            every,
            count: 0,
            last_session_state: SessionState::Idle,
        }
    }
}

impl StatePublisher for LoggingPublisher {
    fn publish(&mut self, state: &LbrState) {
        self.count += 1;

        if state.session_state != self.last_session_state {
            info!(
                "Session state {:?} -> {:?} (quality: {:?}, mode: {:?})",
                self.last_session_state,
                state.session_state,
                state.connection_quality,
                state.client_command_mode
            );
            self.last_session_state = state.session_state;
        }

        if self.every > 0 && self.count % self.every == 0 {
            info!(
                "[{}] t={:.3}s q={:.4?} tau_ext={:.2?}",
                self.count,
                state.timestamp(),
                state.measured_joint_position,
                state.external_torque
            );
        }
    }
}
