//! 会话中间层
//!
//! 在引擎回调（[`SessionClient`]）与 `LbrCommand` / `LbrState` 之间转换：
//! - 步进线程先调用 [`command_to_buffer`](SessionIntermediary::command_to_buffer)
//!   暂存本周期的命令（经守卫校验）
//! - 引擎在 `step` 中回调，中间层记录状态并交出暂存命令
//! - 步进线程再调用 [`buffer_to_state`](SessionIntermediary::buffer_to_state)
//!   把状态写入发件箱

use crate::error::DriverError;
use lbr_protocol::{CommandGuard, LbrCommand, LbrState, SessionState};
use lbr_transport::SessionClient;
use tracing::debug;

/// 会话中间层
#[derive(Debug)]
pub struct SessionIntermediary {
    guard: CommandGuard,
    /// 引擎最近一次报告的状态
    state: LbrState,
    /// 本周期暂存的命令
    staged: Option<LbrCommand>,
}

impl SessionIntermediary {
    pub fn new(guard: CommandGuard) -> Self {
        Self {
            guard,
            state: LbrState::default(),
            staged: None,
        }
    }

    /// 暂存本周期的命令
    ///
    /// - `None`: 清空暂存命令（引擎回调时保持插补位置）
    /// - `Some`: 以最近的状态为参考校验命令，通过后暂存
    ///
    /// # 错误
    /// - `DriverError::Validation`: 命令被守卫拒绝，暂存区同时被清空
    pub fn command_to_buffer(&mut self, command: Option<&LbrCommand>) -> Result<(), DriverError> {
        self.staged = None;
        if let Some(command) = command {
            self.guard.validate(command, &self.state)?;
            self.staged = Some(*command);
        }
        Ok(())
    }

    /// 把最近的状态复制到 `state`
    pub fn buffer_to_state(&self, state: &mut LbrState) {
        *state = self.state;
    }

    /// 最近一次已知的状态（不阻塞）
    pub fn lbr_state(&self) -> &LbrState {
        &self.state
    }

    pub fn staged_command(&self) -> Option<&LbrCommand> {
        self.staged.as_ref()
    }

    /// 新连接开始前清除上一次会话的残留
    pub fn reset_session(&mut self) {
        self.state = LbrState::default();
        self.staged = None;
    }
}

impl SessionClient for SessionIntermediary {
    fn on_state_change(&mut self, old: SessionState, new: SessionState) {
        debug!("FRI session state changed: {:?} -> {:?}", old, new);
    }

    fn monitor(&mut self, state: &LbrState) {
        self.state = *state;
    }

    fn wait_for_command(&mut self, state: &LbrState) -> LbrCommand {
        self.state = *state;
        LbrCommand::hold(state)
    }

    fn command(&mut self, state: &LbrState) -> LbrCommand {
        self.state = *state;
        match &self.staged {
            Some(command) => *command,
            None => LbrCommand::hold(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbr_protocol::{ClientCommandMode, GuardError, N_JOINTS};

    fn guard() -> CommandGuard {
        let mut content = String::from("name = \"test\"\n");
        for i in 0..N_JOINTS {
            content.push_str(&format!(
                "\n[[joints]]\nname = \"A{}\"\nlower = -2.0\nupper = 2.0\nvelocity = 2.0\neffort = 100.0\n",
                i + 1
            ));
        }
        CommandGuard::from_description(&content).unwrap()
    }

    fn active_state() -> LbrState {
        LbrState {
            session_state: SessionState::CommandingActive,
            client_command_mode: ClientCommandMode::Position,
            sample_time: 0.005,
            ipo_joint_position: [0.25; N_JOINTS],
            ..Default::default()
        }
    }

    #[test]
    fn test_staged_command_is_sent() {
        let mut intermediary = SessionIntermediary::new(guard());
        let command = LbrCommand::position([0.001; N_JOINTS]);
        intermediary.command_to_buffer(Some(&command)).unwrap();
        assert_eq!(intermediary.staged_command(), Some(&command));
        assert_eq!(intermediary.command(&active_state()), command);
    }

    #[test]
    fn test_empty_buffer_holds_position() {
        let mut intermediary = SessionIntermediary::new(guard());
        intermediary
            .command_to_buffer(Some(&LbrCommand::position([0.001; N_JOINTS])))
            .unwrap();
        // None 清空暂存命令，不重放旧命令
        intermediary.command_to_buffer(None).unwrap();
        assert!(intermediary.staged_command().is_none());

        let sent = intermediary.command(&active_state());
        assert_eq!(sent.joint_position, [0.25; N_JOINTS]);
    }

    #[test]
    fn test_wait_for_command_ignores_staged() {
        let mut intermediary = SessionIntermediary::new(guard());
        intermediary
            .command_to_buffer(Some(&LbrCommand::position([0.001; N_JOINTS])))
            .unwrap();
        let state = LbrState {
            session_state: SessionState::CommandingWait,
            ..active_state()
        };
        assert_eq!(
            intermediary.wait_for_command(&state).joint_position,
            [0.25; N_JOINTS]
        );
    }

    #[test]
    fn test_invalid_command_rejected_and_cleared() {
        let mut intermediary = SessionIntermediary::new(guard());
        intermediary
            .command_to_buffer(Some(&LbrCommand::position([0.001; N_JOINTS])))
            .unwrap();

        let mut bad = LbrCommand::default();
        bad.joint_position[2] = f64::NAN;
        let err = intermediary.command_to_buffer(Some(&bad)).unwrap_err();
        assert!(matches!(
            err,
            DriverError::Validation(GuardError::NotFinite { index: 2, .. })
        ));
        assert!(intermediary.staged_command().is_none());
    }

    #[test]
    fn test_validation_uses_last_state() {
        let mut intermediary = SessionIntermediary::new(guard());
        let command = LbrCommand::position([1.0; N_JOINTS]);
        // 尚无状态（sample_time = 0），只做位置检查
        assert!(intermediary.command_to_buffer(Some(&command)).is_ok());

        // 收到状态后：1 rad / 5ms 超过速度上限
        intermediary.monitor(&active_state());
        let err = intermediary.command_to_buffer(Some(&command)).unwrap_err();
        assert!(matches!(
            err,
            DriverError::Validation(GuardError::VelocityLimit { .. })
        ));
    }

    #[test]
    fn test_buffer_to_state_copies_latest() {
        let mut intermediary = SessionIntermediary::new(guard());
        intermediary.monitor(&active_state());

        let mut state = LbrState::default();
        intermediary.buffer_to_state(&mut state);
        assert_eq!(state.session_state, SessionState::CommandingActive);
        assert_eq!(state, *intermediary.lbr_state());

        intermediary.reset_session();
        assert_eq!(intermediary.lbr_state().session_state, SessionState::Idle);
    }
}
