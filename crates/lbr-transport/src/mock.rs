//! Mock 协议引擎
//!
//! 不依赖控制器，按脚本产生会话阶段，并记录客户端在命令阶段返回的命令。
//! 测试通过 [`MockHandle`] 在引擎运行时调整行为：
//!
//! - 会话阶段脚本 / 当前阶段
//! - 在第 N 次 `step` 返回失败
//! - 让 `step` 卡住（模拟引擎无响应）
//! - `connect` 的返回值
//!
//! `step` 按 `cycle` 周期节拍（`spin_sleep`），模拟控制器周期。

use crate::application::{ClientApplication, SessionClient, StepOutcome, dispatch};
use lbr_protocol::{ClientCommandMode, LbrCommand, LbrState, N_JOINTS, SessionState};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// 默认模拟周期
pub const DEFAULT_MOCK_CYCLE: Duration = Duration::from_millis(1);

/// 命令阶段记录下的一条命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedCommand {
    /// 该周期的会话阶段
    pub session_state: SessionState,
    /// 步进序号（从 1 开始）
    pub step: usize,
    pub command: LbrCommand,
}

struct Script {
    connect_result: bool,
    /// 待消费的阶段（每个 step 取一个）
    pending: VecDeque<SessionState>,
    /// 脚本耗尽后保持的阶段
    current: SessionState,
    template: LbrState,
    fail_at_step: Option<usize>,
    cycle: Duration,
    last_connect: Option<(u16, Option<String>)>,
}

struct Shared {
    script: Mutex<Script>,
    recorded: Mutex<Vec<RecordedCommand>>,
    stalled: AtomicBool,
    /// step 正卡在 stall 中
    parked: AtomicBool,
    connected: AtomicBool,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    step_calls: AtomicUsize,
}

/// Mock 引擎
pub struct MockApplication {
    shared: Arc<Shared>,
    last_session_state: SessionState,
}

/// Mock 引擎的控制句柄（可克隆，跨线程使用）
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<Shared>,
}

impl MockApplication {
    /// 创建引擎及其控制句柄
    ///
    /// 默认：`connect` 成功，会话阶段保持 `MonitoringReady`，位置命令模式，
    /// 周期 1ms。
    pub fn new() -> (Self, MockHandle) {
        let template = LbrState {
            client_command_mode: ClientCommandMode::Position,
            sample_time: DEFAULT_MOCK_CYCLE.as_secs_f64(),
            ..Default::default()
        };

        let shared = Arc::new(Shared {
            script: Mutex::new(Script {
                connect_result: true,
                pending: VecDeque::new(),
                current: SessionState::MonitoringReady,
                template,
                fail_at_step: None,
                cycle: DEFAULT_MOCK_CYCLE,
                last_connect: None,
            }),
            recorded: Mutex::new(Vec::new()),
            stalled: AtomicBool::new(false),
            parked: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            step_calls: AtomicUsize::new(0),
        });

        let app = Self {
            shared: shared.clone(),
            last_session_state: SessionState::Idle,
        };
        (app, MockHandle { shared })
    }

    /// 生成本周期的状态
    fn next_state(&self) -> (LbrState, Duration) {
        let mut script = self.shared.script.lock();
        if let Some(next) = script.pending.pop_front() {
            script.current = next;
        }
        let state = LbrState {
            session_state: script.current,
            ..script.template
        };
        (state, script.cycle)
    }
}

impl ClientApplication for MockApplication {
    fn connect(&mut self, port: u16, remote_host: Option<&str>) -> bool {
        self.shared.connect_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.shared.script.lock();
        script.last_connect = Some((port, remote_host.map(str::to_string)));
        let ok = script.connect_result;
        self.shared.connected.store(ok, Ordering::SeqCst);
        self.last_session_state = SessionState::Idle;
        ok
    }

    fn disconnect(&mut self) {
        self.shared.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.connected.store(false, Ordering::SeqCst);
    }

    fn step(&mut self, client: &mut dyn SessionClient) -> StepOutcome {
        let step = self.shared.step_calls.fetch_add(1, Ordering::SeqCst) + 1;

        // 模拟引擎卡死，直到测试解除
        while self.shared.stalled.load(Ordering::SeqCst) {
            self.shared.parked.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1));
        }
        self.shared.parked.store(false, Ordering::SeqCst);

        if !self.shared.connected.load(Ordering::SeqCst) {
            return StepOutcome::Failed;
        }

        let (state, cycle) = self.next_state();
        let fail_at = self.shared.script.lock().fail_at_step;

        spin_sleep::sleep(cycle);

        if fail_at == Some(step) {
            return StepOutcome::Failed;
        }

        if let Some(command) = dispatch(client, &mut self.last_session_state, &state) {
            self.shared.recorded.lock().push(RecordedCommand {
                session_state: state.session_state,
                step,
                command,
            });
        }
        StepOutcome::Stepped
    }
}

impl MockHandle {
    /// 设置 `connect` 的返回值
    pub fn set_connect_result(&self, ok: bool) {
        self.shared.script.lock().connect_result = ok;
    }

    /// 追加会话阶段脚本（每次 step 消费一个）
    pub fn push_states(&self, states: impl IntoIterator<Item = SessionState>) {
        self.shared.script.lock().pending.extend(states);
    }

    /// 立即切换会话阶段（清空未消费的脚本）
    pub fn set_session_state(&self, state: SessionState) {
        let mut script = self.shared.script.lock();
        script.pending.clear();
        script.current = state;
    }

    pub fn session_state(&self) -> SessionState {
        self.shared.script.lock().current
    }

    /// 设置状态模板（会话阶段字段由脚本覆盖）
    pub fn set_template(&self, template: LbrState) {
        self.shared.script.lock().template = template;
    }

    /// 设置测量关节位置
    pub fn set_measured_position(&self, position: [f64; N_JOINTS]) {
        let mut script = self.shared.script.lock();
        script.template.measured_joint_position = position;
        script.template.ipo_joint_position = position;
    }

    /// 第 `step` 次调用返回失败（从 1 开始计数）
    pub fn fail_at_step(&self, step: Option<usize>) {
        self.shared.script.lock().fail_at_step = step;
    }

    /// 让 `step` 卡住 / 恢复
    pub fn set_stalled(&self, stalled: bool) {
        self.shared.stalled.store(stalled, Ordering::SeqCst);
    }

    /// 是否有 `step` 正卡在 stall 中
    pub fn is_parked(&self) -> bool {
        self.shared.parked.load(Ordering::SeqCst)
    }

    pub fn set_cycle(&self, cycle: Duration) {
        self.shared.script.lock().cycle = cycle;
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn connect_calls(&self) -> usize {
        self.shared.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.shared.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn step_calls(&self) -> usize {
        self.shared.step_calls.load(Ordering::SeqCst)
    }

    /// 最近一次 `connect` 的参数
    pub fn last_connect(&self) -> Option<(u16, Option<String>)> {
        self.shared.script.lock().last_connect.clone()
    }

    /// 命令阶段记录的命令（按步进顺序）
    pub fn recorded_commands(&self) -> Vec<RecordedCommand> {
        self.shared.recorded.lock().clone()
    }

    pub fn clear_recorded(&self) {
        self.shared.recorded.lock().clear();
    }

    /// 等待 step 调用次数达到 `count`
    pub fn wait_for_steps(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.step_calls() < count {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }
}
