//! 实时步进循环
//!
//! 步进线程的主体。每个周期：
//!
//! 1. `try_lock` 会话（引擎 + 中间层）；失败说明断开流程正在进行，退出循环
//! 2. 会话处于 `CommandingWait` 时清空收件箱，本周期不使用任何命令
//! 3. 否则读取收件箱中的最新命令
//! 4. 暂存命令（守卫校验失败则退出循环）
//! 5. 引擎执行一个协议周期（失败则退出循环；接收超时为空闲周期，不发布）
//! 6. `try_lock` 发件箱并发布状态（获取失败则跳过本周期的样本）
//!
//! 稳态周期内没有阻塞加锁，也没有堆分配。

use crate::error::DriverError;
use crate::inbox::CommandInbox;
use crate::intermediary::SessionIntermediary;
use crate::metrics::StepMetrics;
use crate::outbox::StateOutbox;
use lbr_protocol::SessionState;
use lbr_transport::{ClientApplication, StepOutcome};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, trace, warn};

/// 步进线程名称
pub const STEP_THREAD_NAME: &str = "lbr-app-step";

/// 引擎与中间层（同一把锁保护）
pub struct Session<A> {
    pub app: A,
    pub intermediary: SessionIntermediary,
}

/// 实时线程与非实时线程共享的端点
#[derive(Clone)]
pub struct StepEndpoints {
    pub inbox: Arc<CommandInbox>,
    pub outbox: Arc<StateOutbox>,
    pub metrics: Arc<StepMetrics>,
    /// 进程级停止标志
    pub shutdown: Arc<AtomicBool>,
}

/// 步进线程上下文
pub(crate) struct StepContext<A> {
    pub session: Arc<Mutex<Session<A>>>,
    pub endpoints: StepEndpoints,
    pub connected: Arc<AtomicBool>,
    /// 已清除连接标志但引擎尚未关闭；由先拿到它的一方（断开流程或本线程）关闭引擎
    pub close_pending: Arc<AtomicBool>,
}

/// 循环结束原因
#[derive(Debug)]
pub(crate) enum LoopExit {
    /// 连接标志被清除或收到停止信号
    Stopped,
    /// 会话被断开流程持有
    SessionBusy,
    /// 命令校验失败（`DriverError::Validation`）或引擎单步失败（`DriverError::StepFailed`）
    Failed(DriverError),
}

/// 步进线程主体
///
/// 循环结束时如果连接标志仍为 `true`，由本线程完成断开（清除标志并断开引擎）。
/// 如果断开流程没能在时限内拿到引擎（留下 `close_pending`），也由本线程关闭引擎。
/// 线程句柄由连接管理器在下一次 connect/disconnect 时回收。
pub(crate) fn step_loop<A: ClientApplication>(ctx: StepContext<A>) {
    // 设置线程优先级（可选 feature）
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("Step thread priority set to MAX (realtime)");
            },
            Err(e) => {
                warn!(
                    "Failed to set step thread priority: {:?}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    e
                );
            },
        }
    }

    let exit = run_cycles(&ctx);
    trace!("Step loop exited: {:?}", exit);

    // 自行断开：只有在没有人先清除标志时才执行
    if ctx.connected.swap(false, Ordering::AcqRel) {
        ctx.session.lock().app.disconnect();
        StepMetrics::inc(&ctx.endpoints.metrics.disconnects);
        match exit {
            LoopExit::Failed(e) => warn!("Step loop ended ({}), connection closed", e),
            other => warn!("Step loop ended ({:?}), connection closed", other),
        }
    } else if ctx.close_pending.swap(false, Ordering::AcqRel) {
        ctx.session.lock().app.disconnect();
        StepMetrics::inc(&ctx.endpoints.metrics.disconnects);
        warn!("Step loop resumed after disconnect timed out, connection closed");
    } else {
        info!("Step loop stopped");
    }
}

fn run_cycles<A: ClientApplication>(ctx: &StepContext<A>) -> LoopExit {
    let StepEndpoints {
        inbox,
        outbox,
        metrics,
        shutdown,
    } = &ctx.endpoints;

    loop {
        if !ctx.connected.load(Ordering::Acquire) || shutdown.load(Ordering::Acquire) {
            return LoopExit::Stopped;
        }

        let Some(mut session) = ctx.session.try_lock() else {
            return LoopExit::SessionBusy;
        };
        let Session { app, intermediary } = &mut *session;

        // 等待阶段：丢弃旧命令，防止重放到控制器
        let command = if intermediary.lbr_state().session_state == SessionState::CommandingWait {
            if !inbox.is_empty() {
                StepMetrics::inc(&metrics.stale_command_resets);
            }
            inbox.reset();
            None
        } else {
            inbox.read()
        };

        if let Err(e) = intermediary.command_to_buffer(command.as_deref()) {
            StepMetrics::inc(&metrics.validation_failures);
            error!("Command validation failed, stopping step loop: {}", e);
            return LoopExit::Failed(e);
        }

        match app.step(intermediary) {
            StepOutcome::Stepped => StepMetrics::inc(&metrics.cycles),
            StepOutcome::Idle => {
                StepMetrics::inc(&metrics.idle_cycles);
                continue;
            },
            StepOutcome::Failed => {
                StepMetrics::inc(&metrics.step_failures);
                error!("FRI step failed, stopping step loop");
                return LoopExit::Failed(DriverError::StepFailed);
            },
        }

        match outbox.try_begin_publish() {
            Some(mut guard) => {
                intermediary.buffer_to_state(&mut guard);
                guard.commit_and_publish();
            },
            None => StepMetrics::inc(&metrics.publish_skips),
        }
    }
}
