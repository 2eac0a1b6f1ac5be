//! 步进循环指标
//!
//! 原子计数器，步进线程只做 `fetch_add(Relaxed)`，任何线程都可以读取快照。

use std::sync::atomic::{AtomicU64, Ordering};

/// 步进循环与连接生命周期指标
#[derive(Debug, Default)]
pub struct StepMetrics {
    /// 成功完成的协议周期数
    pub cycles: AtomicU64,

    /// 接收超时的空闲周期数（控制器尚未发送或暂停发送）
    pub idle_cycles: AtomicU64,

    /// 引擎单步失败次数（每次都会结束循环）
    pub step_failures: AtomicU64,

    /// 命令被守卫拒绝的次数（每次都会结束循环）
    pub validation_failures: AtomicU64,

    /// 发件箱被占用而跳过发布的次数
    ///
    /// 偶发是正常的；持续增长说明有读者长时间持有发布锁。
    pub publish_skips: AtomicU64,

    /// `CommandingWait` 阶段清空收件箱的次数
    pub stale_command_resets: AtomicU64,

    /// 未读命令被新命令覆盖的次数
    pub commands_overwritten: AtomicU64,

    /// 成功建立连接的次数
    pub connects: AtomicU64,

    /// 断开连接的次数（包括步进线程自行断开）
    pub disconnects: AtomicU64,
}

impl StepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取指标快照
    ///
    /// # 性能
    ///
    /// 使用 `Ordering::Relaxed`，不同计数器之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            idle_cycles: self.idle_cycles.load(Ordering::Relaxed),
            step_failures: self.step_failures.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            publish_skips: self.publish_skips.load(Ordering::Relaxed),
            stale_command_resets: self.stale_command_resets.load(Ordering::Relaxed),
            commands_overwritten: self.commands_overwritten.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub cycles: u64,
    pub idle_cycles: u64,
    pub step_failures: u64,
    pub validation_failures: u64,
    pub publish_skips: u64,
    pub stale_command_resets: u64,
    pub commands_overwritten: u64,
    pub connects: u64,
    pub disconnects: u64,
}

impl MetricsSnapshot {
    /// 结束循环的失败总数
    pub fn failures(&self) -> u64 {
        self.step_failures + self.validation_failures
    }
}
