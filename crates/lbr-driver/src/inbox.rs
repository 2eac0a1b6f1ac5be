//! 命令收件箱
//!
//! 单槽、无锁、后写覆盖的命令交接点：
//! - 非实时线程（订阅回调）调用 [`CommandInbox::write`]
//! - 步进线程调用 [`CommandInbox::read`] / [`CommandInbox::reset`]
//!
//! 底层是 `ArcSwapOption<LbrCommand>`：读取只增加引用计数，不阻塞、不分配；
//! 写入方分配新的 `Arc` 后原子替换。

use crate::metrics::StepMetrics;
use arc_swap::ArcSwapOption;
use lbr_protocol::LbrCommand;
use std::sync::Arc;

/// 命令收件箱
#[derive(Debug, Default)]
pub struct CommandInbox {
    slot: ArcSwapOption<LbrCommand>,
    metrics: Option<Arc<StepMetrics>>,
}

impl CommandInbox {
    /// 创建空收件箱
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建带覆盖计数的收件箱
    pub fn with_metrics(metrics: Arc<StepMetrics>) -> Self {
        Self {
            slot: ArcSwapOption::empty(),
            metrics: Some(metrics),
        }
    }

    /// 写入命令，替换尚未读取的旧命令（任意线程，从不失败）
    pub fn write(&self, command: Arc<LbrCommand>) {
        let previous = self.slot.swap(Some(command));
        if previous.is_some()
            && let Some(metrics) = &self.metrics
        {
            StepMetrics::inc(&metrics.commands_overwritten);
        }
    }

    /// 按值写入
    pub fn write_value(&self, command: LbrCommand) {
        self.write(Arc::new(command));
    }

    /// 读取最新命令（仅步进线程）
    ///
    /// 读取不会清空槽位：没有新写入时，后续周期继续得到同一条命令。
    /// 返回 `None` 表示从未写入或已被 [`reset`](Self::reset)。
    pub fn read(&self) -> Option<Arc<LbrCommand>> {
        self.slot.load_full()
    }

    /// 清空槽位（仅步进线程）
    ///
    /// 之后的 `read` 返回 `None`，直到下一次 `write`。
    pub fn reset(&self) {
        self.slot.store(None);
    }

    /// 是否有待读命令
    pub fn is_empty(&self) -> bool {
        self.slot.load().is_none()
    }
}

/// 命令写入句柄
///
/// 交给订阅回调使用，只暴露写入操作。
#[derive(Debug, Clone)]
pub struct CommandWriter {
    inbox: Arc<CommandInbox>,
}

impl CommandWriter {
    pub fn new(inbox: Arc<CommandInbox>) -> Self {
        Self { inbox }
    }

    pub fn write(&self, command: Arc<LbrCommand>) {
        self.inbox.write(command);
    }

    pub fn write_value(&self, command: LbrCommand) {
        self.inbox.write_value(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbr_protocol::N_JOINTS;

    #[test]
    fn test_empty_inbox_reads_none() {
        let inbox = CommandInbox::new();
        assert!(inbox.read().is_none());
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let inbox = CommandInbox::new();
        inbox.write_value(LbrCommand::position([0.1; N_JOINTS]));
        inbox.write_value(LbrCommand::position([0.2; N_JOINTS]));
        assert_eq!(inbox.read().unwrap().joint_position, [0.2; N_JOINTS]);
        // 读取不清空
        assert_eq!(inbox.read().unwrap().joint_position, [0.2; N_JOINTS]);
    }

    #[test]
    fn test_reset_clears_until_next_write() {
        let inbox = CommandInbox::new();
        inbox.write_value(LbrCommand::position([0.1; N_JOINTS]));
        inbox.reset();
        assert!(inbox.read().is_none());
        assert!(inbox.read().is_none());

        inbox.write_value(LbrCommand::position([0.3; N_JOINTS]));
        assert_eq!(inbox.read().unwrap().joint_position, [0.3; N_JOINTS]);
    }

    #[test]
    fn test_overwrite_counter() {
        let metrics = Arc::new(StepMetrics::new());
        let inbox = CommandInbox::with_metrics(metrics.clone());
        inbox.write_value(LbrCommand::default());
        assert_eq!(metrics.snapshot().commands_overwritten, 0);
        inbox.write_value(LbrCommand::default());
        inbox.write_value(LbrCommand::default());
        assert_eq!(metrics.snapshot().commands_overwritten, 2);

        // reset 之后的第一次写入不算覆盖
        inbox.reset();
        inbox.write_value(LbrCommand::default());
        assert_eq!(metrics.snapshot().commands_overwritten, 2);
    }

    #[test]
    fn test_writer_shares_inbox() {
        let inbox = Arc::new(CommandInbox::new());
        let writer = CommandWriter::new(inbox.clone());
        let writer2 = writer.clone();
        writer.write_value(LbrCommand::position([0.5; N_JOINTS]));
        writer2.write(Arc::new(LbrCommand::position([0.6; N_JOINTS])));
        assert_eq!(inbox.read().unwrap().joint_position, [0.6; N_JOINTS]);
    }
}
