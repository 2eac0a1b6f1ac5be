//! 带超时的线程 join

use std::thread::{JoinHandle, spawn};
use std::time::Duration;

/// 带超时的 join
pub(crate) trait JoinTimeout {
    /// 在 `timeout` 内等待线程结束
    ///
    /// 超时后目标线程继续运行（无法强制终止），由看守线程负责最终回收。
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        // 已结束的线程直接 join，不额外创建看守线程
        if self.is_finished() {
            return self.join().map(|_| ());
        }

        let (tx, rx) = mpsc::channel();
        spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// join 错误是否为超时
pub(crate) fn is_timeout(err: &(dyn std::any::Any + Send)) -> bool {
    err.downcast_ref::<std::io::Error>()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::TimedOut)
}
