//! 状态发件箱
//!
//! 单槽发布缓冲区。步进线程用 `try_lock` 获取发布锁（失败则跳过本周期），
//! 提交后通过 `Condvar` 唤醒发布线程；发布线程在锁外调用 [`StatePublisher`]。
//!
//! ```text
//! 步进线程 ──try_lock──> [staging] ──commit──> [published] ──notify──> 发布线程 ──> StatePublisher
//!                                                  │
//!                                      latest() ───┘ （非实时读者）
//! ```

use crate::error::DriverError;
use crate::join::JoinTimeout;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use lbr_protocol::LbrState;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{trace, warn};

/// 发布线程退出的最长等待时间
const PUBLISHER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// 状态发布者（非实时上下文调用）
pub trait StatePublisher: Send + 'static {
    fn publish(&mut self, state: &LbrState);
}

impl<F> StatePublisher for F
where
    F: FnMut(&LbrState) + Send + 'static,
{
    fn publish(&mut self, state: &LbrState) {
        self(state)
    }
}

/// 基于有界通道的发布者
///
/// 通道满时丢弃新样本（状态流允许丢样本）。
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: Sender<LbrState>,
}

impl ChannelPublisher {
    pub fn new(tx: Sender<LbrState>) -> Self {
        Self { tx }
    }

    /// 创建发布者及对应的接收端
    pub fn bounded(capacity: usize) -> (Self, Receiver<LbrState>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

impl StatePublisher for ChannelPublisher {
    fn publish(&mut self, state: &LbrState) {
        match self.tx.try_send(*state) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => trace!("State channel full, dropping sample"),
            Err(TrySendError::Disconnected(_)) => trace!("State channel disconnected"),
        }
    }
}

#[derive(Default)]
struct Slot {
    /// 步进线程写入的暂存状态
    staging: LbrState,
    /// 最近一次提交的状态
    published: Option<LbrState>,
    /// 发布线程尚未处理
    fresh: bool,
    sequence: u64,
}

struct Shared {
    slot: Mutex<Slot>,
    ready: Condvar,
    running: AtomicBool,
}

/// 状态发件箱
pub struct StateOutbox {
    shared: Arc<Shared>,
    publisher_thread: Option<JoinHandle<()>>,
}

impl StateOutbox {
    /// 创建发件箱并启动发布线程
    ///
    /// # 错误
    /// - `DriverError::Io`: 发布线程创建失败
    pub fn new(publisher: impl StatePublisher) -> Result<Self, DriverError> {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot::default()),
            ready: Condvar::new(),
            running: AtomicBool::new(true),
        });

        let shared_clone = shared.clone();
        let handle = std::thread::Builder::new()
            .name("lbr-app-publisher".into())
            .spawn(move || publisher_loop(shared_clone, publisher))?;

        Ok(Self {
            shared,
            publisher_thread: Some(handle),
        })
    }

    /// 尝试获取发布锁（不阻塞）
    ///
    /// 返回 `None` 表示锁被占用，本周期的样本应被跳过。
    pub fn try_begin_publish(&self) -> Option<PublishGuard<'_>> {
        self.shared.slot.try_lock().map(|guard| PublishGuard {
            guard,
            shared: &self.shared,
        })
    }

    /// 最近一次提交的状态（加锁读取，非实时）
    pub fn latest(&self) -> Option<LbrState> {
        self.shared.slot.lock().published
    }

    /// 已提交的次数
    pub fn sequence(&self) -> u64 {
        self.shared.slot.lock().sequence
    }

    /// 停止发布线程
    fn shutdown(&mut self) {
        {
            let _slot = self.shared.slot.lock();
            self.shared.running.store(false, Ordering::Release);
        }
        self.shared.ready.notify_all();

        if let Some(handle) = self.publisher_thread.take()
            && handle.join_timeout(PUBLISHER_JOIN_TIMEOUT).is_err()
        {
            warn!(
                "Publisher thread did not stop within {:?}",
                PUBLISHER_JOIN_TIMEOUT
            );
        }
    }
}

impl Drop for StateOutbox {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 发布锁守卫
///
/// 通过 `Deref`/`DerefMut` 访问暂存状态。未提交就丢弃时，暂存内容不会被发布。
pub struct PublishGuard<'a> {
    guard: MutexGuard<'a, Slot>,
    shared: &'a Shared,
}

impl PublishGuard<'_> {
    /// 提交暂存状态并唤醒发布线程
    pub fn commit_and_publish(self) {
        let PublishGuard { mut guard, shared } = self;
        guard.published = Some(guard.staging);
        guard.fresh = true;
        guard.sequence += 1;
        drop(guard);
        shared.ready.notify_one();
    }
}

impl Deref for PublishGuard<'_> {
    type Target = LbrState;

    fn deref(&self) -> &LbrState {
        &self.guard.staging
    }
}

impl DerefMut for PublishGuard<'_> {
    fn deref_mut(&mut self) -> &mut LbrState {
        &mut self.guard.staging
    }
}

fn publisher_loop(shared: Arc<Shared>, mut publisher: impl StatePublisher) {
    loop {
        let state = {
            let mut slot = shared.slot.lock();
            while !slot.fresh && shared.running.load(Ordering::Acquire) {
                shared.ready.wait(&mut slot);
            }
            if !slot.fresh {
                // running == false 且没有待发布的样本
                break;
            }
            slot.fresh = false;
            match slot.published {
                Some(state) => state,
                None => continue,
            }
        };

        // 锁外回调，避免阻塞步进线程
        publisher.publish(&state);
    }
    trace!("Publisher thread exiting");
}
