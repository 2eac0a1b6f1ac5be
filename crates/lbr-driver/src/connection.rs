//! 连接管理器
//!
//! 拥有协议引擎，负责 connect / disconnect 以及步进线程的生命周期。
//!
//! ```text
//! Disconnected ──connect(有效端口, 传输成功)──> Connected
//! Disconnected ──connect(无效端口 / 传输失败)──> Disconnected
//! Connected ──disconnect()──> Disconnecting ──线程在时限内退出──> Disconnected
//! Connected ──step/校验失败──> Disconnected（步进线程自行断开）
//! ```
//!
//! connect / disconnect 由控制锁串行化；步进线程只在自行断开时清除连接标志。
//!
//! 断开流程清除连接标志后置位 `close_pending`，引擎由先取回该标志的一方关闭：
//! 拿到引擎锁的断开流程，或者卡住后恢复的步进线程。引擎因此只关闭一次，
//! 断开超时也不会让引擎一直开着。

use crate::error::DriverError;
use crate::intermediary::SessionIntermediary;
use crate::join::{JoinTimeout, is_timeout};
use crate::metrics::StepMetrics;
use crate::pipeline::{STEP_THREAD_NAME, Session, StepContext, StepEndpoints, step_loop};
use lbr_transport::ClientApplication;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// 允许的最小端口
pub const PORT_ID_MIN: i32 = 30200;
/// 允许的最大端口
pub const PORT_ID_MAX: i32 = 30209;

/// 默认断开时限
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// 端口是否在 [30200, 30209] 范围内（无效时记录错误日志）
pub fn valid_port(port: i32) -> bool {
    if !(PORT_ID_MIN..=PORT_ID_MAX).contains(&port) {
        error!(
            "Invalid port_id {}, must be in range [{}, {}]",
            port, PORT_ID_MIN, PORT_ID_MAX
        );
        return false;
    }
    true
}

/// 当前连接的描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub port_id: u16,
    /// `None` 表示接受任意控制器
    pub remote_host: Option<String>,
}

/// 连接阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    /// 已连接，步进线程在运行（Connected-Running）
    Connected,
    Disconnecting,
}

// 过渡阶段的原子编码；其余时刻由连接标志决定
const PHASE_SETTLED: u8 = 0;
const PHASE_CONNECTING: u8 = 1;
const PHASE_DISCONNECTING: u8 = 2;

#[derive(Default)]
struct Control {
    descriptor: Option<ConnectionDescriptor>,
    step_thread: Option<JoinHandle<()>>,
}

/// 连接管理器
pub struct ConnectionManager<A: ClientApplication> {
    session: Arc<Mutex<Session<A>>>,
    endpoints: StepEndpoints,
    /// 当且仅当步进线程在运行时为 `true`
    connected: Arc<AtomicBool>,
    /// 连接标志已清除、引擎尚未关闭
    close_pending: Arc<AtomicBool>,
    control: Mutex<Control>,
    phase: AtomicU8,
    join_timeout: Duration,
}

impl<A: ClientApplication> ConnectionManager<A> {
    pub fn new(app: A, intermediary: SessionIntermediary, endpoints: StepEndpoints) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session { app, intermediary })),
            endpoints,
            connected: Arc::new(AtomicBool::new(false)),
            close_pending: Arc::new(AtomicBool::new(false)),
            control: Mutex::new(Control::default()),
            phase: AtomicU8::new(PHASE_SETTLED),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }

    /// 设置断开时限（获取引擎锁 + join 步进线程的总时长）
    pub fn with_join_timeout(mut self, join_timeout: Duration) -> Self {
        self.join_timeout = join_timeout;
        self
    }

    pub fn join_timeout(&self) -> Duration {
        self.join_timeout
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> ConnectionPhase {
        match self.phase.load(Ordering::Acquire) {
            PHASE_CONNECTING => ConnectionPhase::Connecting,
            PHASE_DISCONNECTING => ConnectionPhase::Disconnecting,
            _ if self.is_connected() => ConnectionPhase::Connected,
            _ => ConnectionPhase::Disconnected,
        }
    }

    /// 当前连接描述（未连接时为 `None`）
    pub fn descriptor(&self) -> Option<ConnectionDescriptor> {
        let control = self.control.lock();
        if self.is_connected() {
            control.descriptor.clone()
        } else {
            None
        }
    }

    /// 打开连接并启动步进线程
    ///
    /// # 参数
    /// - `port`: 本地端口，必须在 [30200, 30209] 内
    /// - `remote_host`: 控制器地址，`None` 或空字符串表示任意
    ///
    /// # 返回
    /// - `Ok(true)`: 已连接（包括此前已经连接的情况，不会重复打开）
    /// - `Ok(false)`: 引擎打开失败
    ///
    /// # 错误
    /// - `DriverError::InvalidPort`: 端口越界，不会触碰引擎
    /// - `DriverError::JoinTimeout`: 上一个步进线程在时限内仍未退出
    /// - `DriverError::Io`: 步进线程创建失败
    pub fn connect(&self, port: i32, remote_host: Option<&str>) -> Result<bool, DriverError> {
        let mut control = self.control.lock();
        self.reap(&mut control);

        if self.is_connected() {
            info!(
                "Connection already open on port {:?}, ignoring connect request",
                control.descriptor.as_ref().map(|d| d.port_id)
            );
            return Ok(true);
        }

        if !valid_port(port) {
            return Err(DriverError::InvalidPort(port));
        }

        // 上一个步进线程正在自行断开，等待它结束
        if let Some(handle) = control.step_thread.take()
            && let Err(e) = handle.join_timeout(self.join_timeout)
        {
            if is_timeout(e.as_ref()) {
                error!("Previous step thread is still running, refusing to connect");
                return Err(DriverError::JoinTimeout(self.join_timeout));
            }
            error!("Step thread panicked");
        }

        self.phase.store(PHASE_CONNECTING, Ordering::Release);
        let result = self.open(&mut control, port as u16, remote_host.filter(|h| !h.is_empty()));
        self.phase.store(PHASE_SETTLED, Ordering::Release);
        result
    }

    fn open(
        &self,
        control: &mut Control,
        port: u16,
        remote_host: Option<&str>,
    ) -> Result<bool, DriverError> {
        info!(
            "Opening FRI connection on port {} (remote host: {})",
            port,
            remote_host.unwrap_or("any")
        );

        {
            // 上一个步进线程仍卡在引擎中时不阻塞
            let Some(mut session) = self.session.try_lock_for(self.join_timeout) else {
                error!("FRI session is still held by a previous step thread");
                return Err(DriverError::JoinTimeout(self.join_timeout));
            };
            // 上一个步进线程异常退出时可能留下未关闭的引擎
            if self.close_pending.swap(false, Ordering::AcqRel) {
                session.app.disconnect();
                StepMetrics::inc(&self.endpoints.metrics.disconnects);
            }
            session.intermediary.reset_session();
            if !session.app.connect(port, remote_host) {
                warn!("Failed to open FRI connection on port {}", port);
                return Ok(false);
            }
        }

        self.connected.store(true, Ordering::Release);

        let ctx = StepContext {
            session: self.session.clone(),
            endpoints: self.endpoints.clone(),
            connected: self.connected.clone(),
            close_pending: self.close_pending.clone(),
        };
        let handle = match std::thread::Builder::new()
            .name(STEP_THREAD_NAME.into())
            .spawn(move || step_loop(ctx))
        {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to spawn step thread: {}", e);
                self.connected.store(false, Ordering::Release);
                self.session.lock().app.disconnect();
                return Err(e.into());
            },
        };

        control.descriptor = Some(ConnectionDescriptor {
            port_id: port,
            remote_host: remote_host.map(str::to_string),
        });
        control.step_thread = Some(handle);
        StepMetrics::inc(&self.endpoints.metrics.connects);
        info!("FRI connection opened on port {}", port);
        Ok(true)
    }

    /// 断开连接并在时限内 join 步进线程
    ///
    /// # 返回
    /// - `Ok(true)`: 已断开（包括此前已经断开的情况）
    ///
    /// # 错误
    /// - `DriverError::JoinTimeout`: 时限内未能获取引擎或步进线程未退出
    pub fn disconnect(&self) -> Result<bool, DriverError> {
        let mut control = self.control.lock();

        // 先清除标志，步进线程在下一个周期退出
        if !self.connected.swap(false, Ordering::AcqRel) {
            info!("Connection already closed");
            self.reap(&mut control);
            return Ok(true);
        }

        self.close_pending.store(true, Ordering::Release);
        self.phase.store(PHASE_DISCONNECTING, Ordering::Release);
        let result = self.close(&mut control);
        self.phase.store(PHASE_SETTLED, Ordering::Release);
        result
    }

    fn close(&self, control: &mut Control) -> Result<bool, DriverError> {
        let deadline = Instant::now() + self.join_timeout;
        info!("Closing FRI connection");

        match self.session.try_lock_for(self.join_timeout) {
            Some(mut session) => {
                // 步进线程可能已在退出时关闭了引擎
                if self.close_pending.swap(false, Ordering::AcqRel) {
                    session.app.disconnect();
                    StepMetrics::inc(&self.endpoints.metrics.disconnects);
                }
            },
            None => {
                // close_pending 保持置位，步进线程恢复后关闭引擎
                control.descriptor = None;
                error!(
                    "Could not acquire FRI session within {:?}, step thread is stuck",
                    self.join_timeout
                );
                return Err(DriverError::JoinTimeout(self.join_timeout));
            },
        }
        control.descriptor = None;

        if let Some(handle) = control.step_thread.take() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Err(e) = handle.join_timeout(remaining) {
                if is_timeout(e.as_ref()) {
                    error!(
                        "Step thread did not terminate within {:?}",
                        self.join_timeout
                    );
                    return Err(DriverError::JoinTimeout(self.join_timeout));
                }
                error!("Step thread panicked");
            }
        }

        info!("FRI connection closed");
        Ok(true)
    }

    /// 回收已经自行退出的步进线程
    fn reap(&self, control: &mut Control) {
        if let Some(handle) = control.step_thread.take_if(|h| h.is_finished()) {
            if handle.join().is_err() {
                error!("Step thread panicked");
            }
            if !self.is_connected() {
                control.descriptor = None;
            }
        }
    }
}

impl<A: ClientApplication> Drop for ConnectionManager<A> {
    fn drop(&mut self) {
        if self.is_connected()
            && let Err(e) = self.disconnect()
        {
            error!("Failed to disconnect on drop: {}", e);
        }
    }
}
