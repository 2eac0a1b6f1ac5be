//! ConnectionManager 集成测试
//!
//! 直接驱动连接管理器（不经过 AppNode 的服务转换），检查错误类型和时限。

use lbr_driver::{
    CommandInbox, ConnectionManager, ConnectionPhase, DriverError, SessionIntermediary,
    StateOutbox, StepEndpoints, StepMetrics,
};
use lbr_protocol::{CommandGuard, LbrState, N_JOINTS};
use lbr_transport::{MockApplication, MockHandle};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

fn guard() -> CommandGuard {
    let mut content = String::from("name = \"test\"\n");
    for i in 0..N_JOINTS {
        content.push_str(&format!(
            "\n[[joints]]\nname = \"A{}\"\nlower = -2.9\nupper = 2.9\nvelocity = 1.7\neffort = 100.0\n",
            i + 1
        ));
    }
    CommandGuard::from_description(&content).unwrap()
}

fn manager(
    join_timeout: Duration,
) -> (ConnectionManager<MockApplication>, MockHandle, StepEndpoints) {
    let (app, handle) = MockApplication::new();
    let metrics = Arc::new(StepMetrics::new());
    let endpoints = StepEndpoints {
        inbox: Arc::new(CommandInbox::with_metrics(metrics.clone())),
        outbox: Arc::new(StateOutbox::new(|_: &LbrState| {}).unwrap()),
        metrics,
        shutdown: Arc::new(AtomicBool::new(false)),
    };
    let manager = ConnectionManager::new(app, SessionIntermediary::new(guard()), endpoints.clone())
        .with_join_timeout(join_timeout);
    (manager, handle, endpoints)
}

fn wait_until(timeout: Duration, mut f: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if f() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    f()
}

#[test]
fn test_connect_then_disconnect() {
    let (manager, handle, _endpoints) = manager(Duration::from_secs(1));
    assert_eq!(manager.phase(), ConnectionPhase::Disconnected);

    assert!(manager.connect(30204, Some("")).unwrap());
    assert_eq!(manager.phase(), ConnectionPhase::Connected);
    // 空字符串视为任意地址
    assert_eq!(handle.last_connect(), Some((30204, None)));

    assert!(manager.disconnect().unwrap());
    assert_eq!(manager.phase(), ConnectionPhase::Disconnected);
    assert!(!handle.is_connected());
}

#[test]
fn test_invalid_port_error() {
    let (manager, handle, _endpoints) = manager(Duration::from_secs(1));
    for port in [30199, 30210, 0, -1, 65535] {
        assert!(matches!(
            manager.connect(port, None),
            Err(DriverError::InvalidPort(p)) if p == port
        ));
    }
    assert_eq!(handle.connect_calls(), 0);
}

#[test]
fn test_join_timeout_is_fatal_error() {
    let join_timeout = Duration::from_millis(100);
    let (manager, handle, _endpoints) = manager(join_timeout);
    assert!(manager.connect(30200, None).unwrap());
    assert!(handle.wait_for_steps(3, Duration::from_secs(2)));

    handle.set_stalled(true);
    assert!(wait_until(Duration::from_secs(2), || handle.is_parked()));

    let start = Instant::now();
    let result = manager.disconnect();
    let elapsed = start.elapsed();

    match result {
        Err(DriverError::JoinTimeout(d)) => assert_eq!(d, join_timeout),
        other => panic!("Expected JoinTimeout, got {:?}", other),
    }
    // 整个断开流程受同一个时限约束
    assert!(elapsed < join_timeout * 5, "elapsed: {:?}", elapsed);
    assert!(!manager.is_connected());

    handle.set_stalled(false);
}

#[test]
fn test_engine_closed_after_timed_out_disconnect() {
    let join_timeout = Duration::from_millis(100);
    let (manager, handle, endpoints) = manager(join_timeout);
    assert!(manager.connect(30200, None).unwrap());
    assert!(handle.wait_for_steps(3, Duration::from_secs(2)));

    handle.set_stalled(true);
    assert!(wait_until(Duration::from_secs(2), || handle.is_parked()));
    assert!(matches!(
        manager.disconnect(),
        Err(DriverError::JoinTimeout(_))
    ));
    // 引擎被卡住的步进线程持有，尚未关闭
    assert_eq!(handle.disconnect_calls(), 0);

    handle.set_stalled(false);
    assert!(wait_until(Duration::from_secs(2), || handle.disconnect_calls() == 1));
    assert!(!handle.is_connected());

    // 再次断开是幂等的，不会重复关闭引擎
    assert!(manager.disconnect().unwrap());
    assert_eq!(handle.disconnect_calls(), 1);
    assert_eq!(endpoints.metrics.snapshot().disconnects, 1);

    // 之后可以正常重连
    assert!(manager.connect(30201, None).unwrap());
    assert!(handle.is_connected());
    assert!(manager.disconnect().unwrap());
    assert_eq!(handle.disconnect_calls(), 2);
}

#[test]
fn test_held_outbox_does_not_block_step_loop() {
    let (manager, handle, endpoints) = manager(Duration::from_secs(1));
    assert!(manager.connect(30200, None).unwrap());
    assert!(handle.wait_for_steps(3, Duration::from_secs(2)));

    // 非实时读者长时间持有发布锁
    let held = endpoints.outbox.try_begin_publish().unwrap();
    let steps = handle.step_calls();
    assert!(handle.wait_for_steps(steps + 20, Duration::from_secs(2)));
    let skips_while_held = endpoints.metrics.snapshot().publish_skips;
    drop(held);

    assert!(skips_while_held >= 19);
    assert!(manager.is_connected());
    let published = endpoints.outbox.sequence();
    assert!(wait_until(Duration::from_secs(1), || endpoints.outbox.sequence() > published));

    assert!(manager.disconnect().unwrap());
}

#[test]
fn test_self_disconnect_is_reaped_on_next_connect() {
    let (manager, handle, endpoints) = manager(Duration::from_secs(1));
    handle.fail_at_step(Some(3));
    assert!(manager.connect(30200, None).unwrap());

    assert!(wait_until(Duration::from_secs(2), || !manager.is_connected()));
    assert!(manager.descriptor().is_none());
    assert_eq!(endpoints.metrics.snapshot().step_failures, 1);

    // 立即重连：上一个线程可能仍在收尾
    assert!(manager.connect(30201, None).unwrap());
    assert_eq!(manager.descriptor().unwrap().port_id, 30201);
    assert!(manager.disconnect().unwrap());
    assert_eq!(endpoints.metrics.snapshot().disconnects, 2);
}

#[test]
fn test_drop_disconnects_running_manager() {
    let (manager, handle, _endpoints) = manager(Duration::from_secs(1));
    assert!(manager.connect(30200, None).unwrap());
    drop(manager);
    assert!(!handle.is_connected());
    assert_eq!(handle.disconnect_calls(), 1);
}
