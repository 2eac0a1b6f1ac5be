//! 命令收件箱属性测试
//!
//! - 任意写入序列之后的读取返回最后一次写入
//! - reset 之后的读取为空，直到下一次写入
//! - 并发写入时读取到的总是某次完整写入的值

use lbr_driver::CommandInbox;
use lbr_protocol::{LbrCommand, N_JOINTS};
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn command_strategy() -> impl Strategy<Value = LbrCommand> {
    (
        proptest::array::uniform7(-3.0f64..3.0),
        proptest::array::uniform7(-100.0f64..100.0),
    )
        .prop_map(|(position, torque)| LbrCommand::torque(position, torque))
}

#[derive(Debug, Clone)]
enum Op {
    Write(LbrCommand),
    Reset,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => command_strategy().prop_map(Op::Write),
        1 => Just(Op::Reset),
    ]
}

proptest! {
    #[test]
    fn prop_last_write_wins(writes in proptest::collection::vec(command_strategy(), 1..50)) {
        let inbox = CommandInbox::new();
        for w in &writes {
            inbox.write_value(*w);
        }
        let read = inbox.read();
        prop_assert_eq!(read.as_deref(), writes.last());
    }

    #[test]
    fn prop_reset_empties_until_next_write(
        before in proptest::collection::vec(command_strategy(), 0..10),
        extra_reads in 1usize..5,
        after in command_strategy(),
    ) {
        let inbox = CommandInbox::new();
        for w in &before {
            inbox.write_value(*w);
        }
        inbox.reset();
        for _ in 0..extra_reads {
            prop_assert!(inbox.read().is_none());
        }
        inbox.write_value(after);
        let read = inbox.read();
        prop_assert_eq!(read.as_deref(), Some(&after));
    }

    #[test]
    fn prop_matches_single_slot_model(ops in proptest::collection::vec(op_strategy(), 0..64)) {
        let inbox = CommandInbox::new();
        let mut model: Option<LbrCommand> = None;
        for op in ops {
            match op {
                Op::Write(command) => {
                    inbox.write_value(command);
                    model = Some(command);
                },
                Op::Reset => {
                    inbox.reset();
                    model = None;
                },
            }
            let read = inbox.read();
            prop_assert_eq!(read.as_deref(), model.as_ref());
        }
    }
}

#[test]
fn test_concurrent_writes_never_tear() {
    let inbox = Arc::new(CommandInbox::new());
    let stop = Arc::new(AtomicBool::new(false));

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let inbox = inbox.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                let mut i = 0u32;
                while !stop.load(Ordering::SeqCst) {
                    // 同一条命令的所有分量相同，读到混合值即为撕裂
                    let value = f64::from(w * 1_000_000 + i % 1_000_000);
                    inbox.write_value(LbrCommand::torque([value; N_JOINTS], [value; N_JOINTS]));
                    i += 1;
                }
            })
        })
        .collect();

    let mut reads = 0;
    while reads < 10_000 {
        if let Some(command) = inbox.read() {
            let first = command.joint_position[0];
            assert!(command.joint_position.iter().all(|v| *v == first));
            assert!(command.torque.iter().all(|v| *v == first));
            reads += 1;
        }
        if reads % 100 == 0 {
            inbox.reset();
        }
    }

    stop.store(true, Ordering::SeqCst);
    for w in writers {
        w.join().unwrap();
    }
}
