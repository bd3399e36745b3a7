//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 调度器自检
//!
//! 启动时（`unit-test` 特性）或 `cargo test` 下运行，每一步之后检查环结构。
//! 检查失败直接停机。

use crate::config::LOW_QUANTUM;
use crate::errno::SchedResult;
use crate::println;
use crate::sched::{verify, CheckFlags, ContextSwitch, Pid, SchedClass, Scheduler, TaskState, PID_IDLE};

/// 统计切换原语被调用的情况
#[derive(Default)]
struct SwitchProbe {
    calls: usize,
    last: Option<Pid>,
}

impl ContextSwitch for SwitchProbe {
    fn switch_to(&mut self, pid: Pid) {
        self.calls += 1;
        self.last = Some(pid);
    }
}

/// 运行全部自检
pub fn run() -> SchedResult<()> {
    println!("test: ===== Starting scheduler self-test =====");
    test_lifecycle()?;
    test_wakeup_from_idle()?;
    test_single_task()?;
    test_round_robin()?;
    println!("test: ===== Scheduler self-test completed =====");
    Ok(())
}

// 加载、选择、阻塞、唤醒
fn test_lifecycle() -> SchedResult<()> {
    let mut sched = Scheduler::new(SwitchProbe::default());

    println!("test: 1. load two tasks...");
    sched.load(1)?;
    sched.load(2)?;
    sched.check_invariants(CheckFlags::STRUCTURE)?;
    verify(sched.expect_ring_len(SchedClass::Low, 2));
    verify(sched.expect_head(SchedClass::Low, 1));
    verify(sched.expect_links(1, 2, 2));
    verify(sched.expect_links(2, 1, 1));
    verify(sched.expect_current(PID_IDLE));
    println!("test:    SUCCESS - low ring = {{1, 2}}");

    println!("test: 2. first tick...");
    sched.tick()?;
    sched.check_invariants(CheckFlags::all())?;
    verify(sched.expect_current(1));
    verify(sched.expect_quantum(LOW_QUANTUM));
    println!("test:    SUCCESS - pid 1 selected");

    println!("test: 3. block current...");
    sched.block()?;
    sched.check_invariants(CheckFlags::all())?;
    verify(sched.expect_state(1, TaskState::Blocked));
    verify(sched.expect_class(1, None));
    verify(sched.expect_current(2));
    verify(sched.expect_ring_len(SchedClass::Low, 1));
    println!("test:    SUCCESS - pid 1 blocked, pid 2 running");

    println!("test: 4. unblock while busy...");
    sched.unblock(1)?;
    sched.check_invariants(CheckFlags::STRUCTURE)?;
    verify(sched.expect_class(1, Some(SchedClass::RealTime)));
    verify(sched.expect_head(SchedClass::RealTime, 1));
    verify(sched.expect_links(1, 1, 1));
    verify(sched.expect_current(2));
    assert_eq!(sched.switcher().calls, 0, "no context switch while busy");
    println!("test:    SUCCESS - pid 1 promoted, pid 2 keeps running");

    sched.show_tasks(0..4);
    Ok(())
}

// 空闲时唤醒立即切换
fn test_wakeup_from_idle() -> SchedResult<()> {
    println!("test: 5. unblock from idle...");
    let mut sched = Scheduler::new(SwitchProbe::default());
    sched.create_blocked(5)?;
    sched.unblock(5)?;
    sched.check_invariants(CheckFlags::all())?;
    verify(sched.expect_current(5));
    verify(sched.expect_quantum(LOW_QUANTUM));

    let probe = sched.switcher();
    assert!(probe.calls == 1 && probe.last == Some(5), "switch_to(5) expected exactly once");
    println!("test:    SUCCESS - switched to pid 5");
    Ok(())
}

// 单个任务时间片用完后重新选中自己
fn test_single_task() -> SchedResult<()> {
    println!("test: 6. single task quantum...");
    let mut sched = Scheduler::new(SwitchProbe::default());
    sched.load(7)?;
    sched.tick()?;

    for _ in 0..LOW_QUANTUM - 1 {
        sched.tick()?;
        verify(sched.expect_current(7));
    }
    sched.tick()?;
    sched.check_invariants(CheckFlags::all())?;
    verify(sched.expect_current(7));
    verify(sched.expect_quantum(LOW_QUANTUM));
    verify(sched.expect_class(7, Some(SchedClass::Low)));
    println!("test:    SUCCESS - pid 7 reselected");
    Ok(())
}

// 三个 LOW 任务按到达顺序轮转
fn test_round_robin() -> SchedResult<()> {
    println!("test: 7. round robin...");
    let mut sched = Scheduler::new(SwitchProbe::default());
    for pid in 1..=3 {
        sched.load(pid)?;
    }

    let mut order = [PID_IDLE; 3];
    let mut seen = 0;
    let mut prev = sched.current_pid();
    for _ in 0..3 * LOW_QUANTUM {
        let pid = sched.tick()?;
        sched.check_invariants(CheckFlags::all())?;
        if pid != prev {
            if seen < order.len() {
                order[seen] = pid;
            }
            seen += 1;
            prev = pid;
        }
    }
    assert_eq!(seen, 3, "each task should be selected once per rotation");
    assert_eq!(order, [1, 2, 3], "tasks should run in arrival order");
    println!("test:    SUCCESS - order 1, 2, 3");
    Ok(())
}
