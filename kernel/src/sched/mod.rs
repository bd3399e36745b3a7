//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 调度器模块
//!
//! 两级优先级 (REALTIME / LOW) 的轮转调度器：
//! - task:  任务表 (PID 下标，固定容量)
//! - ring:  穿过任务表的两个优先级环
//! - sched: 调度状态机和选择算法
//! - stats: 调度计数
//! - diag:  诊断和不变式检查
//!
//! 本模块持有全局调度器实例。所有入口都获取同一把锁，
//! 这把锁就是调度器的临界区；在真实硬件上调用者还需要屏蔽中断，
//! 避免时钟中断在持锁期间重入 `tick`。

pub mod diag;
pub mod ring;
pub mod sched;
pub mod stats;
pub mod task;

use log::info;
use spin::Mutex;

use crate::errno::{SchedError, SchedResult};

pub use diag::{verify, CheckFlags, Discrepancy, TaskSnapshot};
pub use ring::PriorityRings;
pub use sched::{ContextSwitch, Scheduler};
pub use stats::SchedStats;
pub use task::{Pid, SchedClass, TaskRecord, TaskState, TaskTable, PID_IDLE};

/// 延迟的上下文切换
///
/// 全局调度器在锁内只记录切换目标，释放锁之后才真正调用切换原语，
/// 切换到的任务可以立即重新进入调度器。
#[derive(Debug, Default)]
pub struct PendingSwitch {
    target: Option<Pid>,
}

impl PendingSwitch {
    fn take(&mut self) -> Option<Pid> {
        self.target.take()
    }
}

impl ContextSwitch for PendingSwitch {
    fn switch_to(&mut self, pid: Pid) {
        self.target = Some(pid);
    }
}

struct GlobalScheduler {
    sched: Scheduler<PendingSwitch>,
    switch_to: fn(Pid),
}

static SCHEDULER: Mutex<Option<GlobalScheduler>> = Mutex::new(None);

const NOT_INITIALIZED: SchedError = SchedError::InvalidOperation("scheduler not initialized");

fn with_global<R>(f: impl FnOnce(&mut Scheduler<PendingSwitch>) -> SchedResult<R>) -> SchedResult<R> {
    let mut guard = SCHEDULER.lock();
    let global = guard.as_mut().ok_or(NOT_INITIALIZED)?;
    f(&mut global.sched)
}

/// 初始化调度器
///
/// 启动时、开中断之前调用一次。`switch_to` 是加载器提供的上下文切换原语。
pub fn init(switch_to: fn(Pid)) -> SchedResult<()> {
    let mut guard = SCHEDULER.lock();
    if guard.is_some() {
        return Err(SchedError::InvalidOperation("scheduler already initialized"));
    }
    *guard = Some(GlobalScheduler {
        sched: Scheduler::new(PendingSwitch::default()),
        switch_to,
    });
    info!("sched: initialized");
    Ok(())
}

/// 新任务加入调度 (LOW)
pub fn load(pid: Pid) -> SchedResult<()> {
    with_global(|s| s.load(pid))
}

/// 创建一个初始即阻塞的任务
pub fn create_blocked(pid: Pid) -> SchedResult<()> {
    with_global(|s| s.create_blocked(pid))
}

/// 回收已结束任务的槽位
pub fn reap(pid: Pid) -> SchedResult<()> {
    with_global(|s| s.reap(pid))
}

/// 唤醒阻塞的任务
///
/// 系统空闲时在返回之前切换到被唤醒的任务，切换发生在锁外。
pub fn unblock(pid: Pid) -> SchedResult<()> {
    let (target, switch_to) = {
        let mut guard = SCHEDULER.lock();
        let global = guard.as_mut().ok_or(NOT_INITIALIZED)?;
        global.sched.unblock(pid)?;
        (global.sched.switcher_mut().take(), global.switch_to)
    };

    if let Some(pid) = target {
        switch_to(pid);
    }
    Ok(())
}

/// 当前任务阻塞，返回下一个运行的 PID
pub fn block() -> SchedResult<Pid> {
    with_global(|s| s.block())
}

/// 当前任务结束，返回下一个运行的 PID
pub fn exit() -> SchedResult<Pid> {
    with_global(|s| s.exit())
}

/// 时钟中断入口，返回下一个运行的 PID
///
/// 返回值与调用前的 `current_pid` 不同时，由调用者执行上下文切换。
pub fn tick() -> SchedResult<Pid> {
    with_global(|s| s.tick())
}

pub fn current_pid() -> SchedResult<Pid> {
    with_global(|s| Ok(s.current_pid()))
}

/// 在临界区内只读访问调度器（诊断用）
pub fn with_scheduler<R>(f: impl FnOnce(&Scheduler<PendingSwitch>) -> R) -> SchedResult<R> {
    let guard = SCHEDULER.lock();
    let global = guard.as_ref().ok_or(NOT_INITIALIZED)?;
    Ok(f(&global.sched))
}

#[cfg(test)]
pub(crate) fn reset() {
    *SCHEDULER.lock() = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    static SWITCHES: Mutex<Vec<Pid>> = Mutex::new(Vec::new());

    fn record_switch(pid: Pid) {
        // 切换时调度器锁已经释放
        assert_eq!(current_pid(), Ok(pid));
        SWITCHES.lock().push(pid);
    }

    fn setup() {
        reset();
        SWITCHES.lock().clear();
        init(record_switch).unwrap();
    }

    #[test]
    #[serial]
    fn test_calls_before_init_rejected() {
        reset();
        assert_eq!(load(1), Err(NOT_INITIALIZED));
        assert_eq!(tick(), Err(NOT_INITIALIZED));
        assert!(with_scheduler(|s| s.current_pid()).is_err());
    }

    #[test]
    #[serial]
    fn test_init_twice_rejected() {
        setup();
        assert!(matches!(init(record_switch), Err(SchedError::InvalidOperation(_))));
    }

    #[test]
    #[serial]
    fn test_global_lifecycle() {
        setup();
        load(1).unwrap();
        load(2).unwrap();
        assert_eq!(tick(), Ok(1));
        assert_eq!(block(), Ok(2));
        assert_eq!(exit(), Ok(PID_IDLE));

        with_scheduler(|s| {
            assert_eq!(s.task(2).unwrap().state(), TaskState::Finished);
            assert!(s.check_invariants(CheckFlags::all()).is_ok());
        })
        .unwrap();

        reap(2).unwrap();
        assert!(SWITCHES.lock().is_empty());
    }

    #[test]
    #[serial]
    fn test_unblock_from_idle_switches_outside_lock() {
        setup();
        create_blocked(5).unwrap();
        unblock(5).unwrap();

        assert_eq!(*SWITCHES.lock(), [5]);
        assert_eq!(current_pid(), Ok(5));
    }

    #[test]
    #[serial]
    fn test_unblock_while_busy_does_not_switch() {
        setup();
        load(1).unwrap();
        create_blocked(3).unwrap();
        tick().unwrap();

        unblock(3).unwrap();
        assert!(SWITCHES.lock().is_empty());
        assert_eq!(current_pid(), Ok(1));
        assert_eq!(with_scheduler(|s| s.head(SchedClass::RealTime)), Ok(3));
    }

    #[test]
    #[serial]
    fn test_rejected_call_leaves_state() {
        setup();
        assert!(matches!(block(), Err(SchedError::InvalidOperation(_))));
        assert_eq!(unblock(4), Err(SchedError::InvalidPid(4)));
        assert_eq!(current_pid(), Ok(PID_IDLE));
    }
}
