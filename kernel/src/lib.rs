//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! mqsched: 保护模式小内核的 CPU 调度器
//!
//! 固定容量的任务表 + 两个优先级环 (REALTIME / LOW)，
//! 由时钟中断和 trap 层驱动，只决定下一个运行的 PID。

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod errno;
pub mod logger;
pub mod print;
pub mod sched;

#[cfg(any(test, feature = "unit-test"))]
pub mod selftest;

pub use errno::{Errno, SchedError, SchedResult};
pub use sched::{Pid, SchedClass, Scheduler, TaskState, PID_IDLE};

/// 启动调度器
///
/// 启动核在开中断之前调用：注册控制台和日志，初始化全局调度器，
/// 启用 `unit-test` 时先运行自检。
pub fn boot(console: &'static dyn print::Console, switch_to: fn(Pid)) -> SchedResult<()> {
    logger::init(console, logger::level_from_config());
    log::info!(
        "{} {}: max_tasks={} rt_quantum={} low_quantum={}",
        config::KERNEL_NAME,
        config::KERNEL_VERSION,
        config::MAX_TASKS,
        config::RT_QUANTUM,
        config::LOW_QUANTUM
    );

    #[cfg(feature = "unit-test")]
    selftest::run()?;

    sched::init(switch_to)
}
