//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 调度器核心
//!
//! 两级优先级 + 同级轮转 (round robin)：
//! - REALTIME 环非空时只调度 REALTIME 任务
//! - REALTIME 为空时调度 LOW 环
//! - 两个环都为空时运行 idle (PID 0)
//!
//! 生命周期事件：
//! - load:    新任务进入 LOW 环
//! - unblock: 被唤醒的任务总是进入 REALTIME 环；系统空闲时立即切换过去
//! - block / exit: 当前任务出环，重新选择
//! - tick:    时间片用完的任务出环并降级到 LOW 环尾部，然后重新选择
//!
//! 调度器不做上下文切换，只决定下一个运行的 PID；
//! 唯一的例外是从 idle 唤醒时直接调用 `ContextSwitch::switch_to`。

use log::{debug, trace, warn};

use crate::config::{LOW_QUANTUM, RT_QUANTUM};
use crate::errno::{SchedError, SchedResult};

use super::ring::PriorityRings;
use super::stats::SchedStats;
use super::task::{Pid, SchedClass, TaskRecord, TaskState, TaskTable, PID_IDLE};

/// 上下文切换原语，由加载器 / trap 层提供
pub trait ContextSwitch {
    /// 把 CPU 交给 `pid`
    fn switch_to(&mut self, pid: Pid);
}

impl<F: FnMut(Pid)> ContextSwitch for F {
    fn switch_to(&mut self, pid: Pid) {
        self(pid)
    }
}

/// 调度器状态
///
/// 单实例，所有入口都需要在同一个临界区内调用（见 `sched` 模块的全局句柄）。
pub struct Scheduler<S: ContextSwitch> {
    tasks: TaskTable,
    rings: PriorityRings,
    /// 当前运行的任务，0 表示 idle
    current: Pid,
    /// 当前任务剩余的滴答数
    quantum: u32,
    stats: SchedStats,
    switcher: S,
}

impl<S: ContextSwitch> Scheduler<S> {
    /// 初始化：两个环为空，运行 idle，quantum = LOW_QUANTUM
    pub fn new(switcher: S) -> Self {
        Self {
            tasks: TaskTable::new(),
            rings: PriorityRings::new(),
            current: PID_IDLE,
            quantum: LOW_QUANTUM,
            stats: SchedStats::new(),
            switcher,
        }
    }

    /// 新任务加入调度，所有任务都从 LOW 开始
    ///
    /// `pid` 必须是空槽位或已结束 (Finished) 的槽位。
    pub fn load(&mut self, pid: Pid) -> SchedResult<()> {
        let prior = self
            .tasks
            .slot(pid)
            .and_then(|prior| self.tasks.install(pid, TaskState::Running).map(|_| prior))
            .map_err(|e| {
                warn!("sched: load({}) rejected: {}", pid, e);
                e
            })?;

        if let Err(e) = self.rings.enqueue(&mut self.tasks, pid, SchedClass::Low) {
            // 回滚：加载器还没看到的 Finished 记录原样保留
            self.tasks.restore(pid, prior)?;
            return Err(e);
        }

        debug!("sched: load pid={} -> low", pid);
        Ok(())
    }

    /// 加载器创建一个初始即阻塞的任务，等待以后 `unblock`
    pub fn create_blocked(&mut self, pid: Pid) -> SchedResult<()> {
        self.tasks.install(pid, TaskState::Blocked)?;
        debug!("sched: create pid={} blocked", pid);
        Ok(())
    }

    /// 加载器回收已结束任务的槽位
    pub fn reap(&mut self, pid: Pid) -> SchedResult<()> {
        if pid == PID_IDLE {
            return Err(SchedError::InvalidOperation("idle task cannot be reaped"));
        }
        if self.tasks.get(pid)?.state() != TaskState::Finished {
            return Err(SchedError::InvalidOperation("only finished tasks can be reaped"));
        }
        self.tasks.release(pid)?;
        debug!("sched: reap pid={}", pid);
        Ok(())
    }

    /// 唤醒阻塞的任务
    ///
    /// 被唤醒的任务总是进入 REALTIME 环，不管它阻塞前属于哪一级。
    /// 如果系统正在运行 idle，立即把 CPU 切换给它，不等下一个 tick。
    /// idle 期间 quantum 总是 LOW_QUANTUM，被唤醒的任务沿用它。
    pub fn unblock(&mut self, pid: Pid) -> SchedResult<()> {
        if pid == PID_IDLE {
            return Err(SchedError::InvalidOperation("idle task cannot be unblocked"));
        }
        if self.tasks.get(pid)?.state() != TaskState::Blocked {
            warn!("sched: unblock({}) rejected: task is not blocked", pid);
            return Err(SchedError::InvalidOperation("task is not blocked"));
        }

        self.rings.enqueue(&mut self.tasks, pid, SchedClass::RealTime)?;
        self.stats.promotions += 1;
        debug!("sched: unblock pid={} -> realtime", pid);

        if self.current == PID_IDLE {
            self.current = pid;
            self.stats.switches += 1;
            debug!("sched: idle wakeup, switch to pid={}", pid);
            self.switcher.switch_to(pid);
        }
        Ok(())
    }

    /// 当前任务阻塞，返回新的 current_pid
    pub fn block(&mut self) -> SchedResult<Pid> {
        if self.current == PID_IDLE {
            warn!("sched: block() called from idle");
            return Err(SchedError::InvalidOperation("idle task cannot block"));
        }
        let pid = self.rings.dequeue(&mut self.tasks, self.current, TaskState::Blocked)?;
        self.stats.blocks += 1;
        debug!("sched: block pid={}", pid);
        self.update_current_pid()
    }

    /// 当前任务结束，返回新的 current_pid
    ///
    /// 槽位保持 Finished，直到加载器调用 `reap` 或重新 `load`。
    pub fn exit(&mut self) -> SchedResult<Pid> {
        if self.current == PID_IDLE {
            warn!("sched: exit() called from idle");
            return Err(SchedError::InvalidOperation("idle task cannot exit"));
        }
        let pid = self.rings.dequeue(&mut self.tasks, self.current, TaskState::Finished)?;
        self.stats.exits += 1;
        debug!("sched: exit pid={}", pid);
        self.update_current_pid()
    }

    /// 时钟中断
    ///
    /// - 时间片未用完：继续运行当前任务
    /// - 时间片用完：当前任务出环并降级到 LOW 环尾部，然后重新选择
    /// - idle：每个 tick 都重新选择，新就绪的任务最多等待一个 tick
    pub fn tick(&mut self) -> SchedResult<Pid> {
        self.stats.ticks += 1;

        if self.current != PID_IDLE {
            self.quantum = self.quantum.saturating_sub(1);
            if self.quantum > 0 {
                return Ok(self.current);
            }

            // 降级：即使本来就是 LOW 也重新入队，移到环尾
            let pid = self.rings.dequeue(&mut self.tasks, self.current, TaskState::Running)?;
            self.rings.enqueue(&mut self.tasks, pid, SchedClass::Low)?;
            self.stats.demotions += 1;
            trace!("sched: pid={} quantum expired -> low", pid);
        } else {
            self.stats.idle_ticks += 1;
        }

        self.update_current_pid()
    }

    /// 选择算法：按优先级选出下一个任务并重置时间片
    ///
    /// 选中的任务留在环中，环头前进一格，实现同级轮转。
    pub fn update_current_pid(&mut self) -> SchedResult<Pid> {
        let prev = self.current;

        let next = match self.rings.rotate(&self.tasks, SchedClass::RealTime)? {
            Some(pid) => {
                self.quantum = RT_QUANTUM;
                pid
            }
            None => {
                self.quantum = LOW_QUANTUM;
                self.rings
                    .rotate(&self.tasks, SchedClass::Low)?
                    .unwrap_or(PID_IDLE)
            }
        };

        self.current = next;
        self.stats.selections += 1;
        if next != prev {
            self.stats.switches += 1;
        }
        trace!("sched: select pid={} quantum={} (prev={})", next, self.quantum, prev);
        Ok(next)
    }

    /// 当前运行的任务
    #[inline]
    pub fn current_pid(&self) -> Pid {
        self.current
    }

    /// 当前任务剩余时间片
    #[inline]
    pub fn quantum(&self) -> u32 {
        self.quantum
    }

    /// 环头，空环为 0
    #[inline]
    pub fn head(&self, class: SchedClass) -> Pid {
        self.rings.head(class)
    }

    pub fn task(&self, pid: Pid) -> SchedResult<&TaskRecord> {
        self.tasks.get(pid)
    }

    pub fn tasks(&self) -> &TaskTable {
        &self.tasks
    }

    pub fn rings(&self) -> &PriorityRings {
        &self.rings
    }

    pub fn stats(&self) -> &SchedStats {
        &self.stats
    }

    pub fn switcher(&self) -> &S {
        &self.switcher
    }

    pub fn switcher_mut(&mut self) -> &mut S {
        &mut self.switcher
    }
}
