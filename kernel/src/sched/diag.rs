//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 调度器诊断
//!
//! 只读的遍历与断言，供测试和自检使用，正常调度路径不会调用。

use core::fmt;
use core::ops::Range;

use bitflags::bitflags;
use log::{error, info};

use crate::errno::{SchedError, SchedResult};

use super::ring::RingIter;
use super::sched::{ContextSwitch, Scheduler};
use super::task::{Pid, SchedClass, TaskState, PID_IDLE};

/// 单个任务的调度信息快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub pid: Pid,
    pub state: TaskState,
    pub class: Option<SchedClass>,
    pub next: Option<Pid>,
    pub prev: Option<Pid>,
}

impl fmt::Display for TaskSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pid={} state={} class={}",
            self.pid,
            self.state.as_str(),
            self.class.map_or("none", SchedClass::as_str)
        )?;
        if let (Some(next), Some(prev)) = (self.next, self.prev) {
            write!(f, " next={} prev={}", next, prev)?;
        }
        Ok(())
    }
}

/// 断言失败：观察值与期望值不符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discrepancy {
    RingLen { class: SchedClass, observed: usize, expected: usize },
    Head { class: SchedClass, observed: Pid, expected: Pid },
    Current { observed: Pid, expected: Pid },
    Quantum { observed: u32, expected: u32 },
    State { pid: Pid, observed: TaskState, expected: TaskState },
    Class { pid: Pid, observed: Option<SchedClass>, expected: Option<SchedClass> },
    Links { pid: Pid, observed: Option<(Pid, Pid)>, expected: (Pid, Pid) },
    /// 检查过程中遇到的调度器错误
    Error(SchedError),
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class_str = |c: Option<SchedClass>| c.map_or("none", SchedClass::as_str);
        match *self {
            Discrepancy::RingLen { class, observed, expected } => write!(
                f,
                "{} ring length is {}, expected {}",
                class.as_str(),
                observed,
                expected
            ),
            Discrepancy::Head { class, observed, expected } => write!(
                f,
                "{} head is {}, expected {}",
                class.as_str(),
                observed,
                expected
            ),
            Discrepancy::Current { observed, expected } => {
                write!(f, "current pid is {}, expected {}", observed, expected)
            }
            Discrepancy::Quantum { observed, expected } => {
                write!(f, "quantum is {}, expected {}", observed, expected)
            }
            Discrepancy::State { pid, observed, expected } => write!(
                f,
                "pid {} state is {}, expected {}",
                pid,
                observed.as_str(),
                expected.as_str()
            ),
            Discrepancy::Class { pid, observed, expected } => write!(
                f,
                "pid {} class is {}, expected {}",
                pid,
                class_str(observed),
                class_str(expected)
            ),
            Discrepancy::Links { pid, observed: Some((n, p)), expected: (en, ep) } => write!(
                f,
                "pid {} links are next={} prev={}, expected next={} prev={}",
                pid, n, p, en, ep
            ),
            Discrepancy::Links { pid, observed: None, expected: (en, ep) } => write!(
                f,
                "pid {} is unlinked, expected next={} prev={}",
                pid, en, ep
            ),
            Discrepancy::Error(e) => write!(f, "{}", e),
        }
    }
}

impl From<SchedError> for Discrepancy {
    fn from(e: SchedError) -> Self {
        Discrepancy::Error(e)
    }
}

/// 断言结果
pub type DiagResult = Result<(), Discrepancy>;

/// 断言失败即停机
///
/// 记录差异后 panic，环状态不一致时不能继续调度。
#[track_caller]
pub fn verify(result: DiagResult) {
    if let Err(d) = result {
        error!("sched: check failed: {}", d);
        panic!("scheduler check failed: {}", d);
    }
}

bitflags! {
    /// `check_invariants` 要检查的不变式
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CheckFlags: u32 {
        /// 每个环成员满足 next[prev[t]] == t 且 prev[next[t]] == t
        const LINKS      = 1 << 0;
        /// 已链接的任务恰好出现在它所属的环中一次，未链接的任务不在任何环中
        const MEMBERSHIP = 1 << 1;
        /// current == 0 时两个环都为空（仅在选择之后成立）
        const IDLE       = 1 << 2;
        /// current != 0 时 quantum > 0
        const QUANTUM    = 1 << 3;
        /// REALTIME 非空时 current 是 REALTIME 成员（仅在选择之后成立）
        const PRIORITY   = 1 << 4;

        /// 任何时刻都成立的结构不变式
        const STRUCTURE  = Self::LINKS.bits() | Self::MEMBERSHIP.bits() | Self::QUANTUM.bits();
    }
}

impl<S: ContextSwitch> Scheduler<S> {
    /// 从环头开始遍历 `class` 环
    pub fn ring_members(&self, class: SchedClass) -> RingIter<'_> {
        self.rings().iter(self.tasks(), class)
    }

    /// 环长度，遍历不闭合时返回 `RingCorrupted`
    pub fn ring_len(&self, class: SchedClass) -> SchedResult<usize> {
        let mut len = 0;
        for pid in self.ring_members(class) {
            pid?;
            len += 1;
        }
        Ok(len)
    }

    pub fn snapshot(&self, pid: Pid) -> SchedResult<TaskSnapshot> {
        let task = self.task(pid)?;
        Ok(TaskSnapshot {
            pid,
            state: task.state(),
            class: task.class(),
            next: task.next(),
            prev: task.prev(),
        })
    }

    /// 打印一个任务
    pub fn show_task(&self, pid: Pid) {
        match self.snapshot(pid) {
            Ok(snap) => info!("  {}", snap),
            Err(e) => info!("  pid={} {}", pid, e),
        }
    }

    /// 打印调度器状态和 `pids` 范围内已初始化的任务
    pub fn show_tasks(&self, pids: Range<Pid>) {
        info!(
            "sched: current={} quantum={} realtime_head={} low_head={}",
            self.current_pid(),
            self.quantum(),
            self.head(SchedClass::RealTime),
            self.head(SchedClass::Low)
        );
        for pid in pids.filter(|&p| self.tasks().is_initialized(p)) {
            self.show_task(pid);
        }
        info!("sched: {}", self.stats());
    }

    pub fn expect_ring_len(&self, class: SchedClass, expected: usize) -> DiagResult {
        let observed = self.ring_len(class)?;
        if observed != expected {
            return Err(Discrepancy::RingLen { class, observed, expected });
        }
        Ok(())
    }

    pub fn expect_head(&self, class: SchedClass, expected: Pid) -> DiagResult {
        let observed = self.head(class);
        if observed != expected {
            return Err(Discrepancy::Head { class, observed, expected });
        }
        Ok(())
    }

    pub fn expect_current(&self, expected: Pid) -> DiagResult {
        let observed = self.current_pid();
        if observed != expected {
            return Err(Discrepancy::Current { observed, expected });
        }
        Ok(())
    }

    pub fn expect_quantum(&self, expected: u32) -> DiagResult {
        let observed = self.quantum();
        if observed != expected {
            return Err(Discrepancy::Quantum { observed, expected });
        }
        Ok(())
    }

    pub fn expect_state(&self, pid: Pid, expected: TaskState) -> DiagResult {
        let observed = self.task(pid)?.state();
        if observed != expected {
            return Err(Discrepancy::State { pid, observed, expected });
        }
        Ok(())
    }

    pub fn expect_class(&self, pid: Pid, expected: Option<SchedClass>) -> DiagResult {
        let observed = self.task(pid)?.class();
        if observed != expected {
            return Err(Discrepancy::Class { pid, observed, expected });
        }
        Ok(())
    }

    /// 期望 `pid` 的 (next, prev)
    pub fn expect_links(&self, pid: Pid, next: Pid, prev: Pid) -> DiagResult {
        let observed = self.task(pid)?.link().map(|l| (l.next, l.prev));
        if observed != Some((next, prev)) {
            return Err(Discrepancy::Links { pid, observed, expected: (next, prev) });
        }
        Ok(())
    }

    /// 检查调度器不变式
    ///
    /// 违反任何一条都返回 `RingCorrupted`，调用者应停机。
    pub fn check_invariants(&self, flags: CheckFlags) -> SchedResult<()> {
        if flags.intersects(CheckFlags::LINKS | CheckFlags::MEMBERSHIP) {
            self.check_rings(flags)?;
        }

        let current = self.current_pid();
        if flags.contains(CheckFlags::QUANTUM) && current != PID_IDLE && self.quantum() == 0 {
            error!("sched: pid={} is running with an empty quantum", current);
            return Err(SchedError::RingCorrupted(current));
        }

        if flags.contains(CheckFlags::IDLE) && current == PID_IDLE {
            for class in SchedClass::ALL {
                let head = self.head(class);
                if head != PID_IDLE {
                    error!("sched: idle selected while {} ring is not empty", class.as_str());
                    return Err(SchedError::RingCorrupted(head));
                }
            }
        }

        if flags.contains(CheckFlags::PRIORITY) && !self.rings().is_empty(SchedClass::RealTime) {
            let class = self.task(current)?.class();
            if class != Some(SchedClass::RealTime) {
                error!("sched: pid={} selected while realtime ring is not empty", current);
                return Err(SchedError::RingCorrupted(current));
            }
        }
        Ok(())
    }

    fn check_rings(&self, flags: CheckFlags) -> SchedResult<()> {
        let tasks = self.tasks();
        let mut linked = 0;

        for class in SchedClass::ALL {
            for pid in self.ring_members(class) {
                let pid = pid?;
                let link = tasks.ring_link(pid)?;

                if flags.contains(CheckFlags::MEMBERSHIP) && link.class != class {
                    error!("sched: pid={} on {} ring has class {}", pid, class.as_str(), link.class.as_str());
                    return Err(SchedError::RingCorrupted(pid));
                }
                if flags.contains(CheckFlags::LINKS)
                    && (tasks.ring_link(link.prev)?.next != pid || tasks.ring_link(link.next)?.prev != pid)
                {
                    error!("sched: pid={} has broken links", pid);
                    return Err(SchedError::RingCorrupted(pid));
                }
                linked += 1;
            }
        }

        // 每个已链接的任务都应该在遍历中出现过，且只出现一次
        if flags.contains(CheckFlags::MEMBERSHIP) {
            let expected = tasks.iter().filter(|(_, t)| t.is_linked()).count();
            if linked != expected {
                error!("sched: {} tasks linked but {} reachable from ring heads", expected, linked);
                return Err(SchedError::RingCorrupted(self.current_pid()));
            }
            if let Some((pid, _)) = tasks.iter().find(|(pid, t)| *pid == PID_IDLE && t.is_linked()) {
                return Err(SchedError::RingCorrupted(pid));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LOW_QUANTUM, RT_QUANTUM};

    fn no_switch(_: Pid) {}

    fn new_sched() -> Scheduler<fn(Pid)> {
        Scheduler::new(no_switch as fn(Pid))
    }

    #[test]
    fn test_ring_len_and_members() {
        let mut sched = new_sched();
        for pid in [3, 1, 2] {
            sched.load(pid).unwrap();
        }
        assert_eq!(sched.ring_len(SchedClass::Low), Ok(3));
        assert_eq!(sched.ring_len(SchedClass::RealTime), Ok(0));

        let members: Vec<Pid> = sched
            .ring_members(SchedClass::Low)
            .collect::<SchedResult<_>>()
            .unwrap();
        assert_eq!(members, [3, 1, 2]);
    }

    #[test]
    fn test_snapshot() {
        let mut sched = new_sched();
        sched.load(1).unwrap();
        sched.create_blocked(2).unwrap();

        let snap = sched.snapshot(1).unwrap();
        assert_eq!(snap.class, Some(SchedClass::Low));
        assert_eq!((snap.next, snap.prev), (Some(1), Some(1)));
        assert_eq!(snap.to_string(), "pid=1 state=running class=low next=1 prev=1");

        let snap = sched.snapshot(2).unwrap();
        assert_eq!(snap.to_string(), "pid=2 state=blocked class=none");
        assert_eq!(sched.snapshot(9), Err(SchedError::InvalidPid(9)));
    }

    #[test]
    fn test_expectations() {
        let mut sched = new_sched();
        sched.load(1).unwrap();
        sched.load(2).unwrap();

        assert!(sched.expect_ring_len(SchedClass::Low, 2).is_ok());
        assert!(sched.expect_head(SchedClass::Low, 1).is_ok());
        assert!(sched.expect_links(1, 2, 2).is_ok());
        assert!(sched.expect_current(PID_IDLE).is_ok());
        assert!(sched.expect_quantum(LOW_QUANTUM).is_ok());
        assert!(sched.expect_state(2, TaskState::Running).is_ok());
        assert!(sched.expect_class(2, Some(SchedClass::Low)).is_ok());

        assert_eq!(
            sched.expect_ring_len(SchedClass::RealTime, 1),
            Err(Discrepancy::RingLen { class: SchedClass::RealTime, observed: 0, expected: 1 })
        );
        assert_eq!(
            sched.expect_current(1),
            Err(Discrepancy::Current { observed: 0, expected: 1 })
        );
        assert_eq!(
            sched.expect_state(7, TaskState::Blocked),
            Err(Discrepancy::Error(SchedError::InvalidPid(7)))
        );
    }

    #[test]
    fn test_discrepancy_display() {
        let d = Discrepancy::Head { class: SchedClass::RealTime, observed: 2, expected: 1 };
        assert_eq!(d.to_string(), "realtime head is 2, expected 1");

        let d = Discrepancy::Links { pid: 4, observed: None, expected: (4, 4) };
        assert_eq!(d.to_string(), "pid 4 is unlinked, expected next=4 prev=4");
    }

    #[test]
    #[should_panic(expected = "scheduler check failed")]
    fn test_verify_panics_on_discrepancy() {
        let sched = new_sched();
        verify(sched.expect_current(3));
    }

    #[test]
    fn test_invariants_hold_through_lifecycle() {
        let mut sched = new_sched();
        for pid in 1..=4 {
            sched.load(pid).unwrap();
        }
        sched.create_blocked(5).unwrap();
        sched.check_invariants(CheckFlags::STRUCTURE).unwrap();

        for _ in 0..7 {
            sched.tick().unwrap();
            sched.check_invariants(CheckFlags::all()).unwrap();
        }
        sched.unblock(5).unwrap();
        sched.check_invariants(CheckFlags::STRUCTURE).unwrap();

        sched.block().unwrap();
        sched.check_invariants(CheckFlags::all()).unwrap();
        assert_eq!(sched.current_pid(), 5);
        assert_eq!(sched.quantum(), RT_QUANTUM);

        sched.exit().unwrap();
        sched.check_invariants(CheckFlags::all()).unwrap();
        assert_eq!(sched.current_pid(), 1);
        assert_eq!(sched.quantum(), LOW_QUANTUM);
    }

    #[test]
    fn test_idle_check_after_load_needs_selection() {
        let mut sched = new_sched();
        sched.load(1).unwrap();
        // 加载后还没有选择，idle 不变式暂时不成立
        assert_eq!(sched.check_invariants(CheckFlags::IDLE), Err(SchedError::RingCorrupted(1)));
        sched.tick().unwrap();
        assert!(sched.check_invariants(CheckFlags::all()).is_ok());
    }
}
