//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 任务记录表 (Task Record Store)
//!
//! 固定容量的任务表，以 PID 作为下标：
//! - PID 0 是 idle 任务，永远不进入任何队列，状态也从不改变
//! - 槽位由外部加载器初始化，调度器只修改 state 和队列链接
//! - 表不会重新分配，PID 在任务生命周期内保持稳定
//!
//! 队列链接使用 PID 而不是指针，两个优先级环共享同一张表也不会产生别名问题。

use crate::config::MAX_TASKS;
use crate::errno::{SchedError, SchedResult};

/// 进程 ID，同时是任务表的下标
pub type Pid = u32;

/// idle 任务的 PID
pub const PID_IDLE: Pid = 0;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TaskState {
    /// 可运行：正在运行，或者在某个优先级环中等待
    Running = 0,

    /// 阻塞：不在任何环中，等待 unblock
    Blocked = 1,

    /// 已结束：不在任何环中，等待加载器回收槽位
    Finished = 2,
}

impl TaskState {
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskState::Running => "running",
            TaskState::Blocked => "blocked",
            TaskState::Finished => "finished",
        }
    }
}

/// 优先级类别
///
/// 严格优先级：REALTIME 环非空时 LOW 环中的任务不会被选中。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SchedClass {
    RealTime = 0,
    Low = 1,
}

impl SchedClass {
    /// 按优先级从高到低排列
    pub const ALL: [SchedClass; 2] = [SchedClass::RealTime, SchedClass::Low];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SchedClass::RealTime => "realtime",
            SchedClass::Low => "low",
        }
    }
}

/// 环链接：任务在环中时才存在
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingLink {
    /// 所在环的类别
    pub class: SchedClass,
    /// 下一个任务
    pub next: Pid,
    /// 上一个任务
    pub prev: Pid,
}

/// 单个任务的调度元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRecord {
    state: TaskState,
    /// `None` 表示不在任何环中（Blocked、Finished、idle）
    link: Option<RingLink>,
}

impl TaskRecord {
    pub const fn new(state: TaskState) -> Self {
        Self { state, link: None }
    }

    #[inline]
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// 所在环的类别，不在环中时为 `None`
    #[inline]
    pub fn class(&self) -> Option<SchedClass> {
        self.link.map(|l| l.class)
    }

    #[inline]
    pub fn link(&self) -> Option<RingLink> {
        self.link
    }

    #[inline]
    pub fn next(&self) -> Option<Pid> {
        self.link.map(|l| l.next)
    }

    #[inline]
    pub fn prev(&self) -> Option<Pid> {
        self.link.map(|l| l.prev)
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    pub(crate) fn set_state(&mut self, state: TaskState) {
        self.state = state;
    }

    pub(crate) fn set_link(&mut self, link: Option<RingLink>) {
        self.link = link;
    }

    pub(crate) fn link_mut(&mut self) -> Option<&mut RingLink> {
        self.link.as_mut()
    }
}

/// 任务表
pub struct TaskTable {
    slots: [Option<TaskRecord>; MAX_TASKS],
}

impl TaskTable {
    /// 创建任务表，只有 idle 任务的槽位被占用
    pub const fn new() -> Self {
        let mut slots = [None; MAX_TASKS];
        slots[PID_IDLE as usize] = Some(TaskRecord::new(TaskState::Running));
        Self { slots }
    }

    /// 任务表容量
    #[inline]
    pub const fn capacity(&self) -> usize {
        MAX_TASKS
    }

    /// PID 范围检查，返回槽位下标
    #[inline]
    pub fn index(pid: Pid) -> SchedResult<usize> {
        let idx = pid as usize;
        if idx < MAX_TASKS {
            Ok(idx)
        } else {
            Err(SchedError::InvalidPid(pid))
        }
    }

    /// 槽位是否已被加载器初始化
    pub fn is_initialized(&self, pid: Pid) -> bool {
        Self::index(pid)
            .map(|idx| self.slots[idx].is_some())
            .unwrap_or(false)
    }

    /// 查询任务记录
    ///
    /// PID 越界或槽位未初始化时返回 `InvalidPid`
    pub fn get(&self, pid: Pid) -> SchedResult<&TaskRecord> {
        let idx = Self::index(pid)?;
        self.slots[idx].as_ref().ok_or(SchedError::InvalidPid(pid))
    }

    pub(crate) fn get_mut(&mut self, pid: Pid) -> SchedResult<&mut TaskRecord> {
        let idx = Self::index(pid)?;
        self.slots[idx].as_mut().ok_or(SchedError::InvalidPid(pid))
    }

    /// 环成员的链接，不在环中说明链表已损坏
    pub(crate) fn ring_link(&self, pid: Pid) -> SchedResult<RingLink> {
        self.get(pid)
            .ok()
            .and_then(|t| t.link())
            .ok_or(SchedError::RingCorrupted(pid))
    }

    pub(crate) fn ring_link_mut(&mut self, pid: Pid) -> SchedResult<&mut RingLink> {
        let idx = Self::index(pid).map_err(|_| SchedError::RingCorrupted(pid))?;
        self.slots[idx]
            .as_mut()
            .and_then(|t| t.link_mut())
            .ok_or(SchedError::RingCorrupted(pid))
    }

    /// 初始化一个槽位（不在任何环中）
    ///
    /// 空槽位和 Finished 槽位可以被（重新）初始化，idle 槽位不行。
    pub(crate) fn install(&mut self, pid: Pid, state: TaskState) -> SchedResult<()> {
        let idx = Self::index(pid)?;
        if pid == PID_IDLE {
            return Err(SchedError::InvalidOperation("idle task slot is reserved"));
        }
        match self.slots[idx] {
            None => {}
            Some(t) if t.state() == TaskState::Finished => {}
            Some(t) if t.is_linked() => {
                return Err(SchedError::InvalidOperation("task is already queued"));
            }
            Some(_) => return Err(SchedError::InvalidOperation("task slot is in use")),
        }
        self.slots[idx] = Some(TaskRecord::new(state));
        Ok(())
    }

    /// 槽位的原始内容，配合 `restore` 回滚 `install`
    pub(crate) fn slot(&self, pid: Pid) -> SchedResult<Option<TaskRecord>> {
        let idx = Self::index(pid)?;
        Ok(self.slots[idx])
    }

    pub(crate) fn restore(&mut self, pid: Pid, slot: Option<TaskRecord>) -> SchedResult<()> {
        let idx = Self::index(pid)?;
        if pid == PID_IDLE {
            return Err(SchedError::InvalidOperation("idle task slot is reserved"));
        }
        self.slots[idx] = slot;
        Ok(())
    }

    /// 释放槽位，之后该 PID 视为未初始化
    pub(crate) fn release(&mut self, pid: Pid) -> SchedResult<()> {
        let idx = Self::index(pid)?;
        if pid == PID_IDLE {
            return Err(SchedError::InvalidOperation("idle task slot is reserved"));
        }
        self.slots[idx] = None;
        Ok(())
    }

    /// 遍历所有已初始化的槽位
    pub fn iter(&self) -> impl Iterator<Item = (Pid, &TaskRecord)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|t| (idx as Pid, t)))
    }
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}
