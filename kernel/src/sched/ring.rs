//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 优先级环 (Priority Rings)
//!
//! 每个优先级类别一个环：穿过任务表的侵入式循环双向链表。
//! 和 `list_head` 不同，这里没有哨兵节点，环头本身就是一个成员任务，
//! 环头为 `PID_IDLE` (0) 表示环为空。
//!
//! ```text
//!   head ──► A ──► B ──► C ──┐
//!            ▲               │
//!            └───────────────┘      (prev 方向相反)
//! ```
//!
//! - 入队：插入到环尾，也就是 head 之前
//! - 轮转：选中 head，并把 head 移到它的 next
//! - 出队：把任务从环中摘下；如果它正是 head，head 前进到它的 next

use crate::config::MAX_TASKS;
use crate::errno::{SchedError, SchedResult};

use super::task::{Pid, RingLink, SchedClass, TaskState, TaskTable, PID_IDLE};

/// 两个优先级环的环头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityRings {
    heads: [Pid; 2],
}

impl PriorityRings {
    /// 两个环都为空
    pub const fn new() -> Self {
        Self {
            heads: [PID_IDLE; 2],
        }
    }

    /// 环头，空环返回 `PID_IDLE`
    #[inline]
    pub fn head(&self, class: SchedClass) -> Pid {
        self.heads[class.index()]
    }

    #[inline]
    pub fn is_empty(&self, class: SchedClass) -> bool {
        self.head(class) == PID_IDLE
    }

    /// 把任务插入 `class` 环的尾部，并设置为 Running
    ///
    /// 空环时任务自成一环并成为环头；否则环头不变，
    /// 同类任务按到达顺序 (FIFO) 排列。
    ///
    /// 前置条件：任务已初始化且不在任何环中。
    pub fn enqueue(&mut self, tasks: &mut TaskTable, pid: Pid, class: SchedClass) -> SchedResult<()> {
        if pid == PID_IDLE {
            return Err(SchedError::InvalidOperation("idle task is never queued"));
        }
        if tasks.get(pid)?.is_linked() {
            return Err(SchedError::InvalidOperation("task is already queued"));
        }

        let head = self.head(class);
        let link = if head == PID_IDLE {
            RingLink { class, next: pid, prev: pid }
        } else {
            // 修改之前先确认 head 和尾部都是完好的环成员
            let tail = tasks.ring_link(head)?.prev;
            tasks.ring_link(tail)?;
            RingLink { class, next: head, prev: tail }
        };

        let task = tasks.get_mut(pid)?;
        task.set_state(TaskState::Running);
        task.set_link(Some(link));

        if head == PID_IDLE {
            self.heads[class.index()] = pid;
        } else {
            tasks.ring_link_mut(link.prev)?.next = pid;
            tasks.ring_link_mut(head)?.prev = pid;
        }
        Ok(())
    }

    /// 把任务从它所在的环中摘下，设置新状态并清除链接
    ///
    /// 返回被摘下的 PID。idle 任务从不入队，对它出队是调用错误。
    pub fn dequeue(&mut self, tasks: &mut TaskTable, pid: Pid, state: TaskState) -> SchedResult<Pid> {
        if pid == PID_IDLE {
            return Err(SchedError::InvalidOperation("idle task is never queued"));
        }
        let RingLink { class, next, prev } = tasks
            .get(pid)?
            .link()
            .ok_or(SchedError::InvalidOperation("task is not queued"))?;

        if next == pid {
            // 最后一个成员
            if self.head(class) != pid {
                return Err(SchedError::RingCorrupted(pid));
            }
            self.heads[class.index()] = PID_IDLE;
        } else {
            tasks.ring_link(next)?;
            tasks.ring_link(prev)?;
            tasks.ring_link_mut(prev)?.next = next;
            tasks.ring_link_mut(next)?.prev = prev;
            if self.head(class) == pid {
                self.heads[class.index()] = next;
            }
        }

        let task = tasks.get_mut(pid)?;
        task.set_link(None);
        task.set_state(state);
        Ok(pid)
    }

    /// 轮转：返回当前环头并把环头移到它的 next
    ///
    /// 任务留在环中，每转一圈被访问一次。空环返回 `None`。
    pub fn rotate(&mut self, tasks: &TaskTable, class: SchedClass) -> SchedResult<Option<Pid>> {
        let head = self.head(class);
        if head == PID_IDLE {
            return Ok(None);
        }
        self.heads[class.index()] = tasks.ring_link(head)?.next;
        Ok(Some(head))
    }

    /// 从环头开始沿 next 方向遍历
    pub fn iter<'a>(&self, tasks: &'a TaskTable, class: SchedClass) -> RingIter<'a> {
        let head = self.head(class);
        RingIter {
            tasks,
            head,
            pos: head,
            steps: 0,
            done: head == PID_IDLE,
        }
    }
}

impl Default for PriorityRings {
    fn default() -> Self {
        Self::new()
    }
}

/// 环遍历器
///
/// 遍历步数不超过 `MAX_TASKS`，超过说明环没有闭合，此时产生
/// `Err(RingCorrupted)` 并结束。
pub struct RingIter<'a> {
    tasks: &'a TaskTable,
    head: Pid,
    pos: Pid,
    steps: usize,
    done: bool,
}

impl Iterator for RingIter<'_> {
    type Item = SchedResult<Pid>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.steps >= MAX_TASKS {
            self.done = true;
            return Some(Err(SchedError::RingCorrupted(self.pos)));
        }

        let pid = self.pos;
        match self.tasks.ring_link(pid) {
            Ok(link) => {
                self.steps += 1;
                self.pos = link.next;
                if self.pos == self.head {
                    self.done = true;
                }
                Some(Ok(pid))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(pids: &[Pid]) -> TaskTable {
        let mut table = TaskTable::new();
        for &pid in pids {
            table.install(pid, TaskState::Running).unwrap();
        }
        table
    }

    fn members(rings: &PriorityRings, tasks: &TaskTable, class: SchedClass) -> Vec<Pid> {
        rings.iter(tasks, class).map(|r| r.unwrap()).collect()
    }

    fn links(tasks: &TaskTable, pid: Pid) -> (Pid, Pid) {
        let link = tasks.get(pid).unwrap().link().unwrap();
        (link.next, link.prev)
    }

    #[test]
    fn test_enqueue_into_empty_ring() {
        let mut tasks = table_with(&[1]);
        let mut rings = PriorityRings::new();

        rings.enqueue(&mut tasks, 1, SchedClass::Low).unwrap();

        assert_eq!(rings.head(SchedClass::Low), 1);
        assert!(rings.is_empty(SchedClass::RealTime));
        assert_eq!(links(&tasks, 1), (1, 1));
        assert_eq!(tasks.get(1).unwrap().class(), Some(SchedClass::Low));
    }

    #[test]
    fn test_enqueue_keeps_fifo_order() {
        let mut tasks = table_with(&[1, 2, 3]);
        let mut rings = PriorityRings::new();

        for pid in [1, 2, 3] {
            rings.enqueue(&mut tasks, pid, SchedClass::Low).unwrap();
        }

        // head=1, 1 -> 2 -> 3 -> 1
        assert_eq!(rings.head(SchedClass::Low), 1);
        assert_eq!(members(&rings, &tasks, SchedClass::Low), [1, 2, 3]);
        assert_eq!(links(&tasks, 1), (2, 3));
        assert_eq!(links(&tasks, 2), (3, 1));
        assert_eq!(links(&tasks, 3), (1, 2));
    }

    #[test]
    fn test_enqueue_rejects_linked_and_idle() {
        let mut tasks = table_with(&[1]);
        let mut rings = PriorityRings::new();
        rings.enqueue(&mut tasks, 1, SchedClass::Low).unwrap();

        let before = rings;
        assert!(matches!(
            rings.enqueue(&mut tasks, 1, SchedClass::RealTime),
            Err(SchedError::InvalidOperation(_))
        ));
        assert!(matches!(
            rings.enqueue(&mut tasks, PID_IDLE, SchedClass::Low),
            Err(SchedError::InvalidOperation(_))
        ));
        assert_eq!(rings, before);
        assert_eq!(links(&tasks, 1), (1, 1));
    }

    #[test]
    fn test_enqueue_uninitialized_slot() {
        let mut tasks = TaskTable::new();
        let mut rings = PriorityRings::new();
        assert_eq!(
            rings.enqueue(&mut tasks, 9, SchedClass::Low),
            Err(SchedError::InvalidPid(9))
        );
    }

    #[test]
    fn test_dequeue_sole_member_empties_ring() {
        let mut tasks = table_with(&[4]);
        let mut rings = PriorityRings::new();
        rings.enqueue(&mut tasks, 4, SchedClass::RealTime).unwrap();

        assert_eq!(rings.dequeue(&mut tasks, 4, TaskState::Blocked), Ok(4));

        assert!(rings.is_empty(SchedClass::RealTime));
        let task = tasks.get(4).unwrap();
        assert_eq!(task.state(), TaskState::Blocked);
        assert_eq!(task.class(), None);
        assert_eq!(task.next(), None);
    }

    #[test]
    fn test_dequeue_head_advances_to_next() {
        let mut tasks = table_with(&[1, 2, 3]);
        let mut rings = PriorityRings::new();
        for pid in [1, 2, 3] {
            rings.enqueue(&mut tasks, pid, SchedClass::Low).unwrap();
        }

        rings.dequeue(&mut tasks, 1, TaskState::Finished).unwrap();

        assert_eq!(rings.head(SchedClass::Low), 2);
        assert_eq!(members(&rings, &tasks, SchedClass::Low), [2, 3]);
        assert_eq!(links(&tasks, 2), (3, 3));
        assert_eq!(links(&tasks, 3), (2, 2));
    }

    #[test]
    fn test_dequeue_middle_keeps_head() {
        let mut tasks = table_with(&[1, 2, 3]);
        let mut rings = PriorityRings::new();
        for pid in [1, 2, 3] {
            rings.enqueue(&mut tasks, pid, SchedClass::Low).unwrap();
        }

        rings.dequeue(&mut tasks, 2, TaskState::Blocked).unwrap();

        assert_eq!(rings.head(SchedClass::Low), 1);
        assert_eq!(members(&rings, &tasks, SchedClass::Low), [1, 3]);
    }

    #[test]
    fn test_dequeue_rejects_idle_and_unqueued() {
        let mut tasks = table_with(&[5]);
        let mut rings = PriorityRings::new();

        assert!(matches!(
            rings.dequeue(&mut tasks, PID_IDLE, TaskState::Blocked),
            Err(SchedError::InvalidOperation(_))
        ));
        assert!(matches!(
            rings.dequeue(&mut tasks, 5, TaskState::Blocked),
            Err(SchedError::InvalidOperation(_))
        ));
        // 状态未被修改
        assert_eq!(tasks.get(5).unwrap().state(), TaskState::Running);
    }

    #[test]
    fn test_rotate_walks_the_ring() {
        let mut tasks = table_with(&[1, 2, 3]);
        let mut rings = PriorityRings::new();
        for pid in [1, 2, 3] {
            rings.enqueue(&mut tasks, pid, SchedClass::Low).unwrap();
        }

        let picked: Vec<Pid> = (0..6)
            .map(|_| rings.rotate(&tasks, SchedClass::Low).unwrap().unwrap())
            .collect();
        assert_eq!(picked, [1, 2, 3, 1, 2, 3]);
        assert_eq!(rings.rotate(&tasks, SchedClass::RealTime), Ok(None));
    }

    #[test]
    fn test_iter_detects_broken_ring() {
        let mut tasks = table_with(&[1, 2]);
        let mut rings = PriorityRings::new();
        rings.enqueue(&mut tasks, 1, SchedClass::Low).unwrap();
        rings.enqueue(&mut tasks, 2, SchedClass::Low).unwrap();

        // 人为破坏：2 指向自己，环无法回到 head
        tasks.ring_link_mut(2).unwrap().next = 2;

        let result: Result<Vec<Pid>, SchedError> = rings.iter(&tasks, SchedClass::Low).collect();
        assert_eq!(result, Err(SchedError::RingCorrupted(2)));
    }
}
