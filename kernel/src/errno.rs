//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 错误代码定义
//!
//! - `Errno`: 与 include/uapi/asm-generic/errno.h 一致的错误码子集，
//!   供 trap/syscall 层把调度器错误翻译成任务可见的返回值
//! - `SchedError`: 调度器自身的错误分类

use core::fmt;

use crate::config::MAX_TASKS;
use crate::sched::task::Pid;

/// 标准错误代码（调度器用到的子集）
///
/// 使用方法：
/// ```rust
/// use mqsched::errno::Errno;
///
/// // 系统调用风格，返回负数
/// assert_eq!(Errno::NoSuchProcess.as_neg_i32(), -3);
/// ```
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Errno {
    /// Operation not permitted (EPERM, 1)
    OperationNotPermitted = 1,

    /// No such process (ESRCH, 3)
    NoSuchProcess = 3,

    /// Bad address (EFAULT, 14)
    BadAddress = 14,

    /// Invalid argument (EINVAL, 22)
    InvalidArgument = 22,
}

impl Errno {
    /// 获取错误代码的正数值（用于比较）
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// 获取错误代码的负数值（用于系统调用返回）
    #[inline]
    pub const fn as_neg_i32(self) -> i32 {
        -(self as i32)
    }
}

/// 调度器错误
///
/// 这些都是调用者违反接口约定导致的错误，调度器从不重试。
/// 返回错误时调度器状态保证未被修改（先校验，后修改）。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// PID 超出 [0, MAX_TASKS) 或指向未初始化的槽位
    InvalidPid(Pid),

    /// 违反操作前置条件（idle 阻塞/退出、唤醒非阻塞任务、重复加载等）
    InvalidOperation(&'static str),

    /// 诊断发现环链表损坏，系统不可恢复
    RingCorrupted(Pid),
}

impl SchedError {
    /// 映射到标准错误码
    pub const fn as_errno(self) -> Errno {
        match self {
            // 越界的 PID 是参数错误，未初始化的槽位是“没有这个进程”
            SchedError::InvalidPid(pid) if pid as usize >= MAX_TASKS => Errno::InvalidArgument,
            SchedError::InvalidPid(_) => Errno::NoSuchProcess,
            SchedError::InvalidOperation(_) => Errno::OperationNotPermitted,
            SchedError::RingCorrupted(_) => Errno::BadAddress,
        }
    }

    /// 系统调用风格的负数返回值
    #[inline]
    pub const fn as_neg_i32(self) -> i32 {
        self.as_errno().as_neg_i32()
    }

    /// 是否为致命错误（应停机而不是继续调度）
    #[inline]
    pub const fn is_fatal(self) -> bool {
        matches!(self, SchedError::RingCorrupted(_))
    }
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::InvalidPid(pid) => write!(f, "invalid pid {}", pid),
            SchedError::InvalidOperation(why) => write!(f, "invalid operation: {}", why),
            SchedError::RingCorrupted(pid) => write!(f, "ring corrupted at pid {}", pid),
        }
    }
}

/// 调度器操作结果
pub type SchedResult<T> = Result<T, SchedError>;
