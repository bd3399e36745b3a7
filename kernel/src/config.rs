//! mqsched 配置（自动生成）
//!
//! 此文件由 build.rs 根据 Kernel.toml 自动生成，请勿手动修改

// ============================================================
// 基本信息
// ============================================================

/// 名称
pub const KERNEL_NAME: &str = "mqsched";

/// 版本
pub const KERNEL_VERSION: &str = "0.1.0";

// ============================================================
// 调度器配置
// ============================================================

/// 任务表容量，PID 范围 [0, MAX_TASKS)
pub const MAX_TASKS: usize = 32;

/// REALTIME 队列时间片 (滴答数)
pub const RT_QUANTUM: u32 = 4;

/// LOW 队列时间片 (滴答数)
pub const LOW_QUANTUM: u32 = 2;

// ============================================================
// 调试配置
// ============================================================

/// 默认日志级别
pub const LOG_LEVEL: &str = "info";
