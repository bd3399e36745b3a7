//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 调度统计

use core::fmt;

/// 调度器计数器，只增不减
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedStats {
    /// 时钟滴答总数
    pub ticks: u64,
    /// idle 期间的滴答数
    pub idle_ticks: u64,
    /// 选择算法运行次数
    pub selections: u64,
    /// current_pid 发生变化的次数（含唤醒 idle 时的直接切换）
    pub switches: u64,
    /// 时间片用完被降级到 LOW 的次数
    pub demotions: u64,
    /// 唤醒时提升到 REALTIME 的次数
    pub promotions: u64,
    /// block 次数
    pub blocks: u64,
    /// exit 次数
    pub exits: u64,
}

impl SchedStats {
    pub const fn new() -> Self {
        Self {
            ticks: 0,
            idle_ticks: 0,
            selections: 0,
            switches: 0,
            demotions: 0,
            promotions: 0,
            blocks: 0,
            exits: 0,
        }
    }
}

impl fmt::Display for SchedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticks={} idle={} selections={} switches={} demotions={} promotions={} blocks={} exits={}",
            self.ticks,
            self.idle_ticks,
            self.selections,
            self.switches,
            self.demotions,
            self.promotions,
            self.blocks,
            self.exits,
        )
    }
}
