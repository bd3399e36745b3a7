//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 日志
//!
//! 实现 `log::Log`，把日志按 `[LEVEL] target: message` 格式写到控制台。
//! 级别过滤：编译期默认值来自 Kernel.toml 的 `debug.log_level`，运行期可以用
//! `log::set_max_level` 调整。

use log::{LevelFilter, Metadata, Record};

use crate::config;
use crate::print::{self, Console};
use crate::println;

static LOGGER: KernelLogger = KernelLogger;

struct KernelLogger;

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("[{:5}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Kernel.toml 中配置的默认日志级别
pub fn level_from_config() -> LevelFilter {
    config::LOG_LEVEL.parse().unwrap_or(LevelFilter::Info)
}

/// 初始化日志
///
/// # 参数
/// * `console` - 日志输出设备
/// * `max_level` - 最高输出级别
///
/// 重复调用只会更新级别，已安装的 logger 和控制台保持不变。
pub fn init(console: &'static dyn Console, max_level: LevelFilter) {
    print::set_console(console);

    if log::set_logger(&LOGGER).is_ok() {
        println!("[KERNEL] Logger initialized with level: {}", max_level);
    }
    log::set_max_level(max_level);
}
