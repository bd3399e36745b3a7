//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 控制台输出
//!
//! 调度器不关心输出设备：内核启动时通过 `set_console` 注册一个字符输出设备
//! （UART、VGA 文本缓冲区等），之后 `print!`/`println!` 和日志都写到这里。
//! 注册之前的输出被丢弃。

use core::fmt;
use spin::Once;

/// 字符输出设备
pub trait Console: Sync {
    /// 写入单个字符
    fn putchar(&self, c: u8);
}

static CONSOLE: Once<&'static dyn Console> = Once::new();

/// 注册控制台，只有第一次注册生效
///
/// 返回 `true` 表示本次注册成功
pub fn set_console(console: &'static dyn Console) -> bool {
    let mut installed = false;
    CONSOLE.call_once(|| {
        installed = true;
        console
    });
    installed
}

/// 控制台是否已注册
pub fn has_console() -> bool {
    CONSOLE.get().is_some()
}

pub struct ConsoleWriter;

impl fmt::Write for ConsoleWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if let Some(console) = CONSOLE.get() {
            for b in s.bytes() {
                if b == b'\n' {
                    console.putchar(b'\r');
                }
                console.putchar(b);
            }
        }
        Ok(())
    }
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ({
        use core::fmt::Write;
        let _ = write!(&mut $crate::print::ConsoleWriter, $($arg)*);
    });
}

#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ({
        let mut _console = $crate::print::ConsoleWriter;
        let _ = ::core::fmt::Write::write_fmt(&mut _console, ::core::format_args!($($arg)*));
        let _ = ::core::fmt::Write::write_str(&mut _console, "\n");
    });
}
