//! mqsched 构建脚本
//!
//! 这个脚本在编译前运行，负责：
//! 1. 解析 Kernel.toml 配置文件（或 build/.config）
//! 2. 校验调度器参数
//! 3. 生成 src/config.rs

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

/// 解析 build/.config 文件（简单 key=value 格式）
fn parse_dot_config(content: &str) -> toml::Value {
    let mut sections: HashMap<String, toml::map::Map<String, toml::Value>> = HashMap::new();

    for line in content.lines() {
        let line = line.trim();

        // 跳过注释和空行
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // section_key=value，section 取第一个下划线之前的部分
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let Some((section, config_key)) = key.trim().split_once('_') else {
            continue;
        };

        let value = value.trim().trim_matches('"');
        let parsed_value = if value == "true" {
            toml::Value::Boolean(true)
        } else if value == "false" {
            toml::Value::Boolean(false)
        } else if let Ok(int_val) = value.parse::<i64>() {
            toml::Value::Integer(int_val)
        } else {
            toml::Value::String(value.to_string())
        };

        sections
            .entry(section.to_string())
            .or_default()
            .insert(config_key.to_string(), parsed_value);
    }

    let mut root_map = toml::map::Map::new();
    for (section_name, section_data) in sections {
        root_map.insert(section_name, toml::Value::Table(section_data));
    }

    toml::Value::Table(root_map)
}

fn read_config() -> toml::Value {
    // 优先使用 menuconfig 生成的 build/.config
    if let Ok(content) = fs::read_to_string("../build/.config") {
        println!("cargo:warning=Using build/.config configuration");
        return parse_dot_config(&content);
    }

    match fs::read_to_string("../Kernel.toml") {
        Ok(content) => toml::from_str(&content).expect("Kernel.toml 解析失败"),
        // 没有配置文件时全部使用默认值
        Err(_) => toml::Value::Table(toml::map::Map::new()),
    }
}

fn get_int(config: &toml::Value, section: &str, key: &str, default: i64) -> i64 {
    config
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_integer())
        .unwrap_or(default)
}

fn get_str<'a>(config: &'a toml::Value, section: &str, key: &str, default: &'a str) -> &'a str {
    config
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or(default)
}

fn main() {
    println!("cargo:rerun-if-changed=../Kernel.toml");
    println!("cargo:rerun-if-changed=../build/.config");

    let config = read_config();

    let name = get_str(&config, "general", "name", "mqsched");
    let version = get_str(&config, "general", "version", "0.1.0");
    let max_tasks = get_int(&config, "scheduler", "max_tasks", 32);
    let rt_quantum = get_int(&config, "scheduler", "rt_quantum", 4);
    let low_quantum = get_int(&config, "scheduler", "low_quantum", 2);
    let log_level = get_str(&config, "debug", "log_level", "info").to_ascii_lowercase();

    // 参数校验：时间片为 0 会破坏 quantum > 0 的不变量
    assert!(max_tasks >= 2, "scheduler.max_tasks 至少为 2 (idle + 1 个任务)");
    assert!(rt_quantum >= 1, "scheduler.rt_quantum 必须 >= 1");
    assert!(low_quantum >= 1, "scheduler.low_quantum 必须 >= 1");
    assert!(
        matches!(log_level.as_str(), "off" | "error" | "warn" | "info" | "debug" | "trace"),
        "debug.log_level 无效: {}",
        log_level
    );

    println!("cargo:rustc-env=MQSCHED_NAME={}", name);
    println!("cargo:rustc-env=MQSCHED_VERSION={}", version);

    generate_config_code(name, version, max_tasks, rt_quantum, low_quantum, &log_level);
}

fn generate_config_code(
    name: &str,
    version: &str,
    max_tasks: i64,
    rt_quantum: i64,
    low_quantum: i64,
    log_level: &str,
) {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());

    let config_code = format!(
        r#"//! mqsched 配置（自动生成）
//!
//! 此文件由 build.rs 根据 Kernel.toml 自动生成，请勿手动修改

// ============================================================
// 基本信息
// ============================================================

/// 名称
pub const KERNEL_NAME: &str = "{}";

/// 版本
pub const KERNEL_VERSION: &str = "{}";

// ============================================================
// 调度器配置
// ============================================================

/// 任务表容量，PID 范围 [0, MAX_TASKS)
pub const MAX_TASKS: usize = {};

/// REALTIME 队列时间片 (滴答数)
pub const RT_QUANTUM: u32 = {};

/// LOW 队列时间片 (滴答数)
pub const LOW_QUANTUM: u32 = {};

// ============================================================
// 调试配置
// ============================================================

/// 默认日志级别
pub const LOG_LEVEL: &str = "{}";
"#,
        name, version, max_tasks, rt_quantum, low_quantum, log_level,
    );

    let config_file = manifest_dir.join("src").join("config.rs");

    // 只有内容变化时才写入，避免每次编译都更新文件时间戳
    let existing_content = fs::read_to_string(&config_file).unwrap_or_default();
    if existing_content != config_code {
        fs::write(&config_file, &config_code).expect("写入配置文件失败");
    }
}
