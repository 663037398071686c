//! 日志模块 - 控制台输出与按天滚动的文件日志

use crate::config::{load_section, save_section};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// 合法的日志级别
pub const VALID_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// 是否启用日志记录
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
    /// 是否同时写入日志文件
    #[serde(default = "default_enabled")]
    pub file_log: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            level: default_level(),
            file_log: default_enabled(),
        }
    }
}

impl LogConfig {
    /// 从配置文件加载日志配置
    pub fn load(config_dir: &Path) -> Self {
        load_section(config_dir, "log")
    }

    /// 保存日志配置
    pub fn save(&self, config_dir: &Path) -> io::Result<()> {
        save_section(config_dir, "log", self)
    }

    /// 设置日志级别，非法值返回错误
    pub fn set_level(&mut self, level: &str) -> Result<(), String> {
        let level = level.to_lowercase();
        if VALID_LEVELS.contains(&level.as_str()) {
            self.level = level;
            Ok(())
        } else {
            Err(format!("无效的日志级别: {}", level))
        }
    }

    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

/// 初始化全局日志
///
/// 返回的 guard 需要在程序结束前一直持有，否则文件日志中尚未写出的内容会丢失。
pub fn init_logging(config: &LogConfig, log_dir: &Path) -> Option<WorkerGuard> {
    if !config.enabled {
        // 日志已禁用，只初始化一个空的 subscriber
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        return None;
    }

    let env_filter = EnvFilter::builder()
        .with_default_directive(config.tracing_level().into())
        .from_env_lossy();

    // 控制台输出到 stderr，stdout 留给同步结果
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let (file_layer, guard) = if config.file_log && std::fs::create_dir_all(log_dir).is_ok() {
        let appender = tracing_appender::rolling::daily(log_dir, "dirsync.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);

    guard
}
