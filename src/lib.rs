pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;

pub use crate::core::{
    Classification, ConflictDecision, ConflictPolicy, FileEntry, FixedPolicy, SyncAction,
    SyncConfig, SyncExecutor, SyncOutcome, SyncReport, TreeComparator,
};
pub use error::{Result, SyncError};

/// 平台相关的配置目录
pub mod dirs {
    use std::path::PathBuf;

    /// 覆盖配置目录的环境变量
    pub const CONFIG_DIR_ENV: &str = "DIRSYNC_CONFIG_DIR";

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
        } else {
            // Linux
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".config"))
                })
        }
    }

    /// dirsync 自己的配置目录
    pub fn app_config_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(dir);
        }
        config_dir()
            .map(|p| p.join("dirsync"))
            .unwrap_or_else(|| PathBuf::from(".dirsync"))
    }
}
