//! 应用配置模块
//!
//! 所有配置保存在配置目录下的 `config.json` 中，每个组件占用一个顶层键，
//! 读写时只改动自己的那一部分。

use crate::core::SyncConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";

/// 读取 `config.json` 中的某个键，缺失或解析失败时返回默认值
pub fn load_section<T: DeserializeOwned + Default>(config_dir: &Path, key: &str) -> T {
    fs::read_to_string(config_dir.join(CONFIG_FILE))
        .ok()
        .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
        .and_then(|config| config.get(key).cloned())
        .and_then(|section| serde_json::from_value(section).ok())
        .unwrap_or_default()
}

/// 写入 `config.json` 中的某个键，保留其他键
pub fn save_section<T: Serialize>(config_dir: &Path, key: &str, value: &T) -> io::Result<()> {
    fs::create_dir_all(config_dir)?;
    let config_file = config_dir.join(CONFIG_FILE);

    // 读取现有配置
    let mut config: serde_json::Value = if config_file.exists() {
        let content = fs::read_to_string(&config_file)?;
        serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({}))
    } else {
        serde_json::json!({})
    };
    if !config.is_object() {
        config = serde_json::json!({});
    }

    config[key] = serde_json::to_value(value).map_err(io::Error::other)?;

    let content = serde_json::to_string_pretty(&config).map_err(io::Error::other)?;
    fs::write(&config_file, content)
}

/// 上次使用的源目录与目标目录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_directory: Option<PathBuf>,
}

impl Preferences {
    pub fn load(config_dir: &Path) -> Self {
        load_section(config_dir, "paths")
    }

    pub fn save(&self, config_dir: &Path) -> io::Result<()> {
        save_section(config_dir, "paths", self)
    }
}

/// 引擎参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// 最大并发复制数
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_transfers: usize,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transfers: default_max_concurrent(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl EngineConfig {
    pub fn load(config_dir: &Path) -> Self {
        load_section(config_dir, "engine")
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            // 限制范围 1-64
            max_concurrent_transfers: self.max_concurrent_transfers.clamp(1, 64),
            channel_capacity: self.channel_capacity.max(1),
        }
    }
}
