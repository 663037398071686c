//! 日志相关命令

use crate::logging::LogConfig;
use std::path::Path;

/// 修改日志配置，未给出的项保持不变
pub fn update_log_config(
    config_dir: &Path,
    enabled: Option<bool>,
    level: Option<String>,
    file_log: Option<bool>,
) -> Result<LogConfig, String> {
    let mut config = LogConfig::load(config_dir);

    if let Some(e) = enabled {
        config.enabled = e;
    }
    if let Some(f) = file_log {
        config.file_log = f;
    }
    if let Some(l) = level {
        config.set_level(&l)?;
    }

    config.save(config_dir).map_err(|e| e.to_string())?;

    Ok(config)
}
