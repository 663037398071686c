//! 检查与同步命令

use super::render::{render_check, render_outcome, render_summary};
use crate::config::Preferences;
use crate::core::{CheckSummary, ConflictPolicy, SyncExecutor, SyncReport};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// 确定本次使用的源目录和目标目录
///
/// 命令行给出的路径会被记住；未给出时使用上次记住的路径。
pub fn resolve_roots(
    config_dir: &Path,
    source: Option<PathBuf>,
    dest: Option<PathBuf>,
) -> Result<(PathBuf, PathBuf)> {
    let mut prefs = Preferences::load(config_dir);
    let changed = source.is_some() || dest.is_some();

    if let Some(source) = source {
        prefs.source_directory = Some(source);
    }
    if let Some(dest) = dest {
        prefs.destination_directory = Some(dest);
    }

    let source = prefs
        .source_directory
        .clone()
        .context("请指定源目录（之前也没有记住的源目录）")?;
    let dest = prefs
        .destination_directory
        .clone()
        .context("请指定目标目录（之前也没有记住的目标目录）")?;

    if changed {
        if let Err(e) = prefs.save(config_dir) {
            warn!("保存路径记录失败: {}", e);
        }
    }

    Ok((source, dest))
}

/// 预览待同步的文件
pub fn check<W: Write>(
    executor: &SyncExecutor,
    source: &Path,
    dest: &Path,
    out: &mut W,
    color: bool,
) -> Result<CheckSummary> {
    let mut summary = CheckSummary::default();
    let items = executor
        .check_only(source, dest)
        .context("检查文件失败")?;

    for item in items {
        summary.record(&item);
        match item {
            Ok((entry, class)) => {
                if let Some(line) = render_check(&entry, class, color) {
                    writeln!(out, "{}", line)?;
                }
            }
            Err(e) => writeln!(out, "检查失败: {}", e)?,
        }
    }

    writeln!(
        out,
        "新文件 {}, 已修改 {}, 未变化 {}, 错误 {}",
        summary.new_count, summary.modified_count, summary.unchanged_count, summary.error_count
    )?;
    Ok(summary)
}

/// 执行同步，边同步边输出结果
pub async fn sync<W: Write>(
    executor: &SyncExecutor,
    source: &Path,
    dest: &Path,
    policy: Arc<dyn ConflictPolicy>,
    out: &mut W,
    color: bool,
) -> Result<SyncReport> {
    let (tx, mut rx) = mpsc::channel(64);

    let run = executor.run_with_outcomes(source, dest, policy, Some(tx));
    let print = async {
        while let Some(outcome) = rx.recv().await {
            if let Err(e) = writeln!(out, "{}", render_outcome(&outcome, color)) {
                warn!("输出结果失败: {}", e);
            }
        }
    };

    let (report, ()) = tokio::join!(run, print);
    let report = report.context("同步失败")?;

    writeln!(out, "{}", render_summary(&report))?;
    Ok(report)
}
