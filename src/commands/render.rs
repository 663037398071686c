//! 结果输出：新文件与复制为绿色，覆盖、修改与错误为红色

use crate::core::{Classification, FileEntry, SyncAction, SyncOutcome, SyncReport};
use colored::{Color, Colorize};

fn paint(text: String, color: Color, enabled: bool) -> String {
    if enabled {
        text.color(color).to_string()
    } else {
        text
    }
}

pub fn render_outcome(outcome: &SyncOutcome, color: bool) -> String {
    let src = outcome.source_path.display();
    let dst = outcome.dest_path.display();
    match outcome.action {
        SyncAction::Copied => paint(format!("已复制 {} -> {}", src, dst), Color::Green, color),
        SyncAction::Overwritten => paint(format!("已覆盖 {} -> {}", src, dst), Color::Red, color),
        SyncAction::SkippedConflict => paint(format!("已跳过 {}", src), Color::Yellow, color),
        SyncAction::Failed => paint(
            format!(
                "失败 {}: {}",
                src,
                outcome.error.as_deref().unwrap_or("未知错误")
            ),
            Color::Red,
            color,
        ),
    }
}

/// 预览时只输出新文件和已修改文件
pub fn render_check(entry: &FileEntry, class: Classification, color: bool) -> Option<String> {
    match class {
        Classification::New => Some(paint(
            format!("新文件: {}", entry.source_path.display()),
            Color::Green,
            color,
        )),
        Classification::Modified => Some(paint(
            format!("已修改: {}", entry.source_path.display()),
            Color::Red,
            color,
        )),
        Classification::Unchanged => None,
    }
}

pub fn render_summary(report: &SyncReport) -> String {
    format!(
        "{}: 复制 {}, 覆盖 {}, 跳过 {}, 失败 {} ({} 字节, {} ms)",
        if report.cancelled { "同步已取消" } else { "同步完成" },
        report.copied(),
        report.overwritten(),
        report.skipped(),
        report.failed(),
        report.bytes_transferred(),
        report.duration_ms
    )
}
