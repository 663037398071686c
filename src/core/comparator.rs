use crate::error::{Result, SyncError};
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;
use walkdir::WalkDir;

/// 源目录下的一个文件及其对应的目标路径
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// 相对于根目录的路径
    pub relative_path: PathBuf,
    pub source_path: PathBuf,
    pub dest_path: PathBuf,
    pub source_mtime: SystemTime,
    /// 目标文件不存在时为 None
    pub dest_mtime: Option<SystemTime>,
}

impl FileEntry {
    /// 文件名（不含目录），用于冲突提示
    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.relative_path.to_string_lossy().into_owned())
    }

    pub fn classify(&self) -> Classification {
        Classification::of(self.source_mtime, self.dest_mtime)
    }
}

/// 文件分类，由时间戳实时推导
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// 目标不存在
    New,
    /// 目标存在且源文件更新
    Modified,
    Unchanged,
}

impl Classification {
    pub fn of(source_mtime: SystemTime, dest_mtime: Option<SystemTime>) -> Self {
        match dest_mtime {
            None => Classification::New,
            Some(dest) if source_mtime > dest => Classification::Modified,
            Some(_) => Classification::Unchanged,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::New => write!(f, "new"),
            Classification::Modified => write!(f, "modified"),
            Classification::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// 目录树比较器
///
/// 只做只读的 stat/list 调用。每次调用 [`TreeComparator::compare`] 都会重新
/// 遍历，不缓存结果。同一目录内按文件名排序，保证单次运行的顺序稳定。
///
/// 符号链接会被跟随；无法解析的链接和特殊文件会被静默跳过。
#[derive(Debug, Clone)]
pub struct TreeComparator {
    source_root: PathBuf,
    dest_root: PathBuf,
}

impl TreeComparator {
    pub fn new(source_root: impl Into<PathBuf>, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            dest_root: dest_root.into(),
        }
    }

    /// 惰性遍历源目录
    pub fn compare(&self) -> FileEntries {
        debug!(
            "开始遍历: {} -> {}",
            self.source_root.display(),
            self.dest_root.display()
        );
        let walker = WalkDir::new(&self.source_root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();
        FileEntries {
            walker,
            source_root: self.source_root.clone(),
            dest_root: self.dest_root.clone(),
        }
    }
}

/// [`TreeComparator::compare`] 返回的惰性序列
pub struct FileEntries {
    walker: walkdir::IntoIter,
    source_root: PathBuf,
    dest_root: PathBuf,
}

impl Iterator for FileEntries {
    type Item = Result<FileEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    // 断开的符号链接不算错误
                    if err.io_error().map(|e| e.kind()) == Some(io::ErrorKind::NotFound)
                        && err.path().is_some_and(|p| p.is_symlink())
                    {
                        debug!("跳过无法解析的链接: {:?}", err.path());
                        continue;
                    }
                    return Some(Err(SyncError::from(err)));
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            return Some(build_entry(&self.source_root, &self.dest_root, entry.path()));
        }
    }
}

fn build_entry(source_root: &Path, dest_root: &Path, source_path: &Path) -> Result<FileEntry> {
    let relative_path = source_path
        .strip_prefix(source_root)
        .map_err(|_| SyncError::Walk {
            path: source_path.to_path_buf(),
            message: format!("不在源目录 {} 内", source_root.display()),
        })?
        .to_path_buf();
    let dest_path = dest_root.join(&relative_path);

    let source_mtime = std::fs::metadata(source_path)
        .and_then(|m| m.modified())
        .map_err(|e| SyncError::from_stat(source_path, e))?;

    let dest_mtime = match std::fs::metadata(&dest_path) {
        Ok(meta) => Some(
            meta.modified()
                .map_err(|e| SyncError::from_stat(&dest_path, e))?,
        ),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(SyncError::from_stat(&dest_path, e)),
    };

    Ok(FileEntry {
        relative_path,
        source_path: source_path.to_path_buf(),
        dest_path,
        source_mtime,
        dest_mtime,
    })
}
