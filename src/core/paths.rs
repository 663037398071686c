//! 根目录规范化与校验

use crate::error::{Result, SyncError};
use std::path::{Component, Path, PathBuf};

/// 按字面规则规范化路径：去掉多余分隔符与 `.`，折叠 `..`
///
/// 不访问文件系统，也不解析符号链接。
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // 根目录之上没有父目录
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// 检查根目录存在且是目录，返回规范化后的路径
pub fn validate_root(path: &Path) -> Result<PathBuf> {
    let normalized = normalize_path(path);
    let metadata =
        std::fs::metadata(&normalized).map_err(|e| SyncError::from_stat(&normalized, e))?;
    if !metadata.is_dir() {
        return Err(SyncError::NotADirectory { path: normalized });
    }
    Ok(normalized)
}

/// 在目标目录创建再删除一个临时文件，确认可写
pub fn check_writable(dest: &Path) -> Result<()> {
    let probe = dest.join(format!(".dirsync-{}.check", uuid::Uuid::new_v4().simple()));
    let denied = |e| SyncError::PermissionDenied {
        path: dest.to_path_buf(),
        source: e,
    };
    std::fs::File::create(&probe).map_err(denied)?;
    std::fs::remove_file(&probe).map_err(denied)
}

/// 校验源与目标根目录
///
/// 源目录必须可列出；目标目录不能等于源目录或位于源目录内。
pub fn validate_roots(source: &Path, dest: &Path) -> Result<(PathBuf, PathBuf)> {
    let source = validate_root(source)?;
    let dest = validate_root(dest)?;

    std::fs::read_dir(&source).map_err(|e| SyncError::from_stat(&source, e))?;

    let canonical_source = source
        .canonicalize()
        .map_err(|e| SyncError::from_stat(&source, e))?;
    let canonical_dest = dest
        .canonicalize()
        .map_err(|e| SyncError::from_stat(&dest, e))?;
    if canonical_dest.starts_with(&canonical_source) {
        return Err(SyncError::NestedRoots {
            source_root: source,
            dest_root: dest,
        });
    }

    Ok((source, dest))
}
