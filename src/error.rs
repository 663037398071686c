//! 同步引擎错误类型

use std::io;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, SyncError>;

/// 同步过程中可能出现的错误
///
/// 根目录相关的错误会让整个操作失败；单个文件的错误会被转成
/// `SyncOutcome::Failed`，不影响其余文件。
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("路径不存在: {}", path.display())]
    PathNotFound { path: PathBuf },

    #[error("不是目录: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("无法访问 {}: {source}", path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("复制失败 {}: {source}", path.display())]
    CopyFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("创建目录失败 {}: {source}", path.display())]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("目标目录 {} 位于源目录 {} 内", dest_root.display(), source_root.display())]
    NestedRoots {
        source_root: PathBuf,
        dest_root: PathBuf,
    },

    #[error("遍历失败 {}: {message}", path.display())]
    Walk { path: PathBuf, message: String },
}

impl SyncError {
    /// stat/list 失败时使用，NotFound 归类为 PathNotFound
    pub fn from_stat(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            SyncError::PathNotFound {
                path: path.to_path_buf(),
            }
        } else {
            SyncError::PermissionDenied {
                path: path.to_path_buf(),
                source: err,
            }
        }
    }

    /// 出错的路径
    pub fn path(&self) -> &Path {
        match self {
            SyncError::PathNotFound { path }
            | SyncError::NotADirectory { path }
            | SyncError::PermissionDenied { path, .. }
            | SyncError::CopyFailed { path, .. }
            | SyncError::DirectoryCreateFailed { path, .. }
            | SyncError::Walk { path, .. } => path,
            SyncError::NestedRoots { dest_root, .. } => dest_root,
        }
    }
}

impl From<walkdir::Error> for SyncError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(Path::to_path_buf).unwrap_or_default();
        let message = err.to_string();
        match err.into_io_error() {
            Some(io_err) => SyncError::from_stat(&path, io_err),
            None => SyncError::Walk { path, message },
        }
    }
}
