//! 文件传输 - 先写临时文件再原子重命名

use crate::error::{Result, SyncError};
use std::fs::{self, File, Permissions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 确保目标文件的父目录存在，已存在时不报错
pub fn ensure_parent_dir(dest_path: &Path) -> Result<()> {
    let Some(parent) = dest_path.parent() else {
        return Ok(());
    };
    match fs::create_dir_all(parent) {
        Ok(()) => Ok(()),
        // 并发创建同一目录时可能出现
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && parent.is_dir() => Ok(()),
        Err(e) => Err(SyncError::DirectoryCreateFailed {
            path: parent.to_path_buf(),
            source: e,
        }),
    }
}

/// 临时文件路径，与目标文件位于同一目录以保证 rename 是原子的
///
/// 名称长度固定，不受目标文件名长度影响。
fn temp_path_for(dest_path: &Path) -> PathBuf {
    dest_path.with_file_name(format!(".dirsync-{}.tmp", uuid::Uuid::new_v4().simple()))
}

#[cfg(unix)]
fn owner_writable(permissions: &Permissions) -> bool {
    use std::os::unix::fs::PermissionsExt;
    permissions.mode() & 0o200 != 0
}

#[cfg(not(unix))]
fn owner_writable(permissions: &Permissions) -> bool {
    !permissions.readonly()
}

#[cfg(unix)]
fn with_owner_write(permissions: &Permissions) -> Permissions {
    use std::os::unix::fs::PermissionsExt;
    Permissions::from_mode(permissions.mode() | 0o200)
}

#[cfg(not(unix))]
fn with_owner_write(permissions: &Permissions) -> Permissions {
    let mut writable = permissions.clone();
    #[allow(clippy::permissions_set_readonly_false)]
    writable.set_readonly(false);
    writable
}

/// 复制文件内容、权限位和修改时间
///
/// 内容先写入同目录下的临时文件，元数据设置完成后再重命名到目标路径，
/// 读取方不会看到写了一半的文件。失败时临时文件会被删除。返回复制的字节数。
pub fn copy_file_atomic(source_path: &Path, dest_path: &Path) -> Result<u64> {
    let copy_err = |e: io::Error| SyncError::CopyFailed {
        path: dest_path.to_path_buf(),
        source: e,
    };

    let source_meta = fs::metadata(source_path).map_err(|e| SyncError::from_stat(source_path, e))?;
    let source_mtime = source_meta
        .modified()
        .map_err(|e| SyncError::from_stat(source_path, e))?;

    let temp_path = temp_path_for(dest_path);
    let guard = scopeguard::guard(temp_path.clone(), |path| {
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != io::ErrorKind::NotFound {
                debug!("清理临时文件失败 {}: {}", path.display(), e);
            }
        }
    });

    // fs::copy 同时复制权限位
    let bytes = fs::copy(source_path, &temp_path).map_err(copy_err)?;

    // 所有者没有写权限时，需要先放开才能设置修改时间
    let permissions = source_meta.permissions();
    let restore = !owner_writable(&permissions);
    if restore {
        fs::set_permissions(&temp_path, with_owner_write(&permissions)).map_err(copy_err)?;
    }

    let file = File::options()
        .write(true)
        .open(&temp_path)
        .map_err(copy_err)?;
    file.set_modified(source_mtime).map_err(copy_err)?;
    file.sync_all().map_err(copy_err)?;
    drop(file);

    if restore {
        fs::set_permissions(&temp_path, permissions).map_err(copy_err)?;
    }

    fs::rename(&temp_path, dest_path).map_err(copy_err)?;
    scopeguard::ScopeGuard::into_inner(guard);

    debug!(
        "复制完成: {} -> {} ({} 字节)",
        source_path.display(),
        dest_path.display(),
        bytes
    );
    Ok(bytes)
}
