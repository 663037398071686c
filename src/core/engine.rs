use crate::core::comparator::{Classification, FileEntry, TreeComparator};
use crate::core::conflict::{ConflictDecision, ConflictPolicy, Resolution, SyncSession};
use crate::core::paths::{check_writable, validate_roots};
use crate::core::transfer::{copy_file_atomic, ensure_parent_dir};
use crate::error::{Result, SyncError};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 同步配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 最大并发复制数
    pub max_concurrent_transfers: usize,
    /// 遍历线程与调度任务之间的通道容量
    pub channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transfers: 4,
            channel_capacity: 64,
        }
    }
}

/// 对单个文件采取的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Copied,
    Overwritten,
    SkippedConflict,
    Failed,
}

/// 单个文件的同步结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub relative_path: PathBuf,
    pub source_path: PathBuf,
    pub dest_path: PathBuf,
    pub action: SyncAction,
    pub bytes: u64,
    /// 仅在 Failed 时存在
    pub error: Option<String>,
}

impl SyncOutcome {
    fn new(entry: &FileEntry, action: SyncAction) -> Self {
        Self {
            relative_path: entry.relative_path.clone(),
            source_path: entry.source_path.clone(),
            dest_path: entry.dest_path.clone(),
            action,
            bytes: 0,
            error: None,
        }
    }

    fn failed(entry: &FileEntry, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(entry, SyncAction::Failed)
        }
    }

    /// 遍历阶段就失败、拿不到完整条目时使用
    fn walk_failed(err: &SyncError, source_root: &Path, dest_root: &Path) -> Self {
        // 出错路径可能在源目录下，也可能是目标侧的 stat 失败
        let path = err.path();
        let relative_path = path
            .strip_prefix(source_root)
            .or_else(|_| path.strip_prefix(dest_root))
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf());
        Self {
            source_path: source_root.join(&relative_path),
            dest_path: dest_root.join(&relative_path),
            relative_path,
            action: SyncAction::Failed,
            bytes: 0,
            error: Some(err.to_string()),
        }
    }
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub source_root: PathBuf,
    pub dest_root: PathBuf,
    pub start_time: i64,
    pub end_time: i64,
    pub duration_ms: u64,
    /// 按遍历顺序排列
    pub outcomes: Vec<SyncOutcome>,
    pub cancelled: bool,
}

impl SyncReport {
    fn count(&self, action: SyncAction) -> usize {
        self.outcomes.iter().filter(|o| o.action == action).count()
    }

    pub fn copied(&self) -> usize {
        self.count(SyncAction::Copied)
    }

    pub fn overwritten(&self) -> usize {
        self.count(SyncAction::Overwritten)
    }

    pub fn skipped(&self) -> usize {
        self.count(SyncAction::SkippedConflict)
    }

    pub fn failed(&self) -> usize {
        self.count(SyncAction::Failed)
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.outcomes.iter().map(|o| o.bytes).sum()
    }
}

/// 预览统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSummary {
    pub new_count: usize,
    pub modified_count: usize,
    pub unchanged_count: usize,
    pub error_count: usize,
}

impl CheckSummary {
    pub fn record(&mut self, item: &Result<(FileEntry, Classification)>) {
        match item {
            Ok((_, Classification::New)) => self.new_count += 1,
            Ok((_, Classification::Modified)) => self.modified_count += 1,
            Ok((_, Classification::Unchanged)) => self.unchanged_count += 1,
            Err(_) => self.error_count += 1,
        }
    }

    pub fn pending(&self) -> usize {
        self.new_count + self.modified_count
    }
}

/// 调度队列中的一项，保证结果按遍历顺序输出
enum Pending {
    Ready(SyncOutcome),
    Running {
        entry: FileEntry,
        handle: JoinHandle<SyncOutcome>,
    },
}

impl Pending {
    fn is_ready(&self) -> bool {
        match self {
            Pending::Ready(_) => true,
            Pending::Running { handle, .. } => handle.is_finished(),
        }
    }

    async fn resolve(self) -> SyncOutcome {
        match self {
            Pending::Ready(outcome) => outcome,
            Pending::Running { entry, handle } => match handle.await {
                Ok(outcome) => outcome,
                Err(e) => SyncOutcome::failed(&entry, format!("复制任务异常: {}", e)),
            },
        }
    }
}

/// 同步执行器
///
/// 单个调度任务负责分类、维护会话状态和调用冲突策略，复制交给受信号量限制的
/// 工作线程。每个文件的错误都被记录为 `Failed`，不会中断遍历；根目录错误在处理
/// 任何文件之前直接返回。
pub struct SyncExecutor {
    config: SyncConfig,
    cancelled: Arc<AtomicBool>,
}

impl SyncExecutor {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        Self {
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 取消同步，在处理下一个文件之前生效
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// 取消标志，可交给信号处理器等其他任务
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 只读预览：对每个文件分类，不修改文件系统
    pub fn check_only(
        &self,
        source_root: &Path,
        dest_root: &Path,
    ) -> Result<impl Iterator<Item = Result<(FileEntry, Classification)>>> {
        let (source_root, dest_root) = validate_roots(source_root, dest_root)?;
        self.cancelled.store(false, Ordering::SeqCst);

        info!(
            "检查文件: {} -> {}",
            source_root.display(),
            dest_root.display()
        );

        let cancelled = self.cancelled.clone();
        let comparator = TreeComparator::new(source_root, dest_root);
        Ok(comparator
            .compare()
            .take_while(move |_| !cancelled.load(Ordering::SeqCst))
            .map(|item| {
                item.map(|entry| {
                    let class = entry.classify();
                    (entry, class)
                })
            }))
    }

    /// 执行同步
    pub async fn run(
        &self,
        source_root: &Path,
        dest_root: &Path,
        policy: Arc<dyn ConflictPolicy>,
    ) -> Result<SyncReport> {
        self.run_with_outcomes(source_root, dest_root, policy, None)
            .await
    }

    /// 执行同步，并按遍历顺序把每个结果实时发送给 `outcome_tx`
    pub async fn run_with_outcomes(
        &self,
        source_root: &Path,
        dest_root: &Path,
        policy: Arc<dyn ConflictPolicy>,
        mut outcome_tx: Option<mpsc::Sender<SyncOutcome>>,
    ) -> Result<SyncReport> {
        let start_time = chrono::Utc::now().timestamp();
        let started = Instant::now();

        let (source_root, dest_root) = validate_roots(source_root, dest_root)?;
        check_writable(&dest_root)?;

        // 重置取消标志
        self.cancelled.store(false, Ordering::SeqCst);

        info!(
            "开始同步: {} -> {}",
            source_root.display(),
            dest_root.display()
        );

        let mut session = SyncSession::new(source_root.clone(), dest_root.clone());

        // 遍历在阻塞线程中进行，通过有界通道按需产出条目
        let (entry_tx, mut entry_rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let comparator = TreeComparator::new(source_root.clone(), dest_root.clone());
        let walk_cancelled = self.cancelled.clone();
        let walker = tokio::task::spawn_blocking(move || {
            for item in comparator.compare() {
                if walk_cancelled.load(Ordering::SeqCst) {
                    break;
                }
                if entry_tx.blocking_send(item).is_err() {
                    break;
                }
            }
        });

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_transfers.max(1)));
        let mut pending: VecDeque<Pending> = VecDeque::new();
        let mut outcomes = Vec::new();
        let mut cancelled = false;

        while let Some(item) = entry_rx.recv().await {
            if self.is_cancelled() {
                cancelled = true;
                break;
            }

            let entry = match item {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("读取文件信息失败: {}", err);
                    pending.push_back(Pending::Ready(SyncOutcome::walk_failed(
                        &err,
                        &session.source_root,
                        &session.dest_root,
                    )));
                    continue;
                }
            };

            let action = match entry.classify() {
                Classification::Unchanged => {
                    debug!("未变化: {}", entry.relative_path.display());
                    continue;
                }
                Classification::New => SyncAction::Copied,
                Classification::Modified => {
                    match Self::resolve_conflict(&mut session, &policy, &entry).await {
                        Ok(Resolution::Overwrite) => SyncAction::Overwritten,
                        Ok(Resolution::Skip) => {
                            debug!("跳过冲突: {}", entry.relative_path.display());
                            pending.push_back(Pending::Ready(SyncOutcome::new(
                                &entry,
                                SyncAction::SkippedConflict,
                            )));
                            Self::drain(&mut pending, &mut outcomes, &mut outcome_tx, false).await;
                            continue;
                        }
                        Err(outcome) => {
                            pending.push_back(Pending::Ready(outcome));
                            continue;
                        }
                    }
                }
            };

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    pending.push_back(Pending::Ready(SyncOutcome::failed(&entry, e)));
                    continue;
                }
            };

            let job = entry.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let result = ensure_parent_dir(&job.dest_path)
                    .and_then(|_| copy_file_atomic(&job.source_path, &job.dest_path));
                match result {
                    Ok(bytes) => SyncOutcome {
                        bytes,
                        ..SyncOutcome::new(&job, action)
                    },
                    Err(e) => SyncOutcome::failed(&job, e),
                }
            });
            pending.push_back(Pending::Running { entry, handle });

            Self::drain(&mut pending, &mut outcomes, &mut outcome_tx, false).await;
        }

        // 关闭接收端，让遍历线程尽快退出
        drop(entry_rx);
        if let Err(e) = walker.await {
            warn!("遍历任务异常: {}", e);
        }
        cancelled |= self.is_cancelled();

        Self::drain(&mut pending, &mut outcomes, &mut outcome_tx, true).await;

        let report = SyncReport {
            source_root,
            dest_root,
            start_time,
            end_time: chrono::Utc::now().timestamp(),
            duration_ms: started.elapsed().as_millis() as u64,
            outcomes,
            cancelled,
        };

        info!(
            "同步{}: 复制 {}, 覆盖 {}, 跳过 {}, 失败 {}",
            if cancelled { "已取消" } else { "完成" },
            report.copied(),
            report.overwritten(),
            report.skipped(),
            report.failed()
        );

        Ok(report)
    }

    /// 根据会话状态或策略决定如何处理冲突
    ///
    /// 策略在阻塞线程中调用，调度任务等待其返回，因此同一时刻只有一次调用。
    async fn resolve_conflict(
        session: &mut SyncSession,
        policy: &Arc<dyn ConflictPolicy>,
        entry: &FileEntry,
    ) -> std::result::Result<Resolution, SyncOutcome> {
        if let Some(resolution) = session.sticky_resolution() {
            return Ok(resolution);
        }

        let policy = policy.clone();
        let file_name = entry.file_name();
        let decision: ConflictDecision =
            match tokio::task::spawn_blocking(move || policy.decide(&file_name)).await {
                Ok(decision) => decision,
                Err(e) => {
                    warn!("冲突策略调用失败: {}", e);
                    return Err(SyncOutcome::failed(entry, format!("冲突策略调用失败: {}", e)));
                }
            };

        debug!("冲突 {}: {}", entry.relative_path.display(), decision);
        Ok(session.apply(decision))
    }

    /// 按顺序收集已完成的结果；`wait` 为 true 时等待全部完成
    async fn drain(
        pending: &mut VecDeque<Pending>,
        outcomes: &mut Vec<SyncOutcome>,
        outcome_tx: &mut Option<mpsc::Sender<SyncOutcome>>,
        wait: bool,
    ) {
        while pending.front().is_some_and(|p| wait || p.is_ready()) {
            let Some(next) = pending.pop_front() else {
                break;
            };
            let outcome = next.resolve().await;

            match outcome.action {
                SyncAction::Failed => warn!(
                    "同步失败: {} - {}",
                    outcome.relative_path.display(),
                    outcome.error.as_deref().unwrap_or_default()
                ),
                action => debug!("{:?}: {}", action, outcome.relative_path.display()),
            }

            if let Some(tx) = outcome_tx.as_ref() {
                if tx.send(outcome.clone()).await.is_err() {
                    debug!("结果接收端已关闭，停止推送");
                    *outcome_tx = None;
                }
            }
            outcomes.push(outcome);
        }
    }
}

impl Default for SyncExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::comparator::tests::{base_time, write_with_mtime};
    use crate::core::conflict::FixedPolicy;
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn later() -> SystemTime {
        base_time() + Duration::from_secs(3600)
    }

    fn policy(decision: ConflictDecision) -> Arc<dyn ConflictPolicy> {
        Arc::new(FixedPolicy(decision))
    }

    /// 记录目录下所有文件的内容与修改时间
    fn snapshot(root: &Path) -> BTreeMap<PathBuf, (Vec<u8>, SystemTime)> {
        walkdir::WalkDir::new(root)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let meta = e.metadata().unwrap();
                (
                    e.path().strip_prefix(root).unwrap().to_path_buf(),
                    (std::fs::read(e.path()).unwrap(), meta.modified().unwrap()),
                )
            })
            .collect()
    }

    fn actions(report: &SyncReport) -> Vec<(String, SyncAction)> {
        report
            .outcomes
            .iter()
            .map(|o| (o.relative_path.to_string_lossy().into_owned(), o.action))
            .collect()
    }

    #[tokio::test]
    async fn test_new_files_copied_with_mtime() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_with_mtime(&src.path().join("deep/nested/file.txt"), "payload", base_time());

        let executor = SyncExecutor::new();
        let report = executor
            .run(src.path(), dst.path(), policy(ConflictDecision::Skip))
            .await
            .unwrap();

        assert_eq!(actions(&report), vec![("deep/nested/file.txt".to_string(), SyncAction::Copied)]);
        assert_eq!(report.bytes_transferred(), 7);
        let copied = dst.path().join("deep/nested/file.txt");
        assert_eq!(std::fs::read_to_string(&copied).unwrap(), "payload");
        assert_eq!(std::fs::metadata(&copied).unwrap().modified().unwrap(), base_time());
    }

    #[tokio::test]
    async fn test_unchanged_files_not_written() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_with_mtime(&src.path().join("same.txt"), "source", base_time());
        write_with_mtime(&dst.path().join("same.txt"), "dest", base_time());
        write_with_mtime(&src.path().join("older.txt"), "source", base_time());
        write_with_mtime(&dst.path().join("older.txt"), "dest", later());

        let before = snapshot(dst.path());
        let report = SyncExecutor::new()
            .run(src.path(), dst.path(), policy(ConflictDecision::Overwrite))
            .await
            .unwrap();

        assert!(report.outcomes.is_empty());
        assert_eq!(snapshot(dst.path()), before);
    }

    #[tokio::test]
    async fn test_modified_overwrite_and_skip() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_with_mtime(&src.path().join("doc.txt"), "new", later());
        write_with_mtime(&dst.path().join("doc.txt"), "old", base_time());

        let report = SyncExecutor::new()
            .run(src.path(), dst.path(), policy(ConflictDecision::Skip))
            .await
            .unwrap();
        assert_eq!(actions(&report), vec![("doc.txt".to_string(), SyncAction::SkippedConflict)]);
        assert_eq!(std::fs::read_to_string(dst.path().join("doc.txt")).unwrap(), "old");

        let report = SyncExecutor::new()
            .run(src.path(), dst.path(), policy(ConflictDecision::Overwrite))
            .await
            .unwrap();
        assert_eq!(actions(&report), vec![("doc.txt".to_string(), SyncAction::Overwritten)]);
        assert_eq!(std::fs::read_to_string(dst.path().join("doc.txt")).unwrap(), "new");
    }

    async fn run_sticky(decision: ConflictDecision) -> (SyncReport, usize, TempDir) {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            write_with_mtime(&src.path().join(name), "new", later());
            write_with_mtime(&dst.path().join(name), "old", base_time());
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let policy: Arc<dyn ConflictPolicy> = Arc::new(move |_name: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            decision
        });

        let report = SyncExecutor::new()
            .run(src.path(), dst.path(), policy)
            .await
            .unwrap();
        (report, calls.load(Ordering::SeqCst), dst)
    }

    #[tokio::test]
    async fn test_overwrite_all_stops_prompting() {
        let (report, calls, dst) = run_sticky(ConflictDecision::OverwriteAll).await;
        assert_eq!(calls, 1);
        assert_eq!(report.overwritten(), 3);
        for name in ["a.txt", "b.txt", "c.txt"] {
            assert_eq!(std::fs::read_to_string(dst.path().join(name)).unwrap(), "new");
        }
    }

    #[tokio::test]
    async fn test_skip_all_stops_prompting() {
        let (report, calls, dst) = run_sticky(ConflictDecision::SkipAll).await;
        assert_eq!(calls, 1);
        assert_eq!(report.skipped(), 3);
        for name in ["a.txt", "b.txt", "c.txt"] {
            assert_eq!(std::fs::read_to_string(dst.path().join(name)).unwrap(), "old");
        }
    }

    #[tokio::test]
    async fn test_session_flags_do_not_leak_between_runs() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_with_mtime(&src.path().join("a.txt"), "new", later());
        write_with_mtime(&dst.path().join("a.txt"), "old", base_time());

        let executor = SyncExecutor::new();
        let report = executor
            .run(src.path(), dst.path(), policy(ConflictDecision::SkipAll))
            .await
            .unwrap();
        assert_eq!(report.skipped(), 1);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let asking: Arc<dyn ConflictPolicy> = Arc::new(move |_name: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            ConflictDecision::Overwrite
        });
        let report = executor.run(src.path(), dst.path(), asking).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.overwritten(), 1);
    }

    #[tokio::test]
    async fn test_policy_receives_file_name() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_with_mtime(&src.path().join("dir/report.csv"), "new", later());
        write_with_mtime(&dst.path().join("dir/report.csv"), "old", base_time());

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let policy: Arc<dyn ConflictPolicy> = Arc::new(move |name: &str| {
            sink.lock().unwrap().push(name.to_string());
            ConflictDecision::Skip
        });
        SyncExecutor::new()
            .run(src.path(), dst.path(), policy)
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["report.csv".to_string()]);
    }

    #[tokio::test]
    async fn test_per_file_failure_does_not_abort() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_with_mtime(&src.path().join("blocked/inner.txt"), "x", base_time());
        write_with_mtime(&src.path().join("ok.txt"), "ok", base_time());
        // 目标侧同名普通文件挡住了目录
        std::fs::write(dst.path().join("blocked"), "file").unwrap();

        let report = SyncExecutor::new()
            .run(src.path(), dst.path(), policy(ConflictDecision::Overwrite))
            .await
            .unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(report.copied(), 1);
        let failed = report
            .outcomes
            .iter()
            .find(|o| o.action == SyncAction::Failed)
            .unwrap();
        assert_eq!(failed.relative_path, PathBuf::from("blocked/inner.txt"));
        assert!(failed.error.is_some());
        assert_eq!(std::fs::read_to_string(dst.path().join("ok.txt")).unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_missing_root_fails_fast() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let missing = dst.path().join("nope");

        let err = SyncExecutor::new()
            .run(src.path(), &missing, policy(ConflictDecision::Overwrite))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::PathNotFound { .. }));

        let err = SyncExecutor::new()
            .check_only(&missing, dst.path())
            .err()
            .unwrap();
        assert!(matches!(err, SyncError::PathNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_readonly_dest_fails_before_any_file() {
        use std::os::unix::fs::PermissionsExt;

        // root 不受权限限制
        if std::process::Command::new("id")
            .arg("-u")
            .output()
            .is_ok_and(|o| String::from_utf8_lossy(&o.stdout).trim() == "0")
        {
            return;
        }
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_with_mtime(&src.path().join("a.txt"), "a", base_time());
        std::fs::set_permissions(dst.path(), std::fs::Permissions::from_mode(0o555)).unwrap();

        let result = SyncExecutor::new()
            .run(src.path(), dst.path(), policy(ConflictDecision::Overwrite))
            .await;
        let _ = std::fs::set_permissions(dst.path(), std::fs::Permissions::from_mode(0o755));

        assert!(matches!(result, Err(SyncError::PermissionDenied { .. })));
        assert!(!dst.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_long_file_name_is_copied() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let name = "x".repeat(240);
        write_with_mtime(&src.path().join(&name), "long", base_time());

        let report = SyncExecutor::new()
            .run(src.path(), dst.path(), policy(ConflictDecision::Overwrite))
            .await
            .unwrap();
        assert_eq!(actions(&report), vec![(name.clone(), SyncAction::Copied)]);
        assert_eq!(std::fs::read_to_string(dst.path().join(&name)).unwrap(), "long");
    }

    #[tokio::test]
    async fn test_check_only_does_not_mutate() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_with_mtime(&src.path().join("new/a.txt"), "a", base_time());
        write_with_mtime(&src.path().join("b.txt"), "b2", later());
        write_with_mtime(&dst.path().join("b.txt"), "b1", base_time());
        write_with_mtime(&src.path().join("c.txt"), "c", base_time());
        write_with_mtime(&dst.path().join("c.txt"), "c", base_time());

        let src_before = snapshot(src.path());
        let dst_before = snapshot(dst.path());

        let executor = SyncExecutor::new();
        let mut summary = CheckSummary::default();
        let mut classes = Vec::new();
        for item in executor.check_only(src.path(), dst.path()).unwrap() {
            summary.record(&item);
            let (entry, class) = item.unwrap();
            classes.push((entry.relative_path, class));
        }

        assert_eq!(
            classes,
            vec![
                (PathBuf::from("b.txt"), Classification::Modified),
                (PathBuf::from("c.txt"), Classification::Unchanged),
                (PathBuf::from("new/a.txt"), Classification::New),
            ]
        );
        assert_eq!(summary.pending(), 2);
        assert_eq!(summary.unchanged_count, 1);
        assert_eq!(snapshot(src.path()), src_before);
        assert_eq!(snapshot(dst.path()), dst_before);
        assert!(!dst.path().join("new").exists());
    }

    #[tokio::test]
    async fn test_second_run_is_quiet() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_with_mtime(&src.path().join("a.txt"), "a", base_time());
        write_with_mtime(&src.path().join("b.txt"), "b2", later());
        write_with_mtime(&dst.path().join("b.txt"), "b1", base_time());

        let executor = SyncExecutor::new();
        let first = executor
            .run(src.path(), dst.path(), policy(ConflictDecision::Overwrite))
            .await
            .unwrap();
        assert_eq!(first.outcomes.len(), 2);

        let second = executor
            .run(src.path(), dst.path(), policy(ConflictDecision::Overwrite))
            .await
            .unwrap();
        assert!(second.outcomes.is_empty());
        assert!(executor
            .check_only(src.path(), dst.path())
            .unwrap()
            .all(|item| item.unwrap().1 == Classification::Unchanged));
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_file() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_with_mtime(&src.path().join("a.txt"), "new", later());
        write_with_mtime(&dst.path().join("a.txt"), "old", base_time());
        write_with_mtime(&src.path().join("b.txt"), "b", base_time());
        write_with_mtime(&src.path().join("c.txt"), "c", base_time());

        let executor = SyncExecutor::new();
        let flag = executor.cancel_flag();
        let policy: Arc<dyn ConflictPolicy> = Arc::new(move |_name: &str| {
            flag.store(true, Ordering::SeqCst);
            ConflictDecision::Skip
        });

        let report = executor.run(src.path(), dst.path(), policy).await.unwrap();
        assert!(report.cancelled);
        assert_eq!(actions(&report), vec![("a.txt".to_string(), SyncAction::SkippedConflict)]);
        assert!(!dst.path().join("b.txt").exists());
        assert!(!dst.path().join("c.txt").exists());
    }

    #[tokio::test]
    async fn test_closed_outcome_receiver_does_not_stop_run() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            write_with_mtime(&src.path().join(name), name, base_time());
        }

        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let report = SyncExecutor::new()
            .run_with_outcomes(src.path(), dst.path(), policy(ConflictDecision::Overwrite), Some(tx))
            .await
            .unwrap();
        assert_eq!(report.copied(), 3);
        assert!(dst.path().join("c.txt").exists());
    }

    #[tokio::test]
    async fn test_outcomes_streamed_in_walk_order() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        for i in 0..20 {
            write_with_mtime(
                &src.path().join(format!("f{:02}.txt", i)),
                &"x".repeat(i * 100),
                base_time(),
            );
        }

        let (tx, mut rx) = mpsc::channel(64);
        let executor = SyncExecutor::with_config(SyncConfig {
            max_concurrent_transfers: 3,
            channel_capacity: 2,
        });
        let report = executor
            .run_with_outcomes(src.path(), dst.path(), policy(ConflictDecision::Overwrite), Some(tx))
            .await
            .unwrap();

        let mut streamed = Vec::new();
        while let Some(outcome) = rx.recv().await {
            streamed.push(outcome);
        }
        assert_eq!(streamed, report.outcomes);

        let names: Vec<_> = report
            .outcomes
            .iter()
            .map(|o| o.relative_path.to_string_lossy().into_owned())
            .collect();
        let expected: Vec<_> = (0..20).map(|i| format!("f{:02}.txt", i)).collect();
        assert_eq!(names, expected);
        assert_eq!(report.copied(), 20);
    }
}
