use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// 冲突解决决定
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictDecision {
    /// 交互提示的默认选项
    #[default]
    Overwrite,
    Skip,
    /// 本次会话内后续冲突全部覆盖
    OverwriteAll,
    /// 本次会话内后续冲突全部跳过
    SkipAll,
}

impl fmt::Display for ConflictDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictDecision::Overwrite => write!(f, "overwrite"),
            ConflictDecision::Skip => write!(f, "skip"),
            ConflictDecision::OverwriteAll => write!(f, "overwrite_all"),
            ConflictDecision::SkipAll => write!(f, "skip_all"),
        }
    }
}

/// 冲突策略，由调用方注入
///
/// 参数是文件名（不含目录）。实现可以阻塞等待用户输入，引擎保证同一时刻
/// 最多只有一次调用。
pub trait ConflictPolicy: Send + Sync {
    fn decide(&self, file_name: &str) -> ConflictDecision;
}

impl<F> ConflictPolicy for F
where
    F: Fn(&str) -> ConflictDecision + Send + Sync,
{
    fn decide(&self, file_name: &str) -> ConflictDecision {
        self(file_name)
    }
}

/// 总是返回同一个决定，用于无人值守运行和测试
#[derive(Debug, Clone, Copy)]
pub struct FixedPolicy(pub ConflictDecision);

impl ConflictPolicy for FixedPolicy {
    fn decide(&self, _file_name: &str) -> ConflictDecision {
        self.0
    }
}

/// 会话内的冲突处理状态，`AlwaysOverwrite` 与 `AlwaysSkip` 一旦进入就不再离开
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictState {
    Normal,
    AlwaysOverwrite,
    AlwaysSkip,
}

/// 对一个冲突文件的最终处理
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Overwrite,
    Skip,
}

/// 一次 `run` 的会话状态，每次运行新建，不跨会话共享
#[derive(Debug)]
pub struct SyncSession {
    pub source_root: PathBuf,
    pub dest_root: PathBuf,
    overwrite_all: bool,
    skip_all: bool,
}

impl SyncSession {
    pub fn new(source_root: PathBuf, dest_root: PathBuf) -> Self {
        Self {
            source_root,
            dest_root,
            overwrite_all: false,
            skip_all: false,
        }
    }

    pub fn state(&self) -> ConflictState {
        if self.skip_all {
            ConflictState::AlwaysSkip
        } else if self.overwrite_all {
            ConflictState::AlwaysOverwrite
        } else {
            ConflictState::Normal
        }
    }

    /// 不询问策略即可得出的处理结果
    pub fn sticky_resolution(&self) -> Option<Resolution> {
        match self.state() {
            ConflictState::AlwaysSkip => Some(Resolution::Skip),
            ConflictState::AlwaysOverwrite => Some(Resolution::Overwrite),
            ConflictState::Normal => None,
        }
    }

    /// 应用策略的决定，必要时切换状态
    pub fn apply(&mut self, decision: ConflictDecision) -> Resolution {
        match decision {
            ConflictDecision::Overwrite => Resolution::Overwrite,
            ConflictDecision::Skip => Resolution::Skip,
            ConflictDecision::OverwriteAll => {
                debug!("后续冲突全部覆盖");
                self.overwrite_all = true;
                Resolution::Overwrite
            }
            ConflictDecision::SkipAll => {
                debug!("后续冲突全部跳过");
                self.skip_all = true;
                Resolution::Skip
            }
        }
    }
}
