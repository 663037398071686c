pub mod comparator;
pub mod conflict;
pub mod engine;
pub mod paths;
pub mod transfer;

pub use comparator::{Classification, FileEntries, FileEntry, TreeComparator};
pub use conflict::{ConflictDecision, ConflictPolicy, ConflictState, FixedPolicy, SyncSession};
pub use engine::{CheckSummary, SyncAction, SyncConfig, SyncExecutor, SyncOutcome, SyncReport};
pub use paths::{normalize_path, validate_roots};
pub use transfer::copy_file_atomic;
