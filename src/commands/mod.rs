//! 命令行外壳：路径记忆、交互式冲突提示与结果输出

pub mod log;
pub mod prompt;
pub mod render;
pub mod sync;

pub use prompt::PromptPolicy;
