use clap::{Parser, Subcommand};
use dirsync_lib::commands::{self, PromptPolicy};
use dirsync_lib::config::EngineConfig;
use dirsync_lib::dirs::app_config_dir;
use dirsync_lib::logging::{init_logging, LogConfig};
use dirsync_lib::{ConflictDecision, ConflictPolicy, FixedPolicy, SyncExecutor};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "dirsync", version, about = "把源目录中新增或更新的文件同步到目标目录")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 预览待同步的文件，不做任何修改
    Check {
        /// 源目录，省略时使用上次的路径
        source: Option<PathBuf>,
        /// 目标目录，省略时使用上次的路径
        dest: Option<PathBuf>,
    },
    /// 执行同步，遇到目标文件被修改时询问是否覆盖
    Sync {
        source: Option<PathBuf>,
        dest: Option<PathBuf>,
        /// 不询问，覆盖所有冲突文件
        #[arg(long, conflicts_with = "skip_all")]
        overwrite_all: bool,
        /// 不询问，跳过所有冲突文件
        #[arg(long)]
        skip_all: bool,
    },
    /// 修改日志配置
    LogConfig {
        #[arg(long)]
        enabled: Option<bool>,
        /// error, warn, info, debug, trace
        #[arg(long)]
        level: Option<String>,
        /// 是否写入日志文件
        #[arg(long)]
        file_log: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_dir = app_config_dir();

    let _log_guard = init_logging(&LogConfig::load(&config_dir), &config_dir);

    match run(cli, config_dir).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("错误: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config_dir: PathBuf) -> anyhow::Result<ExitCode> {
    let executor = SyncExecutor::with_config(EngineConfig::load(&config_dir).sync_config());
    // colored 根据终端与 NO_COLOR 等环境变量决定是否着色
    let color = colored::control::SHOULD_COLORIZE.should_colorize();
    if !color {
        colored::control::set_override(false);
    }
    let mut stdout = std::io::stdout();

    match cli.command {
        Command::Check { source, dest } => {
            let (source, dest) = commands::sync::resolve_roots(&config_dir, source, dest)?;
            commands::sync::check(&executor, &source, &dest, &mut stdout, color)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Sync {
            source,
            dest,
            overwrite_all,
            skip_all,
        } => {
            let (source, dest) = commands::sync::resolve_roots(&config_dir, source, dest)?;
            let policy: Arc<dyn ConflictPolicy> = if overwrite_all {
                Arc::new(FixedPolicy(ConflictDecision::OverwriteAll))
            } else if skip_all {
                Arc::new(FixedPolicy(ConflictDecision::SkipAll))
            } else {
                Arc::new(PromptPolicy::stdin())
            };

            // 第一次 Ctrl-C 在当前文件之后停止，第二次直接退出
            let cancel = executor.cancel_flag();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("正在取消，再按一次 Ctrl-C 立即退出...");
                    cancel.store(true, Ordering::SeqCst);
                    if tokio::signal::ctrl_c().await.is_ok() {
                        std::process::exit(130);
                    }
                }
            });

            let report =
                commands::sync::sync(&executor, &source, &dest, policy, &mut stdout, color).await?;
            Ok(if report.failed() > 0 {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::LogConfig {
            enabled,
            level,
            file_log,
        } => {
            let config = commands::log::update_log_config(&config_dir, enabled, level, file_log)
                .map_err(anyhow::Error::msg)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
