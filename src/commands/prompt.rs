//! 交互式冲突提示

use crate::core::{ConflictDecision, ConflictPolicy};
use std::io::{self, BufRead, Write};
use std::sync::Mutex;
use tracing::warn;

/// 解析用户输入，空输入取默认值（覆盖）
pub fn parse_answer(input: &str) -> Option<ConflictDecision> {
    match input.trim().to_lowercase().as_str() {
        "" | "y" | "yes" => Some(ConflictDecision::Overwrite),
        "n" | "no" => Some(ConflictDecision::Skip),
        "a" | "all" | "yes-to-all" => Some(ConflictDecision::OverwriteAll),
        "s" | "none" | "no-to-all" => Some(ConflictDecision::SkipAll),
        _ => None,
    }
}

/// 通过终端逐个询问冲突文件
///
/// 输入结束（EOF）或读取失败时视为全部跳过，不会在无人值守时覆盖文件。
pub struct PromptPolicy<R, W> {
    io: Mutex<(R, W)>,
}

impl PromptPolicy<io::BufReader<io::Stdin>, io::Stderr> {
    pub fn stdin() -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stderr())
    }
}

impl<R, W> PromptPolicy<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }

    fn ask(reader: &mut R, writer: &mut W, file_name: &str) -> io::Result<ConflictDecision> {
        loop {
            write!(
                writer,
                "文件 \"{}\" 已被修改，是否覆盖？[Y]是 / [n]否 / [a]全部覆盖 / [s]全部跳过: ",
                file_name
            )?;
            writer.flush()?;

            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "输入已结束"));
            }
            match parse_answer(&line) {
                Some(decision) => return Ok(decision),
                None => writeln!(writer, "无法识别的选项: {}", line.trim())?,
            }
        }
    }
}

impl<R, W> ConflictPolicy for PromptPolicy<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn decide(&self, file_name: &str) -> ConflictDecision {
        let mut guard = match self.io.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let (reader, writer) = &mut *guard;
        match Self::ask(reader, writer, file_name) {
            Ok(decision) => decision,
            Err(e) => {
                warn!("读取冲突选择失败，跳过其余冲突: {}", e);
                ConflictDecision::SkipAll
            }
        }
    }
}
