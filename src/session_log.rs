//! 会话日志
//!
//! 每次交互式命令写入两条记录：`Input: <command>` 与 `Output: <text>`，
//! 引导过程与失败写入诊断记录。日志实现通过 Connection 注入，默认转发到 tracing

use chrono::{SecondsFormat, Utc};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use common::Result;

/// 日志记录级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for RecordLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordLevel::Debug => "DEBUG",
            RecordLevel::Info => "INFO",
            RecordLevel::Warn => "WARN",
            RecordLevel::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// 追加式、按行记录的会话日志
pub trait SessionLog: Send + Sync {
    /// 写入一条记录，`stream_id` 用于关联同一个 Stream 的记录
    fn record(&self, stream_id: &str, level: RecordLevel, message: &str);

    fn input(&self, stream_id: &str, command: &str) {
        self.record(stream_id, RecordLevel::Info, &format!("Input: {}", command));
    }

    fn output(&self, stream_id: &str, text: &str) {
        self.record(stream_id, RecordLevel::Info, &format!("Output: {}", text));
    }

    fn warn(&self, stream_id: &str, message: &str) {
        self.record(stream_id, RecordLevel::Warn, message);
    }
}

/// 默认实现：转发为 tracing 事件
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl SessionLog for TracingLog {
    fn record(&self, stream_id: &str, level: RecordLevel, message: &str) {
        match level {
            RecordLevel::Debug => tracing::debug!(stream_id = %stream_id, "{}", message),
            RecordLevel::Info => tracing::info!(stream_id = %stream_id, "{}", message),
            RecordLevel::Warn => tracing::warn!(stream_id = %stream_id, "{}", message),
            RecordLevel::Error => tracing::error!(stream_id = %stream_id, "{}", message),
        }
    }
}

/// 文件日志：以追加方式写入，文件不存在时创建
pub struct FileLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileLog {
    /// 打开（或创建）日志文件
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for FileLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLog").field("path", &self.path).finish()
    }
}

impl SessionLog for FileLog {
    fn record(&self, stream_id: &str, level: RecordLevel, message: &str) {
        let line = format!(
            "{} {} stream={} {}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            stream_id,
            message
        );
        // 写入失败不影响命令执行，只记录到 tracing
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = file.write_all(line.as_bytes()) {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to write session log");
        }
    }
}
