//! SSH 交互式 shell 库
//! 在单个 SSH 连接上执行一次性命令，或在持久 shell 中按提示符逐条执行命令

pub mod config;
pub mod output;
pub mod session_log;
pub mod ssh;
pub mod telemetry;

pub use common::{
    BootstrapError, CommandOutput, ExecutionResult, LoginInfo, ReadStatus, Result, SshError,
    SshOptions, TerminalSettings,
};
pub use output::{contains_prompt, normalize_command_output, strip_ansi};
pub use session_log::{FileLog, RecordLevel, SessionLog, TracingLog};
pub use ssh::{Connection, InteractiveStream, ShellChannel, StreamSettings};
