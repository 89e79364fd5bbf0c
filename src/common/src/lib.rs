//! Common types shared by the ssh-stream modules

// 导出所有模块
pub mod error;
pub mod execution;
pub mod ssh;

// 重新导出常用的类型和常量
pub use error::{BootstrapError, Result, SshError};

pub use execution::{CommandOutput, ExecutionResult, ReadStatus, TIMEOUT_EXIT_CODE};

pub use ssh::{
    prompt_marker_for, LoginInfo, SshOptions, TerminalSettings, PRIVILEGED_USER, ROOT_PROMPT,
    USER_PROMPT,
};
