//! 统一错误模型
//! 定义连接、引导、命令执行过程中的所有错误类型
//!
//! 此模块提供的错误类型可被 ssh-stream 的所有模块共享使用

/// 交互式 Stream 引导失败的原因
///
/// 引导没有部分成功的状态：要么得到一个就绪的 Stream，要么得到这里的某个错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootstrapError {
    #[error("failed to open session channel: {0}")]
    OpenChannel(String),

    #[error("pseudo-terminal request rejected: {0}")]
    RequestPty(String),

    #[error("failed to start shell: {0}")]
    StartShell(String),

    #[error("prompt {marker:?} did not appear within {waited_ms}ms")]
    Timeout { marker: String, waited_ms: u64 },

    #[error("remote shell closed before the first prompt")]
    ChannelClosed,
}

/// SSH 错误类型
#[derive(Debug, Clone, thiserror::Error)]
pub enum SshError {
    #[error("SSH dial error: {0}")]
    Dial(String),

    #[error("SSH authentication failed: {0}")]
    Authentication(String),

    #[error("Stream bootstrap failed: {0}")]
    StreamBootstrap(#[from] BootstrapError),

    /// 仅用于日志记录，`run` 不会把它返回给调用方
    #[error("timeout waiting for prompt {marker:?} after {waited_ms}ms")]
    ReadTimeout { marker: String, waited_ms: u64 },

    #[error("SSH channel error: {0}")]
    Channel(String),

    #[error("SSH execution error: {0}")]
    Execution(String),

    #[error("Stream is closed")]
    StreamClosed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl SshError {
    /// 稳定的错误分类标签，用于结构化日志
    pub fn kind(&self) -> &'static str {
        match self {
            SshError::Dial(_) => "dial",
            SshError::Authentication(_) => "authentication",
            SshError::StreamBootstrap(_) => "stream_bootstrap",
            SshError::ReadTimeout { .. } => "read_timeout",
            SshError::Channel(_) => "channel",
            SshError::Execution(_) => "execution",
            SshError::StreamClosed => "stream_closed",
            SshError::Config(_) => "config",
            SshError::Io(_) => "io",
        }
    }

    /// 获取用户友好的错误消息（不包含主机、凭据等敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            SshError::Dial(_) => "SSH connection failed".to_string(),
            SshError::Authentication(_) => "SSH authentication failed".to_string(),
            SshError::StreamBootstrap(BootstrapError::Timeout { .. }) => {
                "Remote shell did not become ready in time".to_string()
            }
            SshError::StreamBootstrap(_) => "Remote shell could not be started".to_string(),
            SshError::ReadTimeout { .. } => "Command output incomplete (timed out)".to_string(),
            SshError::Channel(_) => "SSH channel could not be opened".to_string(),
            SshError::Execution(_) => "SSH command execution failed".to_string(),
            SshError::StreamClosed => "Stream is closed".to_string(),
            SshError::Config(_) => "Configuration error".to_string(),
            SshError::Io(msg) => format!("IO error: {}", msg),
        }
    }

    /// 是否为构造阶段的错误（拨号、认证、引导）
    pub fn is_construction_failure(&self) -> bool {
        matches!(
            self,
            SshError::Dial(_) | SshError::Authentication(_) | SshError::StreamBootstrap(_)
        )
    }

    // 便捷方法
    pub fn dial(msg: &str) -> Self {
        SshError::Dial(msg.to_string())
    }

    pub fn channel(msg: &str) -> Self {
        SshError::Channel(msg.to_string())
    }

    pub fn execution(msg: &str) -> Self {
        SshError::Execution(msg.to_string())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, SshError>;

/// 从 std::io::Error 转换
impl From<std::io::Error> for SshError {
    fn from(e: std::io::Error) -> Self {
        SshError::Io(e.to_string())
    }
}
