//! SSH 登录信息与会话选项
//!
//! 统一的 SSH 配置定义，可被 Connection、InteractiveStream 以及配置加载共享

use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 特权用户（root）的提示符结尾
pub const ROOT_PROMPT: &str = "]#";

/// 普通用户的提示符结尾
pub const USER_PROMPT: &str = "]$";

/// 特权账户名
pub const PRIVILEGED_USER: &str = "root";

/// 根据登录用户选择提示符标记
///
/// 假设远端是 POSIX 风格的提示符，例如 `[tian@host ~]$`。
/// 其他格式的提示符需要调用方通过 `update_read_until_expect` 显式指定
pub fn prompt_marker_for(user: &str) -> &'static str {
    if user == PRIVILEGED_USER {
        ROOT_PROMPT
    } else {
        USER_PROMPT
    }
}

/// 登录信息（凭据），只在打开 Connection 时使用一次
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInfo {
    /// 用户名
    pub user: String,

    /// 主机地址
    pub host: String,

    /// 端口
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// 密码（使用 Secret 包装，防止日志泄露）
    pub password: Secret<String>,
}

impl LoginInfo {
    /// 创建新的登录信息
    pub fn new(user: &str, host: &str, port: u16, password: &str) -> Self {
        Self {
            user: user.to_string(),
            host: host.to_string(),
            port,
            password: Secret::new(password.to_string()),
        }
    }

    /// 获取密码明文（仅在认证时调用）
    pub fn expose_password(&self) -> &str {
        self.password.expose_secret()
    }

    /// 是否为特权用户
    pub fn is_privileged(&self) -> bool {
        self.user == PRIVILEGED_USER
    }

    /// 该用户对应的提示符标记
    pub fn prompt_marker(&self) -> &'static str {
        prompt_marker_for(&self.user)
    }

    /// 获取目标地址字符串
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

/// 伪终端参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSettings {
    /// 终端类型
    #[serde(default = "default_term")]
    pub term: String,

    /// 列数
    #[serde(default = "default_cols")]
    pub cols: u32,

    /// 行数
    #[serde(default = "default_rows")]
    pub rows: u32,

    /// 是否开启回显
    #[serde(default)]
    pub echo: bool,

    /// 输入/输出波特率
    #[serde(default = "default_baud")]
    pub baud: u32,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            term: default_term(),
            cols: default_cols(),
            rows: default_rows(),
            echo: false,
            baud: default_baud(),
        }
    }
}

/// Connection 与 InteractiveStream 的运行选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshOptions {
    /// 连接（含认证）超时（秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// 等待首个提示符的超时（秒）
    #[serde(default = "default_bootstrap_timeout")]
    pub bootstrap_timeout_secs: u64,

    /// 交互式命令等待提示符的默认超时（秒）
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// 一次性执行时等待单条消息的超时（秒）
    #[serde(default = "default_exec_timeout")]
    pub exec_timeout_secs: u64,

    /// 伪终端参数
    #[serde(default)]
    pub terminal: TerminalSettings,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_term() -> String {
    "xterm".to_string()
}

fn default_cols() -> u32 {
    80
}

fn default_rows() -> u32 {
    40
}

fn default_baud() -> u32 {
    14400
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_bootstrap_timeout() -> u64 {
    10
}

fn default_command_timeout() -> u64 {
    10
}

fn default_exec_timeout() -> u64 {
    300
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            bootstrap_timeout_secs: default_bootstrap_timeout(),
            command_timeout_secs: default_command_timeout(),
            exec_timeout_secs: default_exec_timeout(),
            terminal: TerminalSettings::default(),
        }
    }
}

impl SshOptions {
    /// 设置连接超时
    pub fn with_connect_timeout(mut self, timeout_secs: u64) -> Self {
        self.connect_timeout_secs = timeout_secs;
        self
    }

    /// 设置引导超时
    pub fn with_bootstrap_timeout(mut self, timeout_secs: u64) -> Self {
        self.bootstrap_timeout_secs = timeout_secs;
        self
    }

    /// 设置命令超时
    pub fn with_command_timeout(mut self, timeout_secs: u64) -> Self {
        self.command_timeout_secs = timeout_secs;
        self
    }

    /// 设置伪终端参数
    pub fn with_terminal(mut self, terminal: TerminalSettings) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }
}
