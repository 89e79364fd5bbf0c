//! 配置系统
//! 从环境变量加载日志与 SSH 选项，缺省值与 `SshOptions::default()` 一致

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::sync::Arc;

use common::{Result, SshOptions};

use crate::session_log::{FileLog, SessionLog, TracingLog};

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty, compact
    pub format: String,
    /// 会话记录文件（可选），未设置时写入 tracing
    pub file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub ssh: SshOptions,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        let defaults = SshOptions::default();
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("logging.level", "info")?
            .set_default("logging.format", "compact")?
            .set_default("ssh.connect_timeout_secs", defaults.connect_timeout_secs as i64)?
            .set_default("ssh.bootstrap_timeout_secs", defaults.bootstrap_timeout_secs as i64)?
            .set_default("ssh.command_timeout_secs", defaults.command_timeout_secs as i64)?
            .set_default("ssh.exec_timeout_secs", defaults.exec_timeout_secs as i64)?
            .set_default("ssh.terminal.term", defaults.terminal.term.clone())?
            .set_default("ssh.terminal.cols", i64::from(defaults.terminal.cols))?
            .set_default("ssh.terminal.rows", i64::from(defaults.terminal.rows))?
            .set_default("ssh.terminal.echo", defaults.terminal.echo)?
            .set_default("ssh.terminal.baud", i64::from(defaults.terminal.baud))?;

        // 从环境变量加载配置（前缀为 SSH_STREAM_）
        settings = settings.add_source(
            Environment::with_prefix("SSH_STREAM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty, compact",
                    self.logging.format
                )))
            }
        }

        if matches!(self.logging.file.as_deref(), Some(path) if path.trim().is_empty()) {
            return Err(ConfigError::Message(
                "logging.file must not be empty when set".to_string(),
            ));
        }

        // 验证超时
        let timeouts = [
            ("connect_timeout_secs", self.ssh.connect_timeout_secs),
            ("bootstrap_timeout_secs", self.ssh.bootstrap_timeout_secs),
            ("command_timeout_secs", self.ssh.command_timeout_secs),
            ("exec_timeout_secs", self.ssh.exec_timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Message(format!("ssh.{} must be > 0", name)));
        }

        // 验证伪终端尺寸
        if self.ssh.terminal.cols == 0 || self.ssh.terminal.rows == 0 {
            return Err(ConfigError::Message(
                "ssh.terminal cols and rows must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// 按配置创建会话记录器
    pub fn session_log(&self) -> Result<Arc<dyn SessionLog>> {
        match &self.logging.file {
            Some(path) => Ok(Arc::new(FileLog::open(path)?)),
            None => Ok(Arc::new(TracingLog)),
        }
    }
}
