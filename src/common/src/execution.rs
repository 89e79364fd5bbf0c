//! 统一执行结果模型
//!
//! 定义一次性执行与交互式执行的结果类型

use serde::{Deserialize, Serialize};

use crate::error::{Result, SshError};

/// 一次性执行超时时使用的退出码
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// 一次性执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// 退出码（远端未报告时为 -1）
    pub exit_code: i32,

    /// 按到达顺序合并的 stdout 与 stderr
    pub output: String,

    /// 标准输出
    pub stdout: String,

    /// 标准错误
    pub stderr: String,

    /// 执行时长（秒）
    pub duration_secs: f64,

    /// 是否超时
    pub timed_out: bool,
}

impl ExecutionResult {
    /// 判断是否成功
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// 获取输出摘要（限制长度）
    pub fn output_summary(&self, max_len: usize) -> String {
        summarize(&self.output, max_len)
    }

    /// 取出完整输出，超时的结果视为执行失败
    pub fn into_complete_output(self) -> Result<String> {
        if self.timed_out {
            return Err(SshError::Execution(format!(
                "command timed out after {:.1}s, output incomplete ({} bytes captured)",
                self.duration_secs,
                self.output.len()
            )));
        }
        Ok(self.output)
    }
}

impl Default for ExecutionResult {
    fn default() -> Self {
        Self {
            exit_code: -1,
            output: String::new(),
            stdout: String::new(),
            stderr: String::new(),
            duration_secs: 0.0,
            timed_out: false,
        }
    }
}

/// 交互式命令读取结束的方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReadStatus {
    /// 提示符重新出现，输出完整
    Complete,
    /// 等待提示符超时，输出可能不完整
    TimedOut,
    /// 远端 shell 已关闭
    ChannelClosed,
}

/// 交互式命令的执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    /// 发送的命令
    pub command: String,

    /// 规范化后的输出
    pub text: String,

    /// 读取状态
    pub status: ReadStatus,

    /// 执行时长（秒）
    pub duration_secs: f64,

    /// 写入命令前缓冲区中残留的上一条命令的迟到输出（已规范化）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_output: Option<String>,
}

impl CommandOutput {
    pub fn is_complete(&self) -> bool {
        self.status == ReadStatus::Complete
    }

    pub fn timed_out(&self) -> bool {
        self.status == ReadStatus::TimedOut
    }

    /// 获取输出摘要（限制长度）
    pub fn output_summary(&self, max_len: usize) -> String {
        summarize(&self.text, max_len)
    }
}

fn summarize(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    // 按字符边界截断
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_result_default() {
        let result = ExecutionResult::default();
        assert_eq!(result.exit_code, -1);
        assert!(result.output.is_empty());
        assert!(!result.is_success());
    }

    #[test]
    fn test_execution_result_success() {
        let result = ExecutionResult {
            exit_code: 0,
            output: "ok".to_string(),
            ..Default::default()
        };
        assert!(result.is_success());

        let timed_out = ExecutionResult {
            exit_code: TIMEOUT_EXIT_CODE,
            timed_out: true,
            ..Default::default()
        };
        assert!(!timed_out.is_success());
    }

    #[test]
    fn test_timed_out_result_is_not_complete_output() {
        let complete = ExecutionResult {
            exit_code: 0,
            output: "Linux\n".to_string(),
            ..Default::default()
        };
        assert_eq!(complete.into_complete_output().unwrap(), "Linux\n");

        let truncated = ExecutionResult {
            exit_code: TIMEOUT_EXIT_CODE,
            output: "partial".to_string(),
            duration_secs: 300.0,
            timed_out: true,
            ..Default::default()
        };
        let err = truncated.into_complete_output().unwrap_err();
        assert!(matches!(err, SshError::Execution(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_output_summary() {
        let result = ExecutionResult {
            output: "a".repeat(200),
            ..Default::default()
        };

        let summary = result.output_summary(50);
        assert_eq!(summary.len(), 53); // 50 + "..."
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn test_output_summary_char_boundary() {
        let output = CommandOutput {
            command: "cat".to_string(),
            text: "日志日志".to_string(),
            status: ReadStatus::Complete,
            duration_secs: 0.1,
            late_output: None,
        };
        // 第 4 个字节落在第二个汉字中间
        assert_eq!(output.output_summary(4), "日...");
    }

    #[test]
    fn test_command_output_status() {
        let output = CommandOutput {
            command: "sleep 11".to_string(),
            text: String::new(),
            status: ReadStatus::TimedOut,
            duration_secs: 10.0,
            late_output: None,
        };
        assert!(output.timed_out());
        assert!(!output.is_complete());
    }

    #[test]
    fn test_read_status_serialization() {
        let statuses = vec![
            (ReadStatus::Complete, "complete"),
            (ReadStatus::TimedOut, "timed_out"),
            (ReadStatus::ChannelClosed, "channel_closed"),
        ];

        for (status, expected) in statuses {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", expected));
        }
    }
}
