//! Shell 通道抽象
//!
//! InteractiveStream 只依赖 `ShellChannel`，russh 的会话通道是其生产实现

use async_trait::async_trait;
use russh::client::{Handle, Msg};
use russh::{Channel, ChannelMsg, Pty};
use std::collections::VecDeque;
use tracing::debug;

use common::{BootstrapError, Result, SshError, TerminalSettings};

use super::handler::ClientHandler;

/// 已启动 shell 的双向字节通道
#[async_trait]
pub trait ShellChannel: Send + 'static {
    /// 写入远端 stdin
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// 读取下一段 stdout/stderr 数据，`None` 表示远端已关闭
    ///
    /// 该方法会在 `tokio::select!` 中被取消，实现必须保证取消时不丢数据
    async fn recv(&mut self) -> Option<Vec<u8>>;

    /// 关闭通道
    async fn close(&mut self) -> Result<()>;
}

/// russh 会话通道上的交互式 shell
pub struct RusshShell {
    channel: Channel<Msg>,
    /// 等待请求应答期间收到的数据
    pending: VecDeque<Vec<u8>>,
}

#[async_trait]
impl ShellChannel for RusshShell {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.channel
            .data(data)
            .await
            .map_err(|e| SshError::Execution(format!("写入shell失败: {}", e)))
    }

    async fn recv(&mut self) -> Option<Vec<u8>> {
        if let Some(data) = self.pending.pop_front() {
            return Some(data);
        }
        loop {
            match self.channel.wait().await? {
                ChannelMsg::Data { ref data } => return Some(data.to_vec()),
                // pty 下 stderr 通常已合并到 stdout，这里仍一并收集
                ChannelMsg::ExtendedData { ref data, .. } => return Some(data.to_vec()),
                ChannelMsg::Eof | ChannelMsg::Close => return None,
                ChannelMsg::ExitStatus { exit_status } => {
                    debug!(exit_status = exit_status, "Remote shell exited");
                }
                _ => {}
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.channel.eof().await;
        self.channel
            .close()
            .await
            .map_err(|e| SshError::Channel(format!("关闭通道失败: {}", e)))
    }
}

/// 伪终端模式：回显与波特率
pub(crate) fn terminal_modes(terminal: &TerminalSettings) -> [(Pty, u32); 3] {
    [
        (Pty::ECHO, u32::from(terminal.echo)),
        (Pty::TTY_OP_ISPEED, terminal.baud),
        (Pty::TTY_OP_OSPEED, terminal.baud),
    ]
}

/// 打开会话通道，请求伪终端并启动 shell
pub(crate) async fn open_shell(
    handle: &Handle<ClientHandler>,
    terminal: &TerminalSettings,
) -> std::result::Result<RusshShell, BootstrapError> {
    let mut channel = handle
        .channel_open_session()
        .await
        .map_err(|e| BootstrapError::OpenChannel(e.to_string()))?;
    let mut pending = VecDeque::new();

    channel
        .request_pty(
            true,
            &terminal.term,
            terminal.cols,
            terminal.rows,
            0,
            0,
            &terminal_modes(terminal),
        )
        .await
        .map_err(|e| BootstrapError::RequestPty(e.to_string()))?;
    await_reply(&mut channel, &mut pending)
        .await
        .map_err(BootstrapError::RequestPty)?;

    channel
        .request_shell(true)
        .await
        .map_err(|e| BootstrapError::StartShell(e.to_string()))?;
    await_reply(&mut channel, &mut pending)
        .await
        .map_err(BootstrapError::StartShell)?;

    debug!(term = %terminal.term, cols = terminal.cols, rows = terminal.rows, "Shell started");

    Ok(RusshShell { channel, pending })
}

/// 等待 want_reply 请求的应答，期间到达的数据先暂存
async fn await_reply(
    channel: &mut Channel<Msg>,
    pending: &mut VecDeque<Vec<u8>>,
) -> std::result::Result<(), String> {
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => return Ok(()),
            Some(ChannelMsg::Failure) => return Err("request rejected by server".to_string()),
            Some(ChannelMsg::Data { ref data }) => pending.push_back(data.to_vec()),
            Some(ChannelMsg::ExtendedData { ref data, .. }) => pending.push_back(data.to_vec()),
            Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                return Err("channel closed before reply".to_string())
            }
            Some(_) => {}
        }
    }
}
