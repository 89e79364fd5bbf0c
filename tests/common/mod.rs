//! 测试公共模块
//! 提供脚本化的假 shell 以及内存会话日志

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use ssh_stream::{RecordLevel, Result, SessionLog, ShellChannel, SshError};

pub const USER_PROMPT_LINE: &str = "[tian@host ~]$ ";
pub const ROOT_PROMPT_LINE: &str = "[root@host ~]# ";
pub const BANNER: &str = "Last login: Mon Oct 19 09:12:01 2026 from 10.0.0.8\r\n";

/// 假 shell 的启动方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    /// 输出登录信息和提示符
    Ready,
    /// 只输出登录信息，不出现提示符
    Silent,
    /// 输出登录信息后立即断开
    HangUp,
}

/// 假 shell 的可观察状态
#[derive(Default)]
pub struct ShellState {
    prompt: Mutex<String>,
    inputs: Mutex<Vec<String>>,
    running: AtomicUsize,
    overlaps: AtomicUsize,
    closed: AtomicBool,
}

impl ShellState {
    /// 收到的全部命令行（按到达顺序）
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }

    /// 前一条命令尚未结束时又收到新命令的次数
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// Stream 是否关闭了通道
    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn prompt(&self) -> String {
        self.prompt.lock().unwrap().clone()
    }
}

/// 脚本化的远端 shell
///
/// 支持的命令：`echo <text>`、`pwd`、`whoami`、`sleep <secs>`、`color`、
/// `PS1=<prompt>`、`exit`，以及用 `;` 连接的命令序列。其他命令输出 `command not found`
pub struct FakeShell {
    output: mpsc::UnboundedSender<Option<Vec<u8>>>,
    incoming: mpsc::UnboundedReceiver<Option<Vec<u8>>>,
    state: Arc<ShellState>,
    user: String,
}

impl FakeShell {
    pub fn new(startup: Startup) -> (Self, Arc<ShellState>) {
        Self::for_user("tian", startup)
    }

    pub fn for_user(user: &str, startup: Startup) -> (Self, Arc<ShellState>) {
        let prompt = if user == "root" {
            ROOT_PROMPT_LINE
        } else {
            USER_PROMPT_LINE
        };
        let state = Arc::new(ShellState {
            prompt: Mutex::new(prompt.to_string()),
            ..Default::default()
        });
        let (output, incoming) = mpsc::unbounded_channel();

        let _ = output.send(Some(BANNER.as_bytes().to_vec()));
        match startup {
            Startup::Ready => {
                let _ = output.send(Some(prompt.as_bytes().to_vec()));
            }
            Startup::Silent => {}
            Startup::HangUp => {
                let _ = output.send(None);
            }
        }

        let shell = Self {
            output,
            incoming,
            state: state.clone(),
            user: user.to_string(),
        };
        (shell, state)
    }
}

#[async_trait]
impl ShellChannel for FakeShell {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.state.was_closed() {
            return Err(SshError::Channel("fake shell closed".to_string()));
        }
        let text = String::from_utf8_lossy(data).to_string();
        for line in text.lines() {
            self.state.inputs.lock().unwrap().push(line.to_string());
            if self.state.running.fetch_add(1, Ordering::SeqCst) > 0 {
                self.state.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            tokio::spawn(execute(
                line.to_string(),
                self.user.clone(),
                self.state.clone(),
                self.output.clone(),
            ));
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<Vec<u8>> {
        // mpsc 的 recv 可以安全取消
        self.incoming.recv().await.flatten()
    }

    async fn close(&mut self) -> Result<()> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

async fn execute(
    line: String,
    user: String,
    state: Arc<ShellState>,
    output: mpsc::UnboundedSender<Option<Vec<u8>>>,
) {
    for command in line.split(';').map(str::trim).filter(|c| !c.is_empty()) {
        let (name, args) = command.split_once(' ').unwrap_or((command, ""));
        let reply = match name {
            "echo" => format!("{}\r\n", args),
            "pwd" => format!("/home/{}\r\n", user),
            "whoami" => format!("{}\r\n", user),
            "color" => "\x1B[01;34mbin\x1B[0m  \x1B[01;32mrun.sh\x1B[0m\r\n".to_string(),
            "sleep" => {
                let secs: f64 = args.parse().unwrap_or(0.0);
                tokio::time::sleep(Duration::from_secs_f64(secs)).await;
                String::new()
            }
            "exit" => {
                let _ = output.send(Some(b"logout\r\n".to_vec()));
                let _ = output.send(None);
                state.running.fetch_sub(1, Ordering::SeqCst);
                return;
            }
            _ if command.starts_with("PS1=") => {
                let prompt = command.trim_start_matches("PS1=").trim_matches('\'');
                *state.prompt.lock().unwrap() = prompt.to_string();
                String::new()
            }
            _ => format!("-bash: {}: command not found\r\n", name),
        };
        if !reply.is_empty() {
            let _ = output.send(Some(reply.into_bytes()));
        }
    }

    // 提示符分两段发送，模拟标记跨越两次读取
    let prompt = state.prompt();
    let split = prompt.len().saturating_sub(2);
    state.running.fetch_sub(1, Ordering::SeqCst);
    let _ = output.send(Some(prompt[..split].as_bytes().to_vec()));
    tokio::task::yield_now().await;
    let _ = output.send(Some(prompt[split..].as_bytes().to_vec()));
}

/// 内存会话日志
#[derive(Default)]
pub struct MemoryLog {
    records: Mutex<Vec<(String, RecordLevel, String)>>,
}

impl MemoryLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, message)| message.clone())
            .collect()
    }

    pub fn at_level(&self, level: RecordLevel) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, l, _)| *l == level)
            .map(|(_, _, message)| message.clone())
            .collect()
    }

    pub fn stream_ids(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _, _)| id.clone())
            .collect()
    }
}

impl SessionLog for MemoryLog {
    fn record(&self, stream_id: &str, level: RecordLevel, message: &str) {
        self.records
            .lock()
            .unwrap()
            .push((stream_id.to_string(), level, message.to_string()));
    }
}
