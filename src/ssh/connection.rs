//! SSH 连接
//! 持有一个已认证的 russh 会话，提供一次性执行与交互式 Stream 工厂

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use russh::client::{self, Config, Handle};
use russh::{ChannelMsg, Disconnect};

use common::{ExecutionResult, LoginInfo, Result, SshError, SshOptions, TIMEOUT_EXIT_CODE};

use super::channel::open_shell;
use super::handler::ClientHandler;
use super::stream::{InteractiveStream, StreamSettings};
use crate::session_log::{SessionLog, TracingLog};

/// 一个已认证的 SSH 连接
pub struct Connection {
    user: String,
    target: String,
    options: SshOptions,
    handle: Mutex<Handle<ClientHandler>>,
    log: Arc<dyn SessionLog>,
}

impl Connection {
    /// 建立连接并使用密码认证
    ///
    /// 连接与认证必须在 `connect_timeout_secs` 内完成。不校验主机密钥
    pub async fn open(login: &LoginInfo, options: SshOptions) -> Result<Self> {
        let target = login.target();
        debug!(target = %target, "Opening SSH connection");

        let connect_timeout = options.connect_timeout();
        let handle = timeout(connect_timeout, Self::authenticate(login))
            .await
            .map_err(|_| {
                error!(target = %target, "SSH连接超时");
                SshError::Dial(format!(
                    "连接超时: {} ({}s)",
                    target,
                    connect_timeout.as_secs()
                ))
            })??;

        info!(target = %target, "SSH认证成功");

        Ok(Self {
            user: login.user.clone(),
            target,
            options,
            handle: Mutex::new(handle),
            log: Arc::new(TracingLog),
        })
    }

    async fn authenticate(login: &LoginInfo) -> Result<Handle<ClientHandler>> {
        let config = Arc::new(Config {
            preferred: russh::Preferred::default(),
            ..Default::default()
        });
        let handler = ClientHandler::new(&login.host, login.port);

        let mut handle = client::connect(config, (login.host.clone(), login.port), handler)
            .await
            .map_err(|e| {
                error!(error = %e, "SSH连接失败");
                SshError::Dial(format!("SSH连接失败: {}", e))
            })?;

        let authenticated = handle
            .authenticate_password(login.user.clone(), login.expose_password())
            .await
            .map_err(|e| {
                error!(error = %e, "SSH认证失败");
                SshError::Authentication(e.to_string())
            })?;

        if !authenticated {
            error!(target = %login.target(), "SSH认证失败");
            return Err(SshError::Authentication(format!(
                "password rejected for {}",
                login.target()
            )));
        }

        Ok(handle)
    }

    /// 注入会话日志，之后创建的 Stream 都使用它
    pub fn with_log(mut self, log: Arc<dyn SessionLog>) -> Self {
        self.log = log;
        self
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn options(&self) -> &SshOptions {
        &self.options
    }

    /// 当前用户对应的提示符标记
    pub fn prompt_marker(&self) -> &'static str {
        common::prompt_marker_for(&self.user)
    }

    /// 在临时通道上执行单条命令，返回合并后的输出
    ///
    /// 命令必须执行完成，等待输出超时返回 `SshError::Execution` 而不是部分输出。
    /// 需要部分输出或退出码时使用 [`execute`](Self::execute)
    pub async fn run_once(&self, command: &str) -> Result<String> {
        self.execute(command).await?.into_complete_output()
    }

    /// 在临时通道上执行单条命令
    pub async fn execute(&self, command: &str) -> Result<ExecutionResult> {
        let start_time = Instant::now();

        debug!(target = %self.target, command = %command, "Executing SSH command");

        let mut channel = {
            let handle = self.handle.lock().await;
            handle.channel_open_session().await.map_err(|e| {
                error!(error = %e, "打开SSH通道失败");
                SshError::Channel(format!("打开SSH通道失败: {}", e))
            })?
        };

        channel.exec(true, command).await.map_err(|e| {
            error!(error = %e, "执行命令失败");
            SshError::Execution(format!("执行命令失败: {}", e))
        })?;

        let mut output = Vec::new();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = -1;
        let mut timed_out = false;

        // 读取输出，直到远端关闭通道
        let exec_timeout = self.options.exec_timeout();

        loop {
            let msg = timeout(exec_timeout, channel.wait()).await;

            match msg {
                Ok(Some(ChannelMsg::Data { ref data })) => {
                    stdout.extend_from_slice(data);
                    output.extend_from_slice(data);
                }
                Ok(Some(ChannelMsg::ExtendedData { ref data, ext })) => {
                    if ext == 1 {
                        // SSH_EXTENDED_DATA_STDERR
                        stderr.extend_from_slice(data);
                    }
                    output.extend_from_slice(data);
                }
                Ok(Some(ChannelMsg::ExitStatus { exit_status })) => {
                    exit_code = exit_status as i32;
                }
                Ok(Some(ChannelMsg::Close)) | Ok(None) => {
                    break;
                }
                Err(_) => {
                    warn!(target = %self.target, command = %command, "命令执行超时");
                    exit_code = TIMEOUT_EXIT_CODE;
                    timed_out = true;
                    break;
                }
                _ => {}
            }
        }

        let _ = channel.close().await;

        let result = ExecutionResult {
            exit_code,
            output: String::from_utf8_lossy(&output).to_string(),
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            duration_secs: start_time.elapsed().as_secs_f64(),
            timed_out,
        };

        info!(
            target = %self.target,
            exit_code = result.exit_code,
            duration_secs = result.duration_secs,
            output_len = result.output.len(),
            summary = %result.output_summary(200),
            "Command executed"
        );

        Ok(result)
    }

    /// 打开一个交互式 Stream（请求伪终端、启动 shell、等待首个提示符）
    pub async fn new_stream(&self) -> Result<InteractiveStream> {
        let shell = {
            let handle = self.handle.lock().await;
            open_shell(&handle, &self.options.terminal).await
        }
        .map_err(|e| {
            error!(target = %self.target, error = %e, "Stream create failed");
            SshError::from(e)
        })?;

        let settings = StreamSettings::from_options(self.prompt_marker(), &self.options);
        let stream = InteractiveStream::start(shell, settings, self.log.clone()).await?;

        info!(target = %self.target, stream_id = %stream.id(), "Stream opened");
        Ok(stream)
    }

    /// 底层传输是否已断开
    pub async fn is_closed(&self) -> bool {
        self.handle.lock().await.is_closed()
    }

    /// 断开连接
    pub async fn close(&self) -> Result<()> {
        let handle = self.handle.lock().await;
        handle
            .disconnect(Disconnect::ByApplication, "", "")
            .await
            .map_err(|e| SshError::Channel(format!("断开连接失败: {}", e)))?;
        info!(target = %self.target, "SSH connection closed");
        Ok(())
    }
}
