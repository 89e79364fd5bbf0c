//! 交互式 Stream
//!
//! 在一个持久 shell 上依次执行命令。远端不会通知命令结束，
//! 只能通过提示符重新出现来判断，因此同一时刻只允许一条命令在执行

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use common::{BootstrapError, CommandOutput, ReadStatus, Result, SshError, SshOptions};

use super::buffer::{Drained, OutputBuffer};
use super::channel::ShellChannel;
use crate::output::normalize_command_output;
use crate::session_log::{RecordLevel, SessionLog};

/// 后台 I/O 任务的指令队列长度
const COMMAND_QUEUE_SIZE: usize = 16;

/// 发给后台 I/O 任务的指令
enum PumpCommand {
    Write {
        data: Vec<u8>,
        ack: oneshot::Sender<Result<()>>,
    },
    Close {
        ack: oneshot::Sender<Result<()>>,
    },
}

/// Stream 的提示符与超时设置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    /// 每条命令输出结束时期望出现的提示符标记
    pub prompt_marker: String,
    /// 等待首个提示符的超时
    pub bootstrap_timeout: Duration,
    /// 每条命令等待提示符的超时
    pub command_timeout: Duration,
}

impl StreamSettings {
    pub fn new(prompt_marker: &str) -> Self {
        Self::from_options(prompt_marker, &SshOptions::default())
    }

    pub fn from_options(prompt_marker: &str, options: &SshOptions) -> Self {
        Self {
            prompt_marker: prompt_marker.to_string(),
            bootstrap_timeout: options.bootstrap_timeout(),
            command_timeout: options.command_timeout(),
        }
    }

    pub fn with_bootstrap_timeout(mut self, timeout: Duration) -> Self {
        self.bootstrap_timeout = timeout;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// 命令执行期间使用的提示符与超时（每次 run 开始时取快照）
#[derive(Debug, Clone)]
struct Expect {
    marker: String,
    timeout: Duration,
}

/// 一个远端交互式 shell
pub struct InteractiveStream {
    id: Uuid,
    commands: mpsc::Sender<PumpCommand>,
    output: Arc<OutputBuffer>,
    expect: StdMutex<Expect>,
    /// 保证同一时刻只有一个 run 在执行
    run_lock: Mutex<()>,
    closed: AtomicBool,
    pump: StdMutex<Option<JoinHandle<()>>>,
    log: Arc<dyn SessionLog>,
}

impl InteractiveStream {
    /// 在已启动 shell 的通道上完成引导握手
    ///
    /// 等待首个提示符出现后丢弃登录信息（例如 `Last login: ...`）。
    /// 超时或通道关闭时返回错误，后台任务会被关闭
    pub async fn start<C: ShellChannel>(
        channel: C,
        settings: StreamSettings,
        log: Arc<dyn SessionLog>,
    ) -> Result<Self> {
        let id = Uuid::new_v4();
        let stream_id = id.to_string();
        let output = Arc::new(OutputBuffer::new());
        let (commands, receiver) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let pump = tokio::spawn(pump(channel, receiver, output.clone()));

        debug!(
            stream_id = %stream_id,
            marker = %settings.prompt_marker,
            timeout_ms = settings.bootstrap_timeout.as_millis() as u64,
            "Waiting for first prompt"
        );

        let failure = match output
            .drain_until(&settings.prompt_marker, settings.bootstrap_timeout)
            .await
        {
            Drained::Matched(banner) => {
                debug!(stream_id = %stream_id, banner_len = banner.len(), "Stream ready");
                None
            }
            Drained::TimedOut(_) => Some(BootstrapError::Timeout {
                marker: settings.prompt_marker.clone(),
                waited_ms: settings.bootstrap_timeout.as_millis() as u64,
            }),
            Drained::Closed(_) => Some(BootstrapError::ChannelClosed),
        };

        if let Some(err) = failure {
            error!(stream_id = %stream_id, error = %err, "Stream create failed");
            log.record(&stream_id, RecordLevel::Error, &format!("Stream create failed: {}", err));
            // 丢弃发送端后后台任务会关闭通道并退出
            drop(commands);
            let _ = pump.await;
            return Err(err.into());
        }

        Ok(Self {
            id,
            commands,
            output,
            expect: StdMutex::new(Expect {
                marker: settings.prompt_marker,
                timeout: settings.command_timeout,
            }),
            run_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
            pump: StdMutex::new(Some(pump)),
            log,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 当前期望的提示符标记
    pub fn read_until_expect(&self) -> String {
        self.expect_snapshot().marker
    }

    /// 当前每条命令的超时
    pub fn timeout(&self) -> Duration {
        self.expect_snapshot().timeout
    }

    /// 更新提示符标记，从下一次 run 开始生效
    pub fn update_read_until_expect(&self, marker: &str) {
        self.lock_expect().marker = marker.to_string();
    }

    /// 更新每条命令的超时，从下一次 run 开始生效
    pub fn update_timeout(&self, timeout: Duration) {
        self.lock_expect().timeout = timeout;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.output.is_closed()
    }

    /// 执行一条命令，返回规范化后的输出
    ///
    /// 等待提示符超时不会返回错误，而是返回已收到的部分输出（并记录警告）。
    /// 需要区分完整输出与超时输出时使用 [`run_detailed`](Self::run_detailed)
    ///
    /// 超时不会终止远端命令。写入前已到达的迟到输出会被丢弃并记录；
    /// 写入后才到达的迟到输出无法与本条命令区分，会被当作本条命令的输出，
    /// 此后的命令将落后一条，直到某次 run 开始前迟到输出已全部到达。
    /// 长时间运行的命令应先调用 [`update_timeout`](Self::update_timeout)
    pub async fn run(&self, command: &str) -> Result<String> {
        self.run_detailed(command).await.map(|output| output.text)
    }

    /// 执行一条命令，返回输出以及读取状态
    pub async fn run_detailed(&self, command: &str) -> Result<CommandOutput> {
        let _guard = self.run_lock.lock().await;
        if self.is_closed() {
            return Err(SshError::StreamClosed);
        }

        let expect = self.expect_snapshot();
        let stream_id = self.id.to_string();
        let started = Instant::now();

        // 上一条命令超时后才到达的输出
        let late_output = self.take_late_output(&stream_id, &expect.marker);
        let (deliver, delivered) = oneshot::channel::<Vec<u8>>();

        let writer = {
            let stream_id = stream_id.as_str();
            async move {
                self.log.input(stream_id, command);
                self.write_line(command).await
            }
        };
        let reader = {
            let output = &self.output;
            let marker = expect.marker.as_str();
            let timeout = expect.timeout;
            async move {
                let (status, bytes) = match output.drain_until(marker, timeout).await {
                    Drained::Matched(bytes) => (ReadStatus::Complete, bytes),
                    Drained::TimedOut(bytes) => (ReadStatus::TimedOut, bytes),
                    Drained::Closed(bytes) => (ReadStatus::ChannelClosed, bytes),
                };
                let _ = deliver.send(bytes);
                status
            }
        };

        let (written, status) = tokio::join!(writer, reader);
        let raw = delivered
            .await
            .map_err(|_| SshError::execution("read task did not deliver output"))?;

        if status == ReadStatus::ChannelClosed {
            self.closed.store(true, Ordering::SeqCst);
        }
        if let Err(err) = written {
            warn!(stream_id = %stream_id, command = %command, error = %err, "Failed to send command");
            self.log.warn(&stream_id, &format!("Failed to send command: {}", err));
            return Err(err);
        }

        let text = normalize_command_output(&String::from_utf8_lossy(&raw), &expect.marker);
        let elapsed = started.elapsed();

        match status {
            ReadStatus::Complete => {}
            ReadStatus::TimedOut => {
                let err = SshError::ReadTimeout {
                    marker: expect.marker.clone(),
                    waited_ms: expect.timeout.as_millis() as u64,
                };
                warn!(
                    stream_id = %stream_id,
                    command = %command,
                    captured_len = raw.len(),
                    error = %err,
                    "Returning partial output"
                );
                self.log.warn(&stream_id, &err.to_string());
                metrics::counter!("ssh_stream_read_timeouts_total").increment(1);
            }
            ReadStatus::ChannelClosed => {
                warn!(stream_id = %stream_id, command = %command, "Remote shell closed during command");
                self.log.warn(&stream_id, "Remote shell closed during command");
            }
        }

        self.log.output(&stream_id, &text);
        metrics::counter!("ssh_stream_commands_total").increment(1);
        metrics::histogram!("ssh_stream_command_duration_seconds").record(elapsed.as_secs_f64());

        debug!(
            stream_id = %stream_id,
            command = %command,
            status = ?status,
            duration_secs = elapsed.as_secs_f64(),
            output_len = text.len(),
            "Command finished"
        );

        Ok(CommandOutput {
            command: command.to_string(),
            text,
            status,
            duration_secs: elapsed.as_secs_f64(),
            late_output,
        })
    }

    /// 关闭 Stream，等待正在执行的 run 结束
    ///
    /// 重复调用是安全的，关闭后的 run 返回 `SshError::StreamClosed`
    pub async fn close(&self) -> Result<()> {
        let _guard = self.run_lock.lock().await;
        self.closed.store(true, Ordering::SeqCst);

        let pump = self.pump.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(pump) = pump else {
            return Ok(());
        };

        let (ack, acked) = oneshot::channel();
        let result = match self.commands.send(PumpCommand::Close { ack }).await {
            Ok(()) => acked.await.unwrap_or(Ok(())),
            // 后台任务已退出（远端先关闭）
            Err(_) => Ok(()),
        };
        let _ = pump.await;

        let stream_id = self.id.to_string();
        info!(stream_id = %stream_id, "Stream closed");
        self.log.record(&stream_id, RecordLevel::Info, "Stream closed");
        result
    }

    /// 取出写入命令前残留在缓冲区中的字节
    fn take_late_output(&self, stream_id: &str, marker: &str) -> Option<String> {
        let leftover = self.output.drain();
        if leftover.is_empty() {
            return None;
        }
        let text = normalize_command_output(&String::from_utf8_lossy(&leftover), marker);
        // 提示符之后单独到达的空白不算迟到输出
        if text.trim().is_empty() {
            debug!(stream_id = %stream_id, late_len = leftover.len(), "Dropped trailing whitespace");
            return None;
        }
        warn!(
            stream_id = %stream_id,
            late_len = leftover.len(),
            "Late output from a timed-out command"
        );
        self.log
            .warn(stream_id, &format!("Late output from previous command: {}", text));
        Some(text)
    }

    async fn write_line(&self, command: &str) -> Result<()> {
        let (ack, acked) = oneshot::channel();
        let data = format!("{}\n", command).into_bytes();
        self.commands
            .send(PumpCommand::Write { data, ack })
            .await
            .map_err(|_| SshError::StreamClosed)?;
        acked.await.map_err(|_| SshError::StreamClosed)?
    }

    fn lock_expect(&self) -> std::sync::MutexGuard<'_, Expect> {
        self.expect.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn expect_snapshot(&self) -> Expect {
        self.lock_expect().clone()
    }
}

/// 后台 I/O 任务：独占 shell 通道，把输出写入缓冲区并执行写入/关闭指令
async fn pump<C: ShellChannel>(
    mut channel: C,
    mut commands: mpsc::Receiver<PumpCommand>,
    output: Arc<OutputBuffer>,
) {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(PumpCommand::Write { data, ack }) => {
                    let _ = ack.send(channel.send(&data).await);
                }
                Some(PumpCommand::Close { ack }) => {
                    let _ = ack.send(channel.close().await);
                    break;
                }
                None => {
                    let _ = channel.close().await;
                    break;
                }
            },
            data = channel.recv() => match data {
                Some(bytes) => output.append(&bytes),
                None => {
                    debug!("Remote shell closed the channel");
                    break;
                }
            },
        }
    }
    output.mark_closed();
}
