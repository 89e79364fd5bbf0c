//! 输出累积缓冲区
//!
//! 后台 I/O 任务是唯一的写入方；持有 Stream 锁的调用（引导或一次 `run`）是唯一的取出方

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};

/// 一次等待的结果，每种情况都携带被取出的全部字节
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Drained {
    /// 缓冲区中出现了提示符标记
    Matched(Vec<u8>),
    /// 超时，内容可能为空或不完整
    TimedOut(Vec<u8>),
    /// 远端已关闭，不会再有新数据
    Closed(Vec<u8>),
}

#[derive(Default)]
struct BufferState {
    bytes: Vec<u8>,
    closed: bool,
}

#[derive(Default)]
pub(crate) struct OutputBuffer {
    state: Mutex<BufferState>,
    notify: Notify,
}

impl OutputBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 追加远端输出并唤醒等待方
    pub(crate) fn append(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.lock().bytes.extend_from_slice(data);
        self.notify.notify_waiters();
    }

    /// 标记远端已关闭
    pub(crate) fn mark_closed(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// 取出当前全部内容
    pub(crate) fn drain(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().bytes)
    }

    /// 等待缓冲区出现 `marker` 或超时，然后取出全部内容
    ///
    /// 每次唤醒只扫描新到达的字节（加上 marker 长度的重叠部分）
    pub(crate) async fn drain_until(&self, marker: &str, timeout: Duration) -> Drained {
        let deadline = Instant::now() + timeout;
        let marker = marker.as_bytes();
        let mut scanned = 0;

        loop {
            // 先注册唤醒再检查内容，避免检查之后到达的数据丢失通知
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if contains_from(&state.bytes, marker, scanned) {
                    return Drained::Matched(std::mem::take(&mut state.bytes));
                }
                if state.closed {
                    return Drained::Closed(std::mem::take(&mut state.bytes));
                }
                scanned = state.bytes.len();
            }

            if timeout_at(deadline, notified).await.is_err() {
                let mut state = self.lock();
                let bytes = std::mem::take(&mut state.bytes);
                // 超时与数据到达可能同时发生
                if contains_from(&bytes, marker, 0) {
                    return Drained::Matched(bytes);
                }
                return Drained::TimedOut(bytes);
            }
        }
    }
}

/// 从 `from` 附近开始查找 `needle`
fn contains_from(haystack: &[u8], needle: &[u8], from: usize) -> bool {
    if needle.is_empty() {
        return true;
    }
    if haystack.len() < needle.len() {
        return false;
    }
    let start = from.saturating_sub(needle.len() - 1).min(haystack.len());
    haystack[start..].windows(needle.len()).any(|w| w == needle)
}
