//! Pipeline 循环模块
//!
//! 两个后台线程的主体：
//!
//! - 反馈线程：拼接 1440 字节定长帧，解码末端位姿并发布到共享缓存
//! - 派发线程：从运动队列取出目标位姿，安全检查后发送 `MovL`
//!
//! 两个循环都不向调用方传播错误：记录日志并继续运行。

use crate::error::DriverError;
use crate::state::{DriverContext, MoveRecord};
use bytes::BytesMut;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use nova_net::{CommandChannel, FeedbackSource, NetError};
use nova_protocol::{
    DashboardCommand, DashboardReply, FEED_FRAME_LEN, FeedbackFrame, Pose, ProtocolError,
};
use nova_tools::{SafetyPolicy, SafetyValidator};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Pipeline 配置
///
/// # Example
///
/// ```
/// use nova_driver::PipelineConfig;
///
/// // 默认：反馈周期 8ms，队列轮询 100ms，线程回收超时 2s
/// let config = PipelineConfig::default();
/// assert_eq!(config.feed_period_ms, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// 每处理完一帧反馈后的休眠时间（毫秒）
    pub feed_period_ms: u64,
    /// 派发线程等待队列的超时（毫秒），决定停止标志的响应延迟
    pub queue_poll_ms: u64,
    /// 断开连接时等待每个后台线程退出的上限（毫秒）
    pub join_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            feed_period_ms: 8,
            queue_poll_ms: 100,
            join_timeout_ms: 2000,
        }
    }
}

/// 队列中的一个目标位姿
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuedMove {
    pub pose: Pose,
    pub enqueued_at: Instant,
}

impl QueuedMove {
    pub fn new(pose: Pose) -> Self {
        Self {
            pose,
            enqueued_at: Instant::now(),
        }
    }
}

/// 派发前的安全检查
#[derive(Debug, Clone, Default)]
pub struct SafetyGate {
    pub validator: SafetyValidator,
    pub policy: SafetyPolicy,
}

impl SafetyGate {
    pub fn new(validator: SafetyValidator, policy: SafetyPolicy) -> Self {
        Self { validator, policy }
    }
}

/// 定长反馈帧拼接器
///
/// 短读时保留已收到的字节，下一次读取继续拼接。
#[derive(Debug)]
pub struct FrameAssembler {
    buf: BytesMut,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(FEED_FRAME_LEN),
        }
    }

    /// 距离一帧完整还缺多少字节
    pub fn missing(&self) -> usize {
        FEED_FRAME_LEN.saturating_sub(self.buf.len())
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// 取出一帧（如果已经完整）并解码
    pub fn take_frame(&mut self) -> Option<Result<FeedbackFrame, ProtocolError>> {
        if self.buf.len() < FEED_FRAME_LEN {
            return None;
        }
        let frame = self.buf.split_to(FEED_FRAME_LEN).freeze();
        Some(FeedbackFrame::decode(&frame))
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// 发送指令并检查返回码
///
/// 非零返回码转换为 [`DriverError::Rejected`]；"Not Tcp" 应答转换为协议错误。
pub fn checked_request<C: CommandChannel + ?Sized>(
    channel: &mut C,
    command: &DashboardCommand,
) -> Result<DashboardReply, DriverError> {
    let reply = channel.request(command)?;
    if reply.is_ok() {
        Ok(reply)
    } else {
        Err(DriverError::Rejected {
            command: command.to_string(),
            code: reply.code,
        })
    }
}

/// 反馈线程主循环
///
/// # 参数
/// - `source`: 反馈字节流
/// - `ctx`: 共享状态上下文
/// - `config`: Pipeline 配置
/// - `stop`: 停止标志（置位后循环在下一次迭代退出，之后的错误不再记录）
pub fn feedback_loop(
    mut source: impl FeedbackSource,
    ctx: Arc<DriverContext>,
    config: PipelineConfig,
    stop: Arc<AtomicBool>,
) {
    // 设置线程优先级（可选 feature）
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;
        use tracing::info;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => info!("Feed thread priority set to MAX (realtime)"),
            Err(e) => warn!(
                "Failed to set feed thread priority: {}. \
                On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                e
            ),
        }
    }

    let period = Duration::from_millis(config.feed_period_ms);
    let mut assembler = FrameAssembler::new();
    let mut chunk = [0u8; FEED_FRAME_LEN];
    // 对端关闭只报告一次，避免刷屏
    let mut closed_reported = false;

    loop {
        // Acquire: 看到 true 时，也能看到置位前的所有写入
        if stop.load(Ordering::Acquire) {
            trace!("Feed thread: stop flag is set, exiting");
            break;
        }

        let want = assembler.missing();
        match source.read_chunk(&mut chunk[..want]) {
            Ok(0) | Err(NetError::Closed) => {
                if stop.load(Ordering::Acquire) {
                    break;
                }
                if !closed_reported {
                    ctx.metrics.feed_read_errors.fetch_add(1, Ordering::Relaxed);
                    ctx.errors
                        .record("Feed error: feedback stream closed by controller");
                    closed_reported = true;
                }
                assembler.clear();
                spin_sleep::sleep(period);
                continue;
            },
            Ok(n) => {
                closed_reported = false;
                assembler.extend(&chunk[..n]);
            },
            Err(NetError::Timeout) => {
                // 无数据，正常现象
                ctx.metrics.feed_timeouts.fetch_add(1, Ordering::Relaxed);
                continue;
            },
            Err(e) => {
                if stop.load(Ordering::Acquire) {
                    trace!("Feed thread: read error during teardown suppressed: {}", e);
                    break;
                }
                ctx.metrics.feed_read_errors.fetch_add(1, Ordering::Relaxed);
                ctx.errors.record(format!("Feed error: {}", e));
                spin_sleep::sleep(period);
                continue;
            },
        }

        let Some(decoded) = assembler.take_frame() else {
            // 短读，继续拼接
            continue;
        };

        match decoded {
            Ok(frame) => {
                ctx.publish_feedback(&frame);
                ctx.metrics.feed_frames_ok.fetch_add(1, Ordering::Relaxed);
            },
            Err(e) => {
                ctx.metrics.feed_frames_invalid.fetch_add(1, Ordering::Relaxed);
                if !stop.load(Ordering::Acquire) {
                    ctx.errors.record(format!("Feed error: {}", e));
                }
            },
        }

        spin_sleep::sleep(period);
    }
}

/// 派发线程主循环
///
/// 只有会话处于 `Enabled` 时才执行取出的目标；否则丢弃。
pub fn dispatch_loop<C: CommandChannel>(
    channel: Arc<Mutex<C>>,
    queue: Receiver<QueuedMove>,
    ctx: Arc<DriverContext>,
    gate: SafetyGate,
    config: PipelineConfig,
    stop: Arc<AtomicBool>,
) {
    let poll = Duration::from_millis(config.queue_poll_ms);

    loop {
        if stop.load(Ordering::Acquire) {
            trace!("Dispatch thread: stop flag is set, exiting");
            break;
        }

        let item = match queue.recv_timeout(poll) {
            Ok(item) => item,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Dispatch thread: queue disconnected, exiting");
                break;
            },
        };

        if !ctx.session.load().is_enabled() {
            ctx.metrics.moves_discarded.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Dispatch thread: session not enabled, discarding target {}",
                item.pose
            );
            continue;
        }

        execute_move(&channel, &ctx, &gate, item);
    }
}

/// 执行单个目标：安全检查 → `MovL` → 记录历史
pub fn execute_move<C: CommandChannel>(
    channel: &Mutex<C>,
    ctx: &DriverContext,
    gate: &SafetyGate,
    item: QueuedMove,
) {
    let pose = item.pose;
    trace!(
        "Dispatch thread: executing {} after {:?} in queue",
        pose,
        item.enqueued_at.elapsed()
    );

    let verdict = gate.validator.validate(&pose);
    if !verdict.safe {
        ctx.metrics.unsafe_targets.fetch_add(1, Ordering::Relaxed);
        for warning in &verdict.warnings {
            warn!("Dispatch thread: target {} may be unsafe: {}", pose, warning);
        }
        if gate.policy == SafetyPolicy::Strict {
            ctx.metrics.moves_rejected.fetch_add(1, Ordering::Relaxed);
            ctx.errors.record(format!(
                "Move rejected by safety policy: {} ({})",
                pose,
                verdict.summary()
            ));
            return;
        }
    }

    let command = DashboardCommand::mov_l(pose, ctx.speed());
    let result = checked_request(&mut *channel.lock(), &command);
    match result {
        Ok(_) => {
            let rendered = command.to_string();
            debug!("Dispatch thread: executed {}", rendered);
            ctx.history.push(MoveRecord::new(pose, rendered));
            ctx.metrics.moves_executed.fetch_add(1, Ordering::Relaxed);
        },
        Err(e) => {
            ctx.metrics.moves_failed.fetch_add(1, Ordering::Relaxed);
            ctx.errors.record(format!("Move execution error: {}", e));
        },
    }
}
