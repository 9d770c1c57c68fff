//! 驱动层运行指标
//!
//! 原子计数器，后台线程更新，任意线程读取快照，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 驱动实时指标
#[derive(Debug, Default)]
pub struct DriverMetrics {
    /// 成功解码并发布的反馈帧数
    pub feed_frames_ok: AtomicU64,

    /// 解码失败的反馈帧数（长度/校验值/非有限值）
    pub feed_frames_invalid: AtomicU64,

    /// 反馈通道读取错误次数
    pub feed_read_errors: AtomicU64,

    /// 反馈通道读超时次数（正常现象，无数据时会超时）
    pub feed_timeouts: AtomicU64,

    /// 已执行（控制器接受）的运动指令数
    pub moves_executed: AtomicU64,

    /// 执行失败（网络错误或控制器拒绝）的运动指令数
    pub moves_failed: AtomicU64,

    /// 会话未使能时取出并丢弃的队列项数
    pub moves_discarded: AtomicU64,

    /// 严格安全策略下拒绝执行的目标数
    pub moves_rejected: AtomicU64,

    /// 安全检查未通过的目标数（不论是否执行）
    pub unsafe_targets: AtomicU64,

    /// 急停时清空的队列项数
    pub emergency_drained: AtomicU64,
}

impl DriverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            feed_frames_ok: self.feed_frames_ok.load(Ordering::Relaxed),
            feed_frames_invalid: self.feed_frames_invalid.load(Ordering::Relaxed),
            feed_read_errors: self.feed_read_errors.load(Ordering::Relaxed),
            feed_timeouts: self.feed_timeouts.load(Ordering::Relaxed),
            moves_executed: self.moves_executed.load(Ordering::Relaxed),
            moves_failed: self.moves_failed.load(Ordering::Relaxed),
            moves_discarded: self.moves_discarded.load(Ordering::Relaxed),
            moves_rejected: self.moves_rejected.load(Ordering::Relaxed),
            unsafe_targets: self.unsafe_targets.load(Ordering::Relaxed),
            emergency_drained: self.emergency_drained.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub feed_frames_ok: u64,
    pub feed_frames_invalid: u64,
    pub feed_read_errors: u64,
    pub feed_timeouts: u64,
    pub moves_executed: u64,
    pub moves_failed: u64,
    pub moves_discarded: u64,
    pub moves_rejected: u64,
    pub unsafe_targets: u64,
    pub emergency_drained: u64,
}

impl MetricsSnapshot {
    /// 反馈帧解码成功率（百分比），没有帧时返回 0.0
    pub fn feed_success_rate(&self) -> f64 {
        let total = self.feed_frames_ok + self.feed_frames_invalid;
        if total == 0 {
            return 0.0;
        }
        (self.feed_frames_ok as f64 / total as f64) * 100.0
    }
}
