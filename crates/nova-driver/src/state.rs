//! 共享状态
//!
//! - 位姿缓存：反馈线程单写，多读（`RwLock`）
//! - 运动历史 / 错误日志：追加写入，读取时复制最近 N 条（`Mutex`）
//! - 会话状态 / 速度：原子值

use crate::metrics::DriverMetrics;
use crate::session::AtomicSessionState;
use nova_protocol::{FeedbackFrame, Pose, RobotMode};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Instant, SystemTime};
use tracing::error;

/// 历史记录长度超过此值时触发裁剪
pub const HISTORY_TRIM_THRESHOLD: usize = 1000;

/// 裁剪后保留的记录数
pub const HISTORY_KEEP: usize = 500;

/// 错误日志保留的最大条数
pub const ERROR_LOG_CAPACITY: usize = 10_000;

/// 默认速度百分比
pub const DEFAULT_SPEED: u8 = 50;

/// 最近一次反馈
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeedbackSnapshot {
    /// 末端位姿（尚未收到反馈时为全 0）
    pub pose: Pose,
    /// 原始 RobotMode 值
    pub robot_mode: Option<i64>,
    /// 发布时间
    pub updated_at: Option<Instant>,
}

impl FeedbackSnapshot {
    pub fn mode(&self) -> Option<RobotMode> {
        self.robot_mode.and_then(RobotMode::from_raw)
    }
}

/// 一条已执行的运动记录
#[derive(Debug, Clone, PartialEq)]
pub struct MoveRecord {
    pub pose: Pose,
    pub timestamp: SystemTime,
    /// 实际发送的指令文本
    pub command: String,
}

impl MoveRecord {
    pub fn new(pose: Pose, command: impl Into<String>) -> Self {
        Self {
            pose,
            timestamp: SystemTime::now(),
            command: command.into(),
        }
    }
}

/// 运动历史
///
/// 追加后长度超过 [`HISTORY_TRIM_THRESHOLD`] 时裁剪为最近 [`HISTORY_KEEP`] 条。
#[derive(Debug, Default)]
pub struct MoveHistory {
    records: Mutex<Vec<MoveRecord>>,
}

impl MoveHistory {
    pub fn push(&self, record: MoveRecord) {
        let mut records = self.records.lock();
        records.push(record);
        if records.len() > HISTORY_TRIM_THRESHOLD {
            let excess = records.len() - HISTORY_KEEP;
            records.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// 最近 `count` 条（按时间顺序）
    pub fn recent(&self, count: usize) -> Vec<MoveRecord> {
        let records = self.records.lock();
        let start = records.len().saturating_sub(count);
        records[start..].to_vec()
    }

    pub fn last(&self) -> Option<MoveRecord> {
        self.records.lock().last().cloned()
    }
}

/// 错误日志
///
/// 每条记录同时通过 `error!` 输出。
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: Mutex<VecDeque<String>>,
}

impl ErrorLog {
    pub fn record(&self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        let mut entries = self.entries.lock();
        if entries.len() >= ERROR_LOG_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(message);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// 最近 `count` 条（按时间顺序）
    pub fn recent(&self, count: usize) -> Vec<String> {
        let entries = self.entries.lock();
        let start = entries.len().saturating_sub(count);
        entries.iter().skip(start).cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// 驱动共享上下文
///
/// 由控制器持有，跨越多次连接存活；后台线程通过 `Arc` 共享。
#[derive(Debug)]
pub struct DriverContext {
    feedback: RwLock<FeedbackSnapshot>,
    speed: AtomicU8,
    pub session: AtomicSessionState,
    pub history: MoveHistory,
    pub errors: ErrorLog,
    pub metrics: DriverMetrics,
}

impl DriverContext {
    pub fn new(speed: u8) -> Self {
        Self {
            feedback: RwLock::new(FeedbackSnapshot::default()),
            speed: AtomicU8::new(clamp_speed(speed)),
            session: AtomicSessionState::default(),
            history: MoveHistory::default(),
            errors: ErrorLog::default(),
            metrics: DriverMetrics::new(),
        }
    }

    /// 发布一帧反馈（仅由反馈线程调用）
    pub fn publish_feedback(&self, frame: &FeedbackFrame) {
        let mut feedback = self.feedback.write();
        feedback.pose = frame.tool_vector;
        feedback.robot_mode = Some(frame.robot_mode);
        feedback.updated_at = Some(Instant::now());
    }

    pub fn feedback(&self) -> FeedbackSnapshot {
        *self.feedback.read()
    }

    pub fn current_pose(&self) -> Pose {
        self.feedback.read().pose
    }

    pub fn speed(&self) -> u8 {
        self.speed.load(Ordering::Relaxed)
    }

    /// 设置速度，超出范围时截断到 [1, 100]；返回实际保存的值
    pub fn set_speed(&self, percent: i64) -> u8 {
        let speed = clamp_speed(percent);
        self.speed.store(speed, Ordering::Relaxed);
        speed
    }
}

impl Default for DriverContext {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED)
    }
}

/// 速度百分比截断到 [1, 100]
pub fn clamp_speed(percent: impl Into<i64>) -> u8 {
    // 截断后一定落在 u8 范围内
    percent.into().clamp(1, 100) as u8
}
