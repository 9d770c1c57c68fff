//! # Nova Driver
//!
//! 后台 IO 与状态同步层：
//!
//! - 反馈线程持续读取 1440 字节反馈帧，发布最新末端位姿
//! - 派发线程串行执行运动队列中的目标位姿，执行前做安全检查
//! - 共享状态（位姿缓存、运动历史、错误日志、会话状态、指标）
//!
//! 后台线程从不向调用方传播错误，只记录日志并继续运行。

pub mod driver;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod session;
pub mod state;

pub use driver::{MoveQueue, NovaDriver, ShutdownReport};
pub use error::DriverError;
pub use metrics::{DriverMetrics, MetricsSnapshot};
pub use pipeline::{FrameAssembler, PipelineConfig, QueuedMove, SafetyGate, checked_request};
pub use session::{AtomicSessionState, SessionState};
pub use state::{
    DriverContext, ErrorLog, FeedbackSnapshot, MoveHistory, MoveRecord, clamp_speed,
};
