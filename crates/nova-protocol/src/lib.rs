//! # Nova Protocol
//!
//! Nova 机械臂网络协议定义（无 IO 依赖）
//!
//! ## 模块
//!
//! - `pose`: 位姿与关节目标值类型
//! - `command`: Dashboard 指令渲染（29999 端口，文本请求/应答）
//! - `reply`: Dashboard 应答解析
//! - `feedback`: 实时反馈帧解析（30004 端口，1440 字节定长帧）
//!
//! ## 字节序
//!
//! 反馈帧使用小端字节序（Little Endian）。

pub mod command;
pub mod feedback;
pub mod pose;
pub mod reply;

pub use command::{CoordinateMode, DashboardCommand};
pub use feedback::{FEED_FRAME_LEN, FeedbackFrame, RobotMode};
pub use pose::{JointTarget, Pose};
pub use reply::DashboardReply;

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// 反馈帧长度错误
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// 反馈帧校验值不匹配
    #[error("Invalid feedback test value: 0x{0:016X}")]
    InvalidTestValue(u64),

    /// 反馈帧中的位姿包含 NaN/Inf
    #[error("Non-finite value in field {field}")]
    NonFinite { field: &'static str },

    /// 应答格式错误
    #[error("Malformed reply: {0:?}")]
    MalformedReply(String),

    /// 控制器不在 TCP 控制模式
    #[error("Control mode is not TCP")]
    NotTcpMode,

    /// 数值解析失败
    #[error("Parse error: {0}")]
    Parse(String),
}
