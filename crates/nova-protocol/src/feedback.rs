//! 实时反馈帧解析
//!
//! 反馈通道（默认 30004 端口）以固定 1440 字节为一帧连续推送机器人状态。
//! 本模块只解析运动控制需要的字段：
//!
//! | 偏移 | 类型 | 字段 |
//! |------|------|------|
//! | 0 | u16 | 帧长度（1440） |
//! | 24 | i64 | RobotMode |
//! | 48 | u64 | TestValue（固定 `0x0123456789ABCDEF`） |
//! | 624 | f64 × 6 | ToolVectorActual（x, y, z, rx, ry, rz） |
//!
//! 其余字段对本层不透明。

use crate::ProtocolError;
use crate::pose::Pose;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 一帧反馈数据的长度（字节）
pub const FEED_FRAME_LEN: usize = 1440;

/// RobotMode 字段偏移
pub const ROBOT_MODE_OFFSET: usize = 24;

/// TestValue 字段偏移
pub const TEST_VALUE_OFFSET: usize = 48;

/// ToolVectorActual 字段偏移
pub const TOOL_VECTOR_OFFSET: usize = 624;

/// TestValue 的期望值（用于识别帧边界错位）
pub const FEED_TEST_VALUE: u64 = 0x0123_4567_89AB_CDEF;

/// 控制器报告的机器人模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum RobotMode {
    Init = 1,
    BrakeOpen = 2,
    PowerOff = 3,
    Disabled = 4,
    Enabled = 5,
    Backdrive = 6,
    Running = 7,
    SingleMove = 8,
    Error = 9,
    Pause = 10,
    Collision = 11,
}

impl RobotMode {
    /// 从原始数值转换，未知值返回 `None`
    pub fn from_raw(raw: i64) -> Option<Self> {
        u8::try_from(raw).ok().and_then(|v| Self::try_from(v).ok())
    }
}

/// 解码后的反馈帧
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedbackFrame {
    /// 原始 RobotMode 值
    pub robot_mode: i64,
    /// 末端实际位姿
    pub tool_vector: Pose,
}

impl FeedbackFrame {
    /// 解码一帧完整的反馈数据
    ///
    /// # 错误
    /// - `InvalidLength`: 长度不是 1440
    /// - `InvalidTestValue`: 校验值不匹配（帧边界错位）
    /// - `NonFinite`: 位姿字段包含 NaN/Inf
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() != FEED_FRAME_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: FEED_FRAME_LEN,
                actual: buf.len(),
            });
        }

        let test_value = u64::from_le_bytes(read8(buf, TEST_VALUE_OFFSET));
        if test_value != FEED_TEST_VALUE {
            return Err(ProtocolError::InvalidTestValue(test_value));
        }

        let robot_mode = i64::from_le_bytes(read8(buf, ROBOT_MODE_OFFSET));
        let values: [f64; 6] =
            std::array::from_fn(|i| f64::from_le_bytes(read8(buf, TOOL_VECTOR_OFFSET + i * 8)));
        let tool_vector = Pose::from_array(values);
        if !tool_vector.is_finite() {
            return Err(ProtocolError::NonFinite {
                field: "ToolVectorActual",
            });
        }

        Ok(Self {
            robot_mode,
            tool_vector,
        })
    }

    /// 编码为一帧反馈数据（未建模字段填 0，用于模拟器和测试）
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; FEED_FRAME_LEN];
        buf[0..2].copy_from_slice(&(FEED_FRAME_LEN as u16).to_le_bytes());
        buf[ROBOT_MODE_OFFSET..ROBOT_MODE_OFFSET + 8]
            .copy_from_slice(&self.robot_mode.to_le_bytes());
        buf[TEST_VALUE_OFFSET..TEST_VALUE_OFFSET + 8]
            .copy_from_slice(&FEED_TEST_VALUE.to_le_bytes());
        for (i, v) in self.tool_vector.to_array().iter().enumerate() {
            let start = TOOL_VECTOR_OFFSET + i * 8;
            buf[start..start + 8].copy_from_slice(&v.to_le_bytes());
        }
        buf
    }

    /// 解析后的机器人模式（未知值返回 `None`）
    pub fn mode(&self) -> Option<RobotMode> {
        RobotMode::from_raw(self.robot_mode)
    }
}

#[inline]
fn read8(buf: &[u8], offset: usize) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[offset..offset + 8]);
    out
}
