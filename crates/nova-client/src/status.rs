//! 状态查询结果

use nova_driver::SessionState;
use nova_protocol::Pose;
use nova_tools::AlarmEvent;
use std::fmt;

/// 报警查询结果
#[derive(Debug, Clone, PartialEq)]
pub enum AlarmStatus {
    /// 未连接，没有发送查询
    Disconnected,
    /// 两个报警 ID 均为 0
    Normal { raw: String },
    /// 存在报警
    Alarm {
        event: AlarmEvent,
        message: String,
        raw: String,
    },
    /// 应答中无法解析出报警 ID
    Unknown { raw: String },
    /// 查询本身失败（网络错误等）
    Error { message: String },
}

impl AlarmStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Normal { .. } => "normal",
            Self::Alarm { .. } => "alarm",
            Self::Unknown { .. } => "unknown",
            Self::Error { .. } => "error",
        }
    }

    /// 面向用户的说明文本
    pub fn message(&self) -> String {
        match self {
            Self::Disconnected => "robot is not connected".to_string(),
            Self::Normal { .. } => nova_tools::alarm::NO_ALARM.to_string(),
            Self::Alarm { message, .. } => message.clone(),
            Self::Unknown { .. } => "unable to parse error id".to_string(),
            Self::Error { message } => message.clone(),
        }
    }

    /// 控制器的原始应答
    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::Normal { raw } | Self::Alarm { raw, .. } | Self::Unknown { raw } => Some(raw),
            Self::Disconnected | Self::Error { .. } => None,
        }
    }

    pub fn is_alarm(&self) -> bool {
        matches!(self, Self::Alarm { .. })
    }
}

impl fmt::Display for AlarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label(), self.message())
    }
}

/// 控制器状态快照
#[derive(Debug, Clone, PartialEq)]
pub struct RobotStatus {
    pub state: SessionState,
    pub position: Pose,
    pub queue_len: usize,
    pub error_count: usize,
    pub speed: u8,
    /// `RobotMode()` 查询结果；未连接或查询失败时为 `None`
    pub robot_mode: Option<i64>,
}

impl fmt::Display for RobotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.position;
        writeln!(f, "state:      {}", self.state)?;
        writeln!(
            f,
            "position:   ({:.1}, {:.1}, {:.1}, {:.1}, {:.1}, {:.1})",
            p.x, p.y, p.z, p.rx, p.ry, p.rz
        )?;
        writeln!(f, "speed:      {}%", self.speed)?;
        writeln!(f, "queue:      {}", self.queue_len)?;
        writeln!(f, "errors:     {}", self.error_count)?;
        match self.robot_mode {
            Some(mode) => write!(f, "robot mode: {}", mode),
            None => write!(f, "robot mode: n/a"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alarm_status_labels() {
        assert_eq!(AlarmStatus::Disconnected.label(), "disconnected");
        let normal = AlarmStatus::Normal {
            raw: "0,{0,0},GetErrorID()".into(),
        };
        assert_eq!(normal.label(), "normal");
        assert_eq!(normal.message(), "no alarm");
        assert_eq!(normal.raw(), Some("0,{0,0},GetErrorID()"));

        let err = AlarmStatus::Error {
            message: "Channel closed".into(),
        };
        assert_eq!(err.to_string(), "error: Channel closed");
        assert!(err.raw().is_none());
    }

    #[test]
    fn test_robot_status_display() {
        let status = RobotStatus {
            state: SessionState::Enabled,
            position: Pose::new(-350.0, 0.0, 200.0, 180.0, 0.0, 0.0),
            queue_len: 2,
            error_count: 0,
            speed: 30,
            robot_mode: None,
        };
        let text = status.to_string();
        assert!(text.contains("state:      enabled"));
        assert!(text.contains("(-350.0, 0.0, 200.0, 180.0, 0.0, 0.0)"));
        assert!(text.ends_with("robot mode: n/a"));
    }
}
