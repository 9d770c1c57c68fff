//! 客户端错误类型
//!
//! 前台操作（`connect`、`enable`、`set_speed` 等）的失败都以 [`RobotError`] 返回，
//! 同时写入控制器的错误日志。

use nova_driver::DriverError;
use nova_net::NetError;
use std::path::PathBuf;
use thiserror::Error;

/// 配置文件错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// 机器人操作错误
#[derive(Debug, Error)]
pub enum RobotError {
    /// 通道打开失败（已回滚，不会留下半开的会话）
    #[error("Connection failed: {0}")]
    Connection(#[source] NetError),

    /// 上使能失败，会话保持未使能状态
    #[error("Enable failed: {0}")]
    Enable(#[source] DriverError),

    /// 操作需要已连接的会话
    #[error("Robot is not connected")]
    NotConnected,

    /// 操作需要已使能的会话
    #[error("Robot is not enabled")]
    NotEnabled,

    /// 目标位姿包含 NaN/Inf
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// 动作库中没有该动作
    #[error("Unknown dance move: {0}")]
    UnknownMove(String),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RobotError {
    /// 重新连接后可能恢复的错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Driver(DriverError::Net(NetError::Timeout))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(RobotError::NotEnabled.to_string(), "Robot is not enabled");
        let e = RobotError::Connection(NetError::Closed);
        assert_eq!(e.to_string(), "Connection failed: Channel closed");
        let e = RobotError::Driver(DriverError::Rejected {
            command: "Stop()".into(),
            code: -1,
        });
        assert_eq!(e.to_string(), "Stop() rejected by controller (code -1)");
    }

    #[test]
    fn test_retryable() {
        assert!(RobotError::Connection(NetError::Timeout).is_retryable());
        assert!(RobotError::Driver(DriverError::Net(NetError::Timeout)).is_retryable());
        assert!(!RobotError::NotConnected.is_retryable());
    }
}
