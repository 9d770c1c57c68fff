//! 驱动层错误类型定义

use nova_net::NetError;
use nova_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 网络通道错误
    #[error("Channel error: {0}")]
    Net(#[from] NetError),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 控制器返回非零状态码
    #[error("{command} rejected by controller (code {code})")]
    Rejected { command: String, code: i32 },

    /// 后台线程启动失败
    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::DriverError;
    use nova_net::NetError;
    use nova_protocol::ProtocolError;

    #[test]
    fn test_driver_error_display() {
        let e = DriverError::Net(NetError::Closed);
        assert_eq!(e.to_string(), "Channel error: Channel closed");

        let e = DriverError::Rejected {
            command: "EnableRobot".to_string(),
            code: -1,
        };
        assert_eq!(e.to_string(), "EnableRobot rejected by controller (code -1)");

        let e = DriverError::Spawn {
            name: "feed",
            source: std::io::Error::other("no threads"),
        };
        assert!(e.to_string().contains("feed thread"));
    }

    #[test]
    fn test_from_conversions() {
        let e: DriverError = ProtocolError::NotTcpMode.into();
        assert!(matches!(e, DriverError::Protocol(ProtocolError::NotTcpMode)));

        let e: DriverError = NetError::Timeout.into();
        assert!(matches!(e, DriverError::Net(NetError::Timeout)));
    }
}
