//! # Nova Network Channel Layer
//!
//! 网络通道抽象层，提供统一的 Dashboard/反馈通道接口。
//!
//! - [`CommandChannel`]: 请求/应答式指令通道（Dashboard）
//! - [`FeedbackSource`]: 连续字节流反馈通道
//! - [`Connector`]: 按顺序打开两个通道
//!
//! 通道的关闭通过 [`ShutdownHandle`] 完成：句柄可以在其他线程中调用，
//! 即使通道本身正被后台线程占用（阻塞读）也能立即生效。

use nova_protocol::{DashboardCommand, DashboardReply, ProtocolError};
use std::fmt;
use thiserror::Error;

pub mod tcp;

#[cfg(feature = "mock")]
pub mod mock;

pub use tcp::{TcpCommandChannel, TcpConnector, TcpFeedbackStream};

#[cfg(feature = "mock")]
pub use mock::{MockCommandChannel, MockConnector, MockFeedbackSource, MockRobot};

/// 网络层统一错误类型
#[derive(Error, Debug)]
pub enum NetError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Address resolution failed: {0}")]
    Resolve(String),
    #[error("Read timeout")]
    Timeout,
    #[error("Channel closed")]
    Closed,
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl NetError {
    /// 将 IO 错误映射为更具体的网络错误
    pub fn from_io(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => NetError::Timeout,
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected => NetError::Closed,
            _ => NetError::Io(e),
        }
    }
}

/// 通道关闭句柄
///
/// 可跨线程调用；重复调用是安全的。
pub struct ShutdownHandle {
    label: &'static str,
    inner: Box<dyn Fn() -> Result<(), NetError> + Send + Sync>,
}

impl ShutdownHandle {
    pub fn new(
        label: &'static str,
        f: impl Fn() -> Result<(), NetError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            label,
            inner: Box::new(f),
        }
    }

    /// 关闭通道
    pub fn shutdown(&self) -> Result<(), NetError> {
        (self.inner)()
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("label", &self.label)
            .finish()
    }
}

/// Dashboard 指令通道
pub trait CommandChannel: Send {
    /// 发送一条指令并返回原始应答文本
    fn call(&mut self, command: &DashboardCommand) -> Result<String, NetError>;

    /// 获取关闭句柄
    fn shutdown_handle(&self) -> Result<ShutdownHandle, NetError>;

    /// 发送指令并解析应答
    fn request(&mut self, command: &DashboardCommand) -> Result<DashboardReply, NetError> {
        let raw = self.call(command)?;
        Ok(DashboardReply::parse(&raw)?)
    }
}

/// 反馈字节流
pub trait FeedbackSource: Send {
    /// 读取一段数据
    ///
    /// - `Ok(0)`: 对端关闭了流
    /// - `Err(NetError::Timeout)`: 读超时（无数据，正常现象）
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, NetError>;

    /// 获取关闭句柄
    fn shutdown_handle(&self) -> Result<ShutdownHandle, NetError>;
}

/// 通道连接器
pub trait Connector: Send + Sync {
    type Command: CommandChannel + 'static;
    type Feedback: FeedbackSource + 'static;

    /// 打开 Dashboard 指令通道
    fn open_command(&self) -> Result<Self::Command, NetError>;

    /// 打开反馈通道
    fn open_feedback(&self) -> Result<Self::Feedback, NetError>;

    /// 用于日志的目标描述
    fn describe(&self) -> String;
}
