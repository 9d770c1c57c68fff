//! TCP 后端
//!
//! - Dashboard：文本请求，应答以 `;` 结尾
//! - 反馈：连续字节流，读超时用于让后台线程周期性检查停止标志

use crate::{CommandChannel, Connector, FeedbackSource, NetError, ShutdownHandle};
use nova_protocol::{DashboardCommand, DashboardReply};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// 应答结束符
const REPLY_TERMINATOR: u8 = b';';

/// 单条应答的最大长度
const MAX_REPLY_LEN: usize = 4096;

fn resolve(host: &str, port: u16) -> Result<SocketAddr, NetError> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| NetError::Resolve(format!("{}:{}: {}", host, port, e)))?
        .next()
        .ok_or_else(|| NetError::Resolve(format!("{}:{}: no address", host, port)))
}

fn connect(addr: SocketAddr, timeout: Duration) -> Result<TcpStream, NetError> {
    TcpStream::connect_timeout(&addr, timeout).map_err(|source| NetError::Connect {
        addr: addr.to_string(),
        source,
    })
}

fn stream_shutdown_handle(
    label: &'static str,
    stream: &TcpStream,
) -> Result<ShutdownHandle, NetError> {
    let clone = stream.try_clone()?;
    Ok(ShutdownHandle::new(label, move || {
        match clone.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // 已经关闭
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(NetError::Io(e)),
        }
    }))
}

/// Dashboard TCP 通道
///
/// 一次读取可能包含多条应答，`;` 之后的字节留给下一次调用。
/// 读超时后迟到的应答会在下一次写入前丢弃；回显与请求不符的应答被跳过。
pub struct TcpCommandChannel {
    stream: TcpStream,
    peer: SocketAddr,
    pending: Vec<u8>,
    stale: bool,
}

impl TcpCommandChannel {
    pub fn connect(
        addr: SocketAddr,
        connect_timeout: Duration,
        reply_timeout: Duration,
    ) -> Result<Self, NetError> {
        let stream = connect(addr, connect_timeout)?;
        stream.set_read_timeout(Some(reply_timeout))?;
        stream.set_write_timeout(Some(reply_timeout))?;
        stream.set_nodelay(true)?;
        debug!("Dashboard channel connected to {}", addr);
        Ok(Self {
            stream,
            peer: addr,
            pending: Vec::with_capacity(256),
            stale: false,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn take_pending_reply(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == REPLY_TERMINATOR)?;
        let reply: Vec<u8> = self.pending.drain(..=end).collect();
        Some(String::from_utf8_lossy(&reply).trim().to_string())
    }

    fn read_reply(&mut self) -> Result<String, NetError> {
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(reply) = self.take_pending_reply() {
                return Ok(reply);
            }
            if self.pending.len() >= MAX_REPLY_LEN {
                let reply = String::from_utf8_lossy(&self.pending).trim().to_string();
                self.pending.clear();
                return Ok(reply);
            }
            let n = self.stream.read(&mut chunk).map_err(NetError::from_io)?;
            if n == 0 {
                return Err(NetError::Closed);
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }

    /// 丢弃超时后残留在缓冲区和 socket 中的应答
    fn discard_stale_input(&mut self) -> Result<(), NetError> {
        if !self.pending.is_empty() {
            trace!("Dashboard: discarded {} buffered bytes", self.pending.len());
            self.pending.clear();
        }

        self.stream.set_nonblocking(true)?;
        let mut chunk = [0u8; 1024];
        let result = loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => break Err(NetError::Closed),
                Ok(n) => trace!("Dashboard: discarded {} stale bytes", n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => break Err(NetError::from_io(e)),
            }
        };
        self.stream.set_nonblocking(false)?;
        result
    }
}

impl CommandChannel for TcpCommandChannel {
    fn call(&mut self, command: &DashboardCommand) -> Result<String, NetError> {
        if self.stale {
            self.discard_stale_input()?;
            self.stale = false;
        }

        let request = command.to_string();
        trace!("Dashboard -> {}", request);
        self.stream
            .write_all(request.as_bytes())
            .map_err(NetError::from_io)?;

        loop {
            let reply = match self.read_reply() {
                Ok(reply) => reply,
                Err(e) => {
                    if matches!(e, NetError::Timeout) {
                        self.stale = true;
                    }
                    return Err(e);
                },
            };
            trace!("Dashboard <- {}", reply);
            if DashboardReply::echoes(&reply, command.name()) {
                return Ok(reply);
            }
            warn!(
                "Dashboard: skipping reply {:?} while waiting for {}",
                reply,
                command.name()
            );
        }
    }

    fn shutdown_handle(&self) -> Result<ShutdownHandle, NetError> {
        stream_shutdown_handle("dashboard", &self.stream)
    }
}

/// 反馈 TCP 流
pub struct TcpFeedbackStream {
    stream: TcpStream,
}

impl TcpFeedbackStream {
    pub fn connect(
        addr: SocketAddr,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, NetError> {
        let stream = connect(addr, connect_timeout)?;
        stream.set_read_timeout(Some(read_timeout))?;
        debug!("Feedback channel connected to {}", addr);
        Ok(Self { stream })
    }
}

impl FeedbackSource for TcpFeedbackStream {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        self.stream.read(buf).map_err(NetError::from_io)
    }

    fn shutdown_handle(&self) -> Result<ShutdownHandle, NetError> {
        stream_shutdown_handle("feedback", &self.stream)
    }
}

/// TCP 连接器
#[derive(Debug, Clone)]
pub struct TcpConnector {
    pub host: String,
    pub dashboard_port: u16,
    pub feed_port: u16,
    pub connect_timeout: Duration,
    pub reply_timeout: Duration,
    pub feed_read_timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, dashboard_port: u16, feed_port: u16) -> Self {
        Self {
            host: host.into(),
            dashboard_port,
            feed_port,
            connect_timeout: Duration::from_secs(3),
            reply_timeout: Duration::from_secs(5),
            feed_read_timeout: Duration::from_millis(200),
        }
    }
}

impl Connector for TcpConnector {
    type Command = TcpCommandChannel;
    type Feedback = TcpFeedbackStream;

    fn open_command(&self) -> Result<Self::Command, NetError> {
        let addr = resolve(&self.host, self.dashboard_port)?;
        TcpCommandChannel::connect(addr, self.connect_timeout, self.reply_timeout)
    }

    fn open_feedback(&self) -> Result<Self::Feedback, NetError> {
        let addr = resolve(&self.host, self.feed_port)?;
        TcpFeedbackStream::connect(addr, self.connect_timeout, self.feed_read_timeout)
    }

    fn describe(&self) -> String {
        format!(
            "{} (dashboard {}, feedback {})",
            self.host, self.dashboard_port, self.feed_port
        )
    }
}
