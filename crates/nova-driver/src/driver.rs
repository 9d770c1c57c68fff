//! 驱动主体
//!
//! [`NovaDriver`] 持有一次连接的全部资源：指令通道、两个关闭句柄、
//! 运动队列以及反馈/派发两个后台线程。

use crate::error::DriverError;
use crate::pipeline::{
    PipelineConfig, QueuedMove, SafetyGate, checked_request, dispatch_loop, feedback_loop,
};
use crate::state::DriverContext;
use crossbeam_channel::{Receiver, Sender, unbounded};
use nova_net::{CommandChannel, FeedbackSource, ShutdownHandle};
use nova_protocol::{DashboardCommand, DashboardReply, Pose};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Extension trait for `JoinHandle` with timeout support
///
/// Uses a watchdog thread + channel, so waiting costs no CPU.
/// If the timeout elapses the watchdog keeps running until the target exits.
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();
        spawn(move || {
            let result = self.join();
            // 接收端可能已经超时
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 运动队列（无界 MPMC）
///
/// 生产者永不阻塞；驱动保留一个接收端用于急停清空。
#[derive(Debug, Clone)]
pub struct MoveQueue {
    tx: Sender<QueuedMove>,
    rx: Receiver<QueuedMove>,
}

impl MoveQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// 入队（不阻塞）
    pub fn push(&self, pose: Pose) {
        // 本结构同时持有接收端，发送不会因断开而失败
        let _ = self.tx.send(QueuedMove::new(pose));
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// 丢弃所有排队的目标，返回丢弃数量
    pub fn drain(&self) -> usize {
        self.rx.try_iter().count()
    }

    pub fn receiver(&self) -> Receiver<QueuedMove> {
        self.rx.clone()
    }
}

impl Default for MoveQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// 后台线程回收结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub feed_joined: bool,
    pub dispatch_joined: bool,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.feed_joined && self.dispatch_joined
    }
}

/// Nova 驱动（一次连接的生命周期）
pub struct NovaDriver<C: CommandChannel + 'static> {
    channel: Arc<Mutex<C>>,
    queue: MoveQueue,
    ctx: Arc<DriverContext>,
    config: PipelineConfig,
    feed_stop: Arc<AtomicBool>,
    dispatch_stop: Arc<AtomicBool>,
    feed_thread: Mutex<Option<JoinHandle<()>>>,
    dispatch_thread: Mutex<Option<JoinHandle<()>>>,
    command_close: ShutdownHandle,
    feedback_close: ShutdownHandle,
    shut_down: AtomicBool,
}

impl<C: CommandChannel + 'static> NovaDriver<C> {
    /// 接管两个已打开的通道并启动后台线程
    ///
    /// 失败时两个通道都会被关闭。
    pub fn start<F: FeedbackSource + 'static>(
        command: C,
        feedback: F,
        ctx: Arc<DriverContext>,
        gate: SafetyGate,
        config: PipelineConfig,
    ) -> Result<Self, DriverError> {
        let command_close = command.shutdown_handle()?;
        let feedback_close = match feedback.shutdown_handle() {
            Ok(handle) => handle,
            Err(e) => {
                close_quietly(&command_close);
                return Err(e.into());
            },
        };

        let channel = Arc::new(Mutex::new(command));
        let queue = MoveQueue::new();
        let feed_stop = Arc::new(AtomicBool::new(false));
        let dispatch_stop = Arc::new(AtomicBool::new(false));

        let feed_thread = {
            let ctx = ctx.clone();
            let config = config.clone();
            let stop = feed_stop.clone();
            std::thread::Builder::new()
                .name("nova-feed".into())
                .spawn(move || feedback_loop(feedback, ctx, config, stop))
        };
        let feed_thread = match feed_thread {
            Ok(handle) => handle,
            Err(source) => {
                close_quietly(&command_close);
                close_quietly(&feedback_close);
                return Err(DriverError::Spawn {
                    name: "feed",
                    source,
                });
            },
        };

        let dispatch_thread = {
            let channel = channel.clone();
            let rx = queue.receiver();
            let ctx = ctx.clone();
            let config = config.clone();
            let stop = dispatch_stop.clone();
            std::thread::Builder::new()
                .name("nova-dispatch".into())
                .spawn(move || dispatch_loop(channel, rx, ctx, gate, config, stop))
        };
        let dispatch_thread = match dispatch_thread {
            Ok(handle) => handle,
            Err(source) => {
                feed_stop.store(true, Ordering::Release);
                close_quietly(&command_close);
                close_quietly(&feedback_close);
                let _ = feed_thread.join_timeout(Duration::from_millis(config.join_timeout_ms));
                return Err(DriverError::Spawn {
                    name: "dispatch",
                    source,
                });
            },
        };

        debug!("Driver started (feed + dispatch threads running)");
        Ok(Self {
            channel,
            queue,
            ctx,
            config,
            feed_stop,
            dispatch_stop,
            feed_thread: Mutex::new(Some(feed_thread)),
            dispatch_thread: Mutex::new(Some(dispatch_thread)),
            command_close,
            feedback_close,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn context(&self) -> &Arc<DriverContext> {
        &self.ctx
    }

    /// 发送指令并检查返回码
    pub fn request(&self, command: &DashboardCommand) -> Result<DashboardReply, DriverError> {
        checked_request(&mut *self.channel.lock(), command)
    }

    /// 发送指令并返回原始应答文本
    pub fn call_raw(&self, command: &DashboardCommand) -> Result<String, DriverError> {
        Ok(self.channel.lock().call(command)?)
    }

    /// 目标入队（不阻塞）
    pub fn enqueue(&self, pose: Pose) {
        self.queue.push(pose);
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// 急停：同步清空队列（不执行任何目标），然后直接发送 `Stop()`
    ///
    /// 返回被丢弃的目标数量。
    pub fn emergency_stop(&self) -> Result<usize, DriverError> {
        let drained = self.queue.drain();
        self.ctx
            .metrics
            .emergency_drained
            .fetch_add(drained as u64, Ordering::Relaxed);
        warn!("Emergency stop: discarded {} queued targets", drained);
        self.request(&DashboardCommand::Stop)?;
        Ok(drained)
    }

    /// 停止后台线程并关闭通道
    ///
    /// 每个线程最多等待 `join_timeout_ms`；无论是否等到，两个通道都会被关闭。
    /// 超时未退出的线程之后可能产生一条错误日志，不影响关闭流程。
    pub fn shutdown(&self) -> ShutdownReport {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return ShutdownReport {
                feed_joined: true,
                dispatch_joined: true,
            };
        }

        // Release: 线程看到 true 时也能看到此前的所有写入
        self.feed_stop.store(true, Ordering::Release);
        self.dispatch_stop.store(true, Ordering::Release);

        let timeout = Duration::from_millis(self.config.join_timeout_ms);
        let feed_joined = join_with_timeout("feed", self.feed_thread.lock().take(), timeout);
        let dispatch_joined =
            join_with_timeout("dispatch", self.dispatch_thread.lock().take(), timeout);

        for handle in [&self.command_close, &self.feedback_close] {
            match handle.shutdown() {
                Ok(()) => trace!("Closed {} channel", handle.label()),
                Err(e) => warn!("Failed to close {} channel: {}", handle.label(), e),
            }
        }

        info!(
            "Driver shut down (feed joined: {}, dispatch joined: {})",
            feed_joined, dispatch_joined
        );
        ShutdownReport {
            feed_joined,
            dispatch_joined,
        }
    }
}

impl<C: CommandChannel + 'static> Drop for NovaDriver<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn join_with_timeout(name: &str, handle: Option<JoinHandle<()>>, timeout: Duration) -> bool {
    let Some(handle) = handle else {
        return true;
    };
    match handle.join_timeout(timeout) {
        Ok(()) => true,
        Err(_) => {
            error!("{} thread did not exit within {:?}", name, timeout);
            false
        },
    }
}

fn close_quietly(handle: &ShutdownHandle) {
    if let Err(e) = handle.shutdown() {
        warn!("Failed to close {} channel: {}", handle.label(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use nova_net::{Connector, MockCommandChannel, MockConnector, MockRobot};
    use std::time::Instant;

    fn base() -> Pose {
        Pose::new(-350.0, 0.0, 200.0, 180.0, 0.0, 0.0)
    }

    fn start(robot: &MockRobot, ctx: Arc<DriverContext>) -> NovaDriver<MockCommandChannel> {
        let connector = MockConnector::new(robot.clone());
        NovaDriver::start(
            connector.open_command().unwrap(),
            connector.open_feedback().unwrap(),
            ctx,
            SafetyGate::default(),
            PipelineConfig {
                feed_period_ms: 1,
                queue_poll_ms: 10,
                join_timeout_ms: 500,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_join_timeout_success() {
        let handle = spawn(|| std::thread::sleep(Duration::from_millis(10)));
        assert!(handle.join_timeout(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_join_timeout_expires() {
        let handle = spawn(|| std::thread::sleep(Duration::from_millis(500)));
        let started = Instant::now();
        assert!(handle.join_timeout(Duration::from_millis(50)).is_err());
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[test]
    fn test_move_queue_drain_without_dispatcher() {
        let queue = MoveQueue::new();
        for i in 0..5 {
            queue.push(Pose::new(-350.0, i as f64, 200.0, 180.0, 0.0, 0.0));
        }
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.drain(), 5);
        assert!(queue.is_empty());
        assert_eq!(queue.drain(), 0);
    }

    #[test]
    fn test_emergency_stop_drains_queue_before_stop() {
        let robot = MockRobot::new();
        // 派发线程每次调用都会阻塞一段时间，保证队列在急停时仍有积压
        robot.set_call_delay(Duration::from_millis(100));
        let ctx = Arc::new(DriverContext::default());
        ctx.session.store(SessionState::Enabled);
        let driver = start(&robot, ctx.clone());

        for _ in 0..10 {
            driver.enqueue(base());
        }
        let drained = driver.emergency_stop().unwrap();
        assert_eq!(driver.queue_len(), 0);

        driver.shutdown();
        let moves = robot.count_calls("MovL");
        assert_eq!(moves + drained, 10);
        assert!(moves <= 1, "drained targets must not be executed");
        assert_eq!(robot.count_calls("Stop"), 1);
        assert_eq!(ctx.metrics.snapshot().emergency_drained, drained as u64);
    }

    #[test]
    fn test_shutdown_closes_both_channels() {
        let robot = MockRobot::new();
        let driver = start(&robot, Arc::new(DriverContext::default()));
        assert!(robot.command_open());
        assert!(robot.feedback_open());

        let report = driver.shutdown();
        assert!(report.is_clean());
        assert!(!robot.command_open());
        assert!(!robot.feedback_open());

        // 重复关闭是无操作
        assert!(driver.shutdown().is_clean());
        assert_eq!(robot.command_shutdowns(), 1);
        assert_eq!(robot.feedback_shutdowns(), 1);
    }

    #[test]
    fn test_shutdown_closes_channels_even_if_join_times_out() {
        let robot = MockRobot::new();
        let ctx = Arc::new(DriverContext::default());
        ctx.session.store(SessionState::Enabled);
        let connector = MockConnector::new(robot.clone());
        let driver = NovaDriver::start(
            connector.open_command().unwrap(),
            connector.open_feedback().unwrap(),
            ctx,
            SafetyGate::default(),
            PipelineConfig {
                feed_period_ms: 1,
                queue_poll_ms: 10,
                join_timeout_ms: 50,
            },
        )
        .unwrap();

        // 让派发线程卡在一次慢调用里
        robot.set_call_delay(Duration::from_millis(400));
        driver.enqueue(base());
        std::thread::sleep(Duration::from_millis(50));

        let report = driver.shutdown();
        assert!(!report.dispatch_joined);
        assert!(!robot.command_open());
        assert!(!robot.feedback_open());
    }

    #[test]
    fn test_drop_shuts_down() {
        let robot = MockRobot::new();
        {
            let _driver = start(&robot, Arc::new(DriverContext::default()));
        }
        assert_eq!(robot.command_shutdowns(), 1);
        assert_eq!(robot.feedback_shutdowns(), 1);
    }

    #[test]
    fn test_request_and_raw_call() {
        let robot = MockRobot::new();
        robot.set_error_ids(16, 0);
        let driver = start(&robot, Arc::new(DriverContext::default()));

        assert_eq!(
            driver.call_raw(&DashboardCommand::GetErrorId).unwrap(),
            "0,{16,0},GetErrorID()"
        );
        let reply = driver.request(&DashboardCommand::RobotMode).unwrap();
        assert_eq!(reply.payload_ints().unwrap(), vec![5]);

        driver.shutdown();
        assert!(driver.request(&DashboardCommand::Stop).is_err());
    }
}
