//! Mock 后端
//!
//! 进程内模拟的控制器：记录所有 Dashboard 指令、按脚本返回应答、
//! 按队列推送反馈字节，用于在没有硬件的情况下测试驱动层和客户端层。

use crate::{CommandChannel, Connector, FeedbackSource, NetError, ShutdownHandle};
use nova_protocol::{DashboardCommand, FeedbackFrame, Pose};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct MockState {
    calls: Vec<DashboardCommand>,
    replies: HashMap<&'static str, String>,
    failing: HashSet<&'static str>,
    error_ids: (i64, i64),
    robot_mode: i64,
    call_delay: Duration,
    fail_open_command: bool,
    fail_open_feedback: bool,
    command_open: bool,
    feedback_open: bool,
    command_opens: usize,
    feedback_opens: usize,
    command_shutdowns: usize,
    feedback_shutdowns: usize,
    feedback: VecDeque<Vec<u8>>,
    failing_feedback_reads: usize,
    feedback_peer_closed: bool,
}

/// 模拟控制器（可克隆，所有克隆共享状态）
#[derive(Clone, Default)]
pub struct MockRobot {
    inner: Arc<Mutex<MockState>>,
}

impl MockRobot {
    pub fn new() -> Self {
        let robot = Self::default();
        robot.inner.lock().robot_mode = 5;
        robot
    }

    /// 为指定指令设置固定应答（按指令名）
    pub fn set_reply(&self, name: &'static str, reply: impl Into<String>) {
        self.inner.lock().replies.insert(name, reply.into());
    }

    /// 让指定指令的调用失败（IO 错误）
    pub fn fail_calls(&self, name: &'static str) {
        self.inner.lock().failing.insert(name);
    }

    /// 恢复指定指令
    pub fn restore_calls(&self, name: &'static str) {
        self.inner.lock().failing.remove(name);
    }

    /// 设置 `GetErrorID()` 返回的报警 ID
    pub fn set_error_ids(&self, controller_id: i64, servo_id: i64) {
        self.inner.lock().error_ids = (controller_id, servo_id);
    }

    /// 每次调用的模拟耗时
    pub fn set_call_delay(&self, delay: Duration) {
        self.inner.lock().call_delay = delay;
    }

    pub fn fail_open_command(&self, fail: bool) {
        self.inner.lock().fail_open_command = fail;
    }

    pub fn fail_open_feedback(&self, fail: bool) {
        self.inner.lock().fail_open_feedback = fail;
    }

    /// 让接下来的 `n` 次反馈读取返回 IO 错误
    pub fn fail_feedback_reads(&self, n: usize) {
        self.inner.lock().failing_feedback_reads = n;
    }

    /// 模拟控制器关闭反馈连接：已排队的数据读完后返回 EOF
    pub fn close_feedback_from_peer(&self) {
        self.inner.lock().feedback_peer_closed = true;
    }

    /// 推送一帧完整的反馈数据
    pub fn push_feedback_pose(&self, pose: Pose) {
        let mut state = self.inner.lock();
        let frame = FeedbackFrame {
            robot_mode: state.robot_mode,
            tool_vector: pose,
        };
        state.feedback.push_back(frame.encode());
    }

    /// 推送任意字节（可用于模拟分段到达或损坏数据）
    pub fn push_feedback_bytes(&self, bytes: impl Into<Vec<u8>>) {
        self.inner.lock().feedback.push_back(bytes.into());
    }

    /// 已记录的所有指令
    pub fn calls(&self) -> Vec<DashboardCommand> {
        self.inner.lock().calls.clone()
    }

    /// 已记录指令的名称
    pub fn call_names(&self) -> Vec<&'static str> {
        self.inner.lock().calls.iter().map(|c| c.name()).collect()
    }

    /// 指定名称的指令被调用的次数
    pub fn count_calls(&self, name: &str) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| c.name() == name)
            .count()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    pub fn command_open(&self) -> bool {
        self.inner.lock().command_open
    }

    pub fn feedback_open(&self) -> bool {
        self.inner.lock().feedback_open
    }

    pub fn command_opens(&self) -> usize {
        self.inner.lock().command_opens
    }

    pub fn feedback_opens(&self) -> usize {
        self.inner.lock().feedback_opens
    }

    pub fn command_shutdowns(&self) -> usize {
        self.inner.lock().command_shutdowns
    }

    pub fn feedback_shutdowns(&self) -> usize {
        self.inner.lock().feedback_shutdowns
    }

    fn default_reply(state: &MockState, command: &DashboardCommand) -> String {
        match command {
            DashboardCommand::GetErrorId => format!(
                "0,{{{},{}}},GetErrorID()",
                state.error_ids.0, state.error_ids.1
            ),
            DashboardCommand::RobotMode => format!("0,{{{}}},RobotMode();", state.robot_mode),
            other => format!("0,{{}},{};", other),
        }
    }
}

/// Mock 指令通道
pub struct MockCommandChannel {
    robot: MockRobot,
}

impl CommandChannel for MockCommandChannel {
    fn call(&mut self, command: &DashboardCommand) -> Result<String, NetError> {
        let delay = self.robot.inner.lock().call_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let mut state = self.robot.inner.lock();
        if !state.command_open {
            return Err(NetError::Closed);
        }
        state.calls.push(*command);
        if state.failing.contains(command.name()) {
            return Err(NetError::Io(std::io::Error::other(format!(
                "mock failure for {}",
                command.name()
            ))));
        }
        let reply = match state.replies.get(command.name()) {
            Some(reply) => reply.clone(),
            None => MockRobot::default_reply(&state, command),
        };
        Ok(reply)
    }

    fn shutdown_handle(&self) -> Result<ShutdownHandle, NetError> {
        let robot = self.robot.clone();
        Ok(ShutdownHandle::new("dashboard", move || {
            let mut state = robot.inner.lock();
            state.command_open = false;
            state.command_shutdowns += 1;
            Ok(())
        }))
    }
}

/// Mock 反馈流
pub struct MockFeedbackSource {
    robot: MockRobot,
}

impl FeedbackSource for MockFeedbackSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        let mut state = self.robot.inner.lock();
        if !state.feedback_open {
            return Err(NetError::Closed);
        }
        if state.failing_feedback_reads > 0 {
            state.failing_feedback_reads -= 1;
            return Err(NetError::Io(std::io::Error::other("mock feedback read failure")));
        }
        match state.feedback.pop_front() {
            Some(mut chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    state.feedback.push_front(chunk.split_off(n));
                }
                Ok(n)
            },
            None if state.feedback_peer_closed => Ok(0),
            None => {
                drop(state);
                // 模拟 socket 读超时
                thread::sleep(Duration::from_millis(2));
                Err(NetError::Timeout)
            },
        }
    }

    fn shutdown_handle(&self) -> Result<ShutdownHandle, NetError> {
        let robot = self.robot.clone();
        Ok(ShutdownHandle::new("feedback", move || {
            let mut state = robot.inner.lock();
            state.feedback_open = false;
            state.feedback_shutdowns += 1;
            Ok(())
        }))
    }
}

/// Mock 连接器
#[derive(Clone, Default)]
pub struct MockConnector {
    pub robot: MockRobot,
}

impl MockConnector {
    pub fn new(robot: MockRobot) -> Self {
        Self { robot }
    }
}

impl Connector for MockConnector {
    type Command = MockCommandChannel;
    type Feedback = MockFeedbackSource;

    fn open_command(&self) -> Result<Self::Command, NetError> {
        let mut state = self.robot.inner.lock();
        if state.fail_open_command {
            return Err(NetError::Connect {
                addr: "mock:29999".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            });
        }
        state.command_open = true;
        state.command_opens += 1;
        Ok(MockCommandChannel {
            robot: self.robot.clone(),
        })
    }

    fn open_feedback(&self) -> Result<Self::Feedback, NetError> {
        let mut state = self.robot.inner.lock();
        if state.fail_open_feedback {
            return Err(NetError::Connect {
                addr: "mock:30004".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            });
        }
        state.feedback_open = true;
        state.feedback_peer_closed = false;
        state.feedback_opens += 1;
        Ok(MockFeedbackSource {
            robot: self.robot.clone(),
        })
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_calls_and_replies() {
        let robot = MockRobot::new();
        robot.set_error_ids(16, 0);
        let connector = MockConnector::new(robot.clone());
        let mut channel = connector.open_command().unwrap();

        assert_eq!(
            channel.call(&DashboardCommand::EnableRobot).unwrap(),
            "0,{},EnableRobot();"
        );
        assert_eq!(
            channel.call(&DashboardCommand::GetErrorId).unwrap(),
            "0,{16,0},GetErrorID()"
        );
        assert_eq!(robot.call_names(), vec!["EnableRobot", "GetErrorID"]);
    }

    #[test]
    fn test_mock_chunked_feedback() {
        let robot = MockRobot::new();
        robot.push_feedback_bytes(vec![1u8; 10]);
        let connector = MockConnector::new(robot.clone());
        let mut feed = connector.open_feedback().unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(feed.read_chunk(&mut buf).unwrap(), 4);
        assert_eq!(feed.read_chunk(&mut buf).unwrap(), 4);
        assert_eq!(feed.read_chunk(&mut buf).unwrap(), 2);
        assert!(matches!(feed.read_chunk(&mut buf), Err(NetError::Timeout)));
    }

    #[test]
    fn test_mock_shutdown_closes_channels() {
        let robot = MockRobot::new();
        let connector = MockConnector::new(robot.clone());
        let mut channel = connector.open_command().unwrap();
        channel.shutdown_handle().unwrap().shutdown().unwrap();
        assert!(matches!(
            channel.call(&DashboardCommand::Stop),
            Err(NetError::Closed)
        ));
        assert_eq!(robot.command_shutdowns(), 1);
    }

    #[test]
    fn test_mock_feedback_failures_and_peer_close() {
        let robot = MockRobot::new();
        robot.push_feedback_bytes(vec![7u8; 3]);
        robot.fail_feedback_reads(1);
        robot.close_feedback_from_peer();
        let mut feed = MockConnector::new(robot.clone()).open_feedback().unwrap();

        let mut buf = [0u8; 8];
        assert!(matches!(feed.read_chunk(&mut buf), Err(NetError::Io(_))));
        // 排队的数据先读完，然后才是 EOF
        assert_eq!(feed.read_chunk(&mut buf).unwrap(), 3);
        assert_eq!(feed.read_chunk(&mut buf).unwrap(), 0);
        assert_eq!(feed.read_chunk(&mut buf).unwrap(), 0);
    }
}
