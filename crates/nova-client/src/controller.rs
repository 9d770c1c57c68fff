//! 控制器门面
//!
//! [`NovaController`] 管理连接生命周期 `Disconnected → Connected → Enabled`，
//! 组合反馈线程、派发线程、安全检查和报警解码，对外提供生产者接口
//! （`enqueue_move`）和状态查询接口。
//!
//! # 线程安全
//!
//! 所有方法只需要 `&self`，可以在多个线程中共享同一个控制器（`Arc<NovaController<_>>`）。
//! 生命周期操作（`connect`/`enable`/`disable`/`disconnect`）之间互斥；
//! `enqueue_move`、`current_position` 不会等待生命周期锁。
//!
//! # 示例
//!
//! ```rust,ignore
//! use nova_client::NovaBuilder;
//! use nova_protocol::Pose;
//!
//! let robot = NovaBuilder::new().robot_ip("192.168.1.198").build();
//! robot.connect()?;
//! robot.enable()?;
//! robot.enqueue_move(Pose::new(-350.0, 0.0, 200.0, 180.0, 0.0, 0.0))?;
//! println!("{}", robot.alarm_info());
//! robot.disconnect();
//! ```

use crate::config::ControllerConfig;
use crate::error::RobotError;
use crate::status::{AlarmStatus, RobotStatus};
use nova_driver::{
    DriverContext, DriverError, FeedbackSnapshot, MetricsSnapshot, MoveRecord, NovaDriver,
    PipelineConfig, SafetyGate, SessionState, ShutdownReport,
};
use nova_net::{CommandChannel, Connector, NetError};
use nova_protocol::{DashboardCommand, JointTarget, Pose};
use nova_tools::{AlarmDecoder, SafetyValidator};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Nova 控制器
pub struct NovaController<C: Connector> {
    connector: C,
    config: ControllerConfig,
    pipeline: PipelineConfig,
    gate: SafetyGate,
    decoder: AlarmDecoder,
    ctx: Arc<DriverContext>,
    lifecycle: Mutex<()>,
    driver: RwLock<Option<Arc<NovaDriver<C::Command>>>>,
}

impl<C: Connector> NovaController<C> {
    /// 按配置创建控制器（报警目录按配置加载，失败时使用内置目录）
    pub fn new(connector: C, config: ControllerConfig) -> Self {
        let decoder = AlarmDecoder::load(config.catalog_paths().as_ref());
        Self::with_parts(connector, config, PipelineConfig::default(), decoder)
    }

    pub fn with_parts(
        connector: C,
        config: ControllerConfig,
        pipeline: PipelineConfig,
        decoder: AlarmDecoder,
    ) -> Self {
        let gate = SafetyGate::new(
            SafetyValidator::new(config.safety_limits.clone()),
            config.safety_policy,
        );
        let ctx = Arc::new(DriverContext::new(config.default_speed));
        Self {
            connector,
            config,
            pipeline,
            gate,
            decoder,
            ctx,
            lifecycle: Mutex::new(()),
            driver: RwLock::new(None),
        }
    }

    // ==================== 生命周期 ====================

    /// 打开两个通道并启动后台线程
    ///
    /// 先打开 Dashboard 通道，再打开反馈通道；任何一步失败都会关闭已打开的通道。
    /// 已连接时直接返回 `Ok(())`。
    pub fn connect(&self) -> Result<(), RobotError> {
        let _guard = self.lifecycle.lock();
        if self.driver.read().is_some() {
            debug!("Already connected to {}", self.connector.describe());
            return Ok(());
        }

        info!("Connecting to {}", self.connector.describe());
        let command = self
            .connector
            .open_command()
            .map_err(|e| self.connection_failed(e))?;

        let feedback = match self.connector.open_feedback() {
            Ok(feedback) => feedback,
            Err(e) => {
                close_command(&command);
                return Err(self.connection_failed(e));
            },
        };

        let driver = NovaDriver::start(
            command,
            feedback,
            self.ctx.clone(),
            self.gate.clone(),
            self.pipeline.clone(),
        )
        .map_err(|e| {
            self.ctx.errors.record(format!("Connection error: {}", e));
            match e {
                DriverError::Net(e) => RobotError::Connection(e),
                other => RobotError::Driver(other),
            }
        })?;

        *self.driver.write() = Some(Arc::new(driver));
        self.ctx.session.store(SessionState::Connected);
        info!("Connected to {}", self.connector.describe());
        Ok(())
    }

    /// 上使能
    ///
    /// `EnableRobot()` → 等待 → `ClearError()` → 等待 → 下发当前速度。
    /// `EnableRobot()` 失败时返回 [`RobotError::Enable`]，状态保持 `Connected`；
    /// 后续步骤被控制器拒绝只输出警告。
    pub fn enable(&self) -> Result<(), RobotError> {
        let _guard = self.lifecycle.lock();
        let driver = self.active_driver()?;

        info!("Enabling robot");
        driver
            .request(&DashboardCommand::EnableRobot)
            .map_err(|e| {
                self.ctx.errors.record(format!("Enable error: {}", e));
                RobotError::Enable(e)
            })?;
        settle(self.config.enable_settle_ms);

        let cleared = soft_request(&driver, &DashboardCommand::ClearError);
        self.enable_step(cleared)?;
        settle(self.config.clear_error_settle_ms);

        let applied = apply_speed(&driver, self.ctx.speed());
        self.enable_step(applied)?;

        self.ctx.session.store(SessionState::Enabled);
        info!("Robot enabled (speed {}%)", self.ctx.speed());
        Ok(())
    }

    /// 下使能，回到 `Connected`
    ///
    /// 无论 `DisableRobot()` 是否成功，派发线程都会立即停止执行队列中的目标。
    pub fn disable(&self) -> Result<(), RobotError> {
        let _guard = self.lifecycle.lock();
        let driver = self.active_driver()?;

        self.ctx.session.store(SessionState::Connected);
        driver
            .request(&DashboardCommand::DisableRobot)
            .map_err(|e| self.foreground_failed("Disable error", e))?;
        info!("Robot disabled");
        Ok(())
    }

    /// 断开连接（任意状态均可调用，重复调用安全）
    ///
    /// 停止两个后台线程（每个最多等待 `join_timeout_ms`），然后关闭两个通道。
    pub fn disconnect(&self) -> ShutdownReport {
        let _guard = self.lifecycle.lock();
        self.ctx.session.store(SessionState::Disconnected);
        let Some(driver) = self.driver.write().take() else {
            return ShutdownReport {
                feed_joined: true,
                dispatch_joined: true,
            };
        };

        info!("Disconnecting from {}", self.connector.describe());
        let report = driver.shutdown();
        if !report.is_clean() {
            warn!("Disconnected with background threads still running");
        }
        report
    }

    // ==================== 速度 ====================

    /// 设置速度百分比
    ///
    /// 超出 [1, 100] 的值被截断，不会报错；已连接时立即下发到
    /// `VelL`/`AccL`/`VelJ`/`AccJ`。返回实际使用的值。
    pub fn set_speed(&self, percent: i64) -> Result<u8, RobotError> {
        let speed = self.ctx.set_speed(percent);
        if i64::from(speed) != percent {
            debug!("Speed {} clamped to {}", percent, speed);
        }

        if let Some(driver) = self.driver() {
            apply_speed(&driver, speed).map_err(|e| self.foreground_failed("Speed error", e))?;
        }
        info!("Speed set to {}%", speed);
        Ok(speed)
    }

    pub fn current_speed(&self) -> u8 {
        self.ctx.speed()
    }

    // ==================== 运动 ====================

    /// 目标位姿入队（不阻塞）
    ///
    /// 只在 `Enabled` 状态下接受；安全检查在派发线程执行前进行。
    pub fn enqueue_move(&self, pose: Pose) -> Result<(), RobotError> {
        if !pose.is_finite() {
            return Err(RobotError::InvalidTarget(pose.to_string()));
        }
        let driver = self.enabled_driver()?;
        driver.enqueue(pose);
        Ok(())
    }

    /// 关节运动（直接发送，不经过队列）
    pub fn move_joints(&self, joints: [f64; 6]) -> Result<(), RobotError> {
        if joints.iter().any(|j| !j.is_finite()) {
            return Err(RobotError::InvalidTarget(format!("{:?}", joints)));
        }
        let driver = self.enabled_driver()?;
        let command = DashboardCommand::mov_j(JointTarget(joints), self.ctx.speed());
        driver
            .request(&command)
            .map_err(|e| self.foreground_failed("Move execution error", e))?;
        debug!("Executed {}", command);
        Ok(())
    }

    /// 回到配置中的初始关节位置（不等待运动完成）
    pub fn move_home(&self) -> Result<(), RobotError> {
        info!("Moving to home position");
        self.move_joints(self.config.home_joints)
    }

    /// 急停：清空队列（不执行），然后发送 `Stop()`；返回丢弃的目标数量
    pub fn emergency_stop(&self) -> Result<usize, RobotError> {
        let driver = self.driver().ok_or(RobotError::NotConnected)?;
        driver
            .emergency_stop()
            .map_err(|e| self.foreground_failed("Emergency stop error", e))
    }

    pub fn queue_len(&self) -> usize {
        self.driver().map_or(0, |d| d.queue_len())
    }

    // ==================== 状态 ====================

    pub fn state(&self) -> SessionState {
        self.ctx.session.load()
    }

    /// 最新的末端位姿（反馈线程写入，读取不阻塞）
    pub fn current_position(&self) -> Pose {
        self.ctx.current_pose()
    }

    pub fn feedback(&self) -> FeedbackSnapshot {
        self.ctx.feedback()
    }

    /// 状态快照（已连接时查询 `RobotMode()`）
    pub fn status(&self) -> RobotStatus {
        let robot_mode = self.driver().and_then(|driver| {
            match driver
                .request(&DashboardCommand::RobotMode)
                .and_then(|reply| reply.payload_ints().map_err(DriverError::from))
            {
                Ok(values) => values.first().copied(),
                Err(e) => {
                    debug!("RobotMode query failed: {}", e);
                    None
                },
            }
        });

        RobotStatus {
            state: self.state(),
            position: self.current_position(),
            queue_len: self.queue_len(),
            error_count: self.ctx.errors.len(),
            speed: self.ctx.speed(),
            robot_mode,
        }
    }

    /// 查询并解码报警
    pub fn alarm_info(&self) -> AlarmStatus {
        let Some(driver) = self.driver() else {
            return AlarmStatus::Disconnected;
        };

        let raw = match driver.call_raw(&DashboardCommand::GetErrorId) {
            Ok(raw) => raw,
            Err(e) => {
                self.ctx.errors.record(format!("Alarm query error: {}", e));
                return AlarmStatus::Error {
                    message: format!("failed to query alarm: {}", e),
                };
            },
        };

        match AlarmDecoder::parse_status(&raw) {
            Some(event) if event.is_clear() => AlarmStatus::Normal { raw },
            Some(event) => AlarmStatus::Alarm {
                event,
                message: self.decoder.describe(event, &self.config.language),
                raw,
            },
            None => {
                warn!("Unable to parse error id from {:?}", raw);
                AlarmStatus::Unknown { raw }
            },
        }
    }

    /// `GetErrorID()` 的原始应答
    pub fn error_id(&self) -> Result<String, RobotError> {
        let driver = self.driver().ok_or(RobotError::NotConnected)?;
        Ok(driver.call_raw(&DashboardCommand::GetErrorId)?)
    }

    /// 清除控制器报警
    pub fn clear_robot_error(&self) -> Result<(), RobotError> {
        let driver = self.driver().ok_or(RobotError::NotConnected)?;
        driver
            .request(&DashboardCommand::ClearError)
            .map_err(|e| self.foreground_failed("Clear error failed", e))?;
        info!("Controller alarms cleared");
        Ok(())
    }

    /// 清空错误日志；已连接时同时清除控制器报警
    pub fn clear_errors(&self) -> Result<(), RobotError> {
        self.ctx.errors.clear();
        if self.driver().is_some() {
            self.clear_robot_error()?;
        }
        Ok(())
    }

    /// 最近的 `count` 条错误（旧 → 新）
    pub fn recent_errors(&self, count: usize) -> Vec<String> {
        self.ctx.errors.recent(count)
    }

    /// 最近的 `count` 条运动记录（旧 → 新）
    pub fn move_history(&self, count: usize) -> Vec<MoveRecord> {
        self.ctx.history.recent(count)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    pub fn alarm_decoder(&self) -> &AlarmDecoder {
        &self.decoder
    }

    pub fn validator(&self) -> &SafetyValidator {
        &self.gate.validator
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    // ==================== 内部 ====================

    fn driver(&self) -> Option<Arc<NovaDriver<C::Command>>> {
        self.driver.read().clone()
    }

    fn active_driver(&self) -> Result<Arc<NovaDriver<C::Command>>, RobotError> {
        self.driver().ok_or(RobotError::NotConnected)
    }

    fn enabled_driver(&self) -> Result<Arc<NovaDriver<C::Command>>, RobotError> {
        if !self.state().is_enabled() {
            return Err(RobotError::NotEnabled);
        }
        self.active_driver()
    }

    fn connection_failed(&self, e: NetError) -> RobotError {
        self.ctx.errors.record(format!("Connection error: {}", e));
        RobotError::Connection(e)
    }

    fn foreground_failed(&self, context: &str, e: DriverError) -> RobotError {
        self.ctx.errors.record(format!("{}: {}", context, e));
        RobotError::Driver(e)
    }

    fn enable_step(&self, result: Result<(), DriverError>) -> Result<(), RobotError> {
        result.map_err(|e| {
            self.ctx.errors.record(format!("Enable error: {}", e));
            RobotError::Enable(e)
        })
    }
}

impl<C: Connector> Drop for NovaController<C> {
    fn drop(&mut self) {
        if self.driver.get_mut().is_some() {
            self.disconnect();
        }
    }
}

/// 控制器拒绝（非零返回码或非 TCP 模式）
fn is_rejection(e: &DriverError) -> bool {
    matches!(
        e,
        DriverError::Rejected { .. }
            | DriverError::Protocol(_)
            | DriverError::Net(NetError::Protocol(_))
    )
}

/// 发送指令，被控制器拒绝时只输出警告，通道错误照常返回
fn soft_request<Ch: CommandChannel>(
    driver: &NovaDriver<Ch>,
    command: &DashboardCommand,
) -> Result<(), DriverError> {
    match driver.request(command) {
        Ok(_) => Ok(()),
        Err(e) if is_rejection(&e) => {
            warn!("{}", e);
            Ok(())
        },
        Err(e) => Err(e),
    }
}

/// 下发速度比例到四个通道
fn apply_speed<Ch: CommandChannel>(driver: &NovaDriver<Ch>, speed: u8) -> Result<(), DriverError> {
    for command in [
        DashboardCommand::VelL(speed),
        DashboardCommand::AccL(speed),
        DashboardCommand::VelJ(speed),
        DashboardCommand::AccJ(speed),
    ] {
        soft_request(driver, &command)?;
    }
    Ok(())
}

fn close_command<Ch: CommandChannel>(command: &Ch) {
    let closed = command.shutdown_handle().and_then(|handle| handle.shutdown());
    if let Err(e) = closed {
        warn!("Failed to close dashboard channel during rollback: {}", e);
    }
}

fn settle(ms: u64) {
    if ms > 0 {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nova_protocol::ProtocolError;

    #[test]
    fn test_rejection_classification() {
        assert!(is_rejection(&DriverError::Rejected {
            command: "VelL(50)".into(),
            code: -1,
        }));
        assert!(is_rejection(&DriverError::Net(NetError::Protocol(
            ProtocolError::NotTcpMode
        ))));
        assert!(!is_rejection(&DriverError::Net(NetError::Closed)));
        assert!(!is_rejection(&DriverError::Net(NetError::Timeout)));
    }
}
