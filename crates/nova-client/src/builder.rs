//! Builder 模式实现
//!
//! 提供链式构造 [`NovaController`] 的方式。

use crate::config::ControllerConfig;
use crate::controller::NovaController;
use nova_driver::PipelineConfig;
use nova_net::{Connector, TcpConnector};
use nova_tools::{AlarmDecoder, SafetyLimits, SafetyPolicy};
use std::path::PathBuf;

/// 控制器 Builder
///
/// # Example
///
/// ```rust,ignore
/// use nova_client::NovaBuilder;
/// use nova_tools::SafetyPolicy;
///
/// let robot = NovaBuilder::new()
///     .robot_ip("192.168.1.198")
///     .speed(30)
///     .safety_policy(SafetyPolicy::Strict)
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct NovaBuilder {
    config: ControllerConfig,
    pipeline: PipelineConfig,
    decoder: Option<AlarmDecoder>,
}

impl NovaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从完整配置开始
    pub fn from_config(config: ControllerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn robot_ip(mut self, ip: impl Into<String>) -> Self {
        self.config.robot_ip = ip.into();
        self
    }

    pub fn dashboard_port(mut self, port: u16) -> Self {
        self.config.dashboard_port = port;
        self
    }

    pub fn feed_port(mut self, port: u16) -> Self {
        self.config.feed_port = port;
        self
    }

    /// 初始速度（超出 [1, 100] 时截断）
    pub fn speed(mut self, percent: u8) -> Self {
        self.config.default_speed = percent.clamp(1, 100);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = language.into();
        self
    }

    pub fn safety_policy(mut self, policy: SafetyPolicy) -> Self {
        self.config.safety_policy = policy;
        self
    }

    pub fn safety_limits(mut self, limits: SafetyLimits) -> Self {
        self.config.safety_limits = limits;
        self
    }

    /// 上使能过程中的两个等待时间（毫秒）
    pub fn settle_times(mut self, enable_ms: u64, clear_error_ms: u64) -> Self {
        self.config.enable_settle_ms = enable_ms;
        self.config.clear_error_settle_ms = clear_error_ms;
        self
    }

    pub fn alarm_catalogs(
        mut self,
        controller: impl Into<PathBuf>,
        servo: impl Into<PathBuf>,
    ) -> Self {
        self.config.alarm_controller_path = Some(controller.into());
        self.config.alarm_servo_path = Some(servo.into());
        self
    }

    /// 直接指定报警解码器（跳过目录加载）
    pub fn alarm_decoder(mut self, decoder: AlarmDecoder) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// 构建使用 TCP 通道的控制器
    pub fn build(self) -> NovaController<TcpConnector> {
        let connector = self.config.tcp_connector();
        self.build_with(connector)
    }

    /// 使用自定义连接器构建控制器
    pub fn build_with<C: Connector>(self, connector: C) -> NovaController<C> {
        let decoder = self
            .decoder
            .unwrap_or_else(|| AlarmDecoder::load(self.config.catalog_paths().as_ref()));
        NovaController::with_parts(connector, self.config, self.pipeline, decoder)
    }
}
