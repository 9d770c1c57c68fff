//! 控制器配置
//!
//! TOML 格式，所有字段都有默认值，文件中缺失的字段使用默认值：
//!
//! ```toml
//! robot_ip = "192.168.1.198"
//! default_speed = 50
//! home_joints = [0.0, 45.0, 45.0, 0.0, 90.0, 0.0]
//! language = "en"
//! safety_policy = "strict"
//!
//! [safety_limits]
//! safety_margin = 60.0
//! ```

use crate::error::ConfigError;
use nova_net::TcpConnector;
use nova_tools::{CatalogPaths, SafetyLimits, SafetyPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// 控制器 IP 地址
    pub robot_ip: String,
    /// Dashboard 端口
    pub dashboard_port: u16,
    /// 实时反馈端口
    pub feed_port: u16,
    /// 初始速度百分比（1-100）
    pub default_speed: u8,
    /// 初始位置（关节角，度）
    pub home_joints: [f64; 6],
    /// 报警信息语言
    pub language: String,
    /// 不安全目标的处理策略
    pub safety_policy: SafetyPolicy,
    /// 建立连接的超时（毫秒）
    pub connect_timeout_ms: u64,
    /// `EnableRobot()` 之后的等待时间（毫秒）
    pub enable_settle_ms: u64,
    /// 上使能过程中 `ClearError()` 之后的等待时间（毫秒）
    pub clear_error_settle_ms: u64,
    /// 控制器报警目录（JSON）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alarm_controller_path: Option<PathBuf>,
    /// 伺服报警目录（JSON）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alarm_servo_path: Option<PathBuf>,
    /// 安全检查阈值
    pub safety_limits: SafetyLimits,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            robot_ip: "192.168.1.198".to_string(),
            dashboard_port: 29999,
            feed_port: 30004,
            default_speed: 50,
            home_joints: [0.0, 45.0, 45.0, 0.0, 90.0, 0.0],
            language: "zh_CN".to_string(),
            safety_policy: SafetyPolicy::WarnOnly,
            connect_timeout_ms: 3000,
            enable_settle_ms: 1000,
            clear_error_settle_ms: 500,
            alarm_controller_path: None,
            alarm_servo_path: None,
            safety_limits: SafetyLimits::default(),
        }
    }
}

impl ControllerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 文件不存在时返回默认配置
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// 保存配置（自动创建父目录）
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, self.to_toml_string()?).map_err(io_err)
    }

    /// 主报警目录路径（两个文件都配置时才有效）
    pub fn catalog_paths(&self) -> Option<CatalogPaths> {
        match (&self.alarm_controller_path, &self.alarm_servo_path) {
            (Some(controller), Some(servo)) => Some(CatalogPaths {
                controller: controller.clone(),
                servo: servo.clone(),
            }),
            _ => None,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// 按配置构造 TCP 连接器
    pub fn tcp_connector(&self) -> TcpConnector {
        let mut connector = TcpConnector::new(&self.robot_ip, self.dashboard_port, self.feed_port);
        connector.connect_timeout = self.connect_timeout();
        connector
    }
}
