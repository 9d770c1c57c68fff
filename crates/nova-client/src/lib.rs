//! # Nova Client
//!
//! Dobot Nova 机械臂的控制器门面：
//!
//! - [`NovaController`]: 连接生命周期、运动队列、速度、报警查询
//! - [`NovaBuilder`]: 链式构造控制器
//! - [`ControllerConfig`]: TOML 配置
//! - [`DancePlayer`]: 关键帧舞蹈播放
//!
//! 后台 IO 由 `nova-driver` 负责，本 crate 只做组合和状态管理。
//!
//! # 测试
//!
//! 启用 `mock` feature 后可以用 `nova_net::MockConnector` 代替真实控制器。

pub mod builder;
pub mod choreography;
pub mod config;
pub mod controller;
pub mod error;
pub mod status;

pub use builder::NovaBuilder;
pub use choreography::{BeatSource, DancePlayer, DanceStats};
pub use config::ControllerConfig;
pub use controller::NovaController;
pub use error::{ConfigError, RobotError};
pub use status::{AlarmStatus, RobotStatus};

pub use nova_driver::{MetricsSnapshot, MoveRecord, SessionState, ShutdownReport};
pub use nova_net::TcpConnector;
pub use nova_protocol::Pose;
