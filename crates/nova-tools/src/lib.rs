//! # Nova Tools - 纯逻辑模块
//!
//! **依赖原则**: 只依赖 `nova-protocol`，不涉及任何 IO 线程或网络通道
//!
//! ## 包含模块
//!
//! - `safety` - 位姿安全检查（工作空间 + 奇异点启发式）
//! - `alarm` - 报警目录加载与报警信息解码
//! - `choreography` - 舞蹈关键帧与动作库

pub mod alarm;
pub mod choreography;
pub mod safety;

// 重新导出常用类型
pub use alarm::{AlarmCatalog, AlarmDecoder, AlarmEvent, AlarmInfo, CatalogError, CatalogPaths};
pub use choreography::{BeatSignal, DanceMove, FrequencyBand, Keyframe, MoveLibrary};
pub use safety::{
    SafetyCategory, SafetyLimits, SafetyPolicy, SafetyValidator, SafetyVerdict, SafetyWarning,
};
