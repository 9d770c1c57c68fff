//! # 安全检查
//!
//! 基于固定几何阈值的位姿安全检查。没有真正的雅可比分析，
//! 奇异点用以下代理量近似：
//!
//! - 肩奇异点：末端到基座轴线（Z 轴）的水平距离过小
//! - 腕奇异点：RY 接近 ±90° / ±270°（第 4 轴与第 6 轴接近同轴）
//! - 肘奇异点：末端到原点的距离过小（过度折叠）或过大（过度伸展）

use nova_protocol::Pose;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use tracing::warn;

/// 检查类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyCategory {
    Workspace,
    Shoulder,
    Wrist,
    Elbow,
}

impl SafetyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Shoulder => "shoulder",
            Self::Wrist => "wrist",
            Self::Elbow => "elbow",
        }
    }
}

impl fmt::Display for SafetyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条安全警告
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyWarning {
    pub category: SafetyCategory,
    pub message: String,
}

impl fmt::Display for SafetyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// 安全结论
///
/// 每次检查重新生成，不缓存。四项检查最多产生 4 条警告。
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyVerdict {
    pub safe: bool,
    pub warnings: SmallVec<[SafetyWarning; 4]>,
}

impl SafetyVerdict {
    /// 是否包含指定类别的警告
    pub fn has(&self, category: SafetyCategory) -> bool {
        self.warnings.iter().any(|w| w.category == category)
    }

    /// 所有警告拼接为一行
    pub fn summary(&self) -> String {
        self.warnings
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// 不安全目标的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SafetyPolicy {
    /// 记录警告后照常执行（默认，由控制器自身保护机制兜底）
    #[default]
    WarnOnly,
    /// 拒绝执行不安全的目标
    Strict,
}

/// 安全限制
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyLimits {
    /// 工作空间（mm）
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,

    /// 安全边界（从工作空间每个边界向内收缩，mm）
    pub safety_margin: f64,

    /// 基座轴线周围的危险半径（mm）
    pub shoulder_radius: f64,

    /// 腕部危险角度（度）
    pub wrist_danger_angles: Vec<f64>,

    /// 腕部角度阈值（度）
    pub wrist_threshold: f64,

    /// 最小臂展（mm）
    pub min_reach: f64,

    /// 最大臂展（mm）
    pub max_reach: f64,

    /// 伸直程度阈值（0-1），超过 `max_reach * extension_ratio` 视为过度伸展
    pub extension_ratio: f64,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            x_min: -500.0,
            x_max: 500.0,
            y_min: -500.0,
            y_max: 500.0,
            z_min: -50.0,
            z_max: 600.0,
            safety_margin: 50.0,
            shoulder_radius: 100.0,
            wrist_danger_angles: vec![90.0, -90.0, 270.0, -270.0],
            wrist_threshold: 5.0,
            min_reach: 200.0,
            max_reach: 600.0,
            extension_ratio: 0.95,
        }
    }
}

/// 预先验证过的安全位姿
pub const SAFE_POSITIONS: [Pose; 4] = [
    // 默认基准位置
    Pose::new(-350.0, 0.0, 200.0, 180.0, 0.0, 0.0),
    Pose::new(-300.0, 100.0, 250.0, 180.0, 0.0, 0.0),
    Pose::new(-300.0, -100.0, 250.0, 180.0, 0.0, 0.0),
    Pose::new(-400.0, 0.0, 300.0, 180.0, 0.0, 0.0),
];

/// 绕行中间点离基座轴线的最小坐标（mm）
const DETOUR_MIN_OFFSET: f64 = 150.0;

/// 位姿安全检查器
///
/// 纯函数式：不依赖连接状态，可在任何线程中共享使用。
#[derive(Debug, Clone, Default)]
pub struct SafetyValidator {
    limits: SafetyLimits,
}

impl SafetyValidator {
    pub fn new(limits: SafetyLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &SafetyLimits {
        &self.limits
    }

    /// 综合检查：四项检查独立运行（不短路），全部通过才安全
    pub fn validate(&self, pose: &Pose) -> SafetyVerdict {
        let warnings: SmallVec<[SafetyWarning; 4]> = [
            self.check_workspace(pose),
            self.check_shoulder(pose),
            self.check_wrist(pose),
            self.check_elbow(pose),
        ]
        .into_iter()
        .flatten()
        .collect();

        SafetyVerdict {
            safe: warnings.is_empty(),
            warnings,
        }
    }

    /// 工作空间检查（只报告第一个越界的轴）
    ///
    /// 含 NaN/Inf 的位姿无法比较，一律按越界处理。
    pub fn check_workspace(&self, pose: &Pose) -> Option<SafetyWarning> {
        if !pose.is_finite() {
            return Some(SafetyWarning {
                category: SafetyCategory::Workspace,
                message: format!("pose contains non-finite values ({})", pose),
            });
        }

        let l = &self.limits;
        let m = l.safety_margin;
        let axes = [
            ("X", pose.x, l.x_min + m, l.x_max - m),
            ("Y", pose.y, l.y_min + m, l.y_max - m),
            ("Z", pose.z, l.z_min + m, l.z_max - m),
        ];

        axes.iter().find_map(|&(axis, value, lo, hi)| {
            let message = if value < lo {
                format!("{} coordinate ({}) near minimum limit ({})", axis, value, lo)
            } else if value > hi {
                format!("{} coordinate ({}) near maximum limit ({})", axis, value, hi)
            } else {
                return None;
            };
            Some(SafetyWarning {
                category: SafetyCategory::Workspace,
                message,
            })
        })
    }

    /// 肩奇异点检查
    pub fn check_shoulder(&self, pose: &Pose) -> Option<SafetyWarning> {
        let distance = pose.planar_radius();
        (distance < self.limits.shoulder_radius).then(|| SafetyWarning {
            category: SafetyCategory::Shoulder,
            message: format!(
                "near shoulder singularity (distance to base axis: {:.1}mm)",
                distance
            ),
        })
    }

    /// 腕奇异点检查
    pub fn check_wrist(&self, pose: &Pose) -> Option<SafetyWarning> {
        let threshold = self.limits.wrist_threshold;
        self.limits
            .wrist_danger_angles
            .iter()
            .find(|&&angle| (pose.ry - angle).abs() < threshold)
            .map(|angle| SafetyWarning {
                category: SafetyCategory::Wrist,
                message: format!(
                    "near wrist singularity (RY={}° close to {}°)",
                    pose.ry, angle
                ),
            })
    }

    /// 肘奇异点检查
    pub fn check_elbow(&self, pose: &Pose) -> Option<SafetyWarning> {
        let distance = pose.reach();
        let max = self.limits.max_reach * self.limits.extension_ratio;
        let message = if distance < self.limits.min_reach {
            format!("arm over-folded (distance: {:.1}mm)", distance)
        } else if distance > max {
            format!("arm over-extended (distance: {:.1}mm)", distance)
        } else {
            return None;
        };
        Some(SafetyWarning {
            category: SafetyCategory::Elbow,
            message,
        })
    }

    /// 建议路径
    ///
    /// 如果直线路径穿过基座轴线附近，在中间插入一个绕行点。
    /// 返回 `[start, (mid), end]`。
    pub fn suggest_safe_path(&self, start: &Pose, end: &Pose) -> SmallVec<[Pose; 3]> {
        let start_verdict = self.validate(start);
        if !start_verdict.safe {
            warn!("Start pose is unsafe: {}", start_verdict.summary());
        }
        let end_verdict = self.validate(end);
        if !end_verdict.safe {
            warn!("Target pose is unsafe: {}", end_verdict.summary());
        }

        let mut path = SmallVec::new();
        path.push(*start);

        let (x1, y1, x2, y2) = (start.x, start.y, end.x, end.y);
        let crosses = x1 * x2 < 0.0 || y1 * y2 < 0.0;
        let closest = x1.abs().min(x2.abs()).min(y1.abs()).min(y2.abs());

        if crosses && closest < self.limits.shoulder_radius {
            let mid_x = push_outward((x1 + x2) / 2.0);
            let mid_y = push_outward((y1 + y2) / 2.0);
            path.push(Pose::new(
                mid_x,
                mid_y,
                (start.z + end.z) / 2.0,
                end.rx,
                end.ry,
                end.rz,
            ));
        }

        path.push(*end);
        path
    }

    /// 预置安全位姿中离 `current` 最近的一个（只比较位置分量，平局取表中靠前者）
    pub fn nearest_safe_position(&self, current: &Pose) -> Pose {
        let mut nearest = SAFE_POSITIONS[0];
        let mut min_distance = f64::INFINITY;
        for candidate in SAFE_POSITIONS.iter() {
            let distance = current.position_distance(candidate);
            if distance < min_distance {
                min_distance = distance;
                nearest = *candidate;
            }
        }
        nearest
    }

    /// 预置安全位姿表
    pub fn safe_positions(&self) -> &'static [Pose] {
        &SAFE_POSITIONS
    }
}

fn push_outward(value: f64) -> f64 {
    if value.abs() >= DETOUR_MIN_OFFSET {
        value
    } else if value >= 0.0 {
        DETOUR_MIN_OFFSET
    } else {
        -DETOUR_MIN_OFFSET
    }
}
