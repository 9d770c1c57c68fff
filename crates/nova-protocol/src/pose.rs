//! 位姿类型
//!
//! 笛卡尔位姿：位置单位毫米（mm），姿态单位度（°）。

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// 末端位姿 `(x, y, z, rx, ry, rz)`
///
/// 值类型（`Copy`），跨线程传递时总是复制，不共享引用。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

impl Pose {
    pub const fn new(x: f64, y: f64, z: f64, rx: f64, ry: f64, rz: f64) -> Self {
        Self { x, y, z, rx, ry, rz }
    }

    pub const fn from_array(v: [f64; 6]) -> Self {
        Self::new(v[0], v[1], v[2], v[3], v[4], v[5])
    }

    pub const fn to_array(&self) -> [f64; 6] {
        [self.x, self.y, self.z, self.rx, self.ry, self.rz]
    }

    /// 位置分量 `[x, y, z]`
    pub const fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// 到基座轴线（Z 轴）的水平距离
    pub fn planar_radius(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// 到基座原点的三维距离
    pub fn reach(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// 两个位姿位置分量之间的欧氏距离（忽略姿态）
    pub fn position_distance(&self, other: &Pose) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// 所有分量都是有限值
    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }

    /// 线性插值（`ratio` 为 0 时返回 `self`，为 1 时返回 `other`）
    pub fn lerp(&self, other: &Pose, ratio: f64) -> Pose {
        let a = self.to_array();
        let b = other.to_array();
        Pose::from_array(std::array::from_fn(|i| a[i] + (b[i] - a[i]) * ratio))
    }
}

impl From<[f64; 6]> for Pose {
    fn from(v: [f64; 6]) -> Self {
        Pose::from_array(v)
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}, {}, {})",
            self.x, self.y, self.z, self.rx, self.ry, self.rz
        )
    }
}

/// 从 `"x,y,z,rx,ry,rz"` 解析（CLI 使用）
impl FromStr for Pose {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_six(s).map(Pose::from_array)
    }
}

/// 关节目标角度 `[j1..j6]`（度）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JointTarget(pub [f64; 6]);

impl JointTarget {
    pub const fn new(joints: [f64; 6]) -> Self {
        Self(joints)
    }

    pub const fn as_array(&self) -> &[f64; 6] {
        &self.0
    }
}

impl FromStr for JointTarget {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_six(s).map(JointTarget)
    }
}

fn parse_six(s: &str) -> Result<[f64; 6], ProtocolError> {
    let values = s
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| ProtocolError::Parse(format!("{:?}: {}", part.trim(), e)))
        })
        .collect::<Result<Vec<f64>, _>>()?;

    <[f64; 6]>::try_from(values.as_slice())
        .map_err(|_| ProtocolError::Parse(format!("expected 6 values, got {}", values.len())))
}
