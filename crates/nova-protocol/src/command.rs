//! Dashboard 指令
//!
//! Dashboard 通道（默认 29999 端口）采用文本请求/应答模式，
//! 每条指令渲染为 `Name(arg1,arg2,...)` 形式的字符串。

use crate::pose::{JointTarget, Pose};
use std::fmt;

/// 运动指令的坐标模式参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CoordinateMode {
    /// 目标点为笛卡尔位姿
    #[default]
    Pose = 0,
    /// 目标点为关节角度
    Joint = 1,
}

/// Dashboard 指令
///
/// 速度/加速度比例参数均为百分比（1-100）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DashboardCommand {
    /// 使能机械臂
    EnableRobot,
    /// 下使能机械臂
    DisableRobot,
    /// 清除控制器报警
    ClearError,
    /// 停止当前运动并清空控制器内部队列
    Stop,
    /// 查询机器人模式
    RobotMode,
    /// 查询报警 ID
    GetErrorId,
    /// 直线运动速度比例
    VelL(u8),
    /// 直线运动加速度比例
    AccL(u8),
    /// 关节运动速度比例
    VelJ(u8),
    /// 关节运动加速度比例
    AccJ(u8),
    /// 直线运动到目标位姿
    MovL {
        pose: Pose,
        mode: CoordinateMode,
        speed: u8,
    },
    /// 关节运动到目标关节角
    MovJ {
        joints: JointTarget,
        mode: CoordinateMode,
        speed: u8,
    },
}

impl DashboardCommand {
    /// 直线运动（位姿坐标）
    pub fn mov_l(pose: Pose, speed: u8) -> Self {
        Self::MovL {
            pose,
            mode: CoordinateMode::Pose,
            speed,
        }
    }

    /// 关节运动（关节坐标）
    pub fn mov_j(joints: JointTarget, speed: u8) -> Self {
        Self::MovJ {
            joints,
            mode: CoordinateMode::Joint,
            speed,
        }
    }

    /// 指令名称（即应答中回显的函数名）
    pub fn name(&self) -> &'static str {
        match self {
            Self::EnableRobot => "EnableRobot",
            Self::DisableRobot => "DisableRobot",
            Self::ClearError => "ClearError",
            Self::Stop => "Stop",
            Self::RobotMode => "RobotMode",
            Self::GetErrorId => "GetErrorID",
            Self::VelL(_) => "VelL",
            Self::AccL(_) => "AccL",
            Self::VelJ(_) => "VelJ",
            Self::AccJ(_) => "AccJ",
            Self::MovL { .. } => "MovL",
            Self::MovJ { .. } => "MovJ",
        }
    }

    /// 是否为运动指令
    pub fn is_motion(&self) -> bool {
        matches!(self, Self::MovL { .. } | Self::MovJ { .. })
    }
}

impl fmt::Display for DashboardCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VelL(p) | Self::AccL(p) | Self::VelJ(p) | Self::AccJ(p) => {
                write!(f, "{}({})", self.name(), p)
            },
            Self::MovL { pose, mode, speed } => write!(
                f,
                "MovL({},{},{},{},{},{},{},speed={})",
                pose.x, pose.y, pose.z, pose.rx, pose.ry, pose.rz, *mode as u8, speed
            ),
            Self::MovJ {
                joints,
                mode,
                speed,
            } => {
                let [j1, j2, j3, j4, j5, j6] = joints.0;
                write!(
                    f,
                    "MovJ({},{},{},{},{},{},{},v={})",
                    j1, j2, j3, j4, j5, j6, *mode as u8, speed
                )
            },
            _ => write!(f, "{}()", self.name()),
        }
    }
}
