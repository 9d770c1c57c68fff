//! # 舞蹈动作
//!
//! 关键帧动作按归一化时间 `t ∈ [0, 1)` 线性插值；
//! 内置动作全部以基准位姿开始和结束。

use crate::safety::{SafetyValidator, SafetyVerdict};
use nova_protocol::Pose;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 舞蹈基准位姿
pub const BASE_POSE: Pose = Pose::new(-350.0, 0.0, 200.0, 180.0, 0.0, 0.0);

/// 关键帧
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub pose: Pose,
    /// 归一化时间（0.0 ~ 1.0）
    pub time: f64,
}

/// 关键帧动作
#[derive(Debug, Clone, PartialEq)]
pub struct DanceMove {
    pub name: &'static str,
    pub description: &'static str,
    pub duration: Duration,
    keyframes: Vec<Keyframe>,
}

impl DanceMove {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            duration: Duration::from_secs(1),
            keyframes: Vec::new(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn keyframe(mut self, pose: impl Into<Pose>, time: f64) -> Self {
        self.keyframes.push(Keyframe {
            pose: pose.into(),
            time,
        });
        self
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// 时刻 `t` 的位姿（`t` 取模 1）
    pub fn pose_at(&self, t: f64) -> Pose {
        let Some(last) = self.keyframes.last() else {
            return Pose::default();
        };
        let t = t.rem_euclid(1.0);

        for pair in self.keyframes.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.time <= t && t <= b.time {
                if b.time == a.time {
                    return a.pose;
                }
                let ratio = (t - a.time) / (b.time - a.time);
                return a.pose.lerp(&b.pose, ratio);
            }
        }
        last.pose
    }

    /// 动作结束时的位姿
    pub fn final_pose(&self) -> Pose {
        self.keyframes
            .last()
            .map(|k| k.pose)
            .unwrap_or_default()
    }

    /// 检查所有关键帧，返回不安全的帧（帧序号 + 结论）
    pub fn unsafe_frames(&self, validator: &SafetyValidator) -> Vec<(usize, SafetyVerdict)> {
        self.keyframes
            .iter()
            .enumerate()
            .map(|(i, k)| (i, validator.validate(&k.pose)))
            .filter(|(_, verdict)| !verdict.safe)
            .collect()
    }
}

/// 音乐频段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrequencyBand {
    Low,
    #[default]
    Mid,
    High,
}

impl fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
        })
    }
}

impl FromStr for FrequencyBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "mid" => Ok(Self::Mid),
            "high" => Ok(Self::High),
            other => Err(format!("unknown frequency band: {}", other)),
        }
    }
}

/// 节拍信号
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BeatSignal {
    /// 当前估计的速度（每分钟节拍数）
    pub bpm: f64,
    /// 节拍强度（0.0 ~ 1.0）
    pub strength: f64,
    pub band: FrequencyBand,
}

impl BeatSignal {
    pub fn new(bpm: f64, strength: f64, band: FrequencyBand) -> Self {
        Self {
            bpm,
            strength,
            band,
        }
    }
}

const DANCE_MOVES: [&str; 6] = ["wave_right", "wave_up", "spin", "figure_eight", "pump", "sway"];
const TEST_MOVES: [&str; 4] = ["test_wave", "test_circle", "test_nod", "test_shake"];

/// 动作库
#[derive(Debug, Clone)]
pub struct MoveLibrary {
    moves: BTreeMap<&'static str, DanceMove>,
}

impl MoveLibrary {
    /// 内置动作库
    pub fn builtin() -> Self {
        let mut library = Self {
            moves: BTreeMap::new(),
        };
        for m in dance_moves().into_iter().chain(test_moves()) {
            library.insert(m);
        }
        library
    }

    pub fn insert(&mut self, dance_move: DanceMove) {
        self.moves.insert(dance_move.name, dance_move);
    }

    pub fn get(&self, name: &str) -> Option<&DanceMove> {
        self.moves.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.moves.keys().copied()
    }

    pub fn dance_moves(&self) -> &'static [&'static str] {
        &DANCE_MOVES
    }

    pub fn test_moves(&self) -> &'static [&'static str] {
        &TEST_MOVES
    }

    /// 按节拍选择动作
    pub fn select_move(&self, beat: BeatSignal) -> &'static str {
        let high = beat.band == FrequencyBand::High;
        if beat.strength > 0.7 {
            if high { "pump" } else { "spin" }
        } else if beat.strength > 0.4 {
            if beat.band == FrequencyBand::Low {
                "wave_right"
            } else {
                "figure_eight"
            }
        } else if high {
            "wave_up"
        } else {
            "sway"
        }
    }

    /// 检查所有动作，返回 `(动作名, 帧序号, 结论)`
    pub fn validate_all(
        &self,
        validator: &SafetyValidator,
    ) -> Vec<(&'static str, usize, SafetyVerdict)> {
        self.moves
            .values()
            .flat_map(|m| {
                m.unsafe_frames(validator)
                    .into_iter()
                    .map(move |(i, v)| (m.name, i, v))
            })
            .collect()
    }
}

fn dance_moves() -> Vec<DanceMove> {
    let b = BASE_POSE;
    vec![
        DanceMove::new("wave_right", "side to side sway")
            .keyframe(b, 0.0)
            .keyframe([-400.0, -50.0, 200.0, 180.0, 0.0, 0.0], 0.2)
            .keyframe([-400.0, 50.0, 200.0, 180.0, 0.0, 0.0], 0.5)
            .keyframe([-400.0, -50.0, 200.0, 180.0, 0.0, 0.0], 0.8)
            .keyframe(b, 1.0),
        DanceMove::new("wave_up", "up and down wave")
            .keyframe(b, 0.0)
            .keyframe([-350.0, 0.0, 150.0, 180.0, 0.0, 0.0], 0.2)
            .keyframe([-350.0, 0.0, 250.0, 180.0, 0.0, 0.0], 0.5)
            .keyframe([-350.0, 0.0, 150.0, 180.0, 0.0, 0.0], 0.8)
            .keyframe(b, 1.0),
        DanceMove::new("spin", "tool rotation")
            .keyframe(b, 0.0)
            .keyframe([-350.0, 0.0, 200.0, 180.0, 0.0, 90.0], 0.2)
            .keyframe([-350.0, 0.0, 200.0, 180.0, 0.0, 180.0], 0.4)
            .keyframe([-350.0, 0.0, 200.0, 180.0, 0.0, 270.0], 0.6)
            .keyframe([-350.0, 0.0, 200.0, 180.0, 0.0, 360.0], 0.8)
            .keyframe(b, 1.0),
        DanceMove::new("figure_eight", "figure eight")
            .keyframe(b, 0.0)
            .keyframe([-400.0, 50.0, 200.0, 180.0, 0.0, 45.0], 0.25)
            .keyframe([-350.0, 0.0, 200.0, 180.0, 0.0, 0.0], 0.5)
            .keyframe([-300.0, -50.0, 200.0, 180.0, 0.0, -45.0], 0.75)
            .keyframe(b, 1.0),
        DanceMove::new("pump", "fast up and down")
            .with_duration(Duration::from_millis(500))
            .keyframe(b, 0.0)
            .keyframe([-350.0, 0.0, 180.0, 180.0, 0.0, 0.0], 0.2)
            .keyframe([-350.0, 0.0, 220.0, 180.0, 0.0, 0.0], 0.5)
            .keyframe([-350.0, 0.0, 180.0, 180.0, 0.0, 0.0], 0.8)
            .keyframe(b, 1.0),
        DanceMove::new("sway", "slow sway")
            .with_duration(Duration::from_secs(2))
            .keyframe(b, 0.0)
            .keyframe([-350.0, -30.0, 200.0, 175.0, 0.0, -10.0], 0.2)
            .keyframe([-350.0, 30.0, 200.0, 185.0, 0.0, 10.0], 0.5)
            .keyframe([-350.0, -30.0, 200.0, 175.0, 0.0, -10.0], 0.8)
            .keyframe(b, 1.0),
    ]
}

fn test_moves() -> Vec<DanceMove> {
    let b = BASE_POSE;

    const CIRCLE_STEPS: u32 = 12;
    let mut circle = DanceMove::new("test_circle", "draw a circle").keyframe(b, 0.0);
    for i in 1..CIRCLE_STEPS {
        let angle = f64::from(i) / f64::from(CIRCLE_STEPS) * std::f64::consts::TAU;
        circle = circle.keyframe(
            [-350.0 + 50.0 * angle.cos(), 50.0 * angle.sin(), 200.0, 180.0, 0.0, 0.0],
            // 为回到原位留出时间
            f64::from(i) / f64::from(CIRCLE_STEPS + 1),
        );
    }
    circle = circle.keyframe(b, 1.0);

    vec![
        DanceMove::new("test_wave", "wave hand")
            .keyframe(b, 0.0)
            .keyframe([-300.0, 0.0, 300.0, 180.0, 0.0, 0.0], 0.1)
            .keyframe([-300.0, 0.0, 300.0, 170.0, 15.0, 0.0], 0.3)
            .keyframe([-300.0, 0.0, 300.0, 190.0, -15.0, 0.0], 0.5)
            .keyframe([-300.0, 0.0, 300.0, 170.0, 15.0, 0.0], 0.7)
            .keyframe([-300.0, 0.0, 300.0, 180.0, 0.0, 0.0], 0.9)
            .keyframe(b, 1.0),
        circle,
        DanceMove::new("test_nod", "nod")
            .keyframe(b, 0.0)
            .keyframe([-350.0, 0.0, 200.0, 160.0, 0.0, 0.0], 0.25)
            .keyframe([-350.0, 0.0, 200.0, 200.0, 0.0, 0.0], 0.5)
            .keyframe([-350.0, 0.0, 200.0, 160.0, 0.0, 0.0], 0.75)
            .keyframe(b, 1.0),
        DanceMove::new("test_shake", "shake head")
            .keyframe(b, 0.0)
            .keyframe([-350.0, 0.0, 200.0, 180.0, 0.0, -30.0], 0.25)
            .keyframe([-350.0, 0.0, 200.0, 180.0, 0.0, 30.0], 0.5)
            .keyframe([-350.0, 0.0, 200.0, 180.0, 0.0, -30.0], 0.75)
            .keyframe(b, 1.0),
    ]
}
