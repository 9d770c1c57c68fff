//! 舞蹈播放
//!
//! 按固定节拍（默认 50ms）对关键帧动作插值，把插值位姿送入控制器的运动队列。
//! 节拍信息来自 [`BeatSource`]，由调用方提供（音频分析、脚本等）。

use crate::controller::NovaController;
use crate::error::RobotError;
use nova_net::Connector;
use nova_tools::choreography::BASE_POSE;
use nova_tools::{BeatSignal, DanceMove, MoveLibrary};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// 默认插值周期
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// 节拍来源
pub trait BeatSource {
    /// 当前节拍；返回 `None` 表示节拍流结束（例如音乐停止）
    fn next_beat(&mut self) -> Option<BeatSignal>;
}

impl<I: Iterator<Item = BeatSignal>> BeatSource for I {
    fn next_beat(&mut self) -> Option<BeatSignal> {
        self.next()
    }
}

/// 一次舞蹈的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DanceStats {
    /// 切换动作的次数（包括第一个动作）
    pub moves_started: usize,
    /// 入队的目标位姿数量
    pub targets_sent: usize,
}

/// 舞蹈播放器
pub struct DancePlayer<'a, C: Connector> {
    robot: &'a NovaController<C>,
    library: MoveLibrary,
    tick: Duration,
}

impl<'a, C: Connector> DancePlayer<'a, C> {
    pub fn new(robot: &'a NovaController<C>, library: MoveLibrary) -> Self {
        Self {
            robot,
            library,
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn library(&self) -> &MoveLibrary {
        &self.library
    }

    /// 完整执行一个动作，最后补发末帧位姿；返回入队的目标数量
    ///
    /// `stop` 置位后提前结束（仍会补发末帧）。
    pub fn perform_move(&self, name: &str, stop: &AtomicBool) -> Result<usize, RobotError> {
        let dance_move = self.lookup(name)?;
        let duration = dance_move.duration.as_secs_f64();
        info!("Performing {} ({})", dance_move.name, dance_move.description);

        let start = Instant::now();
        let mut sent = 0;
        while !stop.load(Ordering::Relaxed) {
            let elapsed = start.elapsed().as_secs_f64();
            if elapsed >= duration {
                break;
            }
            self.robot.enqueue_move(dance_move.pose_at(elapsed / duration))?;
            sent += 1;
            spin_sleep::sleep(self.tick);
        }

        self.robot.enqueue_move(dance_move.final_pose())?;
        Ok(sent + 1)
    }

    /// 按节拍跳舞，直到节拍流结束或 `stop` 置位；结束后回到基准位姿
    pub fn dance(
        &self,
        beats: &mut impl BeatSource,
        stop: &AtomicBool,
    ) -> Result<DanceStats, RobotError> {
        let mut stats = DanceStats::default();
        let mut current: Option<&DanceMove> = None;
        let mut move_start = Instant::now();

        while !stop.load(Ordering::Relaxed) {
            let Some(beat) = beats.next_beat() else {
                break;
            };

            let name = self.library.select_move(beat);
            if current.is_none_or(|m| m.name != name) {
                let next = self.lookup(name)?;
                debug!(
                    "Switching to {} (strength {:.2}, band {})",
                    name, beat.strength, beat.band
                );
                current = Some(next);
                move_start = Instant::now();
                stats.moves_started += 1;
            }

            if let Some(dance_move) = current {
                let t = move_start.elapsed().as_secs_f64() / dance_move.duration.as_secs_f64();
                self.robot.enqueue_move(dance_move.pose_at(t))?;
                stats.targets_sent += 1;
            }
            spin_sleep::sleep(self.tick);
        }

        if self.robot.state().is_enabled() {
            self.robot.enqueue_move(BASE_POSE)?;
            stats.targets_sent += 1;
        }
        info!(
            "Dance finished: {} moves, {} targets",
            stats.moves_started, stats.targets_sent
        );
        Ok(stats)
    }

    fn lookup(&self, name: &str) -> Result<&DanceMove, RobotError> {
        self.library
            .get(name)
            .ok_or_else(|| RobotError::UnknownMove(name.to_string()))
    }
}
