//! 在线命令（需要连接控制器）
//!
//! 每个命令内部都是 连接 → 执行 → 断开 的 one-shot 流程。

use crate::validation::{parse_joints, parse_pose};
use anyhow::{Context, Result, bail};
use clap::Args;
use nova_client::{ControllerConfig, DancePlayer, NovaBuilder, NovaController, TcpConnector};
use nova_tools::MoveLibrary;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

type Robot = NovaController<TcpConnector>;

fn connect(config: &ControllerConfig) -> Result<Robot> {
    let robot = NovaBuilder::from_config(config.clone()).build();
    println!("Connecting to {}...", config.robot_ip);
    robot.connect().context("failed to connect")?;
    Ok(robot)
}

fn connect_enabled(config: &ControllerConfig, speed: Option<u8>) -> Result<Robot> {
    let robot = connect(config)?;
    if let Some(speed) = speed {
        robot.set_speed(i64::from(speed))?;
    }
    robot.enable().context("failed to enable robot")?;
    Ok(robot)
}

/// 下使能并断开，失败只记录警告
fn finish(robot: &Robot) {
    if robot.state().is_enabled() {
        if let Err(e) = robot.disable() {
            warn!("Disable failed: {}", e);
        }
    }
    let report = robot.disconnect();
    if !report.is_clean() {
        warn!("Background threads did not exit in time");
    }
}

/// 等待队列中的目标全部执行完
fn wait_for_queue(robot: &Robot, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if robot.queue_len() == 0 {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

fn print_alarm(robot: &Robot) {
    let alarm = robot.alarm_info();
    println!("alarm: {}", alarm.label());
    if alarm.is_alarm() {
        println!("{}", alarm.message());
    }
}

/// 连接 → 使能 → 读取位置 → 下使能 → 断开
#[derive(Args, Debug)]
pub struct ProbeCommand {
    /// 等待反馈的时间（毫秒）
    #[arg(long, default_value_t = 500)]
    pub settle_ms: u64,
}

impl ProbeCommand {
    pub fn execute(&self, config: &ControllerConfig) -> Result<()> {
        let robot = connect_enabled(config, None)?;
        thread::sleep(Duration::from_millis(self.settle_ms));

        println!("position: {}", robot.current_position());
        print_alarm(&robot);
        finish(&robot);
        println!("Probe finished");
        Ok(())
    }
}

/// 运动到目标位姿或关节角
#[derive(Args, Debug)]
pub struct MoveCommand {
    /// 目标位姿 x,y,z,rx,ry,rz（mm / 度）
    #[arg(allow_hyphen_values = true, required_unless_present = "joints")]
    pub pose: Option<String>,

    /// 目标关节角 j1,...,j6（度）
    #[arg(long, allow_hyphen_values = true, conflicts_with = "pose")]
    pub joints: Option<String>,

    /// 速度百分比（覆盖配置）
    #[arg(long)]
    pub speed: Option<u8>,

    /// 等待执行完成的时间（毫秒）
    #[arg(long, default_value_t = 3000)]
    pub wait_ms: u64,
}

impl MoveCommand {
    pub fn execute(&self, config: &ControllerConfig) -> Result<()> {
        // 先解析输入，避免无效参数时还去连接控制器
        let pose = self.pose.as_deref().map(parse_pose).transpose()?;
        let joints = self.joints.as_deref().map(parse_joints).transpose()?;

        let robot = connect_enabled(config, self.speed)?;
        let result = match (pose, joints) {
            (Some(pose), _) => {
                let verdict = robot.validator().validate(&pose);
                for warning in &verdict.warnings {
                    println!("warning: {}", warning);
                }
                let queued = robot.enqueue_move(pose);
                if queued.is_ok() && !wait_for_queue(&robot, Duration::from_millis(self.wait_ms)) {
                    warn!("Queue not drained after {} ms", self.wait_ms);
                }
                queued.map_err(anyhow::Error::from)
            },
            (None, Some(joints)) => robot.move_joints(joints).map_err(anyhow::Error::from),
            (None, None) => Err(anyhow::anyhow!("no target given")),
        };

        // 运动指令已提交给控制器，留出执行时间
        thread::sleep(Duration::from_millis(self.wait_ms.min(1000)));
        for error in robot.recent_errors(5) {
            println!("error: {}", error);
        }
        finish(&robot);
        result
    }
}

/// 回到初始位置
#[derive(Args, Debug)]
pub struct HomeCommand {
    /// 等待运动完成的时间（毫秒）
    #[arg(long, default_value_t = 3000)]
    pub wait_ms: u64,
}

impl HomeCommand {
    pub fn execute(&self, config: &ControllerConfig) -> Result<()> {
        let robot = connect_enabled(config, None)?;
        let result = robot.move_home();
        if result.is_ok() {
            println!("Moving to {:?}", config.home_joints);
            thread::sleep(Duration::from_millis(self.wait_ms));
        }
        finish(&robot);
        Ok(result?)
    }
}

/// 急停（清空队列并发送 Stop）
#[derive(Args, Debug)]
pub struct StopCommand {}

impl StopCommand {
    pub fn execute(&self, config: &ControllerConfig) -> Result<()> {
        let robot = connect(config)?;
        let result = robot.emergency_stop();
        finish(&robot);
        let drained = result.context("emergency stop failed")?;
        println!("Stopped ({} queued targets discarded)", drained);
        Ok(())
    }
}

/// 状态查询
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// 等待反馈的时间（毫秒）
    #[arg(long, default_value_t = 200)]
    pub settle_ms: u64,
}

impl StatusCommand {
    pub fn execute(&self, config: &ControllerConfig) -> Result<()> {
        let robot = connect(config)?;
        thread::sleep(Duration::from_millis(self.settle_ms));

        println!("{}", robot.status());
        print_alarm(&robot);
        finish(&robot);
        Ok(())
    }
}

/// 循环播放舞蹈动作，Ctrl-C 结束
#[derive(Args, Debug)]
pub struct DanceCommand {
    /// 动作名称
    #[arg(default_value = "wave_right")]
    pub name: String,

    /// 列出所有动作（不连接控制器）
    #[arg(long)]
    pub list: bool,

    /// 播放次数（0 表示直到 Ctrl-C）
    #[arg(long, default_value_t = 0)]
    pub repeat: usize,

    /// 速度百分比（覆盖配置）
    #[arg(long)]
    pub speed: Option<u8>,
}

impl DanceCommand {
    pub fn execute(&self, config: &ControllerConfig) -> Result<()> {
        let library = MoveLibrary::builtin();
        if self.list {
            for name in library.names() {
                if let Some(m) = library.get(name) {
                    println!("{:<14} {:>5.1}s  {}", name, m.duration.as_secs_f64(), m.description);
                }
            }
            return Ok(());
        }
        if library.get(&self.name).is_none() {
            bail!("unknown dance move {:?} (use --list)", self.name);
        }

        let stop = Arc::new(AtomicBool::new(false));
        {
            let stop = stop.clone();
            ctrlc::set_handler(move || {
                stop.store(true, Ordering::Relaxed);
            })
            .context("failed to install Ctrl-C handler")?;
        }

        let robot = connect_enabled(config, self.speed)?;
        let player = DancePlayer::new(&robot, library);
        let mut rounds = 0;
        let mut result = Ok(());
        while !stop.load(Ordering::Relaxed) && (self.repeat == 0 || rounds < self.repeat) {
            if let Err(e) = player.perform_move(&self.name, &stop) {
                result = Err(e);
                break;
            }
            rounds += 1;
            info!("Finished round {}", rounds);
        }

        wait_for_queue(&robot, Duration::from_secs(2));
        finish(&robot);
        println!("Danced {} rounds", rounds);
        Ok(result?)
    }
}
