//! 离线安全检查命令（不连接控制器）

use crate::validation::parse_pose;
use anyhow::Result;
use clap::Args;
use nova_client::ControllerConfig;
use nova_protocol::Pose;
use nova_tools::SafetyValidator;

/// 检查单个位姿
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// 目标位姿 x,y,z,rx,ry,rz（mm / 度）
    #[arg(allow_hyphen_values = true)]
    pub pose: String,

    /// 同时给出最近的安全位置
    #[arg(long)]
    pub nearest: bool,
}

impl CheckCommand {
    pub fn execute(&self, config: &ControllerConfig) -> Result<()> {
        let pose = parse_pose(&self.pose)?;
        let validator = SafetyValidator::new(config.safety_limits.clone());
        let verdict = validator.validate(&pose);

        if verdict.safe {
            println!("{}: safe", pose);
        } else {
            println!("{}: unsafe", pose);
            for warning in &verdict.warnings {
                println!("  {}", warning);
            }
        }

        if self.nearest {
            println!("nearest safe position: {}", validator.nearest_safe_position(&pose));
        }
        Ok(())
    }
}

/// 规划两点之间的绕行路径
#[derive(Args, Debug)]
pub struct PathCommand {
    /// 起点 x,y,z,rx,ry,rz
    #[arg(allow_hyphen_values = true)]
    pub start: String,

    /// 终点 x,y,z,rx,ry,rz
    #[arg(allow_hyphen_values = true)]
    pub end: String,
}

impl PathCommand {
    pub fn execute(&self, config: &ControllerConfig) -> Result<()> {
        let start = parse_pose(&self.start)?;
        let end = parse_pose(&self.end)?;
        let validator = SafetyValidator::new(config.safety_limits.clone());

        let path = validator.suggest_safe_path(&start, &end);
        for (i, pose) in path.iter().enumerate() {
            println!("{}: {}{}", i, pose, marker(&validator, pose));
        }
        Ok(())
    }
}

fn marker(validator: &SafetyValidator, pose: &Pose) -> String {
    let verdict = validator.validate(pose);
    if verdict.safe {
        String::new()
    } else {
        format!("  ({})", verdict.summary())
    }
}
