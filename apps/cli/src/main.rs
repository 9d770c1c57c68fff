//! # Nova CLI
//!
//! Command-line interface for Dobot Nova robot arm control.
//!
//! 离线命令（`config`、`check`、`path`、`alarm`）不连接控制器；
//! 其余命令内部执行 连接 → 操作 → 断开：
//!
//! ```bash
//! # 配置控制器地址
//! nova-cli config set --ip 192.168.1.198 --speed 30
//!
//! # 检查目标位姿
//! nova-cli check -- -350,0,200,180,0,0
//!
//! # 运动
//! nova-cli move -- -350,0,200,180,0,0
//!
//! # 跳舞（Ctrl-C 结束）
//! nova-cli dance wave_right
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use nova_client::ControllerConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod validation;

use commands::{
    AlarmCommand, CheckCommand, ConfigCommand, DanceCommand, HomeCommand, MoveCommand,
    PathCommand, ProbeCommand, StatusCommand, StopCommand,
};

/// Nova CLI - 机械臂命令行工具
#[derive(Parser, Debug)]
#[command(name = "nova-cli")]
#[command(about = "Command-line interface for Dobot Nova robot arm control", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 <config_dir>/nova/config.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 控制器 IP（覆盖配置）
    #[arg(long, global = true)]
    ip: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 检查位姿是否安全
    Check {
        #[command(flatten)]
        args: CheckCommand,
    },

    /// 规划两点之间的安全路径
    Path {
        #[command(flatten)]
        args: PathCommand,
    },

    /// 解码报警
    Alarm {
        #[command(flatten)]
        args: AlarmCommand,
    },

    /// 连接测试：连接 → 使能 → 读取位置 → 下使能 → 断开
    Probe {
        #[command(flatten)]
        args: ProbeCommand,
    },

    /// 运动到目标位置
    Move {
        #[command(flatten)]
        args: MoveCommand,
    },

    /// 回到初始位置
    Home {
        #[command(flatten)]
        args: HomeCommand,
    },

    /// 急停
    Stop {
        #[command(flatten)]
        args: StopCommand,
    },

    /// 查询状态和报警
    Status {
        #[command(flatten)]
        args: StatusCommand,
    },

    /// 播放舞蹈动作
    Dance {
        #[command(flatten)]
        args: DanceCommand,
    },
}

fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nova_cli=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let path = commands::config::resolve_path(cli.config.as_deref())?;

    // 离线和在线命令共用同一份配置，--ip 只覆盖本次运行
    let config = || -> Result<ControllerConfig> {
        let mut config = commands::config::load(&path)?;
        if let Some(ip) = &cli.ip {
            config.robot_ip = ip.clone();
        }
        Ok(config)
    };

    match cli.command {
        Commands::Config(cmd) => cmd.execute(&path),
        Commands::Check { args } => args.execute(&config()?),
        Commands::Path { args } => args.execute(&config()?),
        Commands::Alarm { args } => args.execute(&config()?),
        Commands::Probe { args } => args.execute(&config()?),
        Commands::Move { args } => args.execute(&config()?),
        Commands::Home { args } => args.execute(&config()?),
        Commands::Stop { args } => args.execute(&config()?),
        Commands::Status { args } => args.execute(&config()?),
        Commands::Dance { args } => args.execute(&config()?),
    }
}
