//! 配置管理命令
//!
//! 配置文件默认位于 `<config_dir>/nova/config.toml`，可以用全局参数 `--config` 覆盖。

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use nova_client::ControllerConfig;
use nova_tools::SafetyPolicy;
use std::path::{Path, PathBuf};

/// 默认配置文件路径
pub fn default_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().context("unable to determine config directory")?;
    path.push("nova");
    path.push("config.toml");
    Ok(path)
}

/// 解析配置文件路径（命令行参数优先）
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path(),
    }
}

/// 加载配置（文件不存在时使用默认值）
pub fn load(path: &Path) -> Result<ControllerConfig> {
    ControllerConfig::load_or_default(path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}

fn parse_policy(value: &str) -> Result<SafetyPolicy> {
    match value {
        "warn-only" => Ok(SafetyPolicy::WarnOnly),
        "strict" => Ok(SafetyPolicy::Strict),
        other => bail!("unknown safety policy {:?} (expected warn-only or strict)", other),
    }
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 控制器 IP
        #[arg(long)]
        ip: Option<String>,

        /// 默认速度（1-100）
        #[arg(long)]
        speed: Option<u8>,

        /// 报警信息语言（zh_CN、en 等）
        #[arg(long)]
        language: Option<String>,

        /// 安全策略：warn-only 或 strict
        #[arg(long)]
        policy: Option<String>,

        /// 控制器报警目录（JSON）
        #[arg(long, requires = "alarm_servo")]
        alarm_controller: Option<PathBuf>,

        /// 伺服报警目录（JSON）
        #[arg(long, requires = "alarm_controller")]
        alarm_servo: Option<PathBuf>,
    },

    /// 获取配置项
    Get {
        /// 配置项名称
        #[arg(default_value = "all")]
        key: String,
    },

    /// 检查配置
    Check,
}

impl ConfigCommand {
    pub fn execute(self, path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Set {
                ip,
                speed,
                language,
                policy,
                alarm_controller,
                alarm_servo,
            } => {
                let mut config = load(path)?;
                if let Some(ip) = ip {
                    println!("robot_ip = {}", ip);
                    config.robot_ip = ip;
                }
                if let Some(speed) = speed {
                    config.default_speed = speed.clamp(1, 100);
                    println!("default_speed = {}", config.default_speed);
                }
                if let Some(language) = language {
                    println!("language = {}", language);
                    config.language = language;
                }
                if let Some(policy) = policy {
                    config.safety_policy = parse_policy(&policy)?;
                    println!("safety_policy = {}", policy);
                }
                if let (Some(controller), Some(servo)) = (alarm_controller, alarm_servo) {
                    config.alarm_controller_path = Some(controller);
                    config.alarm_servo_path = Some(servo);
                }
                config
                    .save(path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                Ok(())
            },

            ConfigCommand::Get { key } => {
                let config = load(path)?;
                match key.as_str() {
                    "robot_ip" | "ip" => println!("{}", config.robot_ip),
                    "default_speed" | "speed" => println!("{}", config.default_speed),
                    "language" => println!("{}", config.language),
                    "safety_policy" | "policy" => println!("{}", policy_name(config.safety_policy)),
                    "all" => print!("{}", config.to_toml_string()?),
                    other => bail!("unknown config key {:?}", other),
                }
                Ok(())
            },

            ConfigCommand::Check => {
                println!("config file: {}", path.display());
                if !path.exists() {
                    println!("  (not found, using defaults)");
                }
                let config = load(path)?;
                println!(
                    "  controller: {}:{} (feed {})",
                    config.robot_ip, config.dashboard_port, config.feed_port
                );
                println!("  speed:      {}%", config.default_speed);
                println!("  policy:     {}", policy_name(config.safety_policy));

                let decoder = nova_tools::AlarmDecoder::load(config.catalog_paths().as_ref());
                println!("  alarms:     {:?}", decoder.source());
                Ok(())
            },
        }
    }
}

fn policy_name(policy: SafetyPolicy) -> &'static str {
    match policy {
        SafetyPolicy::WarnOnly => "warn-only",
        SafetyPolicy::Strict => "strict",
    }
}
