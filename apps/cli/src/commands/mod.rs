//! 命令定义和实现

pub mod alarm;
pub mod check;
pub mod config;
pub mod robot;

pub use alarm::AlarmCommand;
pub use check::{CheckCommand, PathCommand};
pub use config::ConfigCommand;
pub use robot::{
    DanceCommand, HomeCommand, MoveCommand, ProbeCommand, StatusCommand, StopCommand,
};
