//! 会话状态
//!
//! `Disconnected → Connected → Enabled`。`disable` 回到 `Connected`，
//! `disconnect` 从任意状态回到 `Disconnected`。
//!
//! 状态由前台线程写入，派发线程每次取出队列项时读取，因此使用原子存储。

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 连接会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SessionState {
    /// 未连接（默认）
    #[default]
    Disconnected = 0,
    /// 两个通道都已打开，后台线程运行中
    Connected = 1,
    /// 已上使能，允许运动
    Enabled = 2,
}

impl SessionState {
    /// 从 u8 转换，无效值视为 `Disconnected`
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connected,
            2 => Self::Enabled,
            _ => Self::Disconnected,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// `Connected` 或 `Enabled`
    pub fn is_connected(self) -> bool {
        self != Self::Disconnected
    }

    pub fn is_enabled(self) -> bool {
        self == Self::Enabled
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Enabled => "enabled",
        })
    }
}

/// 会话状态（原子版本，用于线程间共享）
#[derive(Debug)]
pub struct AtomicSessionState {
    inner: AtomicU8,
}

impl AtomicSessionState {
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn load(&self) -> SessionState {
        SessionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn store(&self, state: SessionState) {
        self.inner.store(state.as_u8(), Ordering::Release);
    }

    /// 仅当当前状态为 `from` 时切换到 `to`
    ///
    /// 返回是否切换成功。
    pub fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.inner
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for AtomicSessionState {
    fn default() -> Self {
        Self::new(SessionState::Disconnected)
    }
}
