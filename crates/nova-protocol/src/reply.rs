//! Dashboard 应答解析
//!
//! 应答格式：`<code>,{<payload>},<echo>;`
//!
//! - `code`: 0 表示指令被接受，非 0 表示控制器拒绝
//! - `payload`: 查询类指令的返回值（逗号分隔）
//! - `echo`: 回显的请求文本，如 `GetErrorID()`

use crate::ProtocolError;

/// 控制器不在 TCP 模式时的应答特征串
const NOT_TCP_MARKER: &str = "Not Tcp";

/// 已解析的 Dashboard 应答
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardReply {
    /// 返回码（0 = 成功）
    pub code: i32,
    /// 大括号内的内容（不含括号）
    pub payload: String,
    /// 回显部分
    pub echo: String,
}

impl DashboardReply {
    /// 解析应答文本
    ///
    /// # 错误
    /// - `ProtocolError::NotTcpMode`: 控制器处于非 TCP 控制模式
    /// - `ProtocolError::MalformedReply`: 返回码缺失或不是整数
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        if text.contains(NOT_TCP_MARKER) {
            return Err(ProtocolError::NotTcpMode);
        }

        let trimmed = text.trim().trim_end_matches(';');
        let (code_part, rest) = trimmed.split_once(',').unwrap_or((trimmed, ""));
        let code = code_part
            .trim()
            .parse::<i32>()
            .map_err(|_| ProtocolError::MalformedReply(text.to_string()))?;

        let rest = rest.trim_start();
        let (payload, echo) = match rest.strip_prefix('{') {
            Some(inner) => match inner.find('}') {
                Some(end) => (
                    inner[..end].to_string(),
                    inner[end + 1..].trim_start_matches(',').to_string(),
                ),
                None => return Err(ProtocolError::MalformedReply(text.to_string())),
            },
            None => (String::new(), rest.to_string()),
        };

        Ok(Self {
            code,
            payload,
            echo,
        })
    }

    /// 应答文本是否回显了指定指令
    ///
    /// 无法解析或没有回显的应答（如 "Not Tcp"）无从判断，视为匹配。
    pub fn echoes(text: &str, name: &str) -> bool {
        match Self::parse(text) {
            Ok(reply) => {
                let echo = reply.echo.trim();
                echo.is_empty() || echo.starts_with(name)
            },
            Err(_) => true,
        }
    }

    /// 指令是否被控制器接受
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// 将 payload 按逗号拆分为整数
    pub fn payload_ints(&self) -> Result<Vec<i64>, ProtocolError> {
        if self.payload.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.payload
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<i64>()
                    .map_err(|e| ProtocolError::Parse(format!("{:?}: {}", part.trim(), e)))
            })
            .collect()
    }
}
