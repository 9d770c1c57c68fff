//! # 报警解码
//!
//! 控制器和伺服各有一份独立的报警目录（JSON 数组），按整数 ID 索引，
//! 每条记录包含报警级别和按语言划分的 `{description, cause, solution}`。
//!
//! 目录在启动时加载一次，之后只读。

use num_enum::TryFromPrimitive;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, warn};

/// 目录的基础语言（请求的语言缺失时使用）
pub const BASE_LANGUAGE: &str = "zh_CN";

/// 没有报警时的固定文本
pub const NO_ALARM: &str = "no alarm";

const BUNDLED_CONTROLLER: &str = include_str!("../data/alarm_controller.json");
const BUNDLED_SERVO: &str = include_str!("../data/alarm_servo.json");

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Duplicate alarm id {0}")]
    DuplicateId(u32),
    #[error("Alarm id 0 is reserved for \"no fault\"")]
    ReservedId,
}

/// 报警级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum AlarmLevel {
    Hint = 1,
    Warning = 2,
    GeneralError = 3,
    SevereError = 4,
    FatalError = 5,
}

impl AlarmLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hint => "hint",
            Self::Warning => "warning",
            Self::GeneralError => "general error",
            Self::SevereError => "severe error",
            Self::FatalError => "fatal error",
        }
    }
}

/// 级别文本；未定义的级别显示为 `level N`
pub fn level_label(level: u8) -> String {
    match AlarmLevel::try_from(level) {
        Ok(known) => known.label().to_string(),
        Err(_) => format!("level {}", level),
    }
}

/// 单一语言的报警文本
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AlarmText {
    pub description: String,
    pub cause: String,
    pub solution: String,
}

/// 目录条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmCatalogEntry {
    pub id: u32,
    pub level: u8,
    pub texts: BTreeMap<String, AlarmText>,
}

impl AlarmCatalogEntry {
    /// 按语言取文本，缺失时回退到基础语言
    pub fn text(&self, language: &str) -> Option<&AlarmText> {
        self.texts
            .get(language)
            .or_else(|| self.texts.get(BASE_LANGUAGE))
    }
}

/// 文件中的原始条目：语言键是动态的，非对象字段忽略
#[derive(Deserialize)]
struct RawEntry {
    id: u32,
    #[serde(default)]
    level: u8,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_json::Value>,
}

impl RawEntry {
    fn into_entry(self) -> AlarmCatalogEntry {
        let texts = self
            .rest
            .into_iter()
            .filter(|(_, value)| value.is_object())
            .filter_map(|(lang, value)| {
                serde_json::from_value::<AlarmText>(value)
                    .ok()
                    .map(|text| (lang, text))
            })
            .collect();
        AlarmCatalogEntry {
            id: self.id,
            level: self.level,
            texts,
        }
    }
}

/// 报警目录（ID → 条目）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmCatalog {
    entries: BTreeMap<u32, AlarmCatalogEntry>,
}

impl AlarmCatalog {
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let raw: Vec<RawEntry> = serde_json::from_str(json)?;
        let mut entries = BTreeMap::new();
        for entry in raw {
            if entry.id == 0 {
                return Err(CatalogError::ReservedId);
            }
            let id = entry.id;
            if entries.insert(id, entry.into_entry()).is_some() {
                return Err(CatalogError::DuplicateId(id));
            }
        }
        Ok(Self { entries })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn get(&self, id: u32) -> Option<&AlarmCatalogEntry> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 目录类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Controller,
    Servo,
}

impl CatalogKind {
    fn block_title(&self) -> &'static str {
        match self {
            Self::Controller => "controller alarm",
            Self::Servo => "servo alarm",
        }
    }
}

/// 主目录文件路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPaths {
    pub controller: PathBuf,
    pub servo: PathBuf,
}

/// 当前使用的目录来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource {
    /// 从配置的文件加载
    Primary,
    /// 内置默认目录
    Bundled,
    /// 内置目录也无法解析，目录为空
    Empty,
}

/// 一次状态读取解码得到的报警 ID 对（0 表示该类别无报警）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlarmEvent {
    pub controller_id: u32,
    pub servo_id: u32,
}

impl AlarmEvent {
    pub fn is_clear(&self) -> bool {
        self.controller_id == 0 && self.servo_id == 0
    }
}

/// 查询结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmInfo {
    pub id: u32,
    pub level: u8,
    pub description: String,
    pub cause: String,
    pub solution: String,
}

impl fmt::Display for AlarmInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", level_label(self.level), self.description)
    }
}

fn unknown_alarm(id: u32) -> String {
    format!("unknown alarm {}", id)
}

/// 报警解码器
#[derive(Debug, Clone)]
pub struct AlarmDecoder {
    controller: AlarmCatalog,
    servo: AlarmCatalog,
    source: CatalogSource,
}

impl AlarmDecoder {
    pub fn new(controller: AlarmCatalog, servo: AlarmCatalog) -> Self {
        Self {
            controller,
            servo,
            source: CatalogSource::Primary,
        }
    }

    /// 内置目录
    pub fn bundled() -> Result<Self, CatalogError> {
        Ok(Self {
            controller: AlarmCatalog::from_json_str(BUNDLED_CONTROLLER)?,
            servo: AlarmCatalog::from_json_str(BUNDLED_SERVO)?,
            source: CatalogSource::Bundled,
        })
    }

    /// 加载目录
    ///
    /// 主目录加载失败时回退到内置目录，并输出 `warn!`，
    /// 以便发现打包或路径配置问题。
    pub fn load(paths: Option<&CatalogPaths>) -> Self {
        if let Some(paths) = paths {
            let primary = AlarmCatalog::from_file(&paths.controller)
                .and_then(|c| AlarmCatalog::from_file(&paths.servo).map(|s| (c, s)));
            match primary {
                Ok((controller, servo)) => {
                    debug!(
                        "Loaded {} controller and {} servo alarm definitions",
                        controller.len(),
                        servo.len()
                    );
                    return Self::new(controller, servo);
                },
                Err(e) => {
                    warn!(
                        "Failed to load alarm catalogs ({}), falling back to bundled defaults",
                        e
                    );
                },
            }
        }

        match Self::bundled() {
            Ok(decoder) => decoder,
            Err(e) => {
                error!("Bundled alarm catalogs are invalid: {}", e);
                Self {
                    controller: AlarmCatalog::default(),
                    servo: AlarmCatalog::default(),
                    source: CatalogSource::Empty,
                }
            },
        }
    }

    pub fn source(&self) -> CatalogSource {
        self.source
    }

    pub fn catalog(&self, kind: CatalogKind) -> &AlarmCatalog {
        match kind {
            CatalogKind::Controller => &self.controller,
            CatalogKind::Servo => &self.servo,
        }
    }

    /// 解析 `GetErrorID()` 的应答：`"<code>,{<c>,<s>},<echo>"`
    ///
    /// 花括号缺失或内容格式错误时返回 `None`，从不 panic。
    pub fn parse_status(text: &str) -> Option<AlarmEvent> {
        let start = text.find('{')?;
        let end = text.find('}')?;
        if end <= start {
            return None;
        }
        let mut parts = text[start + 1..end].split(',');
        let controller_id = parts.next()?.trim().parse().ok()?;
        let servo_id = parts.next()?.trim().parse().ok()?;
        Some(AlarmEvent {
            controller_id,
            servo_id,
        })
    }

    /// 查询报警文本
    pub fn lookup(&self, id: u32, is_servo: bool, language: &str) -> AlarmInfo {
        let kind = if is_servo {
            CatalogKind::Servo
        } else {
            CatalogKind::Controller
        };
        let Some(entry) = self.catalog(kind).get(id) else {
            return AlarmInfo {
                id,
                level: 0,
                description: unknown_alarm(id),
                cause: String::new(),
                solution: String::new(),
            };
        };

        let text = entry.text(language).cloned().unwrap_or_default();
        AlarmInfo {
            id,
            level: entry.level,
            description: if text.description.is_empty() {
                unknown_alarm(id)
            } else {
                text.description
            },
            cause: text.cause,
            solution: text.solution,
        }
    }

    /// 生成报警报告：每个非零 ID 一段
    pub fn compose_message(&self, controller_id: u32, servo_id: u32, language: &str) -> String {
        let mut lines = Vec::new();
        for (id, kind) in [
            (controller_id, CatalogKind::Controller),
            (servo_id, CatalogKind::Servo),
        ] {
            if id == 0 {
                continue;
            }
            let info = self.lookup(id, kind == CatalogKind::Servo, language);
            lines.push(format!(
                "[{}] [{}] {}",
                kind.block_title(),
                level_label(info.level),
                info.description
            ));
            if !info.cause.is_empty() {
                lines.push(format!("  cause: {}", info.cause));
            }
            if !info.solution.is_empty() {
                lines.push(format!("  solution: {}", info.solution));
            }
        }

        if lines.is_empty() {
            NO_ALARM.to_string()
        } else {
            lines.join("\n")
        }
    }

    /// 按事件生成报告
    pub fn describe(&self, event: AlarmEvent, language: &str) -> String {
        self.compose_message(event.controller_id, event.servo_id, language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONTROLLER: &str = r#"[
        {"id": 16, "level": 3,
         "zh_CN": {"description": "碰撞", "cause": "外力", "solution": "清除"},
         "en": {"description": "Collision", "cause": "External force", "solution": "Clear it"}},
        {"id": 40, "level": 9, "zh_CN": {"description": "自定义"}},
        {"id": 41, "level": 2, "en": {"description": "", "cause": "x"}}
    ]"#;

    const SERVO: &str = r#"[
        {"id": 7, "level": 5, "zh_CN": {"description": "过流", "cause": "", "solution": ""}}
    ]"#;

    fn decoder() -> AlarmDecoder {
        AlarmDecoder::new(
            AlarmCatalog::from_json_str(CONTROLLER).unwrap(),
            AlarmCatalog::from_json_str(SERVO).unwrap(),
        )
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(
            AlarmDecoder::parse_status("0,{16,0},GetErrorID()"),
            Some(AlarmEvent {
                controller_id: 16,
                servo_id: 0
            })
        );
        assert_eq!(
            AlarmDecoder::parse_status("0,{ 3 , 4097 },GetErrorID();").map(|e| e.servo_id),
            Some(4097)
        );
    }

    #[test]
    fn test_parse_status_malformed() {
        assert_eq!(AlarmDecoder::parse_status("malformed"), None);
        assert_eq!(AlarmDecoder::parse_status("0,{16},GetErrorID()"), None);
        assert_eq!(AlarmDecoder::parse_status("0,{a,b},GetErrorID()"), None);
        assert_eq!(AlarmDecoder::parse_status("0,}16,0{,x"), None);
        assert_eq!(AlarmDecoder::parse_status("0,{-1,0},x"), None);
        assert_eq!(AlarmDecoder::parse_status(""), None);
    }

    #[test]
    fn test_lookup_language_fallback() {
        let d = decoder();
        assert_eq!(d.lookup(16, false, "en").description, "Collision");
        assert_eq!(d.lookup(16, false, "zh_CN").description, "碰撞");
        // 请求的语言不存在，回退到 zh_CN
        assert_eq!(d.lookup(16, false, "ja").description, "碰撞");
        assert_eq!(d.lookup(7, true, "en").description, "过流");
    }

    #[test]
    fn test_lookup_unknown_and_empty() {
        let d = decoder();
        let info = d.lookup(999, false, "en");
        assert_eq!(info.description, "unknown alarm 999");
        assert_eq!(info.level, 0);
        // 同一 ID 在另一目录中不存在
        assert_eq!(d.lookup(16, true, "en").description, "unknown alarm 16");
        // 描述为空
        let info = d.lookup(41, false, "en");
        assert_eq!(info.description, "unknown alarm 41");
        assert_eq!(info.cause, "x");
    }

    #[test]
    fn test_compose_message() {
        let d = decoder();
        let msg = d.compose_message(16, 7, "en");
        assert_eq!(
            msg,
            "[controller alarm] [general error] Collision\n  \
             cause: External force\n  \
             solution: Clear it\n\
             [servo alarm] [fatal error] 过流"
        );
        assert_eq!(
            d.compose_message(40, 0, "zh_CN"),
            "[controller alarm] [level 9] 自定义"
        );
    }

    #[test]
    fn test_compose_message_no_alarm() {
        let d = decoder();
        for lang in ["zh_CN", "en", "ja", ""] {
            assert_eq!(d.compose_message(0, 0, lang), NO_ALARM);
        }
    }

    #[test]
    fn test_level_labels() {
        assert_eq!(level_label(1), "hint");
        assert_eq!(level_label(4), "severe error");
        assert_eq!(level_label(0), "level 0");
        assert_eq!(level_label(6), "level 6");
    }

    #[test]
    fn test_catalog_validation() {
        let dup = r#"[{"id": 1, "level": 1}, {"id": 1, "level": 2}]"#;
        assert!(matches!(
            AlarmCatalog::from_json_str(dup),
            Err(CatalogError::DuplicateId(1))
        ));
        let zero = r#"[{"id": 0, "level": 1}]"#;
        assert!(matches!(
            AlarmCatalog::from_json_str(zero),
            Err(CatalogError::ReservedId)
        ));
        assert!(matches!(
            AlarmCatalog::from_json_str("{}"),
            Err(CatalogError::Json(_))
        ));
    }

    #[test]
    fn test_bundled_catalogs_parse() {
        let d = AlarmDecoder::bundled().unwrap();
        assert_eq!(d.source(), CatalogSource::Bundled);
        assert!(!d.catalog(CatalogKind::Controller).is_empty());
        assert!(!d.catalog(CatalogKind::Servo).is_empty());
        assert!(d.compose_message(16, 0, "en").starts_with("[controller alarm]"));
    }

    #[test]
    fn test_load_primary_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let controller = dir.path().join("controller.json");
        let servo = dir.path().join("servo.json");
        std::fs::File::create(&controller)
            .unwrap()
            .write_all(CONTROLLER.as_bytes())
            .unwrap();
        std::fs::File::create(&servo)
            .unwrap()
            .write_all(SERVO.as_bytes())
            .unwrap();

        let d = AlarmDecoder::load(Some(&CatalogPaths { controller, servo }));
        assert_eq!(d.source(), CatalogSource::Primary);
        assert_eq!(d.lookup(40, false, "zh_CN").description, "自定义");
    }

    #[test]
    fn test_load_falls_back_to_bundled() {
        let dir = tempfile::tempdir().unwrap();
        let controller = dir.path().join("controller.json");
        std::fs::write(&controller, "not json").unwrap();
        let paths = CatalogPaths {
            controller,
            servo: dir.path().join("missing.json"),
        };

        let d = AlarmDecoder::load(Some(&paths));
        assert_eq!(d.source(), CatalogSource::Bundled);
        assert_eq!(AlarmDecoder::load(None).source(), CatalogSource::Bundled);
    }
}
