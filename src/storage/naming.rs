//! # 文件命名
//!
//! ## 设计思路
//!
//! 文件名由 `<前缀>_<时间戳>` 组成，两段都可以省略；都省略时使用纯数字序列 `1`、`2`……
//! 前缀来自用户输入，必须先清洗成在任何文件系统上都安全的形式：
//! - 非法字符（`<>:"/\|?*` 与控制字符）替换为 `_`，连续的 `_` 合并
//! - 首尾空白、`.`、`_` 去掉，最多保留 16 个字符
//! - Windows 保留设备名（`CON`、`COM1` 等）加 `_` 前缀，即使后面还有扩展名也照样转义
//!
//! ## 实现思路
//!
//! 冲突时依次追加 `_1`、`_2`……；纯数字名称则直接递增数字。候选数量有上限，耗尽视为致命错误。
//! 这里只负责"选出当前不存在的名字"，真正的无覆盖提交由 `writer` 完成。

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::AppError;

/// 前缀最大字符数
pub const MAX_PREFIX_CHARS: usize = 16;

/// 冲突候选上限
pub const MAX_COLLISION_ATTEMPTS: u32 = 10_000;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const ILLEGAL_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const RESERVED_NAMES: [&str; 4] = ["CON", "PRN", "AUX", "NUL"];

/// 规范化后的命名选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingOptions {
    prefix: String,
    include_timestamp: bool,
}

impl NamingOptions {
    pub fn new(prefix: &str, include_timestamp: bool) -> Self {
        Self {
            prefix: normalize_prefix(prefix),
            include_timestamp,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn include_timestamp(&self) -> bool {
        self.include_timestamp
    }

    /// 生成不含扩展名与序号的基础名；前缀和时间戳都省略时为空串。
    pub fn base_name(&self, now: DateTime<Local>) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(2);
        if !self.prefix.is_empty() {
            parts.push(self.prefix.clone());
        }
        if self.include_timestamp {
            parts.push(now.format(TIMESTAMP_FORMAT).to_string());
        }
        parts.join("_")
    }
}

/// 清洗用户输入的前缀。
pub fn normalize_prefix(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if ILLEGAL_CHARS.contains(&c) || c.is_control() { '_' } else { c };
        if c == '_' && cleaned.ends_with('_') {
            continue;
        }
        cleaned.push(c);
    }

    let trimmed = trim_separators(&cleaned);
    let capped: String = trimmed.chars().take(MAX_PREFIX_CHARS).collect();
    trim_separators(&capped).to_string()
}

fn trim_separators(value: &str) -> &str {
    value.trim_matches(|c: char| c.is_whitespace() || c == '.' || c == '_')
}

/// 名称（按第一个 `.` 之前的部分比较）是否为 Windows 保留设备名。
pub fn is_reserved_name(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or_default().trim_end();
    let upper = stem.to_ascii_uppercase();
    if RESERVED_NAMES.contains(&upper.as_str()) {
        return true;
    }
    match upper.strip_prefix("COM").or_else(|| upper.strip_prefix("LPT")) {
        Some(digit) => digit.len() == 1 && matches!(digit.as_bytes()[0], b'1'..=b'9'),
        None => false,
    }
}

fn escape_reserved(file_name: String) -> String {
    if is_reserved_name(&file_name) {
        format!("_{}", file_name)
    } else {
        file_name
    }
}

/// 在 `dir` 中选出一个当前不存在的文件路径。
pub fn unique_path(
    dir: &Path,
    options: &NamingOptions,
    extension: &str,
    now: DateTime<Local>,
) -> Result<PathBuf, AppError> {
    let base = options.base_name(now);

    if base.is_empty() {
        for n in 1..=MAX_COLLISION_ATTEMPTS {
            let candidate = dir.join(format!("{}.{}", n, extension));
            if !candidate.exists() {
                return Ok(candidate);
            }
        }
    } else {
        let first = dir.join(escape_reserved(format!("{}.{}", base, extension)));
        if !first.exists() {
            return Ok(first);
        }
        log::debug!("🔄 文件名已存在，追加序号: {}", first.display());

        for n in 1..MAX_COLLISION_ATTEMPTS {
            let candidate = dir.join(escape_reserved(format!("{}_{}.{}", base, n, extension)));
            if !candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    Err(AppError::Naming(format!(
        "在 {} 中尝试 {} 个候选名称后仍然冲突",
        dir.display(),
        MAX_COLLISION_ATTEMPTS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;

    fn fixed_now() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 5, 14, 7, 9)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn prefix_normalization() {
        assert_eq!(normalize_prefix("a<b>c"), "a_b_c");
        assert_eq!(normalize_prefix("a//\\b"), "a_b");
        assert_eq!(normalize_prefix("  ..report.. "), "report");
        assert_eq!(normalize_prefix("__x__"), "x");
        assert_eq!(normalize_prefix("line\nbreak"), "line_break");
        assert_eq!(normalize_prefix("abcdefghijklmnopqrstuvwxyz"), "abcdefghijklmnop");
        assert_eq!(normalize_prefix("メモメモメモメモメモメモメモメモメモ").chars().count(), 16);
        assert_eq!(normalize_prefix("???"), "");
    }

    #[test]
    fn reserved_names_are_detected() {
        assert!(is_reserved_name("CON"));
        assert!(is_reserved_name("con.txt"));
        assert!(is_reserved_name("Lpt9.png"));
        assert!(is_reserved_name("COM1"));
        assert!(!is_reserved_name("COM0"));
        assert!(!is_reserved_name("COM10"));
        assert!(!is_reserved_name("CONSOLE.txt"));
        assert!(!is_reserved_name("icon.png"));
    }

    #[test]
    fn base_name_variants() {
        let now = fixed_now();
        assert_eq!(NamingOptions::new("memo", true).base_name(now), "memo_20240305_140709");
        assert_eq!(NamingOptions::new("memo", false).base_name(now), "memo");
        assert_eq!(NamingOptions::new("", true).base_name(now), "20240305_140709");
        assert_eq!(NamingOptions::new("", false).base_name(now), "");
    }

    #[test]
    fn reserved_prefix_is_escaped_with_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = NamingOptions::new("CON", false);
        let path = unique_path(dir.path(), &options, "txt", fixed_now()).expect("path");
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("_CON.txt"));
    }

    #[test]
    fn numeric_names_increment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = NamingOptions::new("", false);

        let first = unique_path(dir.path(), &options, "md", fixed_now()).expect("first");
        assert_eq!(first.file_name().and_then(|n| n.to_str()), Some("1.md"));
        fs::write(&first, b"x").expect("write");

        let second = unique_path(dir.path(), &options, "md", fixed_now()).expect("second");
        assert_eq!(second.file_name().and_then(|n| n.to_str()), Some("2.md"));
    }

    #[test]
    fn collisions_get_numbered_suffix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = NamingOptions::new("clip", false);
        fs::write(dir.path().join("clip.txt"), b"x").expect("write");
        fs::write(dir.path().join("clip_1.txt"), b"x").expect("write");

        let path = unique_path(dir.path(), &options, "txt", fixed_now()).expect("path");
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("clip_2.txt"));
    }

    #[test]
    fn other_extensions_do_not_collide() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = NamingOptions::new("clip", false);
        fs::write(dir.path().join("clip.png"), b"x").expect("write");

        let path = unique_path(dir.path(), &options, "txt", fixed_now()).expect("path");
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("clip.txt"));
    }
}
