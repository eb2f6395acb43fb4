//! # 配置规范化与校验
//!
//! ## 设计思路
//!
//! 任何配置在被接受之前（加载后、写入前）都要先规范化、再校验：
//! - **规范化**：修剪文件名前缀并截断到 16 个字符，图片格式转小写，界面语言映射到支持列表
//! - **校验**：至少启用一种内容类型、图片格式合法、JPEG 质量在 1-100、
//!   快捷键至少一个修饰键且不含 Super 键、按键可识别
//!
//! ## 实现思路
//!
//! 规范化永远成功；校验失败返回 `SettingsError::Invalid`，调用方决定回退默认值还是拒绝写入。
//! 不支持的语言代码只会被替换为默认值，不会导致校验失败。

use once_cell::sync::Lazy;
use regex::Regex;

use super::{HotkeySettings, PersistedConfig, SettingsError};
use crate::storage::MAX_PREFIX_CHARS;

/// 默认界面语言
pub const DEFAULT_LANGUAGE: &str = "en";

/// 支持的界面语言
pub const SUPPORTED_LANGUAGES: [&str; 3] = ["en", "ja", "zh-CN"];

const SUPER_KEY_NAMES: [&str; 6] = ["win", "windows", "super", "meta", "cmd", "command"];

const NAMED_KEYS: [&str; 16] = [
    "space", "enter", "tab", "insert", "delete", "home", "end", "pageup", "pagedown", "up",
    "down", "left", "right", "printscreen", "pause", "escape",
];

static FUNCTION_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[fF]([1-9]|1[0-9]|2[0-4])$").expect("function key pattern must compile"));

/// 规范化配置（不会失败）。
pub fn normalize(mut config: PersistedConfig) -> PersistedConfig {
    config.save.file_name_prefix = config
        .save
        .file_name_prefix
        .trim()
        .chars()
        .take(MAX_PREFIX_CHARS)
        .collect::<String>()
        .trim_end()
        .to_string();
    config.save.image_format = config.save.image_format.trim().to_ascii_lowercase();
    config.hotkey.key = config.hotkey.key.trim().to_string();
    config.hotkey.modifiers = config
        .hotkey
        .modifiers
        .iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();
    config.ui.language = normalize_language(&config.ui.language).to_string();
    config
}

/// 将语言代码映射到支持列表，无法映射时返回默认语言。
pub fn normalize_language(code: &str) -> &'static str {
    let code = code.trim().replace('_', "-");
    if let Some(exact) = SUPPORTED_LANGUAGES
        .iter()
        .find(|supported| supported.eq_ignore_ascii_case(&code))
    {
        return *exact;
    }

    let primary = code.split('-').next().unwrap_or_default();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|supported| {
            supported
                .split('-')
                .next()
                .is_some_and(|p| p.eq_ignore_ascii_case(primary))
        })
        .copied()
        .unwrap_or(DEFAULT_LANGUAGE)
}

/// 校验配置。
pub fn validate(config: &PersistedConfig) -> Result<(), SettingsError> {
    config.save.to_settings()?;
    validate_hotkey(&config.hotkey)?;

    if !SUPPORTED_LANGUAGES.contains(&config.ui.language.as_str()) {
        return Err(SettingsError::invalid(format!("不支持的界面语言：{}", config.ui.language)));
    }
    Ok(())
}

fn validate_hotkey(hotkey: &HotkeySettings) -> Result<(), SettingsError> {
    if hotkey.modifiers.is_empty() {
        return Err(SettingsError::invalid("快捷键至少需要一个修饰键"));
    }

    for modifier in &hotkey.modifiers {
        let lower = modifier.to_ascii_lowercase();
        if SUPER_KEY_NAMES.contains(&lower.as_str()) {
            return Err(SettingsError::invalid(format!("快捷键不能使用系统键：{}", modifier)));
        }
        if !matches!(lower.as_str(), "ctrl" | "control" | "alt" | "shift") {
            return Err(SettingsError::invalid(format!("未知修饰键：{}", modifier)));
        }
    }

    if !is_known_key(&hotkey.key) {
        return Err(SettingsError::invalid(format!("无法识别的按键：{:?}", hotkey.key)));
    }
    Ok(())
}

/// 按键是否可识别：字母、数字、F1-F24 或常用命名键。
pub fn is_known_key(key: &str) -> bool {
    let key = key.trim();
    if key.is_empty() {
        return false;
    }

    let mut chars = key.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return c.is_ascii_alphanumeric();
    }

    FUNCTION_KEY.is_match(key) || NAMED_KEYS.contains(&key.to_ascii_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_hotkey(modifiers: &[&str], key: &str) -> PersistedConfig {
        let mut config = PersistedConfig::default();
        config.hotkey = HotkeySettings {
            modifiers: modifiers.iter().map(|m| m.to_string()).collect(),
            key: key.to_string(),
        };
        config
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&PersistedConfig::default()).is_ok());
    }

    #[test]
    fn language_normalization() {
        assert_eq!(normalize_language("en"), "en");
        assert_eq!(normalize_language("JA"), "ja");
        assert_eq!(normalize_language("ja-JP"), "ja");
        assert_eq!(normalize_language("zh"), "zh-CN");
        assert_eq!(normalize_language("zh_cn"), "zh-CN");
        assert_eq!(normalize_language("fr-FR"), "en");
        assert_eq!(normalize_language(""), "en");
    }

    #[test]
    fn unsupported_language_is_normalized_not_rejected() {
        let mut config = PersistedConfig::default();
        config.ui.language = "klingon".to_string();
        let normalized = normalize(config);
        assert_eq!(normalized.ui.language, "en");
        assert!(validate(&normalized).is_ok());
    }

    #[test]
    fn prefix_is_trimmed_and_capped() {
        let mut config = PersistedConfig::default();
        config.save.file_name_prefix = "   a very long prefix value here  ".to_string();
        let normalized = normalize(config);
        assert_eq!(normalized.save.file_name_prefix, "a very long pref");
        assert_eq!(normalized.save.file_name_prefix.chars().count(), 16);
    }

    #[test]
    fn hotkey_rules() {
        assert!(validate(&with_hotkey(&["Ctrl", "Alt"], "S")).is_ok());
        assert!(validate(&with_hotkey(&["shift"], "F12")).is_ok());
        assert!(validate(&with_hotkey(&["Control"], "PageDown")).is_ok());

        assert!(validate(&with_hotkey(&[], "S")).is_err());
        assert!(validate(&with_hotkey(&["Win"], "S")).is_err());
        assert!(validate(&with_hotkey(&["Ctrl", "Super"], "S")).is_err());
        assert!(validate(&with_hotkey(&["Hyper"], "S")).is_err());
        assert!(validate(&with_hotkey(&["Ctrl"], "")).is_err());
        assert!(validate(&with_hotkey(&["Ctrl"], "F25")).is_err());
        assert!(validate(&with_hotkey(&["Ctrl"], "Banana")).is_err());
    }

    #[test]
    fn known_keys() {
        assert!(is_known_key("a"));
        assert!(is_known_key("7"));
        assert!(is_known_key("f1"));
        assert!(is_known_key("Space"));
        assert!(!is_known_key("é"));
        assert!(!is_known_key("F0"));
    }
}
