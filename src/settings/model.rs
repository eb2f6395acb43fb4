//! # 配置数据模型
//!
//! ## 设计思路
//!
//! 磁盘上的 `PersistedConfig` 与运行时使用的 `SaveSettings` 分离：
//! - `PersistedConfig` 字段宽松（格式是字符串、质量是 `i64`），能完整承载用户手改出的越界值，
//!   便于校验阶段给出明确原因
//! - `SaveSettings` 是校验后的强类型快照，每次保存前复制一份，保存过程中不受设置变更影响
//!
//! ## 实现思路
//!
//! - 每个分节都带 `#[serde(default)]`，缺失字段回退默认值，未知字段忽略。
//! - 字段名使用 camelCase，与配置文件格式保持一致。

use serde::{Deserialize, Serialize};

use super::SettingsError;
use crate::content::ContentType;
use crate::storage::NamingOptions;

/// 当前配置文件版本
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// 默认 JPEG 质量
pub const DEFAULT_JPG_QUALITY: u8 = 90;

/// 持久化配置（磁盘格式）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedConfig {
    pub version: u32,
    pub save: SaveSection,
    pub hotkey: HotkeySettings,
    pub notification: NotificationSettings,
    pub advanced: AdvancedSettings,
    pub ui: UiSettings,
}

impl Default for PersistedConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            save: SaveSection::default(),
            hotkey: HotkeySettings::default(),
            notification: NotificationSettings::default(),
            advanced: AdvancedSettings::default(),
            ui: UiSettings::default(),
        }
    }
}

impl PersistedConfig {
    /// 转换为运行时保存设置（同时校验 `save` 分节）。
    pub fn save_settings(&self) -> Result<SaveSettings, SettingsError> {
        self.save.to_settings()
    }
}

/// `save` 分节
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveSection {
    pub image_enabled: bool,
    pub text_enabled: bool,
    pub markdown_enabled: bool,
    pub json_enabled: bool,
    pub csv_enabled: bool,
    pub image_format: String,
    pub jpg_quality: i64,
    pub file_name_prefix: String,
    pub include_timestamp: bool,
}

impl Default for SaveSection {
    fn default() -> Self {
        Self {
            image_enabled: true,
            text_enabled: true,
            markdown_enabled: true,
            json_enabled: true,
            csv_enabled: true,
            image_format: "png".to_string(),
            jpg_quality: DEFAULT_JPG_QUALITY as i64,
            file_name_prefix: String::new(),
            include_timestamp: true,
        }
    }
}

impl SaveSection {
    pub fn to_settings(&self) -> Result<SaveSettings, SettingsError> {
        let image_format = ImageFormat::parse(&self.image_format).ok_or_else(|| {
            SettingsError::invalid(format!(
                "未知图片格式：{:?}（可选：png / jpg / jpeg）",
                self.image_format
            ))
        })?;

        if !(1..=100).contains(&self.jpg_quality) {
            return Err(SettingsError::invalid(format!(
                "JPEG 质量超出范围：{}（允许 1-100）",
                self.jpg_quality
            )));
        }

        let settings = SaveSettings {
            image_enabled: self.image_enabled,
            text_enabled: self.text_enabled,
            markdown_enabled: self.markdown_enabled,
            json_enabled: self.json_enabled,
            csv_enabled: self.csv_enabled,
            image_format,
            jpg_quality: self.jpg_quality as u8,
            file_name_prefix: self.file_name_prefix.clone(),
            include_timestamp: self.include_timestamp,
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// 图片输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpg,
}

impl ImageFormat {
    /// 仅接受 `png` / `jpg` / `jpeg`。
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpg),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
        }
    }
}

/// 单次保存使用的设置快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSettings {
    pub image_enabled: bool,
    pub text_enabled: bool,
    pub markdown_enabled: bool,
    pub json_enabled: bool,
    pub csv_enabled: bool,
    pub image_format: ImageFormat,
    pub jpg_quality: u8,
    pub file_name_prefix: String,
    pub include_timestamp: bool,
}

impl Default for SaveSettings {
    fn default() -> Self {
        Self {
            image_enabled: true,
            text_enabled: true,
            markdown_enabled: true,
            json_enabled: true,
            csv_enabled: true,
            image_format: ImageFormat::Png,
            jpg_quality: DEFAULT_JPG_QUALITY,
            file_name_prefix: String::new(),
            include_timestamp: true,
        }
    }
}

impl SaveSettings {
    pub fn is_enabled(&self, content_type: ContentType) -> bool {
        match content_type {
            ContentType::Image => self.image_enabled,
            ContentType::Text => self.text_enabled,
            ContentType::Markdown => self.markdown_enabled,
            ContentType::Json => self.json_enabled,
            ContentType::Csv => self.csv_enabled,
        }
    }

    /// 至少启用一种内容类型。
    ///
    /// 构造时不检查，允许先整体赋值再统一校验。
    pub fn validate(&self) -> Result<(), SettingsError> {
        let any_enabled = self.image_enabled
            || self.text_enabled
            || self.markdown_enabled
            || self.json_enabled
            || self.csv_enabled;
        if !any_enabled {
            return Err(SettingsError::invalid("至少需要启用一种内容类型"));
        }
        if !(1..=100).contains(&self.jpg_quality) {
            return Err(SettingsError::invalid(format!(
                "JPEG 质量超出范围：{}（允许 1-100）",
                self.jpg_quality
            )));
        }
        Ok(())
    }

    pub fn naming_options(&self) -> NamingOptions {
        NamingOptions::new(&self.file_name_prefix, self.include_timestamp)
    }
}

/// `hotkey` 分节
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HotkeySettings {
    pub modifiers: Vec<String>,
    pub key: String,
}

impl Default for HotkeySettings {
    fn default() -> Self {
        Self {
            modifiers: vec!["Ctrl".to_string(), "Shift".to_string()],
            key: "V".to_string(),
        }
    }
}

/// `notification` 分节
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub on_success: bool,
    pub on_no_content: bool,
    pub on_error: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            on_success: true,
            on_no_content: true,
            on_error: true,
        }
    }
}

/// `advanced` 分节
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdvancedSettings {
    /// 是否额外写入日志文件
    pub logging: bool,
    pub startup_guidance_shown: bool,
}

/// `ui` 分节
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiSettings {
    pub language: String,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            language: super::validation::DEFAULT_LANGUAGE.to_string(),
        }
    }
}
