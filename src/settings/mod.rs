//! 设置子系统
//!
//! - `model`：磁盘格式与运行时快照
//! - `validation`：规范化与校验规则
//! - `store`：加载、损坏恢复、原子保存与变更通知

mod error;
mod jsonc;
mod model;
mod store;
pub mod validation;

pub use error::SettingsError;
pub use model::{
    AdvancedSettings, CURRENT_CONFIG_VERSION, DEFAULT_JPG_QUALITY, HotkeySettings, ImageFormat,
    NotificationSettings, PersistedConfig, SaveSection, SaveSettings, UiSettings,
};
pub use store::{CorruptionEvent, SettingsStore};
