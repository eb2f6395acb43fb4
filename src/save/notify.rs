//! # 保存结果通知
//!
//! ## 设计思路
//!
//! 编排器只向观察者广播 `SaveResult`，如何提示用户交给 `SaveNotifier`：
//! 按 `notification` 设置决定是否提示，并把结果映射为 `(消息, 严重级别)` 交给外部通知接收端。
//!
//! | 结果 | 级别 | 开关 |
//! |------|------|------|
//! | `Success` | Info | `onSuccess` |
//! | `NoContent` / `ContentTypeDisabled` | Warning | `onNoContent` |
//! | `Error` | Error | `onError` |
//! | `UnsupportedTarget` | Warning | `onError` |
//! | `Busy` | 不提示 | - |

use std::sync::{Arc, RwLock};

use super::SaveResult;
use crate::settings::NotificationSettings;

/// 通知严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// 外部通知接收端（托盘气泡、系统通知等）
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// 保存结果观察者
pub trait SaveObserver: Send + Sync {
    fn on_result(&self, result: &SaveResult);
}

/// 把通知写进日志
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => log::info!("✅ {}", message),
            Severity::Warning => log::warn!("⚠️ {}", message),
            Severity::Error => log::error!("❌ {}", message),
        }
    }
}

pub struct SaveNotifier {
    sink: Arc<dyn NotificationSink>,
    preferences: RwLock<NotificationSettings>,
}

impl SaveNotifier {
    pub fn new(sink: Arc<dyn NotificationSink>, preferences: NotificationSettings) -> Self {
        Self {
            sink,
            preferences: RwLock::new(preferences),
        }
    }

    /// 设置变更后替换通知开关。
    pub fn update_preferences(&self, preferences: NotificationSettings) {
        match self.preferences.write() {
            Ok(mut guard) => *guard = preferences,
            Err(poisoned) => *poisoned.into_inner() = preferences,
        }
    }

    fn preferences(&self) -> NotificationSettings {
        match self.preferences.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl SaveObserver for SaveNotifier {
    fn on_result(&self, result: &SaveResult) {
        let preferences = self.preferences();
        let (enabled, severity) = match result {
            SaveResult::Success { .. } => (preferences.on_success, Severity::Info),
            SaveResult::NoContent | SaveResult::ContentTypeDisabled { .. } => {
                (preferences.on_no_content, Severity::Warning)
            }
            SaveResult::Error { .. } => (preferences.on_error, Severity::Error),
            SaveResult::UnsupportedTarget => (preferences.on_error, Severity::Warning),
            SaveResult::Busy => return,
        };

        if enabled {
            self.sink.notify(&result.to_string(), severity);
        }
    }
}
