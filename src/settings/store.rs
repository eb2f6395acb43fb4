//! # 设置存储
//!
//! ## 设计思路
//!
//! 配置文件是用户可以手改的 JSON，所以加载必须能容忍任何内容：
//! - 文件不存在：使用默认值，不写盘，不报警
//! - 解析失败或校验失败：先把原文件复制一份备份，原文件保持不动，内存使用默认值，
//!   再发出一次损坏事件
//!
//! 保存则相反，必须严格：规范化、校验，通过后才写临时文件并重命名覆盖，
//! 落盘成功后才更新内存并通知订阅者。校验失败时磁盘和内存都不变。
//!
//! ## 实现思路
//!
//! - 内存配置放在 `RwLock` 中，读多写少。
//! - `save_lock` 串行化所有保存，避免两个写者交错覆盖临时文件。
//! - 订阅者以 `Arc<dyn Fn>` 保存，回调在锁外执行，回调里可以再次访问存储。
//! - 损坏事件可能在任何订阅者注册之前产生（启动时加载），先排队，交给第一个订阅者。

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use super::jsonc::strip_jsonc;
use super::model::PersistedConfig;
use super::validation::{normalize, validate};
use super::SettingsError;

const SETTINGS_FILE_NAME: &str = "settings.json";
const APP_DIR_NAME: &str = "clipboard-saver";

/// 配置文件损坏事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptionEvent {
    /// 损坏的配置文件
    pub path: PathBuf,
    /// 备份文件路径；备份失败时为 `None`
    pub backup_path: Option<PathBuf>,
    /// 损坏原因（可读文本）
    pub reason: String,
}

type ChangedListener = Arc<dyn Fn(&PersistedConfig) + Send + Sync>;
type CorruptionListener = Arc<dyn Fn(&CorruptionEvent) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    changed: Vec<ChangedListener>,
    corruption: Vec<CorruptionListener>,
    pending_corruption: Vec<CorruptionEvent>,
}

pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<PersistedConfig>,
    save_lock: Mutex<()>,
    listeners: Mutex<Listeners>,
}

impl SettingsStore {
    /// 打开配置文件并立即加载。
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = Self {
            path: path.into(),
            current: RwLock::new(PersistedConfig::default()),
            save_lock: Mutex::new(()),
            listeners: Mutex::new(Listeners::default()),
        };
        store.load();
        store
    }

    /// 默认配置文件路径：`<用户配置目录>/clipboard-saver/settings.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR_NAME)
            .join(SETTINGS_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 当前内存中的配置副本。
    pub fn current(&self) -> PersistedConfig {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                log::warn!("⚠️ 设置读锁已中毒，继续使用内部数据");
                poisoned.into_inner().clone()
            }
        }
    }

    /// 从磁盘重新加载配置。
    ///
    /// 永远返回一份可用配置；文件损坏时返回默认值并发出损坏事件。
    pub fn load(&self) -> PersistedConfig {
        let config = match fs::read_to_string(&self.path) {
            Ok(content) => match parse_config(&content) {
                Ok(config) => {
                    log::info!("✅ 已加载设置: {}", self.path.display());
                    config
                }
                Err(e) => {
                    let backup_path = self.backup_corrupted_file();
                    log::warn!(
                        "⚠️ 设置文件已损坏，改用默认值: {} ({})",
                        self.path.display(),
                        e
                    );
                    self.raise_corruption(CorruptionEvent {
                        path: self.path.clone(),
                        backup_path,
                        reason: e.to_string(),
                    });
                    PersistedConfig::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("📋 设置文件不存在，使用默认值: {}", self.path.display());
                PersistedConfig::default()
            }
            Err(e) => {
                log::warn!("⚠️ 读取设置文件失败，改用默认值: {}", e);
                self.raise_corruption(CorruptionEvent {
                    path: self.path.clone(),
                    backup_path: None,
                    reason: e.to_string(),
                });
                PersistedConfig::default()
            }
        };

        *self.write_current() = config.clone();
        config
    }

    /// 规范化、校验并原子写入配置。
    ///
    /// 校验失败时不写盘、不改内存，直接返回错误。
    pub fn save(&self, config: PersistedConfig) -> Result<(), SettingsError> {
        let config = normalize(config);
        validate(&config)?;

        let content = serde_json::to_string_pretty(&config)
            .map_err(|e| SettingsError::Serialize(e.to_string()))?;

        {
            let _serial = match self.save_lock.lock() {
                Ok(guard) => guard,
                Err(poisoned) => {
                    log::warn!("⚠️ 设置保存锁已中毒，继续保存");
                    poisoned.into_inner()
                }
            };
            write_atomically(&self.path, content.as_bytes())?;
            *self.write_current() = config.clone();
        }
        log::info!("✅ 设置已保存: {}", self.path.display());

        let listeners = self.lock_listeners().changed.clone();
        for listener in listeners {
            listener(&config);
        }
        Ok(())
    }

    /// 在当前配置的副本上修改并保存，返回保存后的配置。
    pub fn update<F>(&self, mutate: F) -> Result<PersistedConfig, SettingsError>
    where
        F: FnOnce(&mut PersistedConfig),
    {
        let mut draft = self.current();
        mutate(&mut draft);
        self.save(draft)?;
        Ok(self.current())
    }

    /// 订阅配置变更（仅在保存成功后触发）。
    pub fn on_changed<F>(&self, listener: F)
    where
        F: Fn(&PersistedConfig) + Send + Sync + 'static,
    {
        self.lock_listeners().changed.push(Arc::new(listener));
    }

    /// 订阅损坏事件；之前排队的事件会立即交给该订阅者。
    pub fn on_corruption<F>(&self, listener: F)
    where
        F: Fn(&CorruptionEvent) + Send + Sync + 'static,
    {
        let listener: CorruptionListener = Arc::new(listener);
        let pending = {
            let mut listeners = self.lock_listeners();
            listeners.corruption.push(Arc::clone(&listener));
            std::mem::take(&mut listeners.pending_corruption)
        };
        for event in &pending {
            listener(event);
        }
    }

    fn raise_corruption(&self, event: CorruptionEvent) {
        let listeners = {
            let mut listeners = self.lock_listeners();
            if listeners.corruption.is_empty() {
                log::debug!("📋 暂无损坏事件订阅者，事件已排队");
                listeners.pending_corruption.push(event);
                return;
            }
            listeners.corruption.clone()
        };
        for listener in listeners {
            listener(&event);
        }
    }

    fn backup_corrupted_file(&self) -> Option<PathBuf> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| SETTINGS_FILE_NAME.to_string());
        let backup = self.path.with_file_name(format!("{}.backup.{}", file_name, stamp));

        match fs::copy(&self.path, &backup) {
            Ok(_) => {
                log::info!("🔄 已备份损坏的设置文件: {}", backup.display());
                Some(backup)
            }
            Err(e) => {
                log::warn!("⚠️ 备份损坏的设置文件失败: {}", e);
                None
            }
        }
    }

    fn write_current(&self) -> std::sync::RwLockWriteGuard<'_, PersistedConfig> {
        match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("⚠️ 设置写锁已中毒，继续使用内部数据");
                poisoned.into_inner()
            }
        }
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Listeners> {
        match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn parse_config(content: &str) -> Result<PersistedConfig, SettingsError> {
    let config: PersistedConfig = serde_json::from_str(&strip_jsonc(content))
        .map_err(|e| SettingsError::Parse(e.to_string()))?;
    let config = normalize(config);
    validate(&config)?;
    Ok(config)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    if let Err(e) = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
