//! # 单实例协调
//!
//! ## 设计思路
//!
//! 同一用户会话内只允许一个进程持有保存编排器：
//! - **互斥**：运行目录下 `<key>.lock` 文件上的独占锁，进程退出时由系统自动释放
//! - **通道**：主实例监听 Unix domain socket（Windows 为命名管道），
//!   第二个实例启动时连过去发送固定命令，然后安静退出
//!
//! 键由应用名、用户名、会话号组成，不同用户或不同登录会话互不影响。
//!
//! ## 实现思路
//!
//! - 主实例收到命令后通过 `broadcast` 广播 `SecondInstanceLaunched`。
//! - 第二实例连接失败或超时只记日志，不报错，返回 `false` 即可。
//! - `dispose` 终止监听任务、解锁、删除套接字文件；之后的连接必然失败。
//!   `Drop` 做同样的同步清理，防止调用方忘记释放。

mod channel;

use std::fs::{self, File, OpenOptions, TryLockError};
use std::path::PathBuf;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::AppError;
use channel::Endpoint;

pub use channel::SHOW_SETTINGS_COMMAND;

const EVENT_CAPACITY: usize = 16;

/// 主实例收到的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceEvent {
    /// 另一个实例启动并请求显示设置
    SecondInstanceLaunched,
}

/// 单实例作用域键（仅含 `[A-Za-z0-9_-]`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceScope {
    key: String,
}

impl InstanceScope {
    pub fn new(raw: &str) -> Self {
        let key: String = raw
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        Self {
            key: if key.is_empty() { "instance".to_string() } else { key },
        }
    }

    /// 按当前用户与登录会话构造：`<app_id>-<user>-<session>`。
    pub fn current(app_id: &str) -> Self {
        let user = first_env(&["USER", "USERNAME", "LOGNAME"]).unwrap_or_else(|| "user".to_string());
        let session =
            first_env(&["XDG_SESSION_ID", "SESSIONNAME"]).unwrap_or_else(|| "default".to_string());
        Self::new(&format!("{}-{}-{}", app_id, user, session))
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// 主实例持有的资源
struct Lease {
    lock_file: File,
    listener: Option<JoinHandle<()>>,
}

pub struct InstanceCoordinator {
    scope: InstanceScope,
    runtime_dir: PathBuf,
    endpoint: Endpoint,
    events: broadcast::Sender<InstanceEvent>,
    lease: Option<Lease>,
}

impl InstanceCoordinator {
    /// 使用系统运行目录（没有时退回临时目录）。
    pub fn new(scope: InstanceScope) -> Self {
        let runtime_dir = dirs::runtime_dir().unwrap_or_else(std::env::temp_dir);
        Self::with_runtime_dir(scope, runtime_dir)
    }

    pub fn with_runtime_dir(scope: InstanceScope, runtime_dir: impl Into<PathBuf>) -> Self {
        let runtime_dir = runtime_dir.into();
        let endpoint = Endpoint::new(&runtime_dir, scope.key());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            scope,
            runtime_dir,
            endpoint,
            events,
            lease: None,
        }
    }

    pub fn scope(&self) -> &InstanceScope {
        &self.scope
    }

    /// 当前进程是否为主实例。
    pub fn is_primary(&self) -> bool {
        self.lease.is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InstanceEvent> {
        self.events.subscribe()
    }

    /// 尝试成为主实例；失败则通知主实例并返回 `false`。
    ///
    /// 必须在 tokio 运行时内调用（主实例要启动监听任务）。
    pub async fn try_acquire_or_notify(&mut self) -> bool {
        if self.lease.is_some() {
            return true;
        }

        match self.try_lock() {
            Ok(Some(lock_file)) => {
                let listener = match channel::start_listener(&self.endpoint, self.events.clone()) {
                    Ok(task) => Some(task),
                    Err(e) => {
                        log::warn!("⚠️ 实例通道启动失败，第二实例将无法唤醒本进程: {}", e);
                        None
                    }
                };
                self.lease = Some(Lease { lock_file, listener });
                log::info!("🔒 已成为主实例: {}", self.scope.key());
                true
            }
            Ok(None) => {
                log::info!("📋 已有主实例在运行，发送唤醒命令");
                if let Err(e) = channel::send_command(&self.endpoint, SHOW_SETTINGS_COMMAND).await {
                    log::warn!("⚠️ 无法联系主实例: {}", e);
                }
                false
            }
            Err(e) => {
                log::warn!("⚠️ {}，按主实例继续运行", e);
                true
            }
        }
    }

    fn try_lock(&self) -> Result<Option<File>, AppError> {
        fs::create_dir_all(&self.runtime_dir).map_err(|e| {
            AppError::Instance(format!("创建运行目录 '{}' 失败: {}", self.runtime_dir.display(), e))
        })?;

        let path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| AppError::Instance(format!("打开锁文件 '{}' 失败: {}", path.display(), e)))?;

        match file.try_lock() {
            Ok(()) => Ok(Some(file)),
            Err(TryLockError::WouldBlock) => Ok(None),
            Err(TryLockError::Error(e)) => Err(AppError::Instance(format!("加锁失败: {}", e))),
        }
    }

    fn lock_path(&self) -> PathBuf {
        self.runtime_dir.join(format!("{}.lock", self.scope.key()))
    }

    /// 释放互斥并停止监听。
    pub async fn dispose(&mut self) {
        let Some(mut lease) = self.lease.take() else {
            return;
        };
        if let Some(task) = lease.listener.take() {
            task.abort();
            let _ = task.await;
        }
        release(lease, &self.endpoint);
        log::info!("🔄 已释放主实例: {}", self.scope.key());
    }
}

fn release(lease: Lease, endpoint: &Endpoint) {
    if let Some(task) = &lease.listener {
        task.abort();
    }
    channel::cleanup(endpoint);
    if let Err(e) = lease.lock_file.unlock() {
        log::debug!("📋 解锁时出错（忽略）: {}", e);
    }
}

impl Drop for InstanceCoordinator {
    fn drop(&mut self) {
        if let Some(lease) = self.lease.take() {
            release(lease, &self.endpoint);
        }
    }
}
