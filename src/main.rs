//! # 剪贴板保存工具：应用入口
//!
//! 本文件仅负责组装：读取设置、初始化日志、单实例协调、把触发事件交给编排器。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。
//!
//! 全局快捷键注册属于平台胶水，不在本程序内；每从标准输入读到一行就触发一次保存，
//! 外部快捷键工具可以直接向本进程写入换行。

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;

use clipboard_saver::clipboard::ArboardClipboardProvider;
use clipboard_saver::instance::{InstanceCoordinator, InstanceEvent, InstanceScope};
use clipboard_saver::save::{
    FixedDirectoryResolver, LogNotificationSink, SaveNotifier, SaveOrchestrator, SaveResult,
};
use clipboard_saver::settings::{PersistedConfig, SettingsStore};

const APP_ID: &str = "clipboard-saver";
const LOG_FILE_NAME: &str = "clipboard-saver.log";

#[derive(Debug, Parser)]
#[command(name = "clipboard-saver", version, about = "把剪贴板内容一键保存为文件")]
struct Cli {
    /// 保存目录（默认为当前目录）
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// 设置文件路径
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// 只保存一次，然后退出
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 先加载设置再初始化日志：日志目标取决于 advanced.logging，期间的损坏事件会排队
    let settings_path = cli.settings.clone().unwrap_or_else(SettingsStore::default_path);
    let store = Arc::new(SettingsStore::open(&settings_path));
    init_logger(&store.current(), &settings_path);
    store.on_corruption(|event| {
        log::warn!(
            "⚠️ 设置文件已损坏，已改用默认值: {} (备份: {}) 原因: {}",
            event.path.display(),
            event
                .backup_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "无".to_string()),
            event.reason
        );
    });

    let target_dir = cli
        .dir
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_default();

    let notifier = Arc::new(SaveNotifier::new(
        Arc::new(LogNotificationSink),
        store.current().notification,
    ));
    {
        let notifier = Arc::clone(&notifier);
        store.on_changed(move |config| notifier.update_preferences(config.notification.clone()));
    }

    let orchestrator = Arc::new(
        SaveOrchestrator::new(
            Arc::new(FixedDirectoryResolver::new(target_dir)),
            Arc::new(ArboardClipboardProvider::new()),
        )
        .with_observer(notifier),
    );

    if cli.once {
        let result = save_once(&orchestrator, &store).await;
        if !matches!(result, Some(SaveResult::Success { .. })) {
            std::process::exit(1);
        }
        return;
    }

    let mut coordinator = InstanceCoordinator::new(InstanceScope::current(APP_ID));
    if !coordinator.try_acquire_or_notify().await {
        log::info!("📋 已通知正在运行的实例，本进程退出");
        return;
    }

    run_trigger_loop(&orchestrator, &store, &coordinator).await;
    coordinator.dispose().await;
}

async fn run_trigger_loop(
    orchestrator: &Arc<SaveOrchestrator>,
    store: &Arc<SettingsStore>,
    coordinator: &InstanceCoordinator,
) {
    let mut events = coordinator.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut saves = JoinSet::new();
    log::info!("✅ 就绪：每输入一行触发一次保存，输入结束后退出");

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(_)) => {
                    let orchestrator = Arc::clone(orchestrator);
                    let store = Arc::clone(store);
                    saves.spawn(async move {
                        save_once(&orchestrator, &store).await;
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    log::error!("❌ 读取触发输入失败: {}", e);
                    break;
                }
            },
            Some(joined) = saves.join_next(), if !saves.is_empty() => {
                if let Err(e) = joined {
                    log::error!("❌ 保存任务异常退出: {}", e);
                }
            },
            event = events.recv() => match event {
                Ok(InstanceEvent::SecondInstanceLaunched) => {
                    log::info!("📋 收到显示设置请求，设置文件: {}", store.path().display());
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("⚠️ 实例事件积压，丢弃 {} 条", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    drain_saves(&mut saves).await;
}

/// 等待在途保存全部结束；运行时退出会取消未完成的任务。
async fn drain_saves(saves: &mut JoinSet<()>) {
    while let Some(joined) = saves.join_next().await {
        if let Err(e) = joined {
            log::error!("❌ 保存任务异常退出: {}", e);
        }
    }
}

/// 以当前设置快照触发一次保存。
async fn save_once(orchestrator: &SaveOrchestrator, store: &SettingsStore) -> Option<SaveResult> {
    let settings = match store.current().save_settings() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("❌ 当前设置不可用: {}", e);
            return None;
        }
    };
    Some(orchestrator.trigger(settings).await)
}

fn init_logger(config: &PersistedConfig, settings_path: &Path) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if config.advanced.logging {
        let log_dir = settings_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir)
            .join("logs");
        let opened = fs::create_dir_all(&log_dir).and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_dir.join(LOG_FILE_NAME))
        });
        match opened {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("日志文件不可用，改为输出到终端: {}", e),
        }
    }

    builder.init();
}
