//! # 保存编排器
//!
//! ## 设计思路
//!
//! 一次触发按固定顺序走完：解析目录 → 读取剪贴板（带重试）→ 分类 → 检查开关 → 编码并写入。
//! 同一进程内同时只允许一个保存在途：入口处用 `AtomicBool` 做非阻塞抢占，
//! 抢不到立刻返回 `Busy`，不排队、不等待。
//!
//! ## 实现思路
//!
//! - `FlightGuard` 是 RAII 守卫，任何返回路径都会释放闸门。
//! - 图片编码较重：先深拷贝像素缓冲，再把拷贝移交 `spawn_blocking`，后台永远不碰前台持有的数据。
//!   后台因像素结构问题失败（或线程异常退出）时，用原始数据在当前上下文同步重试一次。
//! - 其他类型在当前上下文同步编码写入。
//! - 所有错误在边界处转换为 `SaveResult::Error`，编排器本身从不向调用方抛错；
//!   前台流程中的 panic 也由 `catch_unwind` 截获并转换。
//! - 除 `Busy` 外的每个结果都会通知观察者，通知完成后才释放闸门。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;

use super::notify::SaveObserver;
use super::target::{DirectoryResolver, TargetDirectory};
use super::SaveResult;
use crate::clipboard::{read_snapshot_with_retry, ClipboardProvider, ClipboardRetryPolicy};
use crate::content::{classify, encode, ContentVariant, ImageContent};
use crate::error::AppError;
use crate::settings::SaveSettings;
use crate::storage::{has_enough_space, AtomicFileWriter};

/// 单飞闸门守卫
struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

pub struct SaveOrchestrator {
    resolver: Arc<dyn DirectoryResolver>,
    clipboard: Arc<dyn ClipboardProvider>,
    writer: Arc<AtomicFileWriter>,
    retry_policy: ClipboardRetryPolicy,
    observers: Vec<Arc<dyn SaveObserver>>,
    in_flight: AtomicBool,
}

impl SaveOrchestrator {
    pub fn new(resolver: Arc<dyn DirectoryResolver>, clipboard: Arc<dyn ClipboardProvider>) -> Self {
        Self {
            resolver,
            clipboard,
            writer: Arc::new(AtomicFileWriter::new()),
            retry_policy: ClipboardRetryPolicy::default(),
            observers: Vec::new(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_writer(mut self, writer: Arc<AtomicFileWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_retry_policy(mut self, policy: ClipboardRetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SaveObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// 是否有保存在途。
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// 执行一次保存。`settings` 是调用方在触发时取得的快照。
    pub async fn trigger(&self, settings: SaveSettings) -> SaveResult {
        let Some(_flight) = FlightGuard::try_acquire(&self.in_flight) else {
            log::debug!("🚫 已有保存在进行，本次触发返回 Busy");
            return SaveResult::Busy;
        };

        let result = match AssertUnwindSafe(self.run(settings)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => into_error(AppError::Background(format!(
                "保存流程异常中止: {}",
                panic_message(payload.as_ref())
            ))),
        };
        match &result {
            SaveResult::Success { .. } => log::info!("✅ {}", result),
            SaveResult::Error { .. } => log::error!("❌ {}", result),
            _ => log::info!("📋 {}", result),
        }

        for observer in &self.observers {
            observer.on_result(&result);
        }
        result
    }

    async fn run(&self, settings: SaveSettings) -> SaveResult {
        let dir = match self.resolver.resolve() {
            TargetDirectory::Resolved(dir) => dir,
            TargetDirectory::Unsupported => return SaveResult::UnsupportedTarget,
        };

        let snapshot = match read_snapshot_with_retry(self.clipboard.as_ref(), &self.retry_policy).await {
            Ok(snapshot) => snapshot,
            Err(e) => return into_error(e),
        };

        let variant = classify(&snapshot);
        drop(snapshot);

        let Some(content_type) = variant.content_type() else {
            return SaveResult::NoContent;
        };
        if !settings.is_enabled(content_type) {
            return SaveResult::ContentTypeDisabled { content_type };
        }

        if !has_enough_space(&dir, variant.estimated_size()) {
            return into_error(AppError::Storage(format!("{} 所在磁盘空间不足", dir.display())));
        }

        let saved = match variant {
            ContentVariant::Image(image) => self.save_image(image, &dir, &settings).await,
            other => encode_and_write(&self.writer, &other, &dir, &settings),
        };

        match saved {
            Ok(path) => SaveResult::Success { path, content_type },
            Err(e) => into_error(e),
        }
    }

    async fn save_image(
        &self,
        image: ImageContent,
        dir: &Path,
        settings: &SaveSettings,
    ) -> Result<PathBuf, AppError> {
        let background = {
            let frozen = ContentVariant::Image(image.clone());
            let writer = Arc::clone(&self.writer);
            let dir = dir.to_path_buf();
            let settings = settings.clone();

            tokio::task::spawn_blocking(move || encode_and_write(&writer, &frozen, &dir, &settings))
                .await
                .map_err(|e| AppError::Background(e.to_string()))
                .and_then(|saved| saved)
        };

        match background {
            Err(e) if e.is_structural() => {
                log::warn!("⚠️ 后台图片处理失败，在当前上下文重试一次: {}", e);
                encode_and_write(&self.writer, &ContentVariant::Image(image), dir, settings)
            }
            other => other,
        }
    }
}

fn encode_and_write(
    writer: &AtomicFileWriter,
    variant: &ContentVariant,
    dir: &Path,
    settings: &SaveSettings,
) -> Result<PathBuf, AppError> {
    let encoded = encode(variant, settings)?;
    writer.save(&encoded.bytes, dir, encoded.extension, &settings.naming_options())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "未知 panic".to_string())
}

fn into_error(error: AppError) -> SaveResult {
    SaveResult::Error {
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::{ClipboardAccessError, ClipboardSnapshot, ImagePayload, RawPixels};
    use crate::content::{ContentType, PixelFormat};
    use crate::save::FixedDirectoryResolver;
    use crate::storage::{FileOps, StdFileOps};
    use std::io;
    use std::sync::atomic::AtomicU32;
    use std::sync::{mpsc, Mutex};
    use std::time::Duration;

    struct StaticProvider(ClipboardSnapshot);

    impl ClipboardProvider for StaticProvider {
        fn snapshot(&self) -> Result<ClipboardSnapshot, ClipboardAccessError> {
            Ok(self.0.clone())
        }
    }

    struct LockedProvider;

    impl ClipboardProvider for LockedProvider {
        fn snapshot(&self) -> Result<ClipboardSnapshot, ClipboardAccessError> {
            Err(ClipboardAccessError::Locked("held by another process".to_string()))
        }
    }

    struct PanickingProvider;

    impl ClipboardProvider for PanickingProvider {
        fn snapshot(&self) -> Result<ClipboardSnapshot, ClipboardAccessError> {
            panic!("clipboard driver crashed");
        }
    }

    /// 首次读取时阻塞，直到测试放行
    struct GatedProvider {
        entered: Mutex<Option<mpsc::Sender<()>>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl ClipboardProvider for GatedProvider {
        fn snapshot(&self) -> Result<ClipboardSnapshot, ClipboardAccessError> {
            if let Some(tx) = self.entered.lock().expect("lock").take() {
                let _ = tx.send(());
            }
            let _ = self.release.lock().expect("lock").recv_timeout(Duration::from_secs(5));
            Ok(ClipboardSnapshot::from_text("hello"))
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        results: Mutex<Vec<SaveResult>>,
    }

    impl SaveObserver for RecordingObserver {
        fn on_result(&self, result: &SaveResult) {
            self.results.lock().expect("lock").push(result.clone());
        }
    }

    /// 第一次写入时 panic，模拟后台线程异常退出
    struct PanicOnceOps {
        calls: AtomicU32,
    }

    impl FileOps for PanicOnceOps {
        fn write_file(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("simulated background failure");
            }
            StdFileOps.write_file(path, bytes)
        }

        fn commit(&self, temp: &Path, dest: &Path) -> io::Result<()> {
            StdFileOps.commit(temp, dest)
        }
    }

    fn orchestrator(dir: &Path, provider: impl ClipboardProvider + 'static) -> SaveOrchestrator {
        SaveOrchestrator::new(Arc::new(FixedDirectoryResolver::new(dir)), Arc::new(provider))
    }

    fn rgba_snapshot() -> ClipboardSnapshot {
        ClipboardSnapshot::from_image(ImagePayload::Pixels(RawPixels {
            width: 2,
            height: 2,
            format: PixelFormat::Rgba8,
            bytes: vec![200; 16],
        }))
    }

    #[tokio::test]
    async fn saves_plain_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let saver = orchestrator(dir.path(), StaticProvider(ClipboardSnapshot::from_text("hello world")));

        let result = saver.trigger(SaveSettings::default()).await;

        let (path, content_type) = match result {
            SaveResult::Success { path, content_type } => (path, content_type),
            other => panic!("expected success, got {other:?}"),
        };
        assert_eq!(content_type, ContentType::Text);
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("txt"));
        assert_eq!(std::fs::read_to_string(path).expect("read"), "hello world");
        assert!(!saver.is_busy());
    }

    #[tokio::test]
    async fn empty_resolver_is_unsupported_target() {
        let saver = SaveOrchestrator::new(
            Arc::new(FixedDirectoryResolver::new("")),
            Arc::new(StaticProvider(ClipboardSnapshot::from_text("x"))),
        );
        assert_eq!(saver.trigger(SaveSettings::default()).await, SaveResult::UnsupportedTarget);
    }

    #[tokio::test]
    async fn whitespace_is_no_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let saver = orchestrator(dir.path(), StaticProvider(ClipboardSnapshot::from_text("  \n\t ")));

        assert_eq!(saver.trigger(SaveSettings::default()).await, SaveResult::NoContent);
        assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 0);
    }

    #[tokio::test]
    async fn disabled_type_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let saver = orchestrator(dir.path(), StaticProvider(ClipboardSnapshot::from_text("{\"a\": 1}")));
        let settings = SaveSettings { json_enabled: false, ..SaveSettings::default() };

        assert_eq!(
            saver.trigger(settings).await,
            SaveResult::ContentTypeDisabled { content_type: ContentType::Json }
        );
        assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 0);
    }

    #[tokio::test]
    async fn locked_clipboard_becomes_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let saver = orchestrator(dir.path(), LockedProvider).with_retry_policy(ClipboardRetryPolicy {
            max_attempts: 3,
            budget_ms: 100,
            retry_delay_ms: 1,
        });

        let result = saver.trigger(SaveSettings::default()).await;
        assert!(matches!(result, SaveResult::Error { .. }), "got {result:?}");
        assert!(!saver.is_busy());
    }

    #[tokio::test]
    async fn foreground_panic_becomes_error_and_releases_gate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let observer = Arc::new(RecordingObserver::default());
        let saver = orchestrator(dir.path(), PanickingProvider).with_observer(observer.clone());

        let result = saver.trigger(SaveSettings::default()).await;

        match &result {
            SaveResult::Error { message } => assert!(message.contains("clipboard driver crashed")),
            other => panic!("expected error, got {other:?}"),
        }
        assert_eq!(observer.results.lock().expect("lock").as_slice(), &[result]);
        assert!(!saver.is_busy());
    }

    #[tokio::test]
    async fn image_is_encoded_in_background() {
        let dir = tempfile::tempdir().expect("tempdir");
        let saver = orchestrator(dir.path(), StaticProvider(rgba_snapshot()));

        let result = saver.trigger(SaveSettings::default()).await;

        let path = result.saved_path().expect("saved").clone();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
        let decoded = image::open(&path).expect("decode png");
        assert_eq!((decoded.width(), decoded.height()), (2, 2));
    }

    #[tokio::test]
    async fn background_failure_is_retried_in_foreground() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = AtomicFileWriter::new()
            .with_file_ops(Arc::new(PanicOnceOps { calls: AtomicU32::new(0) }));
        let saver = orchestrator(dir.path(), StaticProvider(rgba_snapshot())).with_writer(Arc::new(writer));

        let result = saver.trigger(SaveSettings::default()).await;

        assert!(result.is_success(), "got {result:?}");
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".png"));
    }

    #[tokio::test]
    async fn unsupported_pixel_format_reports_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let snapshot = ClipboardSnapshot::from_image(ImagePayload::Pixels(RawPixels {
            width: 1,
            height: 1,
            format: PixelFormat::Cmyk8,
            bytes: vec![0; 4],
        }));
        let observer = Arc::new(RecordingObserver::default());
        let saver = orchestrator(dir.path(), StaticProvider(snapshot)).with_observer(observer.clone());

        let result = saver.trigger(SaveSettings::default()).await;

        assert!(matches!(result, SaveResult::Error { .. }), "got {result:?}");
        assert_eq!(observer.results.lock().expect("lock").as_slice(), &[result]);
        assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_trigger_is_busy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let provider = GatedProvider {
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(release_rx),
        };
        let observer = Arc::new(RecordingObserver::default());
        let saver = Arc::new(orchestrator(dir.path(), provider).with_observer(observer.clone()));

        let first = tokio::spawn({
            let saver = Arc::clone(&saver);
            async move { saver.trigger(SaveSettings::default()).await }
        });

        tokio::task::spawn_blocking(move || entered_rx.recv_timeout(Duration::from_secs(5)))
            .await
            .expect("join")
            .expect("first save entered the clipboard read");
        assert!(saver.is_busy());

        assert_eq!(saver.trigger(SaveSettings::default()).await, SaveResult::Busy);

        release_tx.send(()).expect("release");
        let first = first.await.expect("join first");
        assert!(first.is_success(), "got {first:?}");
        assert!(!saver.is_busy());

        let recorded = observer.results.lock().expect("lock");
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].is_success());
    }
}
