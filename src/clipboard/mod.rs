//! 剪贴板访问模块
//!
//! # 设计思路
//!
//! 核心流程不直接依赖任何平台剪贴板 API，而是通过 `ClipboardProvider` 取得一份
//! `ClipboardSnapshot`（一次性、自持有的数据副本）：
//! - **快照**：图片负载（原始像素或编码字节）+ 文本，读取完成后与系统剪贴板再无关联
//! - **可区分的"被占用"错误**：`ClipboardAccessError::Locked` 会被编排器有限重试
//! - **arboard 实现**：`ArboardClipboardProvider` 是生产环境使用的默认实现
//!
//! # 实现思路
//!
//! - 快照是纯值对象，分类器只读访问，不会与剪贴板提供方产生数据竞争。
//! - 重试逻辑归 `retry` 子模块，按"次数 + 总预算"双重上限执行。

mod arboard_provider;
pub mod retry;

pub use arboard_provider::ArboardClipboardProvider;
pub use retry::{read_snapshot_with_retry, ClipboardRetryPolicy};

use crate::content::PixelFormat;

/// 编码后的图片传输格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFormat {
    Png,
    Bmp,
    Jpeg,
}

/// 未编码的像素缓冲
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPixels {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub bytes: Vec<u8>,
}

/// 剪贴板中的一份图片负载
///
/// 同一张图片可能以多种格式同时存在（如 PNG 流 + 位图），由分类器挑选无损格式。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    Pixels(RawPixels),
    Encoded { format: TransportFormat, bytes: Vec<u8> },
}

impl ImagePayload {
    /// 选择优先级，数值越小越优先（PNG > 原始像素 > BMP > JPEG）。
    pub(crate) fn preference_rank(&self) -> u8 {
        match self {
            Self::Encoded { format: TransportFormat::Png, .. } => 0,
            Self::Pixels(_) => 1,
            Self::Encoded { format: TransportFormat::Bmp, .. } => 2,
            Self::Encoded { format: TransportFormat::Jpeg, .. } => 3,
        }
    }
}

/// 一次剪贴板读取的快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardSnapshot {
    images: Vec<ImagePayload>,
    text: Option<String>,
}

impl ClipboardSnapshot {
    pub fn new(images: Vec<ImagePayload>, text: Option<String>) -> Self {
        Self { images, text }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self { images: Vec::new(), text: Some(text.into()) }
    }

    pub fn from_image(payload: ImagePayload) -> Self {
        Self { images: vec![payload], text: None }
    }

    pub fn has_image(&self) -> bool {
        !self.images.is_empty()
    }

    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }

    pub fn images(&self) -> &[ImagePayload] {
        &self.images
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

/// 剪贴板访问错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClipboardAccessError {
    /// 剪贴板正被其他进程打开，稍后重试可能成功
    #[error("剪贴板被其他进程占用: {0}")]
    Locked(String),

    /// 其他不可重试的失败
    #[error("剪贴板不可用: {0}")]
    Unavailable(String),
}

/// 剪贴板快照提供方（外部协作者）
pub trait ClipboardProvider: Send + Sync {
    /// 读取当前剪贴板内容。
    ///
    /// 空剪贴板返回空快照而不是错误。
    fn snapshot(&self) -> Result<ClipboardSnapshot, ClipboardAccessError>;
}
