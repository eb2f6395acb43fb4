//! 基于 `arboard` 的系统剪贴板实现
//!
//! 每次读取都新建 `arboard::Clipboard`，读完立即释放，避免长时间持有剪贴板。
//! `ClipboardOccupied` 映射为可重试的 `Locked`，`ContentNotAvailable` 视为该格式不存在。

use super::{ClipboardAccessError, ClipboardProvider, ClipboardSnapshot, ImagePayload, RawPixels};
use crate::content::PixelFormat;

/// 生产环境使用的剪贴板提供方
#[derive(Debug, Default, Clone, Copy)]
pub struct ArboardClipboardProvider;

impl ArboardClipboardProvider {
    pub fn new() -> Self {
        Self
    }
}

fn map_arboard_error(error: arboard::Error) -> ClipboardAccessError {
    match error {
        arboard::Error::ClipboardOccupied => ClipboardAccessError::Locked(error.to_string()),
        other => ClipboardAccessError::Unavailable(other.to_string()),
    }
}

impl ClipboardProvider for ArboardClipboardProvider {
    fn snapshot(&self) -> Result<ClipboardSnapshot, ClipboardAccessError> {
        let mut clipboard = arboard::Clipboard::new().map_err(map_arboard_error)?;

        let mut images = Vec::new();
        match clipboard.get_image() {
            Ok(image_data) => {
                log::debug!("📋 剪贴板图片 {}x{}", image_data.width, image_data.height);
                images.push(ImagePayload::Pixels(RawPixels {
                    width: image_data.width as u32,
                    height: image_data.height as u32,
                    format: PixelFormat::Rgba8,
                    bytes: image_data.bytes.into_owned(),
                }));
            }
            Err(arboard::Error::ContentNotAvailable) => {}
            Err(arboard::Error::ConversionFailure) => {
                log::debug!("🚫 剪贴板图片格式无法转换，按不支持的负载忽略");
            }
            Err(err) => return Err(map_arboard_error(err)),
        }

        let text = match clipboard.get_text() {
            Ok(text) => Some(text),
            Err(arboard::Error::ContentNotAvailable) | Err(arboard::Error::ConversionFailure) => None,
            Err(err) => return Err(map_arboard_error(err)),
        };

        Ok(ClipboardSnapshot::new(images, text))
    }
}
