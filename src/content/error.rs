//! # 编码错误模型
//!
//! 编码器是纯函数，失败只可能来自输入本身：像素格式不支持、缓冲长度不符、
//! 参数越界或底层图片编码器报错。

use super::PixelFormat;

/// 内容编码错误。
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("不支持的像素格式：{0:?}")]
    UnsupportedPixelFormat(PixelFormat),

    #[error("像素数据长度异常：期望 {expected} 字节，实际 {actual} 字节")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("JPEG 质量超出范围：{0}（允许 1-100）")]
    InvalidQuality(u8),

    #[error("图片编码失败：{0}")]
    Image(String),

    /// 编码器只应在分类之后、且内容非空时被调用
    #[error("编码器收到空内容")]
    NothingToEncode,
}

impl EncodeError {
    /// 像素数据结构导致的失败。
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::UnsupportedPixelFormat(_) | Self::BufferSizeMismatch { .. })
    }
}
