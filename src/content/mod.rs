//! # 内容分类与编码模块（content）
//!
//! ## 设计思路
//!
//! 剪贴板内容在进入磁盘前经过两步纯函数处理：
//!
//! ```text
//! ClipboardSnapshot ──classify──▶ ContentVariant ──encode──▶ EncodedContent { bytes, extension }
//! ```
//!
//! - `classifier`：按 图片 > CSV > JSON > Markdown > 文本 的优先级判定内容形态
//! - `delimited`：制表符分隔文本的引号感知解析，以及 CSV 重新序列化
//! - `markdown_detection`：基于 `RegexSet` 的 Markdown 特征检测
//! - `encoder`：把内容变体编码为落盘字节与扩展名
//!
//! ## 实现思路
//!
//! `ContentVariant` 是封闭的和类型，编码器穷举匹配，新增变体时编译器会提示所有遗漏点。
//! 变体都是不可变值对象：分类器创建，编码器消费一次。

mod classifier;
pub mod delimited;
mod encoder;
mod error;
mod markdown_detection;

pub use classifier::classify;
pub use encoder::{encode, EncodedContent};
pub use error::EncodeError;
pub use markdown_detection::is_likely_markdown;

use std::fmt;

/// 像素排列格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    Rgb8,
    Luma8,
    LumaA8,
    /// 可被表示但无法编码（印刷色彩空间）
    Cmyk8,
}

impl PixelFormat {
    /// 每像素字节数。
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 | Self::Bgra8 | Self::Cmyk8 => 4,
            Self::Rgb8 => 3,
            Self::LumaA8 => 2,
            Self::Luma8 => 1,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Rgba8 | Self::Bgra8 | Self::LumaA8)
    }
}

/// 已冻结的图片内容（自持有像素缓冲）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageContent {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

/// 内容类型（用于设置开关与结果上报）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Image,
    Text,
    Markdown,
    Json,
    Csv,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentVariant {
    Image(ImageContent),
    Text(String),
    Markdown(String),
    Json {
        /// 剪贴板中的原始文本，保留备查
        raw: String,
        /// 2 空格缩进的格式化文本，实际落盘内容
        formatted: String,
    },
    Csv {
        raw_tab_text: String,
        row_count: usize,
        column_count: usize,
    },
    None,
}

impl ContentVariant {
    /// `None` 变体返回 `None`。
    pub fn content_type(&self) -> Option<ContentType> {
        match self {
            Self::Image(_) => Some(ContentType::Image),
            Self::Text(_) => Some(ContentType::Text),
            Self::Markdown(_) => Some(ContentType::Markdown),
            Self::Json { .. } => Some(ContentType::Json),
            Self::Csv { .. } => Some(ContentType::Csv),
            Self::None => None,
        }
    }

    /// 落盘体积的粗略上界，供磁盘空间预检使用。
    pub fn estimated_size(&self) -> u64 {
        match self {
            Self::Image(image) => image.pixels.len() as u64,
            Self::Text(text) | Self::Markdown(text) => text.len() as u64,
            Self::Json { formatted, .. } => formatted.len() as u64,
            // 重新转义可能为每个字段增加引号
            Self::Csv { raw_tab_text, .. } => (raw_tab_text.len() as u64).saturating_mul(2) + 3,
            Self::None => 0,
        }
    }
}
