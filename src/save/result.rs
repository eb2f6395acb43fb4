use std::fmt;
use std::path::PathBuf;

use crate::content::ContentType;

/// 单次保存的结果
///
/// 除 `Success` 与 `Error` 外都是策略性拒绝，属于正常结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveResult {
    Success { path: PathBuf, content_type: ContentType },
    Error { message: String },
    NoContent,
    UnsupportedTarget,
    ContentTypeDisabled { content_type: ContentType },
    /// 已有保存正在进行
    Busy,
}

impl SaveResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn saved_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Success { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for SaveResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { path, content_type } => {
                write!(f, "已保存 {}：{}", content_type, path.display())
            }
            Self::Error { message } => write!(f, "保存失败：{}", message),
            Self::NoContent => f.write_str("剪贴板中没有可保存的内容"),
            Self::UnsupportedTarget => f.write_str("当前位置不支持保存"),
            Self::ContentTypeDisabled { content_type } => {
                write!(f, "{} 类型的保存已关闭", content_type)
            }
            Self::Busy => f.write_str("上一次保存仍在进行"),
        }
    }
}
