//! 保存目标目录
//!
//! 目录由外部协作者解析（例如当前前台的文件管理器窗口），核心只关心"有目录"或"不支持"。

use std::path::PathBuf;

/// 目录解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetDirectory {
    Resolved(PathBuf),
    Unsupported,
}

pub trait DirectoryResolver: Send + Sync {
    fn resolve(&self) -> TargetDirectory;
}

/// 始终返回同一个目录；路径为空时视为不支持
#[derive(Debug, Clone)]
pub struct FixedDirectoryResolver {
    dir: PathBuf,
}

impl FixedDirectoryResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DirectoryResolver for FixedDirectoryResolver {
    fn resolve(&self) -> TargetDirectory {
        if self.dir.as_os_str().is_empty() {
            return TargetDirectory::Unsupported;
        }
        TargetDirectory::Resolved(self.dir.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_is_unsupported() {
        assert_eq!(FixedDirectoryResolver::new("").resolve(), TargetDirectory::Unsupported);
        assert_eq!(
            FixedDirectoryResolver::new("/tmp/out").resolve(),
            TargetDirectory::Resolved(PathBuf::from("/tmp/out"))
        );
    }
}
