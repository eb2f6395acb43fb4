//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，替代各模块中分散的
//! `.map_err(|e| e.to_string())`、`format!(...)`、`expect()` 等不一致模式。
//!
//! 只有"致命故障"（命名耗尽、磁盘写入失败、序列化失败等）才会成为 `AppError`；
//! `Busy` / `NoContent` 这类策略性拒绝属于正常结果，由 `SaveResult` 表达，不走错误通道。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `EncodeError` / `SettingsError` / `io::Error` 提供 `From` 转换，`?` 直接上抛。
//! - 编排器边界统一把 `AppError` 转换为 `SaveResult::Error { message }`。

use crate::content::EncodeError;
use crate::settings::SettingsError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 剪贴板读取失败（非"被占用"类的错误）
    #[error("剪贴板操作失败: {0}")]
    Clipboard(String),

    /// 剪贴板在重试预算内始终被其他进程占用
    #[error("剪贴板被其他进程占用（尝试 {attempts} 次，耗时 {elapsed_ms}ms）")]
    ClipboardLocked { attempts: u32, elapsed_ms: u64 },

    /// 内容编码失败
    #[error("{0}")]
    Encode(#[from] EncodeError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 无法生成唯一文件名（后缀耗尽或并发提交冲突过多）
    #[error("文件命名失败: {0}")]
    Naming(String),

    /// 保存目录不可用或空间不足
    #[error("存储目录不可用: {0}")]
    Storage(String),

    /// 设置加载 / 校验 / 持久化失败
    #[error("{0}")]
    Settings(#[from] SettingsError),

    /// 单实例协调失败
    #[error("单实例协调失败: {0}")]
    Instance(String),

    /// 后台任务异常退出
    #[error("后台任务执行失败: {0}")]
    Background(String),
}

impl AppError {
    /// 是否属于"像素数据结构"类失败。
    ///
    /// 仅这类失败会让编排器在前台同步重试一次图片编码。
    pub fn is_structural(&self) -> bool {
        match self {
            Self::Encode(err) => err.is_structural(),
            Self::Background(_) => true,
            _ => false,
        }
    }
}
