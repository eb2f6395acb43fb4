//! 输出文件存储
//!
//! # 设计思路
//!
//! 把剪贴板内容落到目标目录时需要同时满足三件事：名字安全、不覆盖已有文件、
//! 中途失败不留半成品。命名与写入分开实现，写入器在提交冲突时回头重新选名。
//!
//! # 实现思路
//!
//! - `naming`：前缀清洗、保留名转义、冲突序号。
//! - `writer`：临时文件 + 无覆盖提交 + RAII 清理。
//! - `space`：基于 `sysinfo` 的建议性剩余空间检查。

mod naming;
mod space;
mod writer;

pub use naming::{
    is_reserved_name, normalize_prefix, unique_path, NamingOptions, MAX_COLLISION_ATTEMPTS,
    MAX_PREFIX_CHARS,
};
pub use space::has_enough_space;
pub use writer::{AtomicFileWriter, FileOps, StdFileOps, DEFAULT_MAX_COMMIT_ATTEMPTS};
