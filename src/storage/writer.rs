//! # 原子文件写入
//!
//! ## 设计思路
//!
//! 保存的文件要么完整出现，要么完全不出现：
//! - 先写 `<目标>.<进程号>-<序号>.tmp` 并刷盘；临时文件以独占方式新建，别的写者无法截断它
//! - 再以"不覆盖"的方式提交到目标名：硬链接在目标已存在时原子失败，随后删除临时文件
//! - 文件系统不支持硬链接时，退化为"检查存在 + 重命名"
//!
//! 提交时发现目标已被别的写者占用，或临时文件名已存在（`AlreadyExists`），
//! 重新选名再试，两者合计最多 5 次。
//!
//! ## 实现思路
//!
//! - 文件操作抽象为 `FileOps`，测试可以注入写入失败、提交竞争等故障。
//! - `TempFileGuard` 是 RAII 守卫：除非提交成功，离开作用域时一定删除临时文件。
//! - 时钟可替换，测试中固定时间戳。

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};

use super::naming::{unique_path, NamingOptions};
use crate::error::AppError;

/// 提交冲突重试上限
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 5;

/// 写入器依赖的文件系统操作
pub trait FileOps: Send + Sync {
    /// 新建文件（已存在时返回 `ErrorKind::AlreadyExists`），写入完整内容并刷盘。
    fn write_file(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// 把临时文件提交到目标路径，目标已存在时必须返回 `ErrorKind::AlreadyExists`。
    fn commit(&self, temp: &Path, dest: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// 基于 `std::fs` 的实现
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileOps;

impl FileOps for StdFileOps {
    fn write_file(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(bytes)?;
        file.sync_all()
    }

    fn commit(&self, temp: &Path, dest: &Path) -> io::Result<()> {
        match fs::hard_link(temp, dest) {
            Ok(()) => {
                if let Err(e) = fs::remove_file(temp) {
                    log::warn!("⚠️ 删除临时文件失败: {} ({})", temp.display(), e);
                }
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists || e.kind() == ErrorKind::NotFound => {
                Err(e)
            }
            Err(e) => {
                log::debug!("🔄 硬链接不可用（{}），改用重命名提交", e);
                if dest.exists() {
                    return Err(io::Error::new(ErrorKind::AlreadyExists, "目标文件已存在"));
                }
                fs::rename(temp, dest)
            }
        }
    }
}

/// 临时文件守卫：未提交时在 drop 中删除临时文件
struct TempFileGuard<'a> {
    ops: &'a dyn FileOps,
    path: PathBuf,
    committed: bool,
}

impl<'a> TempFileGuard<'a> {
    fn new(ops: &'a dyn FileOps, path: PathBuf) -> Self {
        Self {
            ops,
            path,
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn mark_committed(&mut self) {
        self.committed = true;
    }

    /// 临时文件属于别的写者，不得删除。
    fn disown(&mut self) {
        self.committed = true;
    }
}

impl Drop for TempFileGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match self.ops.remove_file(&self.path) {
            Ok(()) => log::debug!("🔄 已清理临时文件: {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log::warn!("⚠️ 清理临时文件失败: {} ({})", self.path.display(), e),
        }
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// 原子文件写入器
pub struct AtomicFileWriter {
    ops: Arc<dyn FileOps>,
    clock: Clock,
    max_commit_attempts: u32,
}

impl Default for AtomicFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicFileWriter {
    pub fn new() -> Self {
        Self {
            ops: Arc::new(StdFileOps),
            clock: Arc::new(Local::now),
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }

    pub fn with_file_ops(mut self, ops: Arc<dyn FileOps>) -> Self {
        self.ops = ops;
        self
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Local> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts.max(1);
        self
    }

    /// 把 `bytes` 写入 `dir` 下的唯一文件，返回最终路径。
    pub fn save(
        &self,
        bytes: &[u8],
        dir: &Path,
        extension: &str,
        options: &NamingOptions,
    ) -> Result<PathBuf, AppError> {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::Storage(format!("创建目录 '{}' 失败: {}", dir.display(), e))
        })?;

        for attempt in 1..=self.max_commit_attempts {
            let dest = unique_path(dir, options, extension, (self.clock)())?;
            let mut guard = TempFileGuard::new(self.ops.as_ref(), temp_path_for(&dest));

            match self.ops.write_file(guard.path(), bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    guard.disown();
                    log::debug!(
                        "🔄 临时文件已存在，重新选名（第 {}/{} 次）: {}",
                        attempt,
                        self.max_commit_attempts,
                        guard.path().display()
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            match self.ops.commit(guard.path(), &dest) {
                Ok(()) => {
                    guard.mark_committed();
                    log::info!("✅ 已写入文件: {} ({} 字节)", dest.display(), bytes.len());
                    return Ok(dest);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    log::debug!(
                        "🔄 提交时目标已被占用，重新选名（第 {}/{} 次）: {}",
                        attempt,
                        self.max_commit_attempts,
                        dest.display()
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Naming(format!(
            "提交冲突 {} 次后放弃",
            self.max_commit_attempts
        )))
    }
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

fn temp_path_for(dest: &Path) -> PathBuf {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = dest.as_os_str().to_owned();
    name.push(format!(".{}-{}.tmp", std::process::id(), seq));
    PathBuf::from(name)
}
