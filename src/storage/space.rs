//! 剩余空间检查（建议性）
//!
//! 取挂载点最长匹配的磁盘。拿不到磁盘信息（网络路径、容器等）时一律视为空间足够，
//! 不能因此阻止保存。

use std::path::{Path, PathBuf};

use sysinfo::Disks;

/// `dir` 所在磁盘是否至少还有 `bytes` 字节可用；未知时返回 `true`。
pub fn has_enough_space(dir: &Path, bytes: u64) -> bool {
    match available_space(dir) {
        Some(available) => {
            if available < bytes {
                log::warn!(
                    "⚠️ 磁盘空间不足: {} 可用 {} 字节，需要 {} 字节",
                    dir.display(),
                    available,
                    bytes
                );
                return false;
            }
            true
        }
        None => {
            log::debug!("📋 无法获取 {} 的磁盘信息，跳过空间检查", dir.display());
            true
        }
    }
}

fn available_space(dir: &Path) -> Option<u64> {
    let probe = nearest_existing(dir)?;
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| probe.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

fn nearest_existing(dir: &Path) -> Option<PathBuf> {
    let absolute = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(dir)
    };
    absolute
        .ancestors()
        .find(|p| p.exists())
        .map(|p| p.canonicalize().unwrap_or_else(|_| p.to_path_buf()))
}
