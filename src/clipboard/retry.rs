//! # 剪贴板读取重试
//!
//! ## 设计思路
//!
//! 剪贴板被其他进程短暂打开时读取会失败（`Locked`），这类故障稍等即可恢复。
//! 重试同时受"最大次数"与"总时间预算"约束，耗尽后作为致命错误上抛，不再继续重试。
//!
//! ## 实现思路
//!
//! - 仅 `Locked` 可重试，`Unavailable` 立即失败。
//! - 等待前先判断"等待后是否超出预算"，超出则直接放弃，保证总耗时有上界。

use std::time::{Duration, Instant};

use super::{ClipboardAccessError, ClipboardProvider, ClipboardSnapshot};
use crate::error::AppError;

/// 剪贴板读取重试策略
#[derive(Debug, Clone)]
pub struct ClipboardRetryPolicy {
    /// 最大尝试次数（含首次）。
    pub max_attempts: u32,
    /// 单次保存允许的总重试预算（毫秒）。
    pub budget_ms: u64,
    /// 两次尝试之间的等待（毫秒）。
    pub retry_delay_ms: u64,
}

impl Default for ClipboardRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            budget_ms: 300,
            retry_delay_ms: 50,
        }
    }
}

fn would_exceed_retry_budget(elapsed_ms: u64, wait_ms: u64, budget_ms: u64) -> bool {
    elapsed_ms.saturating_add(wait_ms) > budget_ms
}

/// 读取剪贴板快照，`Locked` 时按策略退避重试。
pub async fn read_snapshot_with_retry(
    provider: &dyn ClipboardProvider,
    policy: &ClipboardRetryPolicy,
) -> Result<ClipboardSnapshot, AppError> {
    let max_attempts = policy.max_attempts.max(1);
    let started = Instant::now();
    let mut attempts = 0;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            if would_exceed_retry_budget(elapsed_ms, policy.retry_delay_ms, policy.budget_ms) {
                log::warn!(
                    "⏱️ 剪贴板读取重试预算耗尽（已用 {}ms，预算 {}ms）",
                    elapsed_ms,
                    policy.budget_ms
                );
                break;
            }
            log::debug!("🔄 剪贴板读取重试 {}/{}，等待 {}ms", attempt, max_attempts, policy.retry_delay_ms);
            tokio::time::sleep(Duration::from_millis(policy.retry_delay_ms)).await;
        }

        attempts = attempt;
        match provider.snapshot() {
            Ok(snapshot) => return Ok(snapshot),
            Err(ClipboardAccessError::Locked(detail)) => {
                log::debug!("🔒 剪贴板被占用（尝试 {}）: {}", attempt, detail);
            }
            Err(ClipboardAccessError::Unavailable(detail)) => {
                return Err(AppError::Clipboard(detail));
            }
        }
    }

    Err(AppError::ClipboardLocked {
        attempts,
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}
