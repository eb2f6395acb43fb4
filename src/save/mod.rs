//! 保存流程
//!
//! # 设计思路
//!
//! 编排器把分类、编码、写入串成一次"单飞"保存；目录解析、剪贴板读取、用户提示
//! 都是外部协作者，通过 trait 注入。策略性拒绝（`Busy`、`NoContent` 等）
//! 与致命故障一样以 `SaveResult` 返回，不走错误通道。

mod notify;
mod orchestrator;
mod result;
mod target;

pub use notify::{LogNotificationSink, NotificationSink, SaveNotifier, SaveObserver, Severity};
pub use orchestrator::SaveOrchestrator;
pub use result::SaveResult;
pub use target::{DirectoryResolver, FixedDirectoryResolver, TargetDirectory};
