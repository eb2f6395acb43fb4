//! # 剪贴板保存工具：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            外部协作者（平台胶水，不在本库内）              │
//! │  全局快捷键 · 托盘 · 目录解析 · 系统通知                  │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↓ trigger(SaveSettings 快照)
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↓            核心 (Rust)                           │
//! │                                                          │
//! │  save::SaveOrchestrator  (单飞闸门 + 观察者)             │
//! │    ├─ clipboard     快照读取 + 被占用重试                 │
//! │    ├─ content       分类 → 编码 (PNG/JPG/TXT/MD/JSON/CSV) │
//! │    └─ storage       命名 + 原子写入 + 空间检查            │
//! │                                                          │
//! │  settings  加载·校验·损坏恢复·原子保存·变更事件           │
//! │  instance  单实例互斥 + 第二实例唤醒通道                  │
//! │  error     AppError (统一错误类型)                        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`clipboard`] | 剪贴板快照模型、`ClipboardProvider` 抽象、arboard 实现、读取重试 |
//! | [`content`] | 内容分类、Markdown 启发式、制表符文本解析、编码 |
//! | [`storage`] | 文件名规范化、无覆盖原子写入、剩余空间检查 |
//! | [`settings`] | 持久化配置、规范化与校验、宽松 JSON 读取、`SettingsStore` |
//! | [`save`] | `SaveOrchestrator`、`SaveResult`、目录解析与通知抽象 |
//! | [`instance`] | 跨进程单实例协调 |

pub mod clipboard;
pub mod content;
pub mod error;
pub mod instance;
pub mod save;
pub mod settings;
pub mod storage;
