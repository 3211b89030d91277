//! # IROS Batch
//!
//! 通过 Chrome DevTools 协议驱动 IROS（인터넷등기소）网页，
//! 批量申请法人登记事项证明书的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（浏览器页面），只暴露能力
//! - `RemoteSurface` - 定位 / 点击 / 填写 / 等待 / 读文本 / 弹窗切换
//! - `CdpSurface` - 基于 chromiumoxide 的实现，选择器回退只存在于此
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单条记录或单个界面
//! - `PaginatedLocator` - 分页结果中定位目标法人
//! - `SecondarySurfaceSync` - 弹窗出现、稳定与收尾
//! - `DuplicateGuard` - 重复提交冲突检测
//! - `prompt` / `post_processor` / `report_writer`
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一条记录"的完整处理流程
//! - `RecordCtx` - 上下文封装（批次 + 位置）
//! - `StagePipeline` - Locate → Select → … → Commit
//! - `execute_with_retry` - 固定间隔重试 + 检查点恢复
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_gate` - 分批处理与人工付款确认
//! - `orchestrator/harvest` - 付款后收取证明书
//! - `orchestrator/batch_processor` - 应用生命周期
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::connect_to_browser_and_page;
pub use config::{Config, FlowKind};
pub use error::{AppError, AppResult};
pub use infrastructure::{CdpSurface, RemoteSurface};
pub use models::{RecordInput, RunSummary};
pub use orchestrator::{App, BatchCheckpointManager};
pub use workflow::{RecordCtx, StagePipeline};
