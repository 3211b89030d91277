//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批次划分和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 应用生命周期
//! - 初始化（运行日志、浏览器连接）
//! - 登录确认、加载 CSV
//! - 付款后收取、运行报告
//!
//! ### `batch_gate` - 批次检查点
//! - 按固定大小分批，保持输入顺序
//! - 逐条记录调用重试控制器 + 阶段流水线
//! - 有提交成功的记录时等待人工付款确认
//!
//! ### `harvest` - 付款后收取
//! - 逐个打开已付款证明书并保存、重命名
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (一次运行)
//!     ↓
//! batch_gate (Vec<RecordInput> → 批次)
//!     ↓
//! workflow::StagePipeline (单条记录)
//!     ↓
//! services (能力层：locator / sync / guard / prompt)
//!     ↓
//! infrastructure (基础设施：RemoteSurface)
//! ```

pub mod batch_gate;
pub mod batch_processor;
pub mod harvest;

pub use batch_gate::{BatchCheckpointManager, DUPLICATE_CONFLICT_REASON};
pub use batch_processor::App;
pub use harvest::{HarvestReport, Harvester};
