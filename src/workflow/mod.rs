//! 流程层（Workflow）
//!
//! 定义"一条记录"的完整处理流程：阶段、流水线、重试与恢复

pub mod pipeline;
pub mod record_ctx;
pub mod retry;
pub mod stage;

pub use pipeline::{CommitResult, RecordRun, StagePipeline};
pub use record_ctx::{CommitAction, RecordCtx};
pub use retry::{
    execute_with_retry, Attempt, CheckpointRecovery, Operation, Recovery, RetryError, RetryPolicy,
};
pub use stage::{Stage, StageName, StageOutcome};
