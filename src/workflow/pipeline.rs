//! 阶段流水线 - 流程层
//!
//! 核心职责：让"一条记录"按顺序通过所有阶段，并把每次阶段转换写入尝试日志
//!
//! 提交之前先经过重复提交检测；检测到冲突时不进入 Commit，
//! 而是回到首页并以 duplicate-conflict 结束这条记录。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::infrastructure::{Checkpoint, RemoteSurface};
use crate::models::{AttemptLog, AttemptOutcome};
use crate::services::{DuplicateGuard, PaginatedLocator, SecondarySurfaceSync, SyncSettings};
use crate::workflow::record_ctx::RecordCtx;
use crate::workflow::retry::{Attempt, CheckpointRecovery, Operation, Recovery};
use crate::workflow::stage::{
    CommitStage, ConfigureOptionsStage, ConfirmItemsStage, FinalReviewStage, LocateStage,
    SelectStage, SetDisclosureStage, Stage, StageName, StageOutcome,
};

/// 一次流水线执行的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    Success,
    NoMatch(String),
    DuplicateConflict,
    Retryable(String),
}

/// 阶段流水线
pub struct StagePipeline {
    stages: Vec<Box<dyn Stage>>,
    guard: Arc<DuplicateGuard>,
}

impl StagePipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>, guard: Arc<DuplicateGuard>) -> Self {
        Self { stages, guard }
    }

    /// 按配置组装七个阶段
    pub fn from_config(config: &Config) -> Self {
        let wait = config.wait_timeout();
        let sync = Arc::new(SecondarySurfaceSync::new(SyncSettings::from_config(config)));
        let guard = Arc::new(DuplicateGuard::from_config(config));

        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(LocateStage::new(wait)),
            Box::new(SelectStage::new(
                PaginatedLocator::new(config.max_result_pages),
                Arc::clone(&sync),
                wait,
            )),
            Box::new(ConfigureOptionsStage::new(wait)),
            Box::new(ConfirmItemsStage::new(wait)),
            Box::new(SetDisclosureStage::new(Arc::clone(&guard), wait)),
            Box::new(FinalReviewStage::new(wait)),
            Box::new(CommitStage::new(sync, wait)),
        ];
        Self::new(stages, guard)
    }

    /// 执行一次完整的流水线
    ///
    /// `attempt` / `max_attempts` 只用于日志以及判断失败是否为最终结果
    pub async fn run(
        &self,
        surface: &dyn RemoteSurface,
        ctx: &RecordCtx,
        attempt: u32,
        max_attempts: u32,
        log: &mut AttemptLog,
    ) -> CommitResult {
        let id = ctx.identifier();
        let last_index = self.stages.len().saturating_sub(1);

        for (index, stage) in self.stages.iter().enumerate() {
            let name = stage.name();

            if !stage.applies(ctx) {
                log.append(id, name, attempt, AttemptOutcome::SkippedByPrecondition, false);
                continue;
            }

            if name == StageName::Commit && self.guard.detect_conflict(surface).await {
                return self.on_duplicate(surface, ctx, attempt, log).await;
            }

            info!("{} ▶ {} (尝试 {}/{})", ctx, name, attempt, max_attempts);
            let outcome = stage
                .run(surface, ctx)
                .await
                .unwrap_or_else(|e| StageOutcome::Retryable(format!("{:#}", e)));

            match outcome {
                StageOutcome::Advance => {
                    let is_last = index == last_index;
                    log.append(id, name, attempt, AttemptOutcome::Success, is_last);
                }
                StageOutcome::Retryable(reason) => {
                    warn!("{} ⚠️ {} 失败: {}", ctx, name, reason);
                    log.append(
                        id,
                        name,
                        attempt,
                        AttemptOutcome::TransientFailure(reason.clone()),
                        attempt >= max_attempts,
                    );
                    return CommitResult::Retryable(format!("{}: {}", name, reason));
                }
                StageOutcome::NoMatch(reason) => {
                    warn!("{} ❌ {} 未找到: {}", ctx, name, reason);
                    log.append(
                        id,
                        name,
                        attempt,
                        AttemptOutcome::TerminalNoMatch(reason.clone()),
                        true,
                    );
                    return CommitResult::NoMatch(reason);
                }
                StageOutcome::DuplicateConflict => {
                    return self.on_duplicate(surface, ctx, attempt, log).await;
                }
            }
        }

        info!("{} ✅ 已提交", ctx);
        CommitResult::Success
    }

    /// 重复提交冲突：回到首页（绝对起点），不参与普通重试
    async fn on_duplicate(
        &self,
        surface: &dyn RemoteSurface,
        ctx: &RecordCtx,
        attempt: u32,
        log: &mut AttemptLog,
    ) -> CommitResult {
        warn!("{} 🔁 重复提交冲突，返回首页", ctx);
        log.append(
            ctx.identifier(),
            StageName::Recovery,
            attempt,
            AttemptOutcome::DuplicateConflict,
            true,
        );
        if let Err(e) = CheckpointRecovery::new(surface, Checkpoint::Home)
            .recover()
            .await
        {
            error!("{} 重复冲突后的恢复失败: {:#}", ctx, e);
        }
        CommitResult::DuplicateConflict
    }
}

/// 一条记录的一次完整处理，供重试控制器调用
pub struct RecordRun<'a> {
    pipeline: &'a StagePipeline,
    surface: &'a dyn RemoteSurface,
    ctx: &'a RecordCtx,
    log: &'a mut AttemptLog,
}

impl<'a> RecordRun<'a> {
    pub fn new(
        pipeline: &'a StagePipeline,
        surface: &'a dyn RemoteSurface,
        ctx: &'a RecordCtx,
        log: &'a mut AttemptLog,
    ) -> Self {
        Self {
            pipeline,
            surface,
            ctx,
            log,
        }
    }
}

#[async_trait]
impl Operation for RecordRun<'_> {
    type Output = CommitResult;

    async fn attempt(&mut self, number: u32, of: u32) -> Attempt<CommitResult> {
        match self
            .pipeline
            .run(self.surface, self.ctx, number, of, self.log)
            .await
        {
            CommitResult::Retryable(reason) => Attempt::Retry(reason),
            finished => Attempt::Finished(finished),
        }
    }
}
