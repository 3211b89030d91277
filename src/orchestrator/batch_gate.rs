//! 批次检查点管理器 - 编排层
//!
//! 把记录按固定大小分批，逐条交给重试控制器 + 阶段流水线；
//! 一批中有提交成功的记录时，必须等待人工确认付款后才开始下一批。

use tracing::{error, info, warn};

use crate::config::FlowKind;
use crate::infrastructure::{Checkpoint, RemoteSurface};
use crate::models::{Abort, AttemptLog, BatchState, RecordInput, RecordOutcome, RunSummary};
use crate::services::{ConfirmationPrompt, ReportWriter};
use crate::utils::logging::{log_batch_complete, log_batch_start};
use crate::workflow::{
    execute_with_retry, CheckpointRecovery, CommitResult, Recovery, RecordCtx, RecordRun,
    RetryPolicy, StagePipeline,
};

/// duplicate-conflict 的跳过原因
pub const DUPLICATE_CONFLICT_REASON: &str = "duplicate-conflict";

/// 批次检查点管理器
///
/// 运行期间唯一修改 `BatchState` / `RunSummary` 的组件
pub struct BatchCheckpointManager<'a> {
    surface: &'a dyn RemoteSurface,
    pipeline: &'a StagePipeline,
    prompt: &'a dyn ConfirmationPrompt,
    policy: RetryPolicy,
    flow: FlowKind,
    report_writer: Option<&'a ReportWriter>,
    log: AttemptLog,
}

impl<'a> BatchCheckpointManager<'a> {
    pub fn new(
        surface: &'a dyn RemoteSurface,
        pipeline: &'a StagePipeline,
        prompt: &'a dyn ConfirmationPrompt,
        policy: RetryPolicy,
        flow: FlowKind,
    ) -> Self {
        Self {
            surface,
            pipeline,
            prompt,
            policy,
            flow,
            report_writer: None,
            log: AttemptLog::new(),
        }
    }

    /// 每条记录结束时追加到运行日志
    pub fn with_report_writer(mut self, writer: &'a ReportWriter) -> Self {
        self.report_writer = Some(writer);
        self
    }

    pub fn attempt_log(&self) -> &AttemptLog {
        &self.log
    }

    pub fn into_attempt_log(self) -> AttemptLog {
        self.log
    }

    /// 分批处理所有记录
    pub async fn run_batches(&mut self, records: Vec<RecordInput>, batch_size: usize) -> RunSummary {
        let batch_size = batch_size.max(1);
        let total = records.len();
        let chunks: Vec<Vec<RecordInput>> = records
            .chunks(batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        let planned = chunks.len();
        let mut summary = RunSummary::new(total, planned);
        let mut run_index = 0;

        for (offset, chunk) in chunks.into_iter().enumerate() {
            let batch_index = offset + 1;
            let is_last_batch = batch_index == planned;

            if offset > 0 {
                info!("🏠 开始第 {} 批前回到首页", batch_index);
                if let Err(e) = CheckpointRecovery::new(self.surface, Checkpoint::Home)
                    .recover()
                    .await
                {
                    warn!("⚠️ 回到首页失败，继续处理: {:#}", e);
                }
            }

            let start = offset * batch_size + 1;
            log_batch_start(batch_index, planned, start, start + chunk.len() - 1, total);

            let mut batch = BatchState::new(batch_index, chunk);
            let len = batch.len();

            for position in 0..len {
                run_index += 1;

                if let Err(e) = self.surface.health().await {
                    let reason = format!("{:#}", e);
                    error!("⛔ 远端会话已失效，终止运行: {}", reason);
                    summary.abort = Some(Abort::Fatal { reason });
                    summary.push_batch(batch);
                    return summary;
                }

                let is_last_in_batch = position + 1 == len;
                let ctx = RecordCtx::new(
                    batch.records()[position].clone(),
                    batch_index,
                    position,
                    run_index,
                    is_last_in_batch,
                    is_last_batch && is_last_in_batch,
                    self.flow,
                );

                let outcome = self.process_record(&ctx).await;
                if let Some(writer) = self.report_writer {
                    if let Err(e) = writer.append_outcome(&ctx.record, &outcome.to_string()) {
                        warn!("{} 写入运行日志失败: {}", ctx, e);
                    }
                }
                batch.record_outcome(position, outcome);
            }

            log_batch_complete(batch_index, batch.committed(), len);
            let committed = batch.committed();
            summary.push_batch(batch);

            if is_last_batch {
                break;
            }
            if committed == 0 {
                info!("第 {} 批没有提交成功的记录，直接开始下一批", batch_index);
                continue;
            }

            let question = format!(
                "第 {} 批已加入 {} 条记录。请在浏览器中完成付款后输入 y 继续",
                batch_index, committed
            );
            match self.prompt.confirm(&question).await {
                Ok(true) => info!("✓ 第 {} 批付款已确认", batch_index),
                Ok(false) => {
                    warn!("⛔ 未确认付款，停止处理后续批次");
                    summary.abort = Some(Abort::Declined {
                        after_batch: batch_index,
                    });
                    break;
                }
                Err(e) => {
                    warn!("⛔ 无法读取确认（{}），停止处理后续批次", e);
                    summary.abort = Some(Abort::Declined {
                        after_batch: batch_index,
                    });
                    break;
                }
            }
        }

        summary
    }

    /// 处理一条记录：重试控制器 + 阶段流水线，失败一律转换为跳过
    async fn process_record(&mut self, ctx: &RecordCtx) -> RecordOutcome {
        info!("{} 🏢 开始处理: {}", ctx, ctx.record);

        let mut run = RecordRun::new(self.pipeline, self.surface, ctx, &mut self.log);
        let recovery = CheckpointRecovery::new(self.surface, Checkpoint::Search);

        match execute_with_retry(&mut run, &self.policy, &recovery).await {
            Ok(CommitResult::Success) => RecordOutcome::Committed,
            Ok(CommitResult::NoMatch(reason)) => RecordOutcome::SkippedNoMatch(reason),
            Ok(CommitResult::DuplicateConflict) => {
                RecordOutcome::SkippedError(DUPLICATE_CONFLICT_REASON.to_string())
            }
            Ok(CommitResult::Retryable(reason)) => RecordOutcome::SkippedError(reason),
            Err(e) => {
                error!("{} ❌ {}", ctx, e);
                RecordOutcome::SkippedError(e.to_string())
            }
        }
    }
}
