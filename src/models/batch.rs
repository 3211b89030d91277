//! 批次状态与运行汇总

use std::fmt;

use serde::Serialize;

use crate::models::record::RecordInput;

/// 单条记录的结果
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum RecordOutcome {
    Pending,
    Committed,
    SkippedNoMatch(String),
    SkippedError(String),
}

impl RecordOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, RecordOutcome::Pending)
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, RecordOutcome::Committed)
    }

    /// 跳过原因（未跳过时为 None）
    pub fn skip_reason(&self) -> Option<&str> {
        match self {
            RecordOutcome::SkippedNoMatch(reason) | RecordOutcome::SkippedError(reason) => {
                Some(reason)
            }
            _ => None,
        }
    }
}

impl fmt::Display for RecordOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordOutcome::Pending => write!(f, "pending"),
            RecordOutcome::Committed => write!(f, "committed"),
            RecordOutcome::SkippedNoMatch(reason) => write!(f, "skipped-no-match ({})", reason),
            RecordOutcome::SkippedError(reason) => write!(f, "skipped-error ({})", reason),
        }
    }
}

/// 一个批次的状态
///
/// 由批次检查点管理器在记录之间修改；检查点通过（或运行终止）后封存
#[derive(Clone, Debug, Serialize)]
pub struct BatchState {
    /// 批次编号（从 1 开始）
    pub index: usize,
    records: Vec<RecordInput>,
    outcomes: Vec<RecordOutcome>,
    committed: usize,
    failed: usize,
    sealed: bool,
}

impl BatchState {
    pub fn new(index: usize, records: Vec<RecordInput>) -> Self {
        let outcomes = vec![RecordOutcome::Pending; records.len()];
        Self {
            index,
            records,
            outcomes,
            committed: 0,
            failed: 0,
            sealed: false,
        }
    }

    pub fn records(&self) -> &[RecordInput] {
        &self.records
    }

    pub fn outcomes(&self) -> &[RecordOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 写入记录结果
    ///
    /// 结果只能写一次；批次封存后不再接受写入。写入成功返回 true。
    pub fn record_outcome(&mut self, position: usize, outcome: RecordOutcome) -> bool {
        if self.sealed || outcome.is_pending() {
            return false;
        }
        match self.outcomes.get_mut(position) {
            Some(slot) if slot.is_pending() => {
                if outcome.is_committed() {
                    self.committed += 1;
                } else {
                    self.failed += 1;
                }
                *slot = outcome;
                true
            }
            _ => false,
        }
    }

    pub fn committed(&self) -> usize {
        self.committed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn pending(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_pending()).count()
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecordInput, &RecordOutcome)> {
        self.records.iter().zip(self.outcomes.iter())
    }
}

/// 运行被提前终止的原因
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Abort {
    /// 操作员拒绝了批次确认
    Declined { after_batch: usize },
    /// 远端会话失效
    Fatal { reason: String },
}

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Abort::Declined { after_batch } => {
                write!(f, "第 {} 批之后操作员未确认付款，运行中止", after_batch)
            }
            Abort::Fatal { reason } => write!(f, "致命错误: {}", reason),
        }
    }
}

/// 运行汇总
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    batches: Vec<BatchState>,
    /// 划分出的批次总数（包含未处理的）
    pub planned_batches: usize,
    /// 输入记录总数
    pub total_records: usize,
    pub abort: Option<Abort>,
}

impl RunSummary {
    pub fn new(total_records: usize, planned_batches: usize) -> Self {
        Self {
            batches: Vec::new(),
            planned_batches,
            total_records,
            abort: None,
        }
    }

    pub fn push_batch(&mut self, mut batch: BatchState) {
        batch.seal();
        self.batches.push(batch);
    }

    pub fn batches(&self) -> &[BatchState] {
        &self.batches
    }

    pub fn total_processed(&self) -> usize {
        self.batches
            .iter()
            .map(|b| b.committed() + b.failed())
            .sum()
    }

    pub fn total_committed(&self) -> usize {
        self.batches.iter().map(BatchState::committed).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.batches.iter().map(BatchState::failed).sum()
    }

    /// 未开始处理的批次数
    pub fn unprocessed_batches(&self) -> usize {
        self.planned_batches.saturating_sub(self.batches.len())
    }

    pub fn committed_records(&self) -> impl Iterator<Item = &RecordInput> {
        self.batches
            .iter()
            .flat_map(|b| b.iter())
            .filter(|(_, outcome)| outcome.is_committed())
            .map(|(record, _)| record)
    }

    pub fn skipped_records(&self) -> impl Iterator<Item = (&RecordInput, &str)> {
        self.batches
            .iter()
            .flat_map(|b| b.iter())
            .filter_map(|(record, outcome)| outcome.skip_reason().map(|r| (record, r)))
    }

    pub fn outcome_of(&self, identifier: &str) -> Option<&RecordOutcome> {
        self.batches
            .iter()
            .flat_map(|b| b.iter())
            .find(|(record, _)| record.identifier() == identifier)
            .map(|(_, outcome)| outcome)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "📊 运行结果汇总")?;
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "输入记录: {}", self.total_records)?;
        writeln!(
            f,
            "已处理: {} | ✅ 已提交: {} | ❌ 已跳过: {}",
            self.total_processed(),
            self.total_committed(),
            self.total_skipped()
        )?;

        let committed: Vec<_> = self.committed_records().collect();
        if !committed.is_empty() {
            writeln!(f, "\n✅ 已提交:")?;
            for (i, record) in committed.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, record.identifier())?;
            }
        }

        let skipped: Vec<_> = self.skipped_records().collect();
        if !skipped.is_empty() {
            writeln!(f, "\n❌ 已跳过:")?;
            for (i, (record, reason)) in skipped.iter().enumerate() {
                writeln!(f, "  {}. {} - {}", i + 1, record.identifier(), reason)?;
            }
        }

        let pending: Vec<_> = self
            .batches
            .iter()
            .flat_map(|b| b.iter())
            .filter(|(_, o)| o.is_pending())
            .map(|(r, _)| r.identifier())
            .collect();
        if !pending.is_empty() {
            writeln!(f, "\n⏸️ 未完成: {}", pending.join(", "))?;
        }

        if self.unprocessed_batches() > 0 {
            writeln!(f, "\n⏭️ 未处理的批次: {}", self.unprocessed_batches())?;
        }
        if let Some(abort) = &self.abort {
            writeln!(f, "\n⛔ {}", abort)?;
        }
        write!(f, "{}", "=".repeat(60))
    }
}
