//! 记录处理上下文
//!
//! 封装"我正在处理第几批的第几条记录"这一信息

use std::fmt::Display;

use crate::config::FlowKind;
use crate::models::RecordInput;

/// 结算页面上的提交动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitAction {
    /// 本批还有后续记录：点击“추가”继续加入
    Add,
    /// 本批最后一条但还有后续批次：保持结算对象，等待人工付款
    Hold,
    /// 整个运行的最后一条：点击“결제”进入付款
    Pay,
}

/// 记录处理上下文
#[derive(Debug, Clone)]
pub struct RecordCtx {
    pub record: RecordInput,

    /// 批次编号（从 1 开始）
    pub batch_index: usize,

    /// 在批次中的位置（从 0 开始）
    pub position: usize,

    /// 在整个运行中的序号（从 1 开始，仅用于日志显示）
    pub run_index: usize,

    pub is_last_in_batch: bool,

    pub is_last_in_run: bool,

    pub flow: FlowKind,
}

impl RecordCtx {
    pub fn new(
        record: RecordInput,
        batch_index: usize,
        position: usize,
        run_index: usize,
        is_last_in_batch: bool,
        is_last_in_run: bool,
        flow: FlowKind,
    ) -> Self {
        Self {
            record,
            batch_index,
            position,
            run_index,
            is_last_in_batch,
            is_last_in_run,
            flow,
        }
    }

    pub fn identifier(&self) -> &str {
        self.record.identifier()
    }

    /// 根据位置决定提交动作
    pub fn commit_action(&self) -> CommitAction {
        if self.is_last_in_run {
            CommitAction::Pay
        } else if self.is_last_in_batch {
            CommitAction::Hold
        } else {
            CommitAction::Add
        }
    }
}

impl Display for RecordCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[레코드 {} | 批次 {}#{}]",
            self.run_index,
            self.batch_index,
            self.position + 1
        )
    }
}
