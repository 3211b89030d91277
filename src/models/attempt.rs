//! 执行尝试记录
//!
//! 每次阶段转换追加一条，只追加、不修改

use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::workflow::stage::StageName;

/// 一次阶段执行的结果
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum AttemptOutcome {
    Success,
    TransientFailure(String),
    TerminalNoMatch(String),
    DuplicateConflict,
    /// 阶段前置条件不满足，按流程跳过
    SkippedByPrecondition,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Success => write!(f, "success"),
            AttemptOutcome::TransientFailure(reason) => write!(f, "transient-failure: {}", reason),
            AttemptOutcome::TerminalNoMatch(reason) => write!(f, "terminal-no-match: {}", reason),
            AttemptOutcome::DuplicateConflict => write!(f, "duplicate-conflict"),
            AttemptOutcome::SkippedByPrecondition => write!(f, "skipped-by-precondition"),
        }
    }
}

/// 一次执行尝试
#[derive(Clone, Debug, Serialize)]
pub struct ExecutionAttempt {
    pub record_id: String,
    pub stage: StageName,
    /// 第几次尝试（从 1 开始）
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    /// 该条目是否为这条记录的最终结果
    pub terminal: bool,
    pub timestamp: DateTime<Local>,
}

/// 尝试日志
#[derive(Debug, Default)]
pub struct AttemptLog {
    entries: Vec<ExecutionAttempt>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条记录
    pub fn append(
        &mut self,
        record_id: &str,
        stage: StageName,
        attempt: u32,
        outcome: AttemptOutcome,
        terminal: bool,
    ) {
        self.entries.push(ExecutionAttempt {
            record_id: record_id.to_string(),
            stage,
            attempt,
            outcome,
            terminal,
            timestamp: Local::now(),
        });
    }

    pub fn entries(&self) -> &[ExecutionAttempt] {
        &self.entries
    }

    pub fn for_record<'a>(&'a self, record_id: &'a str) -> impl Iterator<Item = &'a ExecutionAttempt> {
        self.entries.iter().filter(move |e| e.record_id == record_id)
    }

    /// 某条记录的最终结果条目
    pub fn terminal_for<'a>(&'a self, record_id: &'a str) -> impl Iterator<Item = &'a ExecutionAttempt> {
        self.for_record(record_id).filter(|e| e.terminal)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
