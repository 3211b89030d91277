//! 运行报告写入服务 - 业务能力层
//!
//! 只负责"把运行汇总写进报告文件 / 运行日志"能力，不关心流程

use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use tracing::debug;

use crate::error::AppError;
use crate::models::{RecordInput, RunSummary};

/// 报告写入服务
pub struct ReportWriter {
    report_file_path: String,
    log_file_path: Option<String>,
}

impl ReportWriter {
    pub fn new(report_file_path: impl Into<String>) -> Self {
        Self {
            report_file_path: report_file_path.into(),
            log_file_path: None,
        }
    }

    /// 同时把逐条结果追加到运行日志
    pub fn with_log_file(mut self, path: impl Into<String>) -> Self {
        self.log_file_path = Some(path.into());
        self
    }

    /// 追加一条记录的结果到运行日志
    pub fn append_outcome(&self, record: &RecordInput, outcome: &str) -> Result<()> {
        let Some(path) = &self.log_file_path else {
            return Ok(());
        };
        debug!("写入运行日志: {} -> {}", record.identifier(), outcome);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AppError::file_write_failed(path, e))?;
        let line = format!(
            "[{}] {} | {}\n",
            chrono::Local::now().format("%H:%M:%S"),
            record,
            outcome
        );
        file.write_all(line.as_bytes())
            .map_err(|e| AppError::file_write_failed(path, e))?;
        Ok(())
    }

    /// 写入完整的运行汇总（覆盖报告文件）
    pub fn write(&self, summary: &RunSummary) -> Result<()> {
        let report = format!(
            "运行报告 - {}\n{}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            summary
        );
        std::fs::write(&self.report_file_path, &report)
            .map_err(|e| AppError::file_write_failed(&self.report_file_path, e))?;

        if let Some(path) = &self.log_file_path {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| AppError::file_write_failed(path, e))?;
            file.write_all(format!("\n{}", report).as_bytes())
                .map_err(|e| AppError::file_write_failed(path, e))?;
        }
        Ok(())
    }
}
