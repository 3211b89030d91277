//! 日志工具模块
//!
//! 提供运行日志文件和进度横幅的辅助函数

use std::fs;

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::models::RunSummary;

/// 初始化运行日志文件（覆盖旧内容并写入带时间的表头）
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n법인 등기사항증명서 일괄 처리 로그 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .map_err(|e| AppError::file_write_failed(log_file_path, e))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - IROS 法人登记批量处理");
    info!("🌐 目标页面: {}", config.target_url);
    info!("🧭 流程: {:?}", config.flow);
    info!(
        "🔁 每条记录最多尝试 {} 次，间隔 {} 毫秒",
        config.max_retries, config.retry_base_delay_ms
    );
    info!("{}", "=".repeat(60));
}

/// 记录输入加载信息
///
/// # 参数
/// - `total`: 记录总数
/// - `batch_size`: 每批记录数
pub fn log_records_loaded(total: usize, batch_size: usize) {
    let batches = total.div_ceil(batch_size.max(1));
    info!("✓ 找到 {} 条待处理的记录", total);
    info!("📋 将分 {} 批处理，每批 {} 条", batches, batch_size);
    info!("💡 每批完成后需要在浏览器中付款并确认\n");
}

/// 记录批次开始信息
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `total_batches`: 批次总数
/// - `start`: 起始记录编号
/// - `end`: 结束记录编号
/// - `total`: 记录总数
pub fn log_batch_start(
    batch_num: usize,
    total_batches: usize,
    start: usize,
    end: usize,
    total: usize,
) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 批", batch_num, total_batches);
    info!("🏢 本批记录: {}-{} / 共 {} 条", start, end, total);
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
pub fn log_batch_complete(batch_num: usize, committed: usize, total: usize) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 第 {} 批完成: 已提交 {}/{}", batch_num, committed, total);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `summary`: 运行汇总
/// - `report_file_path`: 报告文件路径
pub fn print_final_stats(summary: &RunSummary, report_file_path: &str) {
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    for line in summary.to_string().lines() {
        info!("{}", line);
    }
    info!("\n报告已保存至: {}", report_file_path);
}
