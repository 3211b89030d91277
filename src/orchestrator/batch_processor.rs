//! 批量记录处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一次运行的完整生命周期。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：写运行日志表头、连接浏览器、创建 `CdpSurface`
//! 2. **登录确认**：操作员在浏览器中登录后输入肯定回答
//! 3. **加载输入**：读取 CSV（`Vec<RecordInput>`）
//! 4. **分批处理**：委托 `BatchCheckpointManager`
//! 5. **付款后收取**：操作员确认付款后下载并重命名证明书
//! 6. **运行报告**：写报告文件并输出统计
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一持有浏览器连接的模块
//! - **向下委托**：单条记录交给 workflow，批次交给 batch_gate

use anyhow::Result;
use tracing::{info, warn};

use crate::browser;
use crate::config::{Config, FlowKind};
use crate::error::AppError;
use crate::infrastructure::CdpSurface;
use crate::models::{load_records_from_csv, Abort, RunSummary};
use crate::orchestrator::batch_gate::BatchCheckpointManager;
use crate::orchestrator::harvest::Harvester;
use crate::services::{
    wait_until_confirmed, ConfirmationPrompt, PdfRenamer, ReportWriter, SecondarySurfaceSync,
    StdinPrompt, SyncSettings,
};
use crate::utils::logging::{init_log_file, log_records_loaded, log_startup, print_final_stats};
use crate::workflow::{RetryPolicy, StagePipeline};

/// 应用主结构
pub struct App {
    config: Config,
    surface: CdpSurface,
    prompt: StdinPrompt,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        init_log_file(&config.output_log_file)?;

        log_startup(&config);

        let (browser, page) = browser::connect_to_browser_and_page(
            config.browser_debug_port,
            &config.target_url,
            config.target_title.as_deref(),
        )
        .await?;

        let surface = CdpSurface::new(browser, page, config.target_url.clone());

        Ok(Self {
            config,
            surface,
            prompt: StdinPrompt::new(),
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunSummary> {
        wait_until_confirmed(&self.prompt, "IROS 로그인을 완료했습니까?").await?;

        let records = load_records_from_csv(&self.config.input_csv).await?;
        if records.is_empty() {
            warn!("⚠️ 没有可处理的记录，程序结束");
            return Ok(RunSummary::new(0, 0));
        }
        log_records_loaded(records.len(), self.config.batch_size);

        let pipeline = StagePipeline::from_config(&self.config);
        let writer = ReportWriter::new(&self.config.report_file)
            .with_log_file(&self.config.output_log_file);

        let mut manager = BatchCheckpointManager::new(
            &self.surface,
            &pipeline,
            &self.prompt,
            RetryPolicy::from_config(&self.config),
            self.config.flow,
        )
        .with_report_writer(&writer);
        let summary = manager.run_batches(records, self.config.batch_size).await;
        info!("📝 共记录 {} 次阶段转换", manager.attempt_log().len());

        self.harvest_if_confirmed(&summary).await;

        writer.write(&summary)?;
        print_final_stats(&summary, &self.config.report_file);

        if let Some(Abort::Fatal { reason }) = &summary.abort {
            return Err(AppError::fatal(reason.clone()).into());
        }
        Ok(summary)
    }

    /// 操作员确认付款后收取证明书；任何失败只记录，不影响运行结果
    async fn harvest_if_confirmed(&self, summary: &RunSummary) {
        let committed = summary.total_committed();
        if !self.config.harvest_enabled
            || committed == 0
            || self.config.flow != FlowKind::Purchase
            || matches!(summary.abort, Some(Abort::Fatal { .. }))
        {
            return;
        }

        let question = format!("{} 건의 결제를 완료했습니까? 증명서를 저장합니다", committed);
        match self.prompt.confirm(&question).await {
            Ok(true) => {}
            Ok(false) => {
                info!("跳过证明书收取");
                return;
            }
            Err(e) => {
                warn!("⚠️ 无法读取确认，跳过收取: {}", e);
                return;
            }
        }

        let renamer = match PdfRenamer::new() {
            Ok(renamer) => renamer,
            Err(e) => {
                warn!("⚠️ 无法创建文件重命名器: {:#}", e);
                return;
            }
        };
        let sync = SecondarySurfaceSync::new(SyncSettings::from_config(&self.config));
        let harvester = Harvester::new(
            &self.surface,
            &sync,
            &renamer,
            &self.config.download_dir,
            self.config.wait_timeout(),
        );
        match harvester.harvest(committed).await {
            Ok(report) => info!(
                "📥 已收取 {}/{} 个证明书",
                report.saved.len(),
                report.attempted()
            ),
            Err(e) => warn!("⚠️ 收取阶段失败: {:#}", e),
        }
    }
}
