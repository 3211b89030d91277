//! 阶段定义 - 流程层
//!
//! 每条记录按固定顺序经过以下阶段：
//! 1. Locate - 检索页面上设置条件并检索商号
//! 2. Select - 在分页结果中找到并勾选目标法人
//! 3. ConfigureOptions - 选择“열람”发证方式
//! 4. ConfirmItems - 勾选登记事项
//! 5. SetDisclosure - 住民登录号码“미공개”
//! 6. FinalReview - 证明书确认页面
//! 7. Commit - 加入结算对象 / 付款 / 查阅

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::FlowKind;
use crate::infrastructure::{Checkpoint, Intent, LoadState, RemoteSurface, WaitCondition};
use crate::models::record::RecordField;
use crate::services::{
    DuplicateGuard, LocateResult, PaginatedLocator, RowPredicate, SecondarySurfaceSync,
    SyncOutcome,
};
use crate::workflow::record_ctx::{CommitAction, RecordCtx};

/// 阶段名称（按执行顺序排列）
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum StageName {
    Locate,
    Select,
    ConfigureOptions,
    ConfirmItems,
    SetDisclosure,
    FinalReview,
    Commit,
    /// 重复提交冲突后的恢复（终止阶段）
    Recovery,
}

impl StageName {
    /// 流水线中的阶段顺序
    pub const PIPELINE: [StageName; 7] = [
        StageName::Locate,
        StageName::Select,
        StageName::ConfigureOptions,
        StageName::ConfirmItems,
        StageName::SetDisclosure,
        StageName::FinalReview,
        StageName::Commit,
    ];
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 单个阶段的执行结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageOutcome {
    Advance,
    /// 暂时性失败，可以重试
    Retryable(String),
    /// 目标在远端不存在，不再重试
    NoMatch(String),
    DuplicateConflict,
}

/// 流水线中的一个阶段
///
/// `run` 返回的 `Err` 一律按可重试处理
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    /// 前置条件：不满足时跳过本阶段
    fn applies(&self, _ctx: &RecordCtx) -> bool {
        true
    }

    async fn run(&self, surface: &dyn RemoteSurface, ctx: &RecordCtx) -> Result<StageOutcome>;
}

/// 点击“다음”
async fn press_next(surface: &dyn RemoteSurface, wait: Duration) -> Result<StageOutcome> {
    if !surface
        .wait_for(WaitCondition::Visible(Intent::NextButton), wait)
        .await?
    {
        return Ok(StageOutcome::Retryable("找不到“다음”按钮".to_string()));
    }
    surface.click(&Intent::NextButton).await?;
    Ok(StageOutcome::Advance)
}

/// 只在完整申请流程中执行
fn purchase_only(ctx: &RecordCtx) -> bool {
    ctx.flow == FlowKind::Purchase
}

// ========== 1. Locate ==========

pub struct LocateStage {
    wait: Duration,
}

impl LocateStage {
    pub fn new(wait: Duration) -> Self {
        Self { wait }
    }
}

#[async_trait]
impl Stage for LocateStage {
    fn name(&self) -> StageName {
        StageName::Locate
    }

    async fn run(&self, surface: &dyn RemoteSurface, ctx: &RecordCtx) -> Result<StageOutcome> {
        if !surface.at_checkpoint(Checkpoint::Search).await? {
            debug!("{} 不在检索页面，先导航", ctx);
            surface.navigate(Checkpoint::Search).await?;
        }
        surface.dismiss_overlays().await?;

        for field in RecordField::ORDER {
            let filter = Intent::Filter(field);
            if surface.locate(&filter).await? {
                // 选项不存在时保留页面默认值，照常检索
                if let Err(e) = surface.fill(&filter, ctx.record.value(field)).await {
                    warn!("{} ⚠️ 检索条件 {} 设置失败: {:#}", ctx, field.header(), e);
                }
            } else {
                debug!("{} 页面上没有检索条件 {}", ctx, field.header());
            }
        }

        surface
            .fill(&Intent::SearchInput, ctx.record.identifier())
            .await?;
        surface.click(&Intent::SearchSubmit).await?;
        info!("{} 🔍 检索: {}", ctx, ctx.record);

        let grid = surface
            .wait_for(WaitCondition::Visible(Intent::ResultGrid), self.wait)
            .await?;
        if surface.locate(&Intent::NoResultsMarker).await? {
            return Ok(StageOutcome::NoMatch("검색 결과 없음".to_string()));
        }
        if !grid {
            return Ok(StageOutcome::Retryable("检索结果表格未出现".to_string()));
        }
        Ok(StageOutcome::Advance)
    }
}

// ========== 2. Select ==========

pub struct SelectStage {
    locator: PaginatedLocator,
    sync: Arc<SecondarySurfaceSync>,
    wait: Duration,
}

impl SelectStage {
    pub fn new(locator: PaginatedLocator, sync: Arc<SecondarySurfaceSync>, wait: Duration) -> Self {
        Self {
            locator,
            sync,
            wait,
        }
    }
}

#[async_trait]
impl Stage for SelectStage {
    fn name(&self) -> StageName {
        StageName::Select
    }

    async fn run(&self, surface: &dyn RemoteSurface, ctx: &RecordCtx) -> Result<StageOutcome> {
        let predicate = RowPredicate::for_record(&ctx.record);
        match self.locator.locate(surface, &predicate).await? {
            LocateResult::ExhaustedNoMatch => {
                return Ok(StageOutcome::NoMatch(
                    "검색 결과에서 일치하는 법인을 찾지 못함".to_string(),
                ));
            }
            LocateResult::Found { page, row } => {
                debug!("{} 已勾选第 {} 页: {}", ctx, page, row.name);
            }
        }

        // 查阅流程在 Commit 阶段才打开弹窗
        if !purchase_only(ctx) {
            return Ok(StageOutcome::Advance);
        }

        let wait = self.wait;
        let outcome = self
            .sync
            .spawn_and_reconcile(
                surface,
                async move {
                    if press_next(surface, wait).await? != StageOutcome::Advance {
                        anyhow::bail!("找不到“다음”按钮");
                    }
                    Ok::<(), anyhow::Error>(())
                },
                true,
            )
            .await?;
        if let SyncOutcome::Closed(id) = outcome {
            debug!("{} 关闭了意外弹出的窗口 {}", ctx, id);
        }
        Ok(StageOutcome::Advance)
    }
}

// ========== 3. ConfigureOptions ==========

pub struct ConfigureOptionsStage {
    wait: Duration,
}

impl ConfigureOptionsStage {
    pub fn new(wait: Duration) -> Self {
        Self { wait }
    }
}

#[async_trait]
impl Stage for ConfigureOptionsStage {
    fn name(&self) -> StageName {
        StageName::ConfigureOptions
    }

    fn applies(&self, ctx: &RecordCtx) -> bool {
        purchase_only(ctx)
    }

    async fn run(&self, surface: &dyn RemoteSurface, _ctx: &RecordCtx) -> Result<StageOutcome> {
        if !surface
            .wait_for(WaitCondition::Visible(Intent::ViewOption), self.wait)
            .await?
        {
            return Ok(StageOutcome::Retryable("“열람”选项未出现".to_string()));
        }
        surface.check(&Intent::ViewOption).await?;
        press_next(surface, self.wait).await
    }
}

// ========== 4. ConfirmItems ==========

/// 需要勾选的登记事项行
pub const REGISTRY_ITEM_ROWS: [u32; 2] = [14, 15];

pub struct ConfirmItemsStage {
    wait: Duration,
}

impl ConfirmItemsStage {
    pub fn new(wait: Duration) -> Self {
        Self { wait }
    }
}

#[async_trait]
impl Stage for ConfirmItemsStage {
    fn name(&self) -> StageName {
        StageName::ConfirmItems
    }

    fn applies(&self, ctx: &RecordCtx) -> bool {
        purchase_only(ctx)
    }

    async fn run(&self, surface: &dyn RemoteSurface, ctx: &RecordCtx) -> Result<StageOutcome> {
        let first = Intent::RegistryItem(REGISTRY_ITEM_ROWS[0]);
        if !surface
            .wait_for(WaitCondition::Visible(first), self.wait)
            .await?
        {
            return Ok(StageOutcome::Retryable("登记事项列表未出现".to_string()));
        }
        for row in REGISTRY_ITEM_ROWS {
            surface.check(&Intent::RegistryItem(row)).await?;
        }

        let outcome = press_next(surface, self.wait).await?;
        if outcome != StageOutcome::Advance {
            return Ok(outcome);
        }
        if !surface
            .wait_for(WaitCondition::Hidden(Intent::ProgressFrame), self.wait)
            .await?
        {
            warn!("{} ⚠️ 进度条未在超时内消失，继续执行", ctx);
        }
        Ok(StageOutcome::Advance)
    }
}

// ========== 5. SetDisclosure ==========

pub struct SetDisclosureStage {
    guard: Arc<DuplicateGuard>,
    wait: Duration,
}

impl SetDisclosureStage {
    pub fn new(guard: Arc<DuplicateGuard>, wait: Duration) -> Self {
        Self { guard, wait }
    }
}

#[async_trait]
impl Stage for SetDisclosureStage {
    fn name(&self) -> StageName {
        StageName::SetDisclosure
    }

    fn applies(&self, ctx: &RecordCtx) -> bool {
        purchase_only(ctx)
    }

    async fn run(&self, surface: &dyn RemoteSurface, _ctx: &RecordCtx) -> Result<StageOutcome> {
        if !surface
            .wait_for(WaitCondition::Visible(Intent::DisclosurePrivate), self.wait)
            .await?
        {
            // 已在结算对象中的记录不会出现公开设置，而是直接提示重复
            if self.guard.detect_conflict(surface).await {
                return Ok(StageOutcome::DuplicateConflict);
            }
            return Ok(StageOutcome::Retryable("“미공개”选项未出现".to_string()));
        }
        surface.check(&Intent::DisclosurePrivate).await?;
        press_next(surface, self.wait).await
    }
}

// ========== 6. FinalReview ==========

pub struct FinalReviewStage {
    wait: Duration,
}

impl FinalReviewStage {
    pub fn new(wait: Duration) -> Self {
        Self { wait }
    }
}

#[async_trait]
impl Stage for FinalReviewStage {
    fn name(&self) -> StageName {
        StageName::FinalReview
    }

    fn applies(&self, ctx: &RecordCtx) -> bool {
        purchase_only(ctx)
    }

    async fn run(&self, surface: &dyn RemoteSurface, ctx: &RecordCtx) -> Result<StageOutcome> {
        let outcome = press_next(surface, self.wait).await?;
        if outcome == StageOutcome::Advance
            && !surface
                .wait_for(WaitCondition::Load(LoadState::NetworkIdle), self.wait)
                .await?
        {
            debug!("{} 结算页面加载超时", ctx);
        }
        Ok(outcome)
    }
}

// ========== 7. Commit ==========

pub struct CommitStage {
    sync: Arc<SecondarySurfaceSync>,
    wait: Duration,
}

impl CommitStage {
    pub fn new(sync: Arc<SecondarySurfaceSync>, wait: Duration) -> Self {
        Self { sync, wait }
    }

    async fn click_when_visible(
        &self,
        surface: &dyn RemoteSurface,
        intent: Intent,
    ) -> Result<StageOutcome> {
        if !surface
            .wait_for(WaitCondition::Visible(intent.clone()), self.wait)
            .await?
        {
            return Ok(StageOutcome::Retryable(format!("{} 未出现", intent)));
        }
        surface.click(&intent).await?;
        surface
            .wait_for(WaitCondition::Load(LoadState::NetworkIdle), self.wait)
            .await?;
        Ok(StageOutcome::Advance)
    }

    async fn purchase(&self, surface: &dyn RemoteSurface, ctx: &RecordCtx) -> Result<StageOutcome> {
        match ctx.commit_action() {
            CommitAction::Add => {
                info!("{} ➕ 加入结算对象", ctx);
                self.click_when_visible(surface, Intent::AddButton).await
            }
            CommitAction::Hold => {
                info!("{} ⏸️ 本批最后一条，保持结算对象等待付款", ctx);
                Ok(StageOutcome::Advance)
            }
            CommitAction::Pay => {
                info!("{} 💳 全部记录已加入，进入付款页面", ctx);
                self.click_when_visible(surface, Intent::PayButton).await
            }
        }
    }

    async fn lookup(&self, surface: &dyn RemoteSurface, ctx: &RecordCtx) -> Result<StageOutcome> {
        let wait = self.wait;
        let trigger = async move {
            surface.click(&Intent::ViewIssueButton).await?;
            if surface
                .wait_for(WaitCondition::Visible(Intent::DialogConfirm), wait)
                .await?
            {
                surface.click(&Intent::DialogConfirm).await?;
            }
            Ok::<(), anyhow::Error>(())
        };
        let outcome = self
            .sync
            .spawn_and_reconcile(surface, trigger, !ctx.is_last_in_run)
            .await?;
        info!("{} 📖 열람/발급: {:?}", ctx, outcome);
        Ok(StageOutcome::Advance)
    }
}

#[async_trait]
impl Stage for CommitStage {
    fn name(&self) -> StageName {
        StageName::Commit
    }

    async fn run(&self, surface: &dyn RemoteSurface, ctx: &RecordCtx) -> Result<StageOutcome> {
        match ctx.flow {
            FlowKind::Purchase => self.purchase(surface, ctx).await,
            FlowKind::Lookup => self.lookup(surface, ctx).await,
        }
    }
}
