//! 远端界面适配器接口 - 基础设施层
//!
//! 上层（services / workflow / orchestrator）只通过 [`RemoteSurface`] 操作远端界面，
//! 不认识任何选择器；选择器的多级回退由具体实现负责。

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::record::RecordField;

/// 逻辑上的操作目标
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Intent {
    /// 检索条件下拉框（등기소 / 법인구분 / 등기부상태 / 본지점구분 / 주말여부）
    Filter(RecordField),
    /// 商号输入框
    SearchInput,
    /// 检索按钮
    SearchSubmit,
    /// “검색조건에 맞는 법인등기기록을 찾지 못했습니다”提示
    NoResultsMarker,
    /// 检索结果表格
    ResultGrid,
    /// “다음”按钮
    NextButton,
    /// 发证方式中的“열람”单选框
    ViewOption,
    /// 登记事项复选框（按 data-rowindex）
    RegistryItem(u32),
    /// 页面切换时的进度条 iframe
    ProgressFrame,
    /// 住民登录号码“미공개”单选框
    DisclosurePrivate,
    /// 结算对象页面的“추가”按钮
    AddButton,
    /// 结算对象页面的“결제”按钮
    PayButton,
    /// 重复提交冲突标记元素
    DuplicateMarker,
    /// 弹窗中的“처리 중입니다.”加载提示
    LoadingIndicator,
    /// “열람/발급”按钮
    ViewIssueButton,
    /// 确认对话框中的“확인”按钮
    DialogConfirm,
    /// 申请结果列表中的“열람”按钮
    IssuedViewButton,
    /// 查阅窗口中的下载/保存按钮
    DownloadButton,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Filter(field) => write!(f, "检索条件[{}]", field.header()),
            Intent::RegistryItem(row) => write!(f, "登记事项[{}]", row),
            other => write!(f, "{:?}", other),
        }
    }
}

/// 可以可靠到达的检查点页面
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Checkpoint {
    /// 门户首页（绝对起点）
    Home,
    /// 法人商号检索页面（流程中间的恢复点）
    Search,
    /// 申请结果确认页面（付款后收取文件）
    IssuedList,
}

/// 页面加载状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    DomContentLoaded,
    NetworkIdle,
}

/// 等待条件
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WaitCondition {
    Visible(Intent),
    Hidden(Intent),
    Load(LoadState),
}

/// 界面（标签页 / 弹窗）标识
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SurfaceId(pub String);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 检索结果中的一行
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    /// 行在当前页中的位置（从 0 开始）
    pub index: usize,
    /// 등기상호
    pub name: String,
    /// 관할등기소
    pub registry_office: String,
    /// 법인구분
    pub entity_type: String,
}

/// 远端界面能力集
///
/// 所有等待都必须有上限；超时返回“未满足”而不是一直挂起。
#[async_trait]
pub trait RemoteSurface: Send + Sync {
    /// 远端会话是否仍然可用；出错表示会话已失效
    async fn health(&self) -> Result<()>;

    /// 导航到检查点
    async fn navigate(&self, checkpoint: Checkpoint) -> Result<()>;

    /// 当前是否位于检查点
    async fn at_checkpoint(&self, checkpoint: Checkpoint) -> Result<bool>;

    /// 关闭遮挡操作的弹层，返回关闭数量
    async fn dismiss_overlays(&self) -> Result<usize>;

    /// 目标是否存在且可见
    async fn locate(&self, intent: &Intent) -> Result<bool>;

    async fn click(&self, intent: &Intent) -> Result<()>;

    /// 填写输入框或按标签选择下拉项
    async fn fill(&self, intent: &Intent, value: &str) -> Result<()>;

    /// 勾选复选框 / 单选框（已勾选时不变）
    async fn check(&self, intent: &Intent) -> Result<()>;

    /// 在超时内等待条件成立，返回是否成立
    async fn wait_for(&self, condition: WaitCondition, timeout: Duration) -> Result<bool>;

    /// 当前界面的可见文本
    async fn read_text(&self) -> Result<String>;

    /// 当前检索结果页的所有行
    async fn result_rows(&self) -> Result<Vec<ResultRow>>;

    /// 勾选当前页第 `index` 行
    async fn select_row(&self, index: usize) -> Result<()>;

    /// 点击翻页控件；找不到控件时返回 false
    async fn next_page(&self) -> Result<bool>;

    /// 主界面标识
    fn primary_surface(&self) -> SurfaceId;

    /// 当前打开的所有界面
    async fn open_surfaces(&self) -> Result<Vec<SurfaceId>>;

    /// 在超时内等待一个不在 `known` 中的新界面出现
    async fn wait_for_new_surface(
        &self,
        known: &[SurfaceId],
        timeout: Duration,
    ) -> Result<Option<SurfaceId>>;

    /// 把后续操作切换到指定界面
    async fn focus(&self, surface: &SurfaceId) -> Result<()>;

    async fn close_surface(&self, surface: &SurfaceId) -> Result<()>;

    /// 取消主界面上所有已勾选的行，返回取消数量
    async fn unselect_all(&self) -> Result<usize>;
}
