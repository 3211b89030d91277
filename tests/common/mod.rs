#![allow(dead_code)]

//! 测试用的内存远端界面与脚本化确认

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use iros_batch::config::{Config, FlowKind};
use iros_batch::error::{AppError, BrowserError, RunError};
use iros_batch::infrastructure::{
    Checkpoint, Intent, LoadState, RemoteSurface, ResultRow, SurfaceId, WaitCondition,
};
use iros_batch::models::RecordInput;
use iros_batch::services::ConfirmationPrompt;

pub const PRIMARY: &str = "primary";

/// 内存中的界面状态
pub struct FakeState {
    /// 最近一次填写的商号
    pub search_name: String,
    /// 显式的分页结果；为 None 时每次检索返回一行同名结果
    pub pages: Option<Vec<Vec<ResultRow>>>,
    pub page: usize,
    /// 翻页控件可以点击但结果不变
    pub stuck_pagination: bool,
    /// 检索后显示“没有结果”的商号
    pub no_results: HashSet<String>,
    /// 检索结果里只有其他法人的商号
    pub missing: HashSet<String>,
    /// 出现重复提交标记的商号
    pub duplicates: HashSet<String>,
    /// 检索按钮点击失败的剩余次数
    pub submit_failures: HashMap<String, u32>,
    /// 还能成功几次健康检查（None 表示一直健康）
    pub health_budget: Option<usize>,
    /// 点击后会弹出新窗口的目标
    pub popup_on: HashSet<Intent>,
    /// 加载提示依次返回的可见状态（用完后不可见）
    pub indicator: VecDeque<bool>,
    pub body_text: String,
    /// 检索条件下拉框中不存在的选项
    pub rejected_options: HashSet<String>,
    /// 页面加载等待直接报错
    pub load_error: bool,
    /// 证明书列表中没有“열람”按钮
    pub view_button_hidden: bool,
    /// 点击保存按钮时写入 PDF 的目录
    pub download_dir: Option<PathBuf>,
    /// 保存按钮点击失败的剩余次数
    pub download_failures: u32,

    pub clicks: Vec<Intent>,
    pub checks: Vec<Intent>,
    pub fills: Vec<(Intent, String)>,
    pub navigations: Vec<Checkpoint>,
    pub next_page_calls: usize,
    pub selected: Vec<usize>,
    pub surfaces: Vec<SurfaceId>,
    pub focused: SurfaceId,
    pub closed: Vec<SurfaceId>,
    pub unselect_calls: usize,
    pub indicator_polls: usize,
    popup_seq: usize,
    download_seq: usize,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            search_name: String::new(),
            pages: None,
            page: 0,
            stuck_pagination: false,
            no_results: HashSet::new(),
            missing: HashSet::new(),
            duplicates: HashSet::new(),
            submit_failures: HashMap::new(),
            health_budget: None,
            popup_on: HashSet::new(),
            indicator: VecDeque::new(),
            body_text: String::new(),
            rejected_options: HashSet::new(),
            load_error: false,
            view_button_hidden: false,
            download_dir: None,
            download_failures: 0,
            clicks: Vec::new(),
            checks: Vec::new(),
            fills: Vec::new(),
            navigations: Vec::new(),
            next_page_calls: 0,
            selected: Vec::new(),
            surfaces: vec![SurfaceId(PRIMARY.to_string())],
            focused: SurfaceId(PRIMARY.to_string()),
            closed: Vec::new(),
            unselect_calls: 0,
            indicator_polls: 0,
            popup_seq: 0,
            download_seq: 0,
        }
    }
}

impl FakeState {
    fn rows(&self) -> Vec<ResultRow> {
        if let Some(pages) = &self.pages {
            return pages.get(self.page).cloned().unwrap_or_default();
        }
        if self.search_name.is_empty() || self.no_results.contains(&self.search_name) {
            return Vec::new();
        }
        let name = if self.missing.contains(&self.search_name) {
            "전혀다른회사".to_string()
        } else {
            self.search_name.clone()
        };
        vec![row(0, &name, "서울중앙지방법원 등기국", "주식회사")]
    }

    /// 模拟浏览器把证明书保存到下载目录
    fn write_download(&mut self) -> Result<()> {
        let Some(dir) = self.download_dir.clone() else {
            return Ok(());
        };
        self.download_seq += 1;
        let path = dir.join(format!("download-{}.pdf", self.download_seq));
        let mut file = File::create(&path)?;
        file.write_all(b"%PDF-1.4")?;
        // 文件系统时间戳精度较粗，往后挪一点保证晚于等待起点
        file.set_modified(SystemTime::now() + Duration::from_secs(1))?;
        Ok(())
    }

    fn locate(&mut self, intent: &Intent) -> bool {
        match intent {
            Intent::NoResultsMarker => self.no_results.contains(&self.search_name),
            Intent::DuplicateMarker => self.duplicates.contains(&self.search_name),
            Intent::LoadingIndicator => {
                self.indicator_polls += 1;
                self.indicator.pop_front().unwrap_or(false)
            }
            Intent::ResultGrid => !self.rows().is_empty(),
            Intent::ProgressFrame => false,
            Intent::IssuedViewButton => !self.view_button_hidden,
            _ => true,
        }
    }
}

pub fn row(index: usize, name: &str, office: &str, entity: &str) -> ResultRow {
    ResultRow {
        index,
        name: name.to_string(),
        registry_office: office.to_string(),
        entity_type: entity.to_string(),
    }
}

/// 内存远端界面
#[derive(Default)]
pub struct FakeSurface {
    state: Mutex<FakeState>,
}

impl FakeSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(setup: impl FnOnce(&mut FakeState)) -> Self {
        let surface = Self::new();
        setup(&mut surface.state());
        surface
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn clicks_of(&self, intent: &Intent) -> usize {
        self.state().clicks.iter().filter(|c| *c == intent).count()
    }
}

#[async_trait]
impl RemoteSurface for FakeSurface {
    async fn health(&self) -> Result<()> {
        let mut state = self.state();
        match state.health_budget {
            Some(0) => Err(AppError::Browser(BrowserError::Disconnected).into()),
            Some(ref mut budget) => {
                *budget -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn navigate(&self, checkpoint: Checkpoint) -> Result<()> {
        let mut state = self.state();
        state.navigations.push(checkpoint);
        state.page = 0;
        Ok(())
    }

    async fn at_checkpoint(&self, _checkpoint: Checkpoint) -> Result<bool> {
        Ok(true)
    }

    async fn dismiss_overlays(&self) -> Result<usize> {
        Ok(0)
    }

    async fn locate(&self, intent: &Intent) -> Result<bool> {
        Ok(self.state().locate(intent))
    }

    async fn click(&self, intent: &Intent) -> Result<()> {
        let mut state = self.state();
        if *intent == Intent::SearchSubmit {
            let name = state.search_name.clone();
            if let Some(remaining) = state.submit_failures.get_mut(&name) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(anyhow!("검색 버튼 없음"));
                }
            }
        }
        if *intent == Intent::DownloadButton {
            if state.download_failures > 0 {
                state.download_failures -= 1;
                return Err(anyhow!("저장 버튼 응답 없음"));
            }
            state.write_download()?;
        }
        state.clicks.push(intent.clone());
        if state.popup_on.contains(intent) {
            state.popup_seq += 1;
            let id = SurfaceId(format!("popup-{}", state.popup_seq));
            state.surfaces.push(id);
        }
        Ok(())
    }

    async fn fill(&self, intent: &Intent, value: &str) -> Result<()> {
        let mut state = self.state();
        if *intent == Intent::SearchInput {
            state.search_name = value.to_string();
            state.page = 0;
        }
        if matches!(intent, Intent::Filter(_)) && state.rejected_options.contains(value) {
            return Err(anyhow!("检索条件中没有选项 '{}'", value));
        }
        state.fills.push((intent.clone(), value.to_string()));
        Ok(())
    }

    async fn check(&self, intent: &Intent) -> Result<()> {
        self.state().checks.push(intent.clone());
        Ok(())
    }

    async fn wait_for(&self, condition: WaitCondition, _timeout: Duration) -> Result<bool> {
        let mut state = self.state();
        Ok(match condition {
            WaitCondition::Visible(intent) => state.locate(&intent),
            WaitCondition::Hidden(intent) => !state.locate(&intent),
            WaitCondition::Load(LoadState::DomContentLoaded | LoadState::NetworkIdle) => {
                if state.load_error {
                    return Err(anyhow!("页面加载等待失败"));
                }
                true
            }
        })
    }

    async fn read_text(&self) -> Result<String> {
        Ok(self.state().body_text.clone())
    }

    async fn result_rows(&self) -> Result<Vec<ResultRow>> {
        Ok(self.state().rows())
    }

    async fn select_row(&self, index: usize) -> Result<()> {
        self.state().selected.push(index);
        Ok(())
    }

    async fn next_page(&self) -> Result<bool> {
        let mut state = self.state();
        state.next_page_calls += 1;
        let page_count = state.pages.as_ref().map(Vec::len).unwrap_or(0);
        if state.stuck_pagination {
            return Ok(page_count > 0);
        }
        if state.page + 1 < page_count {
            state.page += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn primary_surface(&self) -> SurfaceId {
        SurfaceId(PRIMARY.to_string())
    }

    async fn open_surfaces(&self) -> Result<Vec<SurfaceId>> {
        Ok(self.state().surfaces.clone())
    }

    async fn wait_for_new_surface(
        &self,
        known: &[SurfaceId],
        _timeout: Duration,
    ) -> Result<Option<SurfaceId>> {
        Ok(self
            .state()
            .surfaces
            .iter()
            .find(|id| !known.contains(id))
            .cloned())
    }

    async fn focus(&self, surface: &SurfaceId) -> Result<()> {
        self.state().focused = surface.clone();
        Ok(())
    }

    async fn close_surface(&self, surface: &SurfaceId) -> Result<()> {
        let mut state = self.state();
        state.surfaces.retain(|id| id != surface);
        state.closed.push(surface.clone());
        Ok(())
    }

    async fn unselect_all(&self) -> Result<usize> {
        self.state().unselect_calls += 1;
        Ok(0)
    }
}

/// 按脚本回答的确认；脚本用完后视为输入已关闭
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<bool>>,
    pub asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked_count(&self) -> usize {
        self.asked.lock().unwrap().len()
    }
}

#[async_trait]
impl ConfirmationPrompt for ScriptedPrompt {
    async fn confirm(&self, question: &str) -> Result<bool> {
        self.asked.lock().unwrap().push(question.to_string());
        self.answers.lock().unwrap().pop_front().ok_or_else(|| {
            AppError::Run(RunError::PromptClosed {
                prompt: question.to_string(),
            })
            .into()
        })
    }
}

/// 测试用配置：所有等待都很短
pub fn test_config(flow: FlowKind) -> Config {
    Config {
        max_retries: 3,
        retry_base_delay_ms: 1,
        wait_timeout_ms: 5,
        secondary_appear_timeout_ms: 5,
        secondary_load_timeout_ms: 5,
        indicator_poll_interval_ms: 1,
        flow,
        ..Config::default()
    }
}

/// 生成 `count` 条记录：회사01, 회사02, ...
pub fn companies(count: usize) -> Vec<RecordInput> {
    (1..=count)
        .map(|i| RecordInput::named(format!("회사{:02}", i)))
        .collect()
}
