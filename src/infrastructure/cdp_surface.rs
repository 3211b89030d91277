//! 基于 chromiumoxide 的远端界面实现
//!
//! 每个 [`Intent`] 对应一组按优先级排列的选择器以及可选的文字回退，
//! “先按 ID 找，找不到再按文字找”的回退链只存在于本文件。

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use serde::Deserialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::{AppError, BrowserError};
use crate::infrastructure::js_executor::JsExecutor;
use crate::infrastructure::surface::{
    Checkpoint, Intent, LoadState, RemoteSurface, ResultRow, SurfaceId, WaitCondition,
};
use crate::models::record::RecordField;

/// 轮询页面状态的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(250);
/// 导航后的稳定等待
const SETTLE: Duration = Duration::from_millis(1500);

/// 查找目标元素的方式
struct Target {
    selectors: Vec<String>,
    text: Option<&'static str>,
    scope: &'static str,
}

impl Target {
    fn css(selectors: &[&str]) -> Self {
        Self {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            text: None,
            scope: "a, button, input",
        }
    }

    fn with_text(mut self, text: &'static str, scope: &'static str) -> Self {
        self.text = Some(text);
        self.scope = scope;
        self
    }
}

fn target_of(intent: &Intent) -> Target {
    match intent {
        Intent::Filter(field) => Target::css(&[]).with_text(field.header(), "label"),
        Intent::SearchInput => Target::css(&[
            "#mf_wfm_potal_main_wfm_content_sbx_conm___input",
            "input[title*='상호']",
        ]),
        Intent::SearchSubmit => Target::css(&["#mf_wfm_potal_main_wfm_content_btn_conm_search"])
            .with_text("검색", "a, button, input"),
        Intent::NoResultsMarker => Target::css(&[])
            .with_text("검색조건에 맞는 법인등기기록을 찾지 못했습니다", "span, b, p, td"),
        Intent::ResultGrid => Target::css(&["[id*='grd'] tbody tr", "table tbody tr"]),
        Intent::NextButton => Target::css(&["#mf_wfm_potal_main_wfm_content_btn_next"])
            .with_text("다음", "a, button, input"),
        Intent::ViewOption => Target::css(&["input[type='radio'][data-index='0']"]),
        Intent::RegistryItem(row) => Target {
            selectors: vec![format!("input[type='checkbox'][data-rowindex='{}']", row)],
            text: None,
            scope: "input",
        },
        Intent::ProgressFrame => Target::css(&["#__processbarIFrame"]),
        Intent::DisclosurePrivate => Target::css(&[]).with_text("미공개", "label, input"),
        Intent::AddButton => Target::css(&["#mf_wfm_potal_main_wfm_content_btn_new_add"])
            .with_text("추가", "a, button"),
        Intent::PayButton => {
            Target::css(&["#mf_wfm_potal_main_wfm_content_btn_pay"]).with_text("결제", "a, button")
        }
        Intent::DuplicateMarker => Target::css(&["#mf_wfm_potal_main_wfm_content_wq_uuid_14688"]),
        Intent::LoadingIndicator => Target::css(&[
            "#processMsgLayer",
            ".pro_loading",
            "[class*='loading']",
            "[id*='loading']",
        ])
        .with_text("처리 중입니다.", "div, span, p"),
        Intent::ViewIssueButton => Target::css(&[]).with_text("열람/발급", "a, button"),
        Intent::DialogConfirm => Target::css(&[]).with_text("확인", "a, button, input"),
        Intent::IssuedViewButton => Target::css(&[]).with_text("열람", "button"),
        Intent::DownloadButton => Target::css(&[
            "div[id*='popup'] input[id*='btn_download']",
            "input[type='button'][value='저장']",
            "[title*='저장']",
        ])
        .with_text("저장", "a, button, input"),
    }
}

/// 页面内公用的查找函数
const FIND_FN: &str = r#"
    const __visible = (el) => !!el && el.offsetParent !== null;
    const __find = (selectors, text, scope) => {
        for (const s of selectors) {
            try {
                const el = document.querySelector(s);
                if (__visible(el)) return el;
            } catch (e) {}
        }
        if (text) {
            const candidates = Array.from(document.querySelectorAll(scope));
            const exact = candidates.find(el => __visible(el) && ((el.textContent || el.value || '').trim() === text));
            if (exact) return exact;
            const partial = candidates.find(el => __visible(el) && ((el.textContent || el.value || '').includes(text)));
            if (partial) return partial;
        }
        return null;
    };
    const __rows = () => Array.from(document.querySelectorAll('tr')).filter(row => {
        const cells = row.querySelectorAll('td');
        return cells.length > 2 && cells[2].textContent.trim();
    });
"#;

/// CDP 远端界面
pub struct CdpSurface {
    browser: Browser,
    executor: JsExecutor,
    home_url: String,
    primary_id: SurfaceId,
}

impl CdpSurface {
    pub fn new(browser: Browser, page: Page, home_url: impl Into<String>) -> Self {
        let primary_id = surface_id_of(&page);
        Self {
            browser,
            executor: JsExecutor::new(page),
            home_url: home_url.into(),
            primary_id,
        }
    }

    /// 在当前焦点页面上执行“查找 + 动作”脚本
    async fn run_on_target(&self, intent: &Intent, action: &str) -> Result<JsonOutcome> {
        let target = target_of(intent);
        let js_code = format!(
            r#"
            (() => {{
                {find}
                const el = __find({selectors}, {text}, {scope});
                if (!el) return {{ found: false }};
                {action}
                return {{ found: true }};
            }})()
            "#,
            find = FIND_FN,
            selectors = serde_json::to_string(&target.selectors)?,
            text = serde_json::to_string(&target.text)?,
            scope = serde_json::to_string(target.scope)?,
            action = action,
        );
        debug!("{} 执行脚本: {}", intent, action.trim());
        self.executor.eval_as(js_code).await
    }

    /// 按标签文字选择下拉项
    async fn select_by_label(&self, field: RecordField, value: &str) -> Result<()> {
        let js_code = format!(
            r#"
            (() => {{
                const label = Array.from(document.querySelectorAll('label'))
                    .find(l => l.textContent.trim() === {header});
                let select = null;
                if (label && label.htmlFor) select = document.getElementById(label.htmlFor);
                if (!select && label) select = label.parentElement && label.parentElement.querySelector('select');
                if (!select) return {{ found: false }};
                const option = Array.from(select.options).find(o => o.text.trim() === {value});
                if (!option) return {{ found: true, selected: false }};
                select.value = option.value;
                select.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return {{ found: true, selected: true }};
            }})()
            "#,
            header = serde_json::to_string(field.header())?,
            value = serde_json::to_string(value)?,
        );
        let outcome: JsonOutcome = self.executor.eval_as(js_code).await?;
        if !outcome.found {
            bail!("找不到检索条件: {}", field.header());
        }
        if outcome.selected == Some(false) {
            bail!("检索条件 {} 中没有选项 '{}'", field.header(), value);
        }
        Ok(())
    }

    async fn click_menu_link(&self, exact: &str, fallback_ids: &[&str]) -> Result<()> {
        let js_code = format!(
            r#"
            (() => {{
                for (const id of {ids}) {{
                    const el = document.querySelector(id);
                    if (el) {{ el.click(); return true; }}
                }}
                const links = Array.from(document.querySelectorAll('a'));
                const link = links.find(l => l.textContent && l.textContent.trim() === {text})
                    || links.find(l => l.textContent && l.textContent.includes({text}));
                if (link) {{ link.click(); return true; }}
                return false;
            }})()
            "#,
            ids = serde_json::to_string(fallback_ids)?,
            text = serde_json::to_string(exact)?,
        );
        let clicked: bool = self.executor.eval_as(js_code).await?;
        if !clicked {
            bail!("找不到菜单: {}", exact);
        }
        Ok(())
    }

    async fn go_home(&self) -> Result<()> {
        self.executor.reset_to_primary();
        let home_button: bool = self
            .executor
            .eval_as(
                r#"(() => {
                    const el = document.querySelector('#mf_wfm_potal_main_wf_header_btn_home');
                    if (el) { el.click(); return true; }
                    return false;
                })()"#,
            )
            .await
            .unwrap_or(false);

        if !home_button {
            debug!("首页按钮不可用，直接跳转 {}", self.home_url);
            self.executor
                .primary()
                .goto(self.home_url.as_str())
                .await
                .map_err(|e| AppError::navigation_failed(&self.home_url, e))?;
        }
        self.wait_for(
            WaitCondition::Load(LoadState::DomContentLoaded),
            Duration::from_secs(30),
        )
        .await?;
        sleep(SETTLE).await;
        Ok(())
    }

    async fn find_page(&self, surface: &SurfaceId) -> Result<Page> {
        let pages = self.browser.pages().await?;
        pages
            .into_iter()
            .find(|p| &surface_id_of(p) == surface)
            .ok_or_else(|| {
                AppError::Browser(BrowserError::SurfaceGone {
                    target: surface.to_string(),
                })
                .into()
            })
    }

    async fn condition_holds(&self, condition: &WaitCondition) -> Result<bool> {
        match condition {
            WaitCondition::Visible(intent) => self.locate(intent).await,
            WaitCondition::Hidden(intent) => Ok(!self.locate(intent).await?),
            WaitCondition::Load(LoadState::DomContentLoaded) => {
                self.executor
                    .eval_as("document.readyState !== 'loading'")
                    .await
            }
            WaitCondition::Load(LoadState::NetworkIdle) => {
                self.executor
                    .eval_as("document.readyState === 'complete'")
                    .await
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonOutcome {
    found: bool,
    #[serde(default)]
    selected: Option<bool>,
}

fn surface_id_of(page: &Page) -> SurfaceId {
    SurfaceId(page.target_id().inner().clone())
}

#[async_trait]
impl RemoteSurface for CdpSurface {
    async fn health(&self) -> Result<()> {
        self.executor
            .eval_on_primary("1")
            .await
            .map_err(|_| AppError::Browser(BrowserError::Disconnected))?;
        Ok(())
    }

    async fn navigate(&self, checkpoint: Checkpoint) -> Result<()> {
        info!("🧭 导航到检查点: {:?}", checkpoint);
        self.go_home().await?;
        self.dismiss_overlays().await?;

        match checkpoint {
            Checkpoint::Home => {}
            Checkpoint::Search => {
                self.click_menu_link("법인 열람·발급", &[]).await?;
                self.wait_for(
                    WaitCondition::Visible(Intent::SearchInput),
                    Duration::from_secs(15),
                )
                .await?;
                sleep(SETTLE).await;
                self.dismiss_overlays().await?;
            }
            Checkpoint::IssuedList => {
                self.click_menu_link("열람·발급", &["#mf_wfm_potal_main_wf_header_wq_uuid_503"])
                    .await?;
                sleep(SETTLE).await;
                self.click_menu_link(
                    "신청결과 확인",
                    &["#mf_wfm_potal_main_wf_header_gen_depth1_0_gen_depth2_1_gen_depth3_6_btn_top_menu3b"],
                )
                .await?;
                self.wait_for(
                    WaitCondition::Load(LoadState::NetworkIdle),
                    Duration::from_secs(15),
                )
                .await?;
                sleep(SETTLE).await;
            }
        }
        Ok(())
    }

    async fn at_checkpoint(&self, checkpoint: Checkpoint) -> Result<bool> {
        match checkpoint {
            Checkpoint::Home => {
                self.executor
                    .eval_as(
                        r#"Array.from(document.querySelectorAll('a'))
                            .some(a => a.offsetParent !== null && a.textContent.includes('법인 열람·발급'))"#,
                    )
                    .await
            }
            Checkpoint::Search => self.locate(&Intent::SearchInput).await,
            Checkpoint::IssuedList => {
                self.executor
                    .eval_as("!!document.body && document.body.innerText.includes('신청결과')")
                    .await
            }
        }
    }

    async fn dismiss_overlays(&self) -> Result<usize> {
        let removed: usize = self
            .executor
            .eval_as(
                r#"
                (() => {
                    let count = 0;
                    const visible = el => el.offsetParent !== null;
                    const pending = Array.from(document.querySelectorAll('div, p, span'))
                        .some(el => visible(el) && el.textContent.includes('결제할 등기사항증명서가 존재합니다'));
                    if (pending) {
                        const cancel = Array.from(document.querySelectorAll('a, button'))
                            .find(el => visible(el) && el.textContent.trim() === '취소');
                        if (cancel) { cancel.click(); count++; }
                    }
                    Array.from(document.querySelectorAll('a'))
                        .filter(a => visible(a) && a.textContent.includes('오늘 다시 보지 않기'))
                        .forEach(a => { a.click(); count++; });
                    document.querySelectorAll('[class*="popup"], [id*="popup"], [class*="layer"][class*="banner"]')
                        .forEach(el => { if (visible(el)) { el.style.display = 'none'; count++; } });
                    return count;
                })()
                "#,
            )
            .await?;
        if removed > 0 {
            debug!("🧹 关闭了 {} 个弹层", removed);
        }
        Ok(removed)
    }

    async fn locate(&self, intent: &Intent) -> Result<bool> {
        if let Intent::Filter(field) = intent {
            let js_code = format!(
                "Array.from(document.querySelectorAll('label')).some(l => l.textContent.trim() === {})",
                serde_json::to_string(field.header())?
            );
            return self.executor.eval_as(js_code).await;
        }
        Ok(self.run_on_target(intent, "").await?.found)
    }

    async fn click(&self, intent: &Intent) -> Result<()> {
        let outcome = self.run_on_target(intent, "el.click();").await?;
        if !outcome.found {
            bail!("找不到可点击的元素: {}", intent);
        }
        Ok(())
    }

    async fn fill(&self, intent: &Intent, value: &str) -> Result<()> {
        if let Intent::Filter(field) = intent {
            return self.select_by_label(*field, value).await;
        }
        let action = format!(
            r#"
                el.focus();
                el.value = {};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                el.blur();
            "#,
            serde_json::to_string(value)?
        );
        let outcome = self.run_on_target(intent, &action).await?;
        if !outcome.found {
            bail!("找不到输入框: {}", intent);
        }
        Ok(())
    }

    async fn check(&self, intent: &Intent) -> Result<()> {
        let outcome = self
            .run_on_target(
                intent,
                r#"
                const input = el.tagName === 'LABEL' && el.htmlFor ? document.getElementById(el.htmlFor) : el;
                if (input && 'checked' in input) { if (!input.checked) input.click(); } else { el.click(); }
                "#,
            )
            .await?;
        if !outcome.found {
            bail!("找不到可勾选的元素: {}", intent);
        }
        Ok(())
    }

    async fn wait_for(&self, condition: WaitCondition, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.condition_holds(&condition).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                // 页面切换期间脚本可能失败，继续轮询
                Err(e) => debug!("等待 {:?} 时脚本失败: {}", condition, e),
            }
            if Instant::now() >= deadline {
                debug!("等待 {:?} 超时 ({:?})", condition, timeout);
                return Ok(false);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn read_text(&self) -> Result<String> {
        self.executor
            .eval_as("document.body ? document.body.innerText : ''")
            .await
    }

    async fn result_rows(&self) -> Result<Vec<ResultRow>> {
        let js_code = format!(
            r#"
            (() => {{
                {find}
                return __rows().map((row, index) => {{
                    const cells = row.querySelectorAll('td');
                    const text = i => (cells[i] ? cells[i].textContent.trim() : '');
                    return {{ index, name: text(2), entity_type: text(3), registry_office: text(4) }};
                }});
            }})()
            "#,
            find = FIND_FN
        );
        let rows: Vec<RawRow> = self.executor.eval_as(js_code).await?;
        Ok(rows
            .into_iter()
            .map(|r| ResultRow {
                index: r.index,
                name: r.name,
                registry_office: r.registry_office,
                entity_type: r.entity_type,
            })
            .collect())
    }

    async fn select_row(&self, index: usize) -> Result<()> {
        let js_code = format!(
            r#"
            (() => {{
                {find}
                const row = __rows()[{index}];
                if (!row) return false;
                const box = row.querySelector('input[type="checkbox"], input[type="radio"]');
                if (!box) return false;
                if (!box.checked) box.click();
                return box.checked;
            }})()
            "#,
            find = FIND_FN,
            index = index
        );
        let checked: bool = self.executor.eval_as(js_code).await?;
        if !checked {
            bail!("无法勾选第 {} 行", index + 1);
        }
        Ok(())
    }

    async fn next_page(&self) -> Result<bool> {
        let clicked: bool = self
            .executor
            .eval_as(
                r#"
                (() => {
                    const active = document.querySelector('.w2pageList_control_pageNum_active');
                    const current = active ? parseInt(active.textContent.trim(), 10) : 1;
                    const next = String(current + 1);
                    const visible = el => el.offsetParent !== null;
                    const controls = Array.from(document.querySelectorAll('button, a'));
                    const byNumber = controls.find(el => visible(el) && el.textContent.trim() === next);
                    const byLabel = controls.find(el => visible(el) &&
                        ((el.getAttribute('title') || '').includes('다음 페이지') || el.textContent.trim() === '다음 페이지'));
                    const byImage = Array.from(document.querySelectorAll("img[alt='다음 페이지']"))
                        .map(img => img.closest('a, button') || img)
                        .find(visible);
                    const target = byNumber || byLabel || byImage;
                    if (!target) return false;
                    target.click();
                    return true;
                })()
                "#,
            )
            .await?;
        if clicked {
            sleep(SETTLE).await;
        }
        Ok(clicked)
    }

    fn primary_surface(&self) -> SurfaceId {
        self.primary_id.clone()
    }

    async fn open_surfaces(&self) -> Result<Vec<SurfaceId>> {
        let pages = self.browser.pages().await?;
        Ok(pages.iter().map(surface_id_of).collect())
    }

    async fn wait_for_new_surface(
        &self,
        known: &[SurfaceId],
        timeout: Duration,
    ) -> Result<Option<SurfaceId>> {
        let deadline = Instant::now() + timeout;
        loop {
            let opened = self.open_surfaces().await?;
            if let Some(new_surface) = opened.into_iter().find(|id| !known.contains(id)) {
                return Ok(Some(new_surface));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn focus(&self, surface: &SurfaceId) -> Result<()> {
        if *surface == self.primary_id {
            self.executor.reset_to_primary();
            self.executor.primary().bring_to_front().await?;
            return Ok(());
        }
        let page = self
            .find_page(surface)
            .await
            .with_context(|| format!("无法切换到界面 {}", surface))?;
        page.bring_to_front().await?;
        self.executor.set_current(page);
        Ok(())
    }

    async fn close_surface(&self, surface: &SurfaceId) -> Result<()> {
        if *surface == self.primary_id {
            return Err(anyhow!("不能关闭主界面"));
        }
        let page = self.find_page(surface).await?;
        if surface_id_of(&self.executor.current()) == *surface {
            self.executor.reset_to_primary();
        }
        if let Err(e) = page.close().await {
            warn!("⚠️ 关闭界面 {} 失败: {}", surface, e);
            return Err(e.into());
        }
        Ok(())
    }

    async fn unselect_all(&self) -> Result<usize> {
        let cleared: usize = serde_json::from_value(
            self.executor
                .eval_on_primary(
                    r#"
                    (() => {
                        let count = 0;
                        document.querySelectorAll('tr input[type="checkbox"]').forEach(box => {
                            if (box.checked) { box.click(); count++; }
                        });
                        return count;
                    })()
                    "#,
                )
                .await?,
        )?;
        Ok(cleared)
    }
}

#[derive(Debug, Deserialize)]
struct RawRow {
    index: usize,
    name: String,
    registry_office: String,
    entity_type: String,
}
