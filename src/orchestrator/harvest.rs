//! 付款后收取 - 编排层
//!
//! 在“신청결과 확인”页面逐个打开已付款的证明书、保存并重命名。
//! 单个文件失败只记录并跳过，不重试，也不影响整个运行。

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{anyhow, bail, Result};
use tracing::{debug, info, warn};

use crate::infrastructure::{Checkpoint, Intent, RemoteSurface, WaitCondition};
use crate::services::{wait_for_artifact, DocumentPostProcessor, SecondarySurfaceSync};

/// 收取结果
#[derive(Debug, Default)]
pub struct HarvestReport {
    pub saved: Vec<PathBuf>,
    pub failed: Vec<(usize, String)>,
}

impl HarvestReport {
    pub fn attempted(&self) -> usize {
        self.saved.len() + self.failed.len()
    }
}

/// 收取器
pub struct Harvester<'a> {
    surface: &'a dyn RemoteSurface,
    sync: &'a SecondarySurfaceSync,
    processor: &'a dyn DocumentPostProcessor,
    download_dir: PathBuf,
    wait: Duration,
}

impl<'a> Harvester<'a> {
    pub fn new(
        surface: &'a dyn RemoteSurface,
        sync: &'a SecondarySurfaceSync,
        processor: &'a dyn DocumentPostProcessor,
        download_dir: impl AsRef<Path>,
        wait: Duration,
    ) -> Self {
        Self {
            surface,
            sync,
            processor,
            download_dir: download_dir.as_ref().to_path_buf(),
            wait,
        }
    }

    /// 收取最多 `expected` 个文件
    pub async fn harvest(&self, expected: usize) -> Result<HarvestReport> {
        info!("📥 开始收取 {} 个证明书", expected);
        self.surface.navigate(Checkpoint::IssuedList).await?;

        let mut report = HarvestReport::default();
        for item in 1..=expected {
            match self.harvest_one(item).await {
                Ok(Some(path)) => {
                    info!("[文件 {}/{}] ✓ 已保存: {}", item, expected, path.display());
                    report.saved.push(path);
                }
                Ok(None) => {
                    warn!(
                        "[文件 {}/{}] 没有更多可查阅的证明书，提前结束",
                        item, expected
                    );
                    break;
                }
                Err(e) => {
                    warn!("[文件 {}/{}] ⚠️ 跳过: {:#}", item, expected, e);
                    report.failed.push((item, format!("{:#}", e)));
                    let primary = self.surface.primary_surface();
                    if let Err(e) = self.surface.focus(&primary).await {
                        debug!("回到主页面失败: {}", e);
                    }
                }
            }
        }

        info!(
            "📥 收取完成: 成功 {} / 失败 {}",
            report.saved.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// 收取一个文件；列表中已没有“열람”按钮时返回 `None`
    async fn harvest_one(&self, item: usize) -> Result<Option<PathBuf>> {
        if !self.ensure_view_button().await? {
            return Ok(None);
        }

        let since = SystemTime::now();
        let wait = self.wait;
        let surface = self.surface;
        let window = self
            .sync
            .spawn(surface, async move {
                surface.click(&Intent::IssuedViewButton).await?;
                if surface
                    .wait_for(WaitCondition::Visible(Intent::DialogConfirm), wait)
                    .await?
                {
                    surface.click(&Intent::DialogConfirm).await?;
                }
                Ok::<(), anyhow::Error>(())
            })
            .await?;
        if window.is_none() {
            debug!("[文件 {}] 查阅内容在主页面的弹层中", item);
            self.sync.stabilize(surface).await?;
        }

        let saved = self.save_current(item, since).await;

        match window {
            Some(id) => {
                self.sync.reconcile(surface, id, true).await?;
            }
            None => {
                surface.dismiss_overlays().await?;
            }
        }
        saved.map(Some)
    }

    async fn save_current(&self, item: usize, since: SystemTime) -> Result<PathBuf> {
        if !self
            .surface
            .wait_for(WaitCondition::Visible(Intent::DownloadButton), self.wait)
            .await?
        {
            bail!("找不到保存按钮");
        }
        self.surface.click(&Intent::DownloadButton).await?;

        let artifact = wait_for_artifact(&self.download_dir, since, self.wait * 3)
            .await?
            .ok_or_else(|| anyhow!("下载目录 {} 中没有新的 PDF", self.download_dir.display()))?;
        debug!("[文件 {}] 下载完成: {}", item, artifact.display());

        match self.processor.process(&artifact).await {
            Ok(renamed) => Ok(renamed),
            Err(e) => {
                warn!("[文件 {}] ⚠️ 后处理失败，保留原文件: {:#}", item, e);
                Ok(artifact)
            }
        }
    }

    /// 当前页没有“열람”按钮时翻页（首行不变视为没有下一页）
    ///
    /// 返回 `false` 表示已经没有可查阅的证明书
    async fn ensure_view_button(&self) -> Result<bool> {
        if self.surface.locate(&Intent::IssuedViewButton).await? {
            return Ok(true);
        }
        let before = first_row_name(self.surface).await;
        if !self.surface.next_page().await? {
            return Ok(false);
        }
        let after = first_row_name(self.surface).await;
        if after.is_empty() || after == before {
            return Ok(false);
        }
        self.surface.locate(&Intent::IssuedViewButton).await
    }
}

async fn first_row_name(surface: &dyn RemoteSurface) -> String {
    surface
        .result_rows()
        .await
        .ok()
        .and_then(|rows| rows.into_iter().next())
        .map(|row| row.name)
        .unwrap_or_default()
}
